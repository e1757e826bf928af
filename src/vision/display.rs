use opencv::prelude::*;
use opencv::{core, highgui, imgproc};

use crate::config::RenderConfig;
use crate::error::Result;
use crate::fps::fps_caption;
use crate::pipeline::{Flow, Renderer};
use crate::postprocess::Detection;

const KEY_ESCAPE: i32 = 27;
const KEY_Q: i32 = 'q' as i32;

/// Draws detections and presents them in a highgui window.
pub struct WindowRenderer {
    window: String,
    style: RenderConfig,
}

impl WindowRenderer {
    pub fn new(style: RenderConfig) -> Result<Self> {
        let window = style.window_title.clone();
        highgui::named_window_def(&window)?;
        Ok(Self { window, style })
    }

    fn window_closed(&self) -> Result<bool> {
        let visible = highgui::get_window_property(&self.window, highgui::WND_PROP_VISIBLE)?;
        Ok(visible < 1.0)
    }
}

impl Renderer<Mat> for WindowRenderer {
    fn render(&mut self, frame: &mut Mat, detections: &[Detection], fps: f64) -> Result<Flow> {
        draw_detections(frame, detections, &self.style)?;
        draw_fps(frame, fps, &self.style)?;
        highgui::imshow(&self.window, &*frame)?;

        let key = highgui::poll_key()?;
        if key == KEY_ESCAPE || key == KEY_Q || self.window_closed()? {
            return Ok(Flow::Stop);
        }
        Ok(Flow::Continue)
    }
}

fn color(style: &RenderConfig) -> core::Scalar {
    let [b, g, r] = style.color;
    core::Scalar::new(b as f64, g as f64, r as f64, 0.0)
}

pub fn draw_detections(frame: &mut Mat, detections: &[Detection], style: &RenderConfig) -> Result<()> {
    let color = color(style);
    for detection in detections {
        let bbox = &detection.bbox;
        let rect = core::Rect::new(
            bbox.left.round() as i32,
            bbox.top.round() as i32,
            bbox.width.round() as i32,
            bbox.height.round() as i32,
        );
        imgproc::rectangle(
            frame,
            rect,
            color,
            style.box_thickness,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::put_text(
            frame,
            &detection.caption(),
            core::Point::new(rect.x, rect.y - 5),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            color,
            style.label_thickness,
            imgproc::LINE_8,
            false,
        )?;
    }
    Ok(())
}

fn draw_fps(frame: &mut Mat, fps: f64, style: &RenderConfig) -> Result<()> {
    imgproc::put_text(
        frame,
        &fps_caption(fps),
        core::Point::new(10, 25),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.7,
        color(style),
        2,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}
