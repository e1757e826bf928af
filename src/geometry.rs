use serde::Serialize;

/// Axis-aligned box in pixel units, anchored at its top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Convert a normalized center/size box into pixel space for a frame.
    pub fn from_normalized_center(
        center_x: f32,
        center_y: f32,
        width: f32,
        height: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let frame_width = frame_width as f32;
        let frame_height = frame_height as f32;
        let pixel_width = width * frame_width;
        let pixel_height = height * frame_height;
        Self {
            left: center_x * frame_width - pixel_width / 2.0,
            top: center_y * frame_height - pixel_height / 2.0,
            width: pixel_width,
            height: pixel_height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn area(&self) -> f32 {
        if self.width <= 0.0 || self.height <= 0.0 {
            return 0.0;
        }
        self.width * self.height
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let w = (self.right().min(other.right()) - self.left.max(other.left)).max(0.0);
        let h = (self.bottom().min(other.bottom()) - self.top.max(other.top)).max(0.0);
        w * h
    }

    /// Intersection over union. Zero-area and disjoint boxes give 0.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        if self.area() == 0.0 || other.area() == 0.0 {
            return 0.0;
        }
        let intersection = self.intersection_area(other);
        if intersection <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}
