//! Turns raw detector rows into labeled, de-duplicated pixel-space detections.
//!
//! The detector hands over one tensor per output layer. Each row carries a
//! normalized center/size box followed by one score per class. Rows are
//! filtered by their best class score, converted to pixels and passed through
//! class-agnostic non-maximum suppression.

use serde::{Deserialize, Serialize};

use crate::classes::ClassTable;
use crate::error::{DetectorError, Result};
use crate::geometry::BoundingBox;
use crate::labels::LabelPolicy;

/// Number of leading box values in a darknet output row.
const DARKNET_BOX_VALUES: usize = 4;
/// Darknet rows put an objectness score between the box and the class scores.
const DARKNET_SCORE_OFFSET: usize = 5;

/// One candidate for one anchor/cell.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetectionRow {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    pub class_scores: Vec<f32>,
}

/// All rows of one detector output layer.
pub type RawOutput = Vec<RawDetectionRow>;

impl RawDetectionRow {
    pub fn new(center_x: f32, center_y: f32, width: f32, height: f32, class_scores: Vec<f32>) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
            class_scores,
        }
    }

    /// Decode a darknet row `[cx, cy, w, h, objectness, scores..]`, dropping objectness.
    pub fn from_darknet(values: &[f32]) -> Result<Self> {
        if values.len() < DARKNET_SCORE_OFFSET {
            return Err(DetectorError::DataShape {
                expected: DARKNET_SCORE_OFFSET,
                actual: values.len(),
            });
        }
        let (bbox, rest) = values.split_at(DARKNET_BOX_VALUES);
        Ok(Self::new(bbox[0], bbox[1], bbox[2], bbox[3], rest[1..].to_vec()))
    }

    /// Highest class score and its index. Ties go to the lowest index.
    pub fn best_class(&self) -> Option<(usize, f32)> {
        let mut scores = self.class_scores.iter().copied().enumerate();
        let mut best = scores.next()?;
        for (class_id, score) in scores {
            if score > best.1 {
                best = (class_id, score);
            }
        }
        Some(best)
    }
}

/// Candidate that passed the confidence filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredBox {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Final per-frame output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    /// Overlay text, e.g. `Human (90.00%)`.
    pub fn caption(&self) -> String {
        format!("{} ({:.2}%)", self.label, self.confidence * 100.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostProcessConfig {
    /// Rows must score strictly above this to survive.
    pub confidence_threshold: f32,
    /// Candidates overlapping a kept box at or above this IoU are dropped.
    pub nms_iou_threshold: f32,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            nms_iou_threshold: 0.4,
        }
    }
}

impl PostProcessConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("nms_iou_threshold", self.nms_iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DetectorError::Configuration(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Greedy class-agnostic NMS. Output is sorted by confidence, descending;
/// equal confidences keep their input order.
pub fn non_maximum_suppression(mut candidates: Vec<ScoredBox>, iou_threshold: f32) -> Vec<ScoredBox> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<ScoredBox> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| k.bbox.iou(&candidate.bbox) < iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}

pub struct DetectionPostProcessor {
    classes: ClassTable,
    config: PostProcessConfig,
    labels: LabelPolicy,
}

impl DetectionPostProcessor {
    pub fn new(classes: ClassTable, config: PostProcessConfig, labels: LabelPolicy) -> Result<Self> {
        if classes.is_empty() {
            return Err(DetectorError::Configuration(
                "class table is empty".to_string(),
            ));
        }
        config.validate()?;
        Ok(Self {
            classes,
            config,
            labels,
        })
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn config(&self) -> &PostProcessConfig {
        &self.config
    }

    /// Filter every row of every output by confidence and convert to pixels.
    pub fn extract_candidates(
        &self,
        outputs: &[RawOutput],
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<ScoredBox>> {
        let mut candidates = Vec::new();
        for row in outputs.iter().flatten() {
            if row.class_scores.len() != self.classes.len() {
                return Err(DetectorError::DataShape {
                    expected: self.classes.len(),
                    actual: row.class_scores.len(),
                });
            }
            // non-empty, length checked above
            let Some((class_id, confidence)) = row.best_class() else {
                continue;
            };
            if confidence > self.config.confidence_threshold {
                candidates.push(ScoredBox {
                    class_id,
                    confidence,
                    bbox: BoundingBox::from_normalized_center(
                        row.center_x,
                        row.center_y,
                        row.width,
                        row.height,
                        frame_width,
                        frame_height,
                    ),
                });
            }
        }
        Ok(candidates)
    }

    /// Run NMS over the candidates and attach display labels.
    pub fn suppress(&self, candidates: Vec<ScoredBox>) -> Vec<Detection> {
        non_maximum_suppression(candidates, self.config.nms_iou_threshold)
            .into_iter()
            .map(|scored| Detection {
                class_id: scored.class_id,
                label: self.label_for(scored.class_id),
                confidence: scored.confidence,
                bbox: scored.bbox,
            })
            .collect()
    }

    pub fn label_for(&self, class_id: usize) -> String {
        self.labels.resolve(self.classes.name(class_id))
    }

    /// Full post-processing for one frame.
    pub fn process(
        &self,
        outputs: &[RawOutput],
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<Detection>> {
        let candidates = self.extract_candidates(outputs, frame_width, frame_height)?;
        let candidate_count = candidates.len();
        let detections = self.suppress(candidates);
        log::debug!(
            "{} candidates above threshold, {} after suppression",
            candidate_count,
            detections.len()
        );
        Ok(detections)
    }
}
