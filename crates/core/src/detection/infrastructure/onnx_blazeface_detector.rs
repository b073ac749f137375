//! BlazeFace short-range detector on ONNX Runtime.
//!
//! 128x128 input, 896 anchors. Boxes come back relative to the frame,
//! which is what the slot tracker and the mesher's ROI stage consume.

use std::cmp::Ordering;
use std::path::Path;

use image::imageops::{self, FilterType};
use ndarray::Array4;

use super::onnx_session::open_session;
use crate::detection::domain::face_detector::{Detection, FaceDetector};
use crate::shared::frame::Frame;
use crate::shared::math::bbox_iou;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const INPUT_SIDE: u32 = 128;
const OVERLAP_LIMIT: f64 = 0.3;
/// Regressor values per anchor: box (4) then six keypoints.
const VALUES_PER_ANCHOR: usize = 16;

/// `(stride, anchors per cell)` for each feature map.
const FEATURE_MAPS: [(u32, usize); 2] = [(8, 2), (16, 6)];

#[derive(Clone, Copy, Debug, PartialEq)]
struct Anchor {
    cx: f32,
    cy: f32,
}

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    min_score: f64,
    anchors: Vec<Anchor>,
}

impl OnnxBlazefaceDetector {
    pub fn new(model_path: &Path, min_score: f64) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: open_session(model_path)?,
            min_score,
            anchors: anchor_grid(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let Some(input) = to_input(frame) else {
            return Ok(Vec::new());
        };
        let outputs = self
            .session
            .run(ort::inputs![ort::value::Tensor::from_array(input)?])?;
        if outputs.len() < 2 {
            return Err(format!("BlazeFace: 2 outputs expected, model has {}", outputs.len()).into());
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let logits = outputs[1].try_extract_array::<f32>()?;
        let boxes = boxes.as_slice().ok_or("BlazeFace: regressor output not contiguous")?;
        let logits = logits.as_slice().ok_or("BlazeFace: score output not contiguous")?;

        let found = decode(boxes, logits, &self.anchors, self.min_score);
        Ok(suppress(found, OVERLAP_LIMIT))
    }
}

/// Frame scaled to the model side, as `[1, 3, H, W]` in [0, 1]. `None` for
/// an empty or non-RGB frame.
fn to_input(frame: &Frame) -> Option<Array4<f32>> {
    if frame.is_empty() {
        return None;
    }
    let rgb = frame.to_rgb_image()?;
    let scaled = imageops::resize(&rgb, INPUT_SIDE, INPUT_SIDE, FilterType::Triangle);
    let side = INPUT_SIDE as usize;
    Some(Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        scaled.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    }))
}

fn anchor_grid() -> Vec<Anchor> {
    FEATURE_MAPS
        .iter()
        .flat_map(|&(stride, per_cell)| {
            let cells = INPUT_SIDE / stride;
            (0..cells).flat_map(move |row| {
                (0..cells).flat_map(move |col| {
                    let anchor = Anchor {
                        cx: (col as f32 + 0.5) / cells as f32,
                        cy: (row as f32 + 0.5) / cells as f32,
                    };
                    std::iter::repeat(anchor).take(per_cell)
                })
            })
        })
        .collect()
}

fn decode(boxes: &[f32], logits: &[f32], anchors: &[Anchor], min_score: f64) -> Vec<Detection> {
    let side = INPUT_SIDE as f32;
    logits
        .iter()
        .zip(anchors)
        .zip(boxes.chunks_exact(VALUES_PER_ANCHOR))
        .filter_map(|((&logit, anchor), reg)| {
            let score = f64::from(logistic(logit));
            if score < min_score {
                return None;
            }
            let cx = anchor.cx + reg[0] / side;
            let cy = anchor.cy + reg[1] / side;
            let (half_w, half_h) = (reg[2] / side / 2.0, reg[3] / side / 2.0);

            let x0 = f64::from((cx - half_w).clamp(0.0, 1.0));
            let y0 = f64::from((cy - half_h).clamp(0.0, 1.0));
            let x1 = f64::from((cx + half_w).clamp(0.0, 1.0));
            let y1 = f64::from((cy + half_h).clamp(0.0, 1.0));
            (x1 > x0 && y1 > y0).then(|| Detection::new(x0, y0, x1 - x0, y1 - y0, score))
        })
        .collect()
}

fn corners(d: &Detection) -> [f64; 4] {
    [d.xmin, d.ymin, d.xmin + d.width, d.ymin + d.height]
}

/// Greedy non-maximum suppression, strongest first.
fn suppress(mut found: Vec<Detection>, overlap_limit: f64) -> Vec<Detection> {
    found.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    let mut kept: Vec<Detection> = Vec::with_capacity(found.len());
    for d in found {
        let box_d = corners(&d);
        if kept.iter().all(|k| bbox_iou(&corners(k), &box_d) <= overlap_limit) {
            kept.push(d);
        }
    }
    kept
}

fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
