//! ArcFace embedding recognizer on ONNX Runtime.
//!
//! Gallery images are embedded once at construction. A crop takes the label
//! of its most similar reference when the cosine similarity reaches the
//! threshold.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

use crate::detection::infrastructure::onnx_session::open_session;
use crate::recognition::domain::face_recognizer::{FaceRecognizer, RecognitionError};
use crate::recognition::domain::gallery::Gallery;
use crate::shared::frame::Frame;

pub const DEFAULT_THRESHOLD: f64 = 0.4;

const INPUT_SIDE: u32 = 112;

struct Reference {
    label: String,
    /// Unit length.
    embedding: Vec<f32>,
}

pub struct EmbeddingFaceRecognizer {
    session: Mutex<ort::session::Session>,
    references: Vec<Reference>,
    threshold: f64,
}

impl EmbeddingFaceRecognizer {
    pub fn new(
        model_path: &Path,
        gallery: &Gallery,
        threshold: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut recognizer = Self {
            session: Mutex::new(open_session(model_path)?),
            references: Vec::new(),
            threshold,
        };
        recognizer.enroll(gallery);
        Ok(recognizer)
    }

    /// Unreadable or unembeddable images are skipped with a warning.
    fn enroll(&mut self, gallery: &Gallery) {
        for entry in gallery.entries() {
            let embedded = image::open(&entry.path)
                .map_err(|e| e.to_string())
                .and_then(|img| self.embed(&img.to_rgb8()).map_err(|e| e.to_string()));
            match embedded {
                Ok(embedding) => self.references.push(Reference {
                    label: entry.label.clone(),
                    embedding,
                }),
                Err(e) => log::warn!("Reference {} skipped: {e}", entry.path.display()),
            }
        }
        log::info!(
            "{} reference embedding(s) across {} identit(ies)",
            self.references.len(),
            gallery.labels().len()
        );
    }

    fn embed(&self, face: &RgbImage) -> Result<Vec<f32>, RecognitionError> {
        if face.width() == 0 || face.height() == 0 {
            return Err(RecognitionError::EmptyCrop);
        }
        let model_err = |e: ort::Error| RecognitionError::Model(e.to_string());

        let input = ort::value::Tensor::from_array(to_input(face)).map_err(model_err)?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| RecognitionError::Model("embedding session poisoned".into()))?;
        let outputs = session.run(ort::inputs![input]).map_err(model_err)?;
        let raw = outputs[0].try_extract_array::<f32>().map_err(model_err)?;

        let mut embedding: Vec<f32> = raw.iter().copied().collect();
        normalize(&mut embedding);
        Ok(embedding)
    }
}

impl FaceRecognizer for EmbeddingFaceRecognizer {
    fn recognize(&self, crop: &Frame) -> Result<Option<String>, RecognitionError> {
        let face = match crop.to_rgb_image() {
            Some(img) if !crop.is_empty() => img,
            _ => return Err(RecognitionError::EmptyCrop),
        };
        if self.references.is_empty() {
            return Ok(None);
        }
        let embedding = self.embed(&face)?;
        Ok(closest(&embedding, &self.references, self.threshold).map(str::to_string))
    }
}

/// Label of the most similar reference at or above `threshold`.
fn closest<'a>(embedding: &[f32], references: &'a [Reference], threshold: f64) -> Option<&'a str> {
    references
        .iter()
        .map(|r| (r.label.as_str(), cosine(embedding, &r.embedding)))
        .filter(|&(_, similarity)| similarity >= threshold)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(label, _)| label)
}

/// 112x112 face as `[1, 3, H, W]`, each channel mapped to [-1, 1].
fn to_input(face: &RgbImage) -> Array4<f32> {
    let scaled = imageops::resize(face, INPUT_SIDE, INPUT_SIDE, FilterType::Triangle);
    let side = INPUT_SIDE as usize;
    Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        scaled.get_pixel(x as u32, y as u32)[c] as f32 / 127.5 - 1.0
    })
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Both inputs are unit length, so the dot product is the cosine.
fn cosine(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}
