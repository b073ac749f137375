use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::shared::constants::UNKNOWN_IDENTITY;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("face crop is empty")]
    EmptyCrop,
    #[error("recognition backend failed: {0}")]
    Backend(String),
    #[error("scratch file error: {0}")]
    Scratch(#[source] std::io::Error),
    #[error("embedding model failed: {0}")]
    Model(String),
}

/// Domain interface for resolving a face crop to a gallery label.
///
/// Implementations only read the gallery, so calls may be retried freely.
/// `Ok(None)` means the face matched nobody.
pub trait FaceRecognizer: Send {
    fn recognize(&self, crop: &Frame) -> Result<Option<String>, RecognitionError>;
}

/// Outcome of recognition as reported per face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn label(&self) -> &str {
        match self {
            Identity::Known(label) => label,
            Identity::Unknown => UNKNOWN_IDENTITY,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Identity::Known(_))
    }
}

impl From<Option<String>> for Identity {
    fn from(label: Option<String>) -> Self {
        match label {
            Some(label) if !label.is_empty() => Identity::Known(label),
            _ => Identity::Unknown,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
