use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open capture source {device}: {reason}")]
    Open { device: String, reason: String },
    #[error("no frame captured after {attempts} consecutive attempts")]
    Exhausted { attempts: u32 },
}

/// Where frames come from: a live capture device or a recorded file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureTarget {
    /// Device index (`"0"`) or platform device name (`"/dev/video2"`,
    /// `"video=Integrated Camera"`).
    Device(String),
    File(PathBuf),
}

impl CaptureTarget {
    pub fn is_live(&self) -> bool {
        matches!(self, CaptureTarget::Device(_))
    }
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureTarget::Device(d) => write!(f, "device {d}"),
            CaptureTarget::File(p) => write!(f, "file {}", p.display()),
        }
    }
}

/// Result of one read attempt.
#[derive(Debug)]
pub enum FrameRead {
    Frame(Frame),
    /// The source produced nothing this time; the caller may retry.
    Empty,
    /// A finite source has no more frames.
    EndOfStream,
}

/// Pull-based frame acquisition.
///
/// `read` errors are transient from the caller's point of view: the
/// orchestrator retries them together with `Empty` reads.
pub trait FrameSource: Send {
    fn read(&mut self) -> Result<FrameRead, Box<dyn std::error::Error>>;

    /// Releases the underlying device or file. Reads after closing report
    /// `EndOfStream`.
    fn close(&mut self);
}
