//! Recognizer that delegates to an external program.
//!
//! The crop is written to a scratch JPEG and the configured command line is
//! run with `{crop}` and `{gallery}` replaced by the scratch path and the
//! gallery root. The first non-empty line of standard output is the
//! answer: either a bare label, or the path of the matching reference
//! image, in which case its identity folder is the label. No output means
//! no match.
use std::path::PathBuf;
use std::process::Command;

use crate::recognition::domain::face_recognizer::{FaceRecognizer, RecognitionError};
use crate::recognition::domain::gallery::Gallery;
use crate::shared::frame::Frame;

const CROP_PLACEHOLDER: &str = "{crop}";
const GALLERY_PLACEHOLDER: &str = "{gallery}";

pub struct CommandFaceRecognizer {
    program: String,
    args: Vec<String>,
    gallery: Gallery,
}

impl CommandFaceRecognizer {
    /// Splits `command_line` on whitespace into a program and arguments.
    /// No shell is involved, so quoting is not interpreted.
    pub fn new(command_line: &str, gallery: Gallery) -> Result<Self, RecognitionError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| RecognitionError::Backend("empty recognizer command".into()))?;
        let args: Vec<String> = parts.collect();
        if !args.iter().any(|a| a.contains(CROP_PLACEHOLDER)) {
            log::warn!("Recognizer command has no {CROP_PLACEHOLDER} argument; the crop path will not be passed");
        }
        Ok(Self {
            program,
            args,
            gallery,
        })
    }

    fn expand_args(&self, crop_path: &str) -> Vec<String> {
        let gallery = self.gallery.root().to_string_lossy();
        self.args
            .iter()
            .map(|a| {
                a.replace(CROP_PLACEHOLDER, crop_path)
                    .replace(GALLERY_PLACEHOLDER, &gallery)
            })
            .collect()
    }

    fn parse_answer(&self, stdout: &str) -> Option<String> {
        let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
        let path = PathBuf::from(line);
        if let Some(label) = self.gallery.label_for_path(&path) {
            return Some(label);
        }
        if path.components().count() > 1 {
            // A path outside the gallery: fall back to its folder name.
            return path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(str::to_string);
        }
        Some(line.to_string())
    }
}

impl FaceRecognizer for CommandFaceRecognizer {
    fn recognize(&self, crop: &Frame) -> Result<Option<String>, RecognitionError> {
        if crop.is_empty() {
            return Err(RecognitionError::EmptyCrop);
        }
        let image = crop.to_rgb_image().ok_or(RecognitionError::EmptyCrop)?;
        if self.gallery.is_empty() {
            return Ok(None);
        }

        // Removed when dropped, including on every early return below.
        let mut scratch = tempfile::Builder::new()
            .prefix("blinkgate-crop-")
            .suffix(".jpg")
            .tempfile()
            .map_err(RecognitionError::Scratch)?;
        image::DynamicImage::ImageRgb8(image)
            .write_to(scratch.as_file_mut(), image::ImageFormat::Jpeg)
            .map_err(|e| RecognitionError::Scratch(std::io::Error::other(e)))?;

        let crop_path = scratch.path().to_string_lossy().into_owned();
        let output = Command::new(&self.program)
            .args(self.expand_args(&crop_path))
            .output()
            .map_err(|e| RecognitionError::Backend(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Backend(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(self.parse_answer(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn gallery() -> (TempDir, Gallery) {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("ada")).unwrap();
        fs::write(tmp.path().join("ada").join("a.jpg"), b"x").unwrap();
        let g = Gallery::load(tmp.path()).unwrap();
        (tmp, g)
    }

    fn crop() -> Frame {
        Frame::new(vec![90u8; 8 * 8 * 3], 8, 8, 3, 0)
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let (_tmp, g) = gallery();
        assert!(matches!(
            CommandFaceRecognizer::new("   ", g),
            Err(RecognitionError::Backend(_))
        ));
    }

    #[test]
    fn test_expand_args_substitutes_placeholders() {
        let (tmp, g) = gallery();
        let r = CommandFaceRecognizer::new("match --img={crop} --db {gallery}", g).unwrap();
        let args = r.expand_args("/tmp/c.jpg");
        assert_eq!(args[0], "--img=/tmp/c.jpg");
        assert_eq!(args[2], tmp.path().to_string_lossy());
    }

    #[test]
    fn test_parse_answer_variants() {
        let (tmp, g) = gallery();
        let r = CommandFaceRecognizer::new("match {crop}", g).unwrap();
        let inside = tmp.path().join("ada").join("a.jpg");
        assert_eq!(
            r.parse_answer(&format!("{}\n", inside.display())),
            Some("ada".to_string())
        );
        assert_eq!(r.parse_answer("\n  grace  \nignored"), Some("grace".to_string()));
        assert_eq!(
            r.parse_answer("/other/db/linus/x.jpg"),
            Some("linus".to_string())
        );
        assert_eq!(r.parse_answer(""), None);
        assert_eq!(r.parse_answer("\n\n"), None);
    }

    #[test]
    fn test_empty_crop_is_rejected_before_spawning() {
        let (_tmp, g) = gallery();
        let r = CommandFaceRecognizer::new("definitely-not-a-real-binary {crop}", g).unwrap();
        let empty = Frame::new(Vec::new(), 0, 0, 3, 0);
        assert!(matches!(r.recognize(&empty), Err(RecognitionError::EmptyCrop)));
    }

    #[test]
    fn test_missing_program_is_backend_error() {
        let (_tmp, g) = gallery();
        let r = CommandFaceRecognizer::new("definitely-not-a-real-binary {crop}", g).unwrap();
        assert!(matches!(r.recognize(&crop()), Err(RecognitionError::Backend(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_command_and_reads_label() {
        let (_tmp, g) = gallery();
        let r = CommandFaceRecognizer::new("echo ada", g).unwrap();
        assert_eq!(r.recognize(&crop()).unwrap(), Some("ada".to_string()));
    }

    #[test]
    fn test_missing_gallery_answers_unknown_without_running() {
        let tmp = TempDir::new().unwrap();
        let g = Gallery::load_or_empty(&tmp.path().join("faces")).unwrap();
        let r = CommandFaceRecognizer::new("echo ada", g).unwrap();
        assert_eq!(r.recognize(&crop()).unwrap(), None);

        // A broken backend is never reached either.
        let g = Gallery::load_or_empty(&tmp.path().join("faces")).unwrap();
        let r = CommandFaceRecognizer::new("false {crop}", g).unwrap();
        assert_eq!(r.recognize(&crop()).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_scratch_crop_exists_while_command_runs() {
        let (_tmp, g) = gallery();
        // `test -s` fails unless the crop file exists and is non-empty.
        let r = CommandFaceRecognizer::new("test -s {crop}", g).unwrap();
        assert_eq!(r.recognize(&crop()).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_backend_error() {
        let (_tmp, g) = gallery();
        let r = CommandFaceRecognizer::new("false {crop}", g).unwrap();
        assert!(matches!(r.recognize(&crop()), Err(RecognitionError::Backend(_))));
    }
}
