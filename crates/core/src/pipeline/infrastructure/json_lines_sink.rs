use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::pipeline::frame_result::FrameResult;
use crate::pipeline::frame_sink::FrameSink;

/// Writes each frame result as one JSON object per line.
///
/// Lines are flushed as they are written so a downstream renderer sees
/// every frame without waiting for the buffer to fill.
pub struct JsonLinesFrameSink<W: Write + Send> {
    writer: BufWriter<W>,
    only_with_faces: bool,
}

impl JsonLinesFrameSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl JsonLinesFrameSink<File> {
    pub fn create(path: &Path) -> Result<Self, io::Error> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write + Send> JsonLinesFrameSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            only_with_faces: false,
        }
    }

    /// Skip frames in which no face was reported.
    pub fn only_with_faces(mut self, enabled: bool) -> Self {
        self.only_with_faces = enabled;
        self
    }

    pub fn into_inner(self) -> Result<W, Box<dyn std::error::Error>> {
        self.writer.into_inner().map_err(|e| e.into_error().into())
    }
}

impl<W: Write + Send> FrameSink for JsonLinesFrameSink<W> {
    fn emit(&mut self, result: &FrameResult) -> Result<(), Box<dyn std::error::Error>> {
        if self.only_with_faces && result.faces.is_empty() {
            return Ok(());
        }
        serde_json::to_writer(&mut self.writer, result)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.writer.flush()?;
        Ok(())
    }
}
