use super::frame_result::FrameResult;

/// Receives one `FrameResult` per processed frame.
///
/// Sink errors abort the run: there is no point processing frames nobody
/// can observe.
pub trait FrameSink: Send {
    fn emit(&mut self, result: &FrameResult) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered output. Called once when the run ends.
    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
