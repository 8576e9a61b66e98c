use crate::shared::frame::Frame;

/// A live supply of frames for a monitoring session (camera, video file,
/// image sequence).
///
/// Implementations handle device and codec details; the monitor only asks
/// whether a new frame is available right now.
pub trait FrameSource: Send {
    /// Claims the underlying device or file. Called once when a session starts.
    fn acquire(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    /// The current frame if new data is available, `None` otherwise.
    fn next_frame(&mut self) -> Option<Frame>;

    /// True when no further frames will ever arrive (end of file).
    fn is_finished(&self) -> bool {
        false
    }

    /// Releases the device or file. Must be safe to call repeatedly.
    fn release(&mut self);
}
