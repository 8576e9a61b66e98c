use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

/// Emits a fixed number of black frames.
///
/// Pairs with a replayed landmark recording when no real video is
/// available: the landmarks come from the recording, the frames only pace
/// the loop.
pub struct BlankFrameSource {
    width: u32,
    height: u32,
    total: usize,
    emitted: usize,
    acquired: bool,
}

impl BlankFrameSource {
    pub fn new(width: u32, height: u32, total: usize) -> Self {
        Self {
            width,
            height,
            total,
            emitted: 0,
            acquired: false,
        }
    }
}

impl FrameSource for BlankFrameSource {
    fn acquire(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("Invalid frame size {}x{}", self.width, self.height).into());
        }
        self.emitted = 0;
        self.acquired = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if !self.acquired || self.emitted >= self.total {
            return None;
        }
        let frame = Frame::blank(self.width, self.height, self.emitted);
        self.emitted += 1;
        Some(frame)
    }

    fn is_finished(&self) -> bool {
        self.acquired && self.emitted >= self.total
    }

    fn release(&mut self) {
        self.acquired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_requested_number_of_frames() {
        let mut source = BlankFrameSource::new(8, 4, 3);
        source.acquire().unwrap();

        let indices: Vec<usize> = std::iter::from_fn(|| source.next_frame())
            .map(|f| f.index())
            .collect();

        assert_eq!(indices, vec![0, 1, 2]);
        assert!(source.is_finished());
    }

    #[test]
    fn test_frames_have_requested_size() {
        let mut source = BlankFrameSource::new(8, 4, 1);
        source.acquire().unwrap();
        let frame = source.next_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 4));
        assert!(frame.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_no_frames_before_acquire_or_after_release() {
        let mut source = BlankFrameSource::new(8, 4, 5);
        assert!(source.next_frame().is_none());
        assert!(!source.is_finished());

        source.acquire().unwrap();
        source.release();
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_zero_size_fails_to_acquire() {
        let mut source = BlankFrameSource::new(0, 4, 5);
        assert!(source.acquire().is_err());
    }
}
