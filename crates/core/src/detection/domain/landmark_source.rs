use crate::shared::frame::Frame;
use crate::shared::landmark::LandmarkSet;

/// Domain interface for facial landmark extraction.
///
/// `timestamp_ms` must increase strictly across calls; video-mode models
/// use it to track faces between frames. Returns one [`LandmarkSet`] per
/// detected face, possibly none.
pub trait LandmarkSource: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        timestamp_ms: f64,
    ) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error>>;
}

/// Produces a ready [`LandmarkSource`]. Loading may download or parse a
/// model, so it happens once per monitor rather than per frame.
pub trait LandmarkModelLoader: Send {
    fn load(&mut self) -> Result<Box<dyn LandmarkSource>, Box<dyn std::error::Error>>;
}
