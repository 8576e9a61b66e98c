//! 468-point face-mesh landmark model run through ONNX Runtime via `ort`.
//!
//! Expects a face-mesh export taking one NCHW float image (values 0..1) and
//! producing `468 * 3` landmark values in input-pixel space plus a single
//! face-presence logit. The whole frame is fed to the model, so it works best
//! on selfie-style webcam framing where the face fills most of the image.

use std::path::Path;

use crate::detection::domain::landmark_source::{LandmarkModelLoader, LandmarkSource};
use crate::shared::constants::FACE_MESH_LANDMARKS;
use crate::shared::frame::Frame;
use crate::shared::landmark::{LandmarkPoint, LandmarkSet};
use crate::shared::model_resolver::{self, ModelLocation, ProgressFn};

/// Fallback input resolution when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 192;

/// Values per landmark in the model output (x, y, z).
const VALUES_PER_LANDMARK: usize = 3;

pub const DEFAULT_PRESENCE_THRESHOLD: f64 = 0.5;

pub struct OnnxFaceMeshLandmarker {
    session: ort::session::Session,
    input_size: u32,
    presence_threshold: f64,
}

impl OnnxFaceMeshLandmarker {
    /// Load a face-mesh ONNX model. The input resolution is read from the
    /// model's NCHW input shape.
    pub fn new(
        model_path: &Path,
        presence_threshold: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                // NCHW: [1, 3, H, W], square input assumed
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        return Some(shape[2] as u32);
                    }
                }
                None
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded face-mesh model {} (input {input_size}x{input_size})",
            model_path.display()
        );

        Ok(Self {
            session,
            input_size,
            presence_threshold,
        })
    }
}

impl LandmarkSource for OnnxFaceMeshLandmarker {
    fn detect(
        &mut self,
        frame: &Frame,
        _timestamp_ms: f64,
    ) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error>> {
        let input = ort::value::Tensor::from_array(preprocess(frame, self.input_size))?;
        let outputs = self.session.run(ort::inputs![input])?;

        let mut landmarks: Option<Vec<f32>> = None;
        let mut presence_logit: Option<f32> = None;
        for i in 0..outputs.len() {
            let tensor = outputs[i].try_extract_array::<f32>()?;
            let values = tensor.as_slice().ok_or("Cannot get tensor slice")?;
            if values.len() >= FACE_MESH_LANDMARKS * VALUES_PER_LANDMARK {
                landmarks = Some(values.to_vec());
            } else if values.len() == 1 {
                presence_logit = Some(values[0]);
            }
        }

        let landmarks = landmarks.ok_or("Face-mesh model produced no landmark output")?;
        // Models exported without a presence head are trusted unconditionally.
        if let Some(logit) = presence_logit {
            let score = sigmoid(logit as f64);
            if score.is_nan() || score < self.presence_threshold {
                return Ok(Vec::new());
            }
        }

        match parse_landmarks(&landmarks, self.input_size) {
            Some(face) => Ok(vec![face]),
            None => {
                log::debug!("Discarding face-mesh output with non-finite coordinates");
                Ok(Vec::new())
            }
        }
    }
}

/// Resolves the model file (downloading into the cache if needed) and
/// opens an ONNX session on it.
pub struct OnnxFaceMeshLoader {
    location: ModelLocation,
    presence_threshold: f64,
    progress: Option<ProgressFn>,
}

impl OnnxFaceMeshLoader {
    pub fn new(location: ModelLocation, presence_threshold: f64) -> Self {
        Self {
            location,
            presence_threshold,
            progress: None,
        }
    }

    /// Reports download progress the first time a remote model is fetched.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl LandmarkModelLoader for OnnxFaceMeshLoader {
    fn load(&mut self) -> Result<Box<dyn LandmarkSource>, Box<dyn std::error::Error>> {
        let path = model_resolver::resolve_location(&self.location, self.progress.take())?;
        let landmarker = OnnxFaceMeshLandmarker::new(&path, self.presence_threshold)?;
        Ok(Box::new(landmarker))
    }
}

fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    let providers = vec![ort::execution_providers::CoreMLExecutionProvider::default().build()];
    #[cfg(target_os = "windows")]
    let providers = vec![ort::execution_providers::DirectMLExecutionProvider::default().build()];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let providers = Vec::new();
    providers
}

/// Stretch-resize the frame to `size`x`size`, scale to 0..1, NCHW layout.
///
/// Stretching (rather than letterboxing) keeps landmark x/y proportional to
/// the source frame, so dividing by `size` yields frame-normalized
/// coordinates directly.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let size = size as usize;
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    if src_h == 0 || src_w == 0 {
        return tensor;
    }

    for y in 0..size {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / size as f64) as usize).min(src_h - 1);
        for x in 0..size {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / size as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

/// Converts raw `[x, y, z, x, y, z, ...]` input-pixel output into a
/// normalized landmark set. The z channel is dropped.
///
/// Returns `None` if any x/y is NaN or infinite.
fn parse_landmarks(values: &[f32], input_size: u32) -> Option<LandmarkSet> {
    let scale = input_size as f64;
    values
        .chunks_exact(VALUES_PER_LANDMARK)
        .take(FACE_MESH_LANDMARKS)
        .map(|v| {
            let (x, y) = (v[0] as f64, v[1] as f64);
            (x.is_finite() && y.is_finite()).then(|| {
                LandmarkPoint::new((x / scale).clamp(0.0, 1.0), (y / scale).clamp(0.0, 1.0))
            })
        })
        .collect::<Option<Vec<_>>>()
        .map(LandmarkSet::from)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
