/// Cache file name for the ONNX face-mesh landmark model.
pub const FACE_MESH_MODEL_NAME: &str = "face_mesh_468.onnx";

/// Number of landmarks produced by the reference face-mesh topology.
pub const FACE_MESH_LANDMARKS: usize = 468;

/// Below this EAR the eyes count as closed.
pub const EAR_THRESHOLD: f64 = 0.25;

/// Above this MAR the mouth counts as open wide (yawning).
pub const MAR_THRESHOLD: f64 = 0.5;

/// Consecutive closed-eye frames tolerated before flagging drowsiness
/// (~1 second at 30 fps).
pub const FATIGUE_FRAMES: u32 = 30;

/// Display refresh rate the frame loop is paced to by default.
pub const DEFAULT_REFRESH_HZ: u32 = 60;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
