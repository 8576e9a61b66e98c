use serde::Serialize;

/// Read-only snapshot of a monitoring session for a presentation layer.
///
/// `ear`/`mar` and the two flags keep their last measured values across
/// frames where no face was found.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub is_model_loading: bool,
    pub is_session_active: bool,
    pub last_error: Option<String>,
    pub ear: f64,
    pub mar: f64,
    pub is_drowsy: bool,
    pub is_yawning: bool,
}
