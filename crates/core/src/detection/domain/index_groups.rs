//! Which landmark indices feed the eye and mouth aspect ratios.
//!
//! The defaults address the 468-point face mesh. Another landmark topology
//! only needs a different [`IndexGroups`], e.g. loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Eye points: `[outer corner, upper lid 1, upper lid 2, inner corner, lower lid 1, lower lid 2]`.
pub type EyeIndices = [usize; 6];

/// Mouth points: `[left corner, right corner, upper lip, lower lip]`.
pub type MouthIndices = [usize; 4];

pub const LEFT_EYE: EyeIndices = [33, 160, 158, 133, 153, 144];
pub const RIGHT_EYE: EyeIndices = [362, 385, 387, 263, 373, 380];
pub const MOUTH: MouthIndices = [61, 291, 13, 14];

#[derive(Error, Debug)]
pub enum IndexGroupsError {
    #[error("failed to read index groups from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid index groups JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexGroups {
    pub left_eye: EyeIndices,
    pub right_eye: EyeIndices,
    pub mouth: MouthIndices,
}

impl Default for IndexGroups {
    fn default() -> Self {
        Self {
            left_eye: LEFT_EYE,
            right_eye: RIGHT_EYE,
            mouth: MOUTH,
        }
    }
}

impl IndexGroups {
    pub fn from_json(json: &str) -> Result<Self, IndexGroupsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, IndexGroupsError> {
        let json = std::fs::read_to_string(path).map_err(|source| IndexGroupsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Largest index referenced; a landmark set must be longer than this
    /// for every ratio to be measurable.
    pub fn max_index(&self) -> usize {
        self.left_eye
            .iter()
            .chain(&self.right_eye)
            .chain(&self.mouth)
            .copied()
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_face_mesh_topology() {
        let groups = IndexGroups::default();
        assert_eq!(groups.left_eye, [33, 160, 158, 133, 153, 144]);
        assert_eq!(groups.right_eye, [362, 385, 387, 263, 373, 380]);
        assert_eq!(groups.mouth, [61, 291, 13, 14]);
        assert!(groups.max_index() < crate::shared::constants::FACE_MESH_LANDMARKS);
    }

    #[test]
    fn test_from_json_custom_topology() {
        let json = r#"{
            "left_eye": [36, 37, 38, 39, 40, 41],
            "right_eye": [42, 43, 44, 45, 46, 47],
            "mouth": [48, 54, 62, 66]
        }"#;
        let groups = IndexGroups::from_json(json).unwrap();
        assert_eq!(groups.left_eye[0], 36);
        assert_eq!(groups.mouth, [48, 54, 62, 66]);
        assert_eq!(groups.max_index(), 66);
    }

    #[test]
    fn test_from_json_rejects_wrong_arity() {
        let json = r#"{"left_eye": [1, 2, 3], "right_eye": [1, 2, 3, 4, 5, 6], "mouth": [1, 2, 3, 4]}"#;
        assert!(matches!(
            IndexGroups::from_json(json),
            Err(IndexGroupsError::Parse(_))
        ));
    }

    #[test]
    fn test_load_round_trips_through_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("groups.json");
        let groups = IndexGroups::default();
        std::fs::write(&path, serde_json::to_string(&groups).unwrap()).unwrap();

        assert_eq!(IndexGroups::load(&path).unwrap(), groups);
    }

    #[test]
    fn test_load_missing_file() {
        let err = IndexGroups::load(Path::new("/nonexistent/groups.json")).unwrap_err();
        assert!(matches!(err, IndexGroupsError::Read { .. }));
    }
}
