//! Eye and mouth aspect ratios from face-mesh landmarks.
//!
//! Both ratios are dimensionless, so normalized coordinates work directly.
//! Missing or non-finite points and a zero-length reference distance yield
//! 0 ("no usable measurement") instead of NaN or infinity.

use crate::shared::landmark::{LandmarkPoint, LandmarkSet};

use super::index_groups::{EyeIndices, IndexGroups, MouthIndices};

pub fn distance(p1: &LandmarkPoint, p2: &LandmarkPoint) -> f64 {
    (p1.x - p2.x).hypot(p1.y - p2.y)
}

/// EAR = (|upper1 - lower2| + |upper2 - lower1|) / (2 * |outer - inner|)
pub fn eye_aspect_ratio(landmarks: &LandmarkSet, eye: &EyeIndices) -> f64 {
    let Some([outer, upper1, upper2, inner, lower1, lower2]) = lookup(landmarks, eye) else {
        return 0.0;
    };

    let horizontal = distance(outer, inner);
    if horizontal == 0.0 {
        return 0.0;
    }
    (distance(upper1, lower2) + distance(upper2, lower1)) / (2.0 * horizontal)
}

/// MAR = |upper - lower| / |left - right|
pub fn mouth_aspect_ratio(landmarks: &LandmarkSet, mouth: &MouthIndices) -> f64 {
    let Some([left, right, upper, lower]) = lookup(landmarks, mouth) else {
        return 0.0;
    };

    let horizontal = distance(left, right);
    if horizontal == 0.0 {
        return 0.0;
    }
    distance(upper, lower) / horizontal
}

/// Ratios measured on one face.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FaceRatios {
    /// Mean of the left and right eye EAR.
    pub ear: f64,
    pub mar: f64,
}

impl FaceRatios {
    pub fn measure(landmarks: &LandmarkSet, groups: &IndexGroups) -> Self {
        let left = eye_aspect_ratio(landmarks, &groups.left_eye);
        let right = eye_aspect_ratio(landmarks, &groups.right_eye);
        Self {
            ear: (left + right) / 2.0,
            mar: mouth_aspect_ratio(landmarks, &groups.mouth),
        }
    }
}

fn lookup<'a, const N: usize>(
    landmarks: &'a LandmarkSet,
    indices: &[usize; N],
) -> Option<[&'a LandmarkPoint; N]> {
    indices
        .iter()
        .map(|&index| landmarks.get(index).filter(|p| p.x.is_finite() && p.y.is_finite()))
        .collect::<Option<Vec<_>>>()?
        .try_into()
        .ok()
}
