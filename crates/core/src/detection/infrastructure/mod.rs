pub mod onnx_face_mesh;
pub mod replay_landmark_source;
