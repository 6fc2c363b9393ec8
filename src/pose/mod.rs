pub mod crop;
pub mod estimator;
pub mod landmark;
pub mod overlay;
pub mod preprocess;
pub mod smoothing;

pub use crop::{roi_from_pose, CropRegion};
pub use estimator::{OnnxPoseEstimator, PoseEstimator};
pub use landmark::{Landmark, LandmarkIndex, Pose, POSE_CONNECTIONS};
pub use overlay::PoseOverlay;
pub use preprocess::{preprocess_for_blazepose, LetterboxInfo};
pub use smoothing::LandmarkSmoother;
