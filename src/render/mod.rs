pub mod skeleton;
pub mod window;

pub use skeleton::{draw_pose, OverlayStyle};
pub use window::MinifbRenderer;
