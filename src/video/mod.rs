pub mod capture;
pub mod ops;
pub mod writer;

pub use capture::{CaptureSession, CaptureTarget};
pub use ops::EdgeFilter;
pub use writer::{WriterParams, WriterSession};
