use std::path::PathBuf;

use thiserror::Error;

/// 操作単位で完結するエラー。リトライはしない。
#[derive(Debug, Error)]
pub enum FormError {
    #[error("unable to access camera {0}")]
    CameraUnavailable(i32),

    #[error("unable to open video file {}", .0.display())]
    UnopenableSource(PathBuf),

    #[error("unable to create output file {}", .0.display())]
    UnwritableDestination(PathBuf),

    /// ダイアログが閉じられた。何もせずに中断する
    #[error("selection cancelled")]
    SelectionCancelled,

    #[error("invalid model complexity {0} (expected 0, 1 or 2)")]
    InvalidModelComplexity(i64),

    #[error("invalid confidence value {0}")]
    InvalidConfidence(f32),

    #[error("camera preview is already running")]
    PreviewAlreadyRunning,

    #[error("a video conversion is already running")]
    ConversionAlreadyRunning,

    /// 変換が途中で止められた。途中までの出力は削除済み
    #[error("video processing was cancelled")]
    ConversionCancelled,

    #[error("frame buffer of {actual} bytes does not match {width}x{height}x3")]
    InvalidFrame {
        width: u32,
        height: u32,
        actual: usize,
    },
}
