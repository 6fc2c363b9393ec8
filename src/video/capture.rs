use anyhow::{Context, Result};
use log::{debug, info, warn};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use std::path::{Path, PathBuf};

use super::ops::mat_to_frame;
use crate::error::FormError;
use crate::frame::{ChannelOrder, Frame};
use crate::pipeline::{FrameSource, StreamProperties};

/// 入力元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    Camera(i32),
    File(PathBuf),
}

/// OpenCVの VideoCapture（カメラ or 動画ファイル）
///
/// `release()` を呼ばなくても Drop で1回だけ解放される。
pub struct CaptureSession {
    capture: VideoCapture,
    target: CaptureTarget,
    properties: StreamProperties,
    released: bool,
}

impl CaptureSession {
    /// カメラを開く
    pub fn open_camera(index: i32) -> Result<Self> {
        let capture = VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32)
            .context("Failed to open camera")?;
        if !capture.is_opened()? {
            return Err(FormError::CameraUnavailable(index).into());
        }
        Self::from_capture(capture, CaptureTarget::Camera(index))
    }

    /// 動画ファイルを開く
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let unopenable = || FormError::UnopenableSource(path.to_path_buf());
        let name = path.to_str().ok_or_else(unopenable)?;
        let capture = VideoCapture::from_file(name, VideoCaptureAPIs::CAP_ANY as i32)
            .map_err(|e| {
                debug!("VideoCapture::from_file({}) failed: {}", name, e);
                unopenable()
            })?;
        if !capture.is_opened()? {
            return Err(unopenable().into());
        }
        Self::from_capture(capture, CaptureTarget::File(path.to_path_buf()))
    }

    /// 開けるかどうかだけ確認して即解放
    pub fn probe_camera(index: i32) -> bool {
        match Self::open_camera(index) {
            Ok(session) => {
                session.release();
                true
            }
            Err(e) => {
                debug!("camera {} not usable: {:#}", index, e);
                false
            }
        }
    }

    fn from_capture(capture: VideoCapture, target: CaptureTarget) -> Result<Self> {
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let frame_count = match target {
            CaptureTarget::Camera(_) => None,
            CaptureTarget::File(_) => Some(capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as u64),
        };
        let properties = StreamProperties {
            frame_count,
            width,
            height,
            fps,
        };
        info!("opened {:?}: {}x{} @ {} fps, {:?} frames", target, width, height, fps, frame_count);

        Ok(Self {
            capture,
            target,
            properties,
            released: false,
        })
    }

    pub fn backend_name(&self) -> String {
        self.capture.get_backend_name().unwrap_or_default()
    }

    /// 明示的に解放する
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.capture.release() {
            warn!("failed to release {:?}: {}", self.target, e);
        } else {
            debug!("released {:?}", self.target);
        }
    }
}

impl FrameSource for CaptureSession {
    /// フレームを読み込む（BGR形式）。読み出し失敗は終端として扱う
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut frame = Mat::default();
        match self.capture.read(&mut frame) {
            Ok(true) if !frame.empty() => Ok(Some(mat_to_frame(&frame, ChannelOrder::Bgr)?)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("read from {:?} failed: {}", self.target, e);
                Ok(None)
            }
        }
    }

    fn properties(&self) -> StreamProperties {
        self.properties
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release_inner();
    }
}
