use anyhow::{Context, Result};
use log::{debug, info, warn};
use opencv::{
    core::Size,
    prelude::*,
    videoio::VideoWriter,
};
use std::path::{Path, PathBuf};

use super::ops::frame_to_mat;
use crate::error::FormError;
use crate::frame::{ChannelOrder, Frame};
use crate::pipeline::{FrameSink, SinkStatus};

/// 出力動画のパラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriterParams {
    pub fourcc: [char; 4],
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// OpenCVの VideoWriter。フレームは BGR で書き込む
pub struct WriterSession {
    writer: VideoWriter,
    path: PathBuf,
    frames: u64,
    released: bool,
}

impl WriterSession {
    pub fn create<P: AsRef<Path>>(path: P, params: WriterParams) -> Result<Self> {
        let path = path.as_ref();
        let unwritable = || FormError::UnwritableDestination(path.to_path_buf());
        let name = path.to_str().ok_or_else(unwritable)?;
        let [a, b, c, d] = params.fourcc;
        let fourcc = VideoWriter::fourcc(a, b, c, d)?;
        let writer = VideoWriter::new(
            name,
            fourcc,
            params.fps,
            Size::new(params.width as i32, params.height as i32),
            true,
        )
        .map_err(|e| {
            debug!("VideoWriter::new({}) failed: {}", name, e);
            unwritable()
        })?;
        if !writer.is_opened()? {
            return Err(unwritable().into());
        }
        info!(
            "writing {} ({}x{} @ {} fps, {})",
            path.display(),
            params.width,
            params.height,
            params.fps,
            params.fourcc.iter().collect::<String>()
        );

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            frames: 0,
            released: false,
        })
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.writer.release().context("Failed to finalize output video")?;
        debug!("released writer {} after {} frames", self.path.display(), self.frames);
        Ok(())
    }
}

impl FrameSink for WriterSession {
    fn write_frame(&mut self, frame: &Frame) -> Result<SinkStatus> {
        let mat = match frame.order() {
            ChannelOrder::Bgr => frame_to_mat(frame)?,
            ChannelOrder::Rgb => frame_to_mat(&frame.clone().into_order(ChannelOrder::Bgr))?,
        };
        self.writer.write(&mat).context("Failed to write frame")?;
        self.frames += 1;
        Ok(SinkStatus::Open)
    }

    fn finish(&mut self) -> Result<()> {
        self.release_inner()
    }
}

impl Drop for WriterSession {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!("{:#}", e);
        }
    }
}
