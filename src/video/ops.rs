use anyhow::{ensure, Context, Result};
use opencv::{
    core::{AlgorithmHint, Mat, Scalar, Size, CV_8UC3},
    imgproc,
    prelude::*,
};

use crate::frame::{ChannelOrder, Frame};

/// Frame を 8UC3 の Mat にコピー（チャンネル順はそのまま）
pub fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(frame.data());
    Ok(mat)
}

/// 8UC3 の Mat を Frame にコピー
pub fn mat_to_frame(mat: &Mat, order: ChannelOrder) -> Result<Frame> {
    ensure!(mat.typ() == CV_8UC3, "expected 8UC3 image, got type {}", mat.typ());
    let data = if mat.is_continuous() {
        mat.data_bytes()?.to_vec()
    } else {
        mat.try_clone()?.data_bytes()?.to_vec()
    };
    let frame = Frame::new(mat.cols() as u32, mat.rows() as u32, order, data)?;
    Ok(frame)
}

/// 表示面のサイズにリサイズ
pub fn resize_frame(frame: &Frame, width: u32, height: u32) -> Result<Frame> {
    let src = frame_to_mat(frame)?;
    let mut resized = Mat::default();
    imgproc::resize(
        &src,
        &mut resized,
        Size::new(width as i32, height as i32),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .context("Failed to resize frame")?;
    mat_to_frame(&resized, frame.order())
}

/// Canny エッジ検出の表示フィルタ（グレースケール → エッジ → 3チャンネル）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeFilter {
    pub low_threshold: f64,
    pub high_threshold: f64,
}

impl Default for EdgeFilter {
    fn default() -> Self {
        Self {
            low_threshold: 75.0,
            high_threshold: 150.0,
        }
    }
}

impl EdgeFilter {
    pub fn new(low_threshold: f64, high_threshold: f64) -> Self {
        Self {
            low_threshold,
            high_threshold,
        }
    }

    pub fn apply(&self, frame: &Frame) -> Result<Frame> {
        let src = frame_to_mat(frame)?;
        let to_gray = match frame.order() {
            ChannelOrder::Rgb => imgproc::COLOR_RGB2GRAY,
            ChannelOrder::Bgr => imgproc::COLOR_BGR2GRAY,
        };

        let mut gray = Mat::default();
        imgproc::cvt_color(&src, &mut gray, to_gray, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;

        let mut edges = Mat::default();
        imgproc::canny(&gray, &mut edges, self.low_threshold, self.high_threshold, 3, false)
            .context("Canny failed")?;

        let mut color = Mat::default();
        imgproc::cvt_color(&edges, &mut color, imgproc::COLOR_GRAY2RGB, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;
        mat_to_frame(&color, frame.order())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Rgb;

    #[test]
    fn test_mat_round_trip_keeps_bytes() {
        let frame = Frame::new(3, 2, ChannelOrder::Bgr, (0u8..18).collect()).unwrap();
        let mat = frame_to_mat(&frame).unwrap();
        assert_eq!(mat.rows(), 2);
        assert_eq!(mat.cols(), 3);
        assert_eq!(mat_to_frame(&mat, ChannelOrder::Bgr).unwrap(), frame);
    }

    #[test]
    fn test_resize() {
        let frame = Frame::filled(64, 48, ChannelOrder::Rgb, Rgb(10, 20, 30));
        let resized = resize_frame(&frame, 32, 24).unwrap();
        assert_eq!((resized.width(), resized.height()), (32, 24));
        assert_eq!(resized.pixel(5, 5), Some(Rgb(10, 20, 30)));
    }

    #[test]
    fn test_edge_filter_flat_image_is_black() {
        let frame = Frame::filled(32, 32, ChannelOrder::Rgb, Rgb(200, 200, 200));
        let edges = EdgeFilter::default().apply(&frame).unwrap();
        assert_eq!((edges.width(), edges.height()), (32, 32));
        assert!(edges.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_edge_filter_finds_step() {
        let mut frame = Frame::filled(32, 32, ChannelOrder::Rgb, Rgb(0, 0, 0));
        for y in 0..32 {
            for x in 16..32 {
                frame.set_pixel(x, y, Rgb(255, 255, 255));
            }
        }
        let edges = EdgeFilter::default().apply(&frame).unwrap();
        assert!(edges.data().iter().any(|&v| v == 255));
    }
}
