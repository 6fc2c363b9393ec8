use anyhow::{Context, Result};
use ndarray::Array4;
use opencv::{
    core::{self, Mat, Rect, Scalar, Vec3f, BORDER_CONSTANT, CV_32FC3},
    imgproc,
    prelude::*,
};

use super::crop::CropRegion;
use crate::frame::{ChannelOrder, Frame};
use crate::video::ops::frame_to_mat;

/// レターボックス変換の情報（入力テンソル座標 → フレーム正規化座標の逆変換に使う）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    /// 注目領域 1px あたりの入力ピクセル数
    pub scale: f32,
    pub pad_left: f32,
    pub pad_top: f32,
    /// 注目領域（フレームのピクセル座標）
    pub roi_x: f32,
    pub roi_y: f32,
    pub frame_width: f32,
    pub frame_height: f32,
}

impl LetterboxInfo {
    /// 入力テンソル上のピクセル座標 (x, y, z) をフレームの正規化座標に戻す
    pub fn unletterbox(&self, x: f32, y: f32, z: f32) -> (f32, f32, f32) {
        let fx = self.roi_x + (x - self.pad_left) / self.scale;
        let fy = self.roi_y + (y - self.pad_top) / self.scale;
        let fz = z / self.scale;
        (fx / self.frame_width, fy / self.frame_height, fz / self.frame_width)
    }
}

/// フレームの注目領域を BlazePose 用の入力テンソルに変換
///
/// - 注目領域を切り出し、アスペクト比を保って size x size にレターボックス
/// - バイリニア補間でリサイズ、余白は黒
/// - [1, size, size, 3] の RGB f32 テンソル (0.0-1.0)
pub fn preprocess_for_blazepose(
    frame: &Frame,
    roi: &CropRegion,
    size: usize,
) -> Result<(Array4<f32>, LetterboxInfo)> {
    let (rx, ry, rw, rh) = roi.to_pixels(frame.width(), frame.height());
    let side = size as i32;
    let scale = size as f32 / rw.max(rh) as f32;
    let content_w = ((rw as f32 * scale).round() as i32).clamp(1, side);
    let content_h = ((rh as f32 * scale).round() as i32).clamp(1, side);
    let pad_left = (side - content_w) / 2;
    let pad_top = (side - content_h) / 2;

    // 注目領域を切り出し
    let rgb = frame.clone().into_order(ChannelOrder::Rgb);
    let mat = frame_to_mat(&rgb)?;
    let cropped = Mat::roi(&mat, Rect::new(rx as i32, ry as i32, rw as i32, rh as i32))?.try_clone()?;

    let mut resized = Mat::default();
    imgproc::resize(
        &cropped,
        &mut resized,
        core::Size::new(content_w, content_h),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .context("Failed to resize model input")?;

    // レターボックス
    let mut padded = Mat::default();
    core::copy_make_border(
        &resized,
        &mut padded,
        pad_top,
        side - content_h - pad_top,
        pad_left,
        side - content_w - pad_left,
        BORDER_CONSTANT,
        Scalar::all(0.0),
    )?;

    // f32 に変換 (0.0-1.0)
    let mut float_mat = Mat::default();
    padded.convert_to(&mut float_mat, CV_32FC3, 1.0 / 255.0, 0.0)?;

    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));
    for y in 0..side {
        for x in 0..side {
            let pixel = float_mat.at_2d::<Vec3f>(y, x)?;
            tensor[[0, y as usize, x as usize, 0]] = pixel[0];
            tensor[[0, y as usize, x as usize, 1]] = pixel[1];
            tensor[[0, y as usize, x as usize, 2]] = pixel[2];
        }
    }

    let info = LetterboxInfo {
        scale,
        pad_left: pad_left as f32,
        pad_top: pad_top as f32,
        roi_x: rx as f32,
        roi_y: ry as f32,
        frame_width: frame.width() as f32,
        frame_height: frame.height() as f32,
    };

    Ok((tensor, info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ChannelOrder, Rgb};

    #[test]
    fn test_tensor_shape_and_range() {
        let frame = Frame::filled(64, 48, ChannelOrder::Bgr, Rgb(255, 0, 51));
        let (tensor, _) = preprocess_for_blazepose(&frame, &CropRegion::full(), 32).unwrap();
        assert_eq!(tensor.shape(), &[1, 32, 32, 3]);
        // 中央は画像内: チャンネル順は RGB
        assert!((tensor[[0, 16, 16, 0]] - 1.0).abs() < 1e-5);
        assert!(tensor[[0, 16, 16, 1]].abs() < 1e-5);
        assert!((tensor[[0, 16, 16, 2]] - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_landscape_is_padded_vertically() {
        let frame = Frame::filled(64, 32, ChannelOrder::Rgb, Rgb(255, 255, 255));
        let (tensor, info) = preprocess_for_blazepose(&frame, &CropRegion::full(), 32).unwrap();
        assert_eq!(info.pad_left, 0.0);
        assert_eq!(info.pad_top, 8.0);
        // 上下のパディングは 0
        assert_eq!(tensor[[0, 0, 16, 0]], 0.0);
        assert_eq!(tensor[[0, 31, 16, 0]], 0.0);
        assert!((tensor[[0, 16, 16, 0]] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_roi_is_cropped_before_resize() {
        // 左半分が黒、右半分が白。右半分だけを切り出すと全面白になる
        let mut frame = Frame::filled(64, 32, ChannelOrder::Rgb, Rgb(0, 0, 0));
        for y in 0..32 {
            for x in 32..64 {
                frame.set_pixel(x, y, Rgb(255, 255, 255));
            }
        }
        let roi = CropRegion {
            x: 0.5,
            y: 0.0,
            width: 0.5,
            height: 1.0,
        };
        let (tensor, info) = preprocess_for_blazepose(&frame, &roi, 16).unwrap();
        assert_eq!((info.pad_left, info.pad_top), (0.0, 0.0));
        assert_eq!(info.roi_x, 32.0);
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_bilinear_resize_blends_edges() {
        // 縦縞を縮小すると中間値が出る（最近傍なら 0 か 1 だけ）
        let mut frame = Frame::filled(64, 64, ChannelOrder::Rgb, Rgb(0, 0, 0));
        for y in 0..64 {
            for x in (0..64).step_by(2) {
                frame.set_pixel(x, y, Rgb(255, 255, 255));
            }
        }
        let (tensor, _) = preprocess_for_blazepose(&frame, &CropRegion::full(), 16).unwrap();
        let v = tensor[[0, 8, 8, 0]];
        assert!(v > 0.1 && v < 0.9, "got {}", v);
    }

    #[test]
    fn test_unletterbox_center() {
        let frame = Frame::filled(640, 480, ChannelOrder::Rgb, Rgb(0, 0, 0));
        let (_, info) = preprocess_for_blazepose(&frame, &CropRegion::full(), 256).unwrap();
        let (x, y, _) = info.unletterbox(128.0, 128.0, 0.0);
        assert!((x - 0.5).abs() < 1e-4);
        assert!((y - 0.5).abs() < 1e-4);
        // コンテンツ左上
        let (x, y, _) = info.unletterbox(0.0, info.pad_top, 0.0);
        assert!(x.abs() < 1e-4);
        assert!(y.abs() < 1e-4);
    }

    #[test]
    fn test_unletterbox_with_roi() {
        let frame = Frame::filled(100, 100, ChannelOrder::Rgb, Rgb(0, 0, 0));
        let roi = CropRegion {
            x: 0.5,
            y: 0.25,
            width: 0.5,
            height: 0.5,
        };
        let (_, info) = preprocess_for_blazepose(&frame, &roi, 50).unwrap();
        assert_eq!(info.scale, 1.0);
        let (x, y, _) = info.unletterbox(25.0, 25.0, 0.0);
        assert!((x - 0.75).abs() < 1e-4);
        assert!((y - 0.5).abs() < 1e-4);
    }
}
