use super::landmark::Pose;

/// BBox拡張率（中心を保持）
pub const ROI_EXPANSION: f32 = 1.25;

/// クロップ領域（正規化座標 0.0〜1.0）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRegion {
    pub fn full() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }

    /// ピクセル矩形 (x, y, w, h)。幅・高さは最低1
    pub fn to_pixels(&self, frame_w: u32, frame_h: u32) -> (u32, u32, u32, u32) {
        let fw = frame_w as f32;
        let fh = frame_h as f32;
        let x = (self.x * fw).clamp(0.0, (frame_w.saturating_sub(1)) as f32) as u32;
        let y = (self.y * fh).clamp(0.0, (frame_h.saturating_sub(1)) as f32) as u32;
        let w = ((self.width * fw) as u32).clamp(1, frame_w.saturating_sub(x).max(1));
        let h = ((self.height * fh) as u32).clamp(1, frame_h.saturating_sub(y).max(1));
        (x, y, w, h)
    }
}

/// 前フレームのPoseから次フレームの注目領域を推定
///
/// - visibility が閾値以上のランドマークの min/max を取る
/// - 1.25倍に拡張し、ピクセル空間で正方形に揃える
/// - フレーム境界にクリップ
///
/// 有効なランドマークが2個未満ならNone。
pub fn roi_from_pose(
    pose: &Pose,
    frame_w: u32,
    frame_h: u32,
    visibility_threshold: f32,
) -> Option<CropRegion> {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    let mut count = 0u32;

    for lm in &pose.landmarks {
        if lm.visibility >= visibility_threshold {
            let px = lm.x * frame_w as f32;
            let py = lm.y * frame_h as f32;
            min_x = min_x.min(px);
            min_y = min_y.min(py);
            max_x = max_x.max(px);
            max_y = max_y.max(py);
            count += 1;
        }
    }

    if count < 2 {
        return None;
    }

    let cx = (min_x + max_x) / 2.0;
    let cy = (min_y + max_y) / 2.0;
    let side = (max_x - min_x).max(max_y - min_y) * ROI_EXPANSION;
    if side < 1.0 {
        return None;
    }

    let fw = frame_w as f32;
    let fh = frame_h as f32;
    let x0 = (cx - side / 2.0).max(0.0);
    let y0 = (cy - side / 2.0).max(0.0);
    let x1 = (cx + side / 2.0).min(fw);
    let y1 = (cy + side / 2.0).min(fh);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(CropRegion {
        x: x0 / fw,
        y: y0 / fh,
        width: (x1 - x0) / fw,
        height: (y1 - y0) / fh,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::landmark::{Landmark, LandmarkIndex};

    #[test]
    fn test_crop_region_full() {
        let region = CropRegion::full();
        assert_eq!(region.to_pixels(640, 480), (0, 0, 640, 480));
    }

    #[test]
    fn test_roi_from_pose_basic() {
        let mut landmarks = [Landmark::default(); LandmarkIndex::COUNT];
        landmarks[LandmarkIndex::LeftShoulder as usize] = Landmark::new(0.4, 0.4, 0.0, 0.9, 0.9);
        landmarks[LandmarkIndex::RightHip as usize] = Landmark::new(0.6, 0.6, 0.0, 0.9, 0.9);

        let roi = roi_from_pose(&Pose::new(landmarks), 100, 100, 0.5).unwrap();
        // 20px 四方 → 25px に拡張、中心 (50, 50)
        assert!((roi.x - 0.375).abs() < 1e-4);
        assert!((roi.y - 0.375).abs() < 1e-4);
        assert!((roi.width - 0.25).abs() < 1e-4);
        assert!((roi.height - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_roi_is_square_in_pixels() {
        let mut landmarks = [Landmark::default(); LandmarkIndex::COUNT];
        landmarks[0] = Landmark::new(0.4, 0.3, 0.0, 1.0, 1.0);
        landmarks[1] = Landmark::new(0.5, 0.7, 0.0, 1.0, 1.0);

        let roi = roi_from_pose(&Pose::new(landmarks), 640, 480, 0.5).unwrap();
        let (_, _, w, h) = roi.to_pixels(640, 480);
        assert!((w as i32 - h as i32).abs() <= 1, "w={} h={}", w, h);
    }

    #[test]
    fn test_roi_clipped_to_frame() {
        let mut landmarks = [Landmark::default(); LandmarkIndex::COUNT];
        landmarks[0] = Landmark::new(0.0, 0.0, 0.0, 1.0, 1.0);
        landmarks[1] = Landmark::new(0.5, 0.5, 0.0, 1.0, 1.0);

        let roi = roi_from_pose(&Pose::new(landmarks), 100, 100, 0.5).unwrap();
        assert_eq!(roi.x, 0.0);
        assert_eq!(roi.y, 0.0);
        assert!(roi.x + roi.width <= 1.0);
    }

    #[test]
    fn test_roi_from_pose_low_visibility() {
        let mut landmarks = [Landmark::default(); LandmarkIndex::COUNT];
        // 1つだけ有効 → 2個未満なのでNone
        landmarks[LandmarkIndex::Nose as usize] = Landmark::new(0.5, 0.5, 0.0, 0.9, 0.9);
        assert!(roi_from_pose(&Pose::new(landmarks), 640, 480, 0.5).is_none());
    }
}
