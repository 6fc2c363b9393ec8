use crate::frame::{Frame, Rgb};
use crate::pose::{LandmarkIndex, Pose, POSE_CONNECTIONS};

/// ランドマークの色 (RGB)
pub const LANDMARK_COLOR: u32 = 0xFF0000; // 赤

/// 骨格線の色 (RGB)
pub const CONNECTION_COLOR: u32 = 0xE0E0E0; // 白

/// これ未満の visibility/presence のランドマークは描かない
pub const VISIBILITY_THRESHOLD: f32 = 0.5;

/// 描画スタイル
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub landmark_color: Rgb,
    pub landmark_radius: i32,
    pub connection_color: Rgb,
    pub connection_thickness: i32,
    pub visibility_threshold: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            landmark_color: Rgb::from_u32(LANDMARK_COLOR),
            landmark_radius: 2,
            connection_color: Rgb::from_u32(CONNECTION_COLOR),
            connection_thickness: 2,
            visibility_threshold: VISIBILITY_THRESHOLD,
        }
    }
}

/// 姿勢をフレームに直接描画（骨格線 → ランドマークの順）
///
/// visibility が閾値未満、またはフレーム外のランドマークと、それにつながる線は描かない。
pub fn draw_pose(frame: &mut Frame, pose: &Pose, style: &OverlayStyle) {
    let w = frame.width();
    let h = frame.height();

    let mut points = [None; LandmarkIndex::COUNT];
    for (point, lm) in points.iter_mut().zip(pose.landmarks.iter()) {
        if lm.is_visible(style.visibility_threshold) {
            *point = lm.to_pixel(w, h);
        }
    }

    for (start_idx, end_idx) in POSE_CONNECTIONS.iter() {
        if let (Some((x1, y1)), Some((x2, y2))) = (points[*start_idx as usize], points[*end_idx as usize]) {
            frame.draw_line(x1, y1, x2, y2, style.connection_thickness, style.connection_color);
        }
    }

    for (px, py) in points.iter().flatten() {
        frame.draw_circle(*px, *py, style.landmark_radius, style.landmark_color);
    }
}
