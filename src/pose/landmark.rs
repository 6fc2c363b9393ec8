/// BlazePose の 33 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;
}

/// 単一ランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0)
    pub y: f32,
    /// 腰の中点を原点とした奥行き。スケールは x と同じ
    pub z: f32,
    /// 画面内に見えている確率
    pub visibility: f32,
    /// 画面内に存在する確率
    pub presence: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32, presence: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
            presence,
        }
    }

    /// visibility と presence が両方とも閾値以上か
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility >= threshold && self.presence >= threshold
    }

    /// ピクセル座標に変換。フレーム外 (0.0〜1.0 の範囲外) なら None
    pub fn to_pixel(&self, width: u32, height: u32) -> Option<(i32, i32)> {
        if !(0.0..=1.0).contains(&self.x) || !(0.0..=1.0).contains(&self.y) {
            return None;
        }
        let px = ((self.x * width as f32) as i32).min(width as i32 - 1);
        let py = ((self.y * height as f32) as i32).min(height as i32 - 1);
        Some((px, py))
    }
}

/// 33ランドマークからなる姿勢
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub landmarks: [Landmark; LandmarkIndex::COUNT],
}

impl Pose {
    pub fn new(landmarks: [Landmark; LandmarkIndex::COUNT]) -> Self {
        Self { landmarks }
    }

    pub fn get(&self, index: LandmarkIndex) -> &Landmark {
        &self.landmarks[index as usize]
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            landmarks: [Landmark::default(); LandmarkIndex::COUNT],
        }
    }
}

/// 骨格の接続定義 (開始, 終了)
pub const POSE_CONNECTIONS: [(LandmarkIndex, LandmarkIndex); 35] = {
    use LandmarkIndex::*;
    [
        // 顔
        (Nose, LeftEyeInner),
        (LeftEyeInner, LeftEye),
        (LeftEye, LeftEyeOuter),
        (LeftEyeOuter, LeftEar),
        (Nose, RightEyeInner),
        (RightEyeInner, RightEye),
        (RightEye, RightEyeOuter),
        (RightEyeOuter, RightEar),
        (MouthLeft, MouthRight),
        // 上半身
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (LeftWrist, LeftPinky),
        (LeftWrist, LeftIndex),
        (LeftWrist, LeftThumb),
        (LeftPinky, LeftIndex),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        (RightWrist, RightPinky),
        (RightWrist, RightIndex),
        (RightWrist, RightThumb),
        (RightPinky, RightIndex),
        // 胴体
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        (LeftHip, RightHip),
        // 下半身
        (LeftHip, LeftKnee),
        (RightHip, RightKnee),
        (LeftKnee, LeftAnkle),
        (RightKnee, RightAnkle),
        (LeftAnkle, LeftHeel),
        (RightAnkle, RightHeel),
        (LeftHeel, LeftFootIndex),
        (RightHeel, RightFootIndex),
        (LeftAnkle, LeftFootIndex),
        (RightAnkle, RightFootIndex),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connections_unique() {
        for (i, a) in POSE_CONNECTIONS.iter().enumerate() {
            assert_ne!(a.0, a.1);
            for b in &POSE_CONNECTIONS[i + 1..] {
                assert!(a != b && (a.0, a.1) != (b.1, b.0), "duplicate edge {:?}", a);
            }
        }
    }

    #[test]
    fn test_landmark_is_visible() {
        let lm = Landmark::new(0.5, 0.5, 0.0, 0.9, 0.6);
        assert!(lm.is_visible(0.5));
        assert!(!lm.is_visible(0.7));
    }

    #[test]
    fn test_landmark_to_pixel() {
        let lm = Landmark::new(0.5, 0.25, 0.0, 1.0, 1.0);
        assert_eq!(lm.to_pixel(640, 480), Some((320, 120)));
        // 右端は最後の列に収める
        assert_eq!(Landmark::new(1.0, 1.0, 0.0, 1.0, 1.0).to_pixel(640, 480), Some((639, 479)));
    }

    #[test]
    fn test_landmark_outside_frame_has_no_pixel() {
        assert_eq!(Landmark::new(1.3, 0.5, 0.0, 1.0, 1.0).to_pixel(100, 100), None);
        assert_eq!(Landmark::new(0.5, -0.1, 0.0, 1.0, 1.0).to_pixel(100, 100), None);
        assert_eq!(Landmark::new(1e10, 0.5, 0.0, 1.0, 1.0).to_pixel(100, 100), None);
        assert_eq!(Landmark::new(f32::NAN, 0.5, 0.0, 1.0, 1.0).to_pixel(100, 100), None);
    }
}
