use anyhow::{ensure, Context, Result};
use log::{debug, info};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::time::Instant;

use super::crop::{roi_from_pose, CropRegion};
use super::landmark::{Landmark, LandmarkIndex, Pose};
use super::preprocess::{preprocess_for_blazepose, LetterboxInfo};
use super::smoothing::LandmarkSmoother;
use crate::config::ModelConfig;
use crate::frame::Frame;
use crate::settings::{ModelComplexity, PoseSettings};

/// モデル出力のランドマーク数（33 + 補助 6）
pub const RAW_LANDMARK_COUNT: usize = 39;
/// ランドマークあたりの値 (x, y, z, visibility, presence)
pub const RAW_LANDMARK_STRIDE: usize = 5;
/// 注目領域の推定に使う visibility 閾値
const ROI_VISIBILITY_THRESHOLD: f32 = 0.5;

/// 1フレームから姿勢を推定する
///
/// 人物が見つからないのは正常系で `Ok(None)`。
pub trait PoseEstimator {
    fn estimate(&mut self, frame: &Frame, settings: &PoseSettings) -> Result<Option<Pose>>;

    /// 最初のフレームの前にモデルを読み込んでおく
    fn prepare(&mut self, _settings: &PoseSettings) -> Result<()> {
        Ok(())
    }
}

impl<E: PoseEstimator + ?Sized> PoseEstimator for Box<E> {
    fn estimate(&mut self, frame: &Frame, settings: &PoseSettings) -> Result<Option<Pose>> {
        (**self).estimate(frame, settings)
    }

    fn prepare(&mut self, settings: &PoseSettings) -> Result<()> {
        (**self).prepare(settings)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// 生のランドマーク出力をフレーム正規化座標の Pose に変換
///
/// 入力: [x, y, z, visibility, presence] x 39 (入力テンソルのピクセル座標、
/// visibility/presence はロジット)
pub fn decode_landmarks(raw: &[f32], letterbox: &LetterboxInfo) -> Result<Pose> {
    ensure!(
        raw.len() >= LandmarkIndex::COUNT * RAW_LANDMARK_STRIDE,
        "landmark tensor too small: {} values",
        raw.len()
    );

    let mut landmarks = [Landmark::default(); LandmarkIndex::COUNT];
    for (i, lm) in landmarks.iter_mut().enumerate() {
        let v = &raw[i * RAW_LANDMARK_STRIDE..(i + 1) * RAW_LANDMARK_STRIDE];
        let (x, y, z) = letterbox.unletterbox(v[0], v[1], v[2]);
        *lm = Landmark::new(x, y, z, sigmoid(v[3]), sigmoid(v[4]));
    }
    Ok(Pose::new(landmarks))
}

/// BlazePose ランドマークモデル (ONNX) による推定器
///
/// - model_complexity ごとにセッションを遅延ロードしてキャッシュ
/// - static_image_mode = false の時は前フレームの姿勢から注目領域を追跡し、
///   One Euro Filter で平滑化する
pub struct OnnxPoseEstimator {
    config: ModelConfig,
    sessions: [Option<Session>; 3],
    tracked_roi: Option<CropRegion>,
    smoother: LandmarkSmoother,
    last_time: Option<Instant>,
}

impl OnnxPoseEstimator {
    pub fn new(config: ModelConfig) -> Self {
        let smoother = LandmarkSmoother::new(config.smoothing_min_cutoff, config.smoothing_beta);
        Self {
            config,
            sessions: [None, None, None],
            tracked_roi: None,
            smoother,
            last_time: None,
        }
    }

    /// 指定した複雑度のモデルを事前にロード
    pub fn preload(&mut self, complexity: ModelComplexity) -> Result<()> {
        self.session(complexity).map(|_| ())
    }

    fn session(&mut self, complexity: ModelComplexity) -> Result<&mut Session> {
        let slot = &mut self.sessions[complexity.level() as usize];
        if slot.is_none() {
            let path = self.config.path_for(complexity);
            info!("loading pose model {} (complexity {})", path.display(), complexity.level());
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(path)
                .with_context(|| format!("Failed to load ONNX model {}", path.display()))?;
            *slot = Some(session);
        }
        slot.as_mut().context("model session missing")
    }

    /// 推論して (ランドマーク生値, 存在スコア) を返す
    fn infer(&mut self, complexity: ModelComplexity, input: Array4<f32>) -> Result<(Vec<f32>, f32)> {
        let input_name = self.config.input_name.clone();
        let landmarks_output = self.config.landmarks_output.clone();
        let presence_output = self.config.presence_output.clone();
        let activation = self.config.presence_activation;

        let session = self.session(complexity)?;
        let input_tensor = Tensor::from_array(input)?;
        let outputs = session
            .run(ort::inputs![input_name => input_tensor])
            .context("Inference failed")?;

        let landmarks: ndarray::ArrayViewD<f32> = outputs[landmarks_output.as_str()]
            .try_extract_array()
            .context("Failed to extract landmark tensor")?;
        let raw: Vec<f32> = landmarks.iter().copied().collect();

        let presence: ndarray::ArrayViewD<f32> = outputs[presence_output.as_str()]
            .try_extract_array()
            .context("Failed to extract presence tensor")?;
        let score = presence.iter().next().copied().map(|v| activation.apply(v)).unwrap_or(0.0);

        Ok((raw, score))
    }

    /// 注目領域で1回推定。スコアが閾値未満ならNone
    fn detect_in(
        &mut self,
        frame: &Frame,
        roi: &CropRegion,
        complexity: ModelComplexity,
        threshold: f32,
    ) -> Result<Option<Pose>> {
        let (input, letterbox) = preprocess_for_blazepose(frame, roi, self.config.input_size)?;
        let (raw, score) = self.infer(complexity, input)?;
        if score < threshold {
            debug!("pose presence {:.2} below {:.2}", score, threshold);
            return Ok(None);
        }
        decode_landmarks(&raw, &letterbox).map(Some)
    }

    fn lose_track(&mut self) {
        self.tracked_roi = None;
        self.smoother.reset();
        self.last_time = None;
    }
}

impl PoseEstimator for OnnxPoseEstimator {
    fn prepare(&mut self, settings: &PoseSettings) -> Result<()> {
        self.preload(settings.model_complexity)
    }

    fn estimate(&mut self, frame: &Frame, settings: &PoseSettings) -> Result<Option<Pose>> {
        let complexity = settings.model_complexity;

        if settings.static_image_mode {
            self.lose_track();
            return self.detect_in(frame, &CropRegion::full(), complexity, settings.min_detection_confidence);
        }

        // 追跡中なら前フレームの領域で、見失ったらフレーム全体で再検出
        let mut pose = None;
        if let Some(roi) = self.tracked_roi {
            pose = self.detect_in(frame, &roi, complexity, settings.min_tracking_confidence)?;
            if pose.is_none() {
                debug!("tracking lost, falling back to detection");
                self.lose_track();
            }
        }
        if pose.is_none() {
            pose = self.detect_in(frame, &CropRegion::full(), complexity, settings.min_detection_confidence)?;
        }

        let Some(pose) = pose else {
            self.lose_track();
            return Ok(None);
        };

        let now = Instant::now();
        let dt = self
            .last_time
            .map(|t| now.duration_since(t).as_secs_f32())
            .unwrap_or(0.0);
        self.last_time = Some(now);

        let pose = self.smoother.apply(&pose, dt);
        self.tracked_roi = roi_from_pose(&pose, frame.width(), frame.height(), ROI_VISIBILITY_THRESHOLD);
        Ok(Some(pose))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ChannelOrder, Rgb};

    fn letterbox_640x480() -> LetterboxInfo {
        let frame = Frame::filled(640, 480, ChannelOrder::Rgb, Rgb(0, 0, 0));
        preprocess_for_blazepose(&frame, &CropRegion::full(), 256).unwrap().1
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_decode_landmarks() {
        let letterbox = letterbox_640x480();
        let mut raw = vec![0.0f32; RAW_LANDMARK_COUNT * RAW_LANDMARK_STRIDE];
        // Nose: 入力の中心、visibility ロジット 0 → 0.5
        raw[0] = 128.0;
        raw[1] = 128.0;
        raw[3] = 0.0;
        raw[4] = 5.0;

        let pose = decode_landmarks(&raw, &letterbox).unwrap();
        let nose = pose.get(LandmarkIndex::Nose);
        assert!((nose.x - 0.5).abs() < 1e-4);
        assert!((nose.y - 0.5).abs() < 1e-4);
        assert!((nose.visibility - 0.5).abs() < 1e-6);
        assert!(nose.presence > 0.99);
    }

    #[test]
    fn test_decode_landmarks_too_short() {
        let letterbox = letterbox_640x480();
        assert!(decode_landmarks(&[0.0; 10], &letterbox).is_err());
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let config = ModelConfig {
            lite_path: "does/not/exist.onnx".into(),
            ..ModelConfig::default()
        };
        let mut estimator = OnnxPoseEstimator::new(config);
        assert!(estimator.preload(ModelComplexity::Lite).is_err());
    }
}
