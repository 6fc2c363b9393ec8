use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::settings::{ModelComplexity, PoseSettings};

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// 起動時の推定パラメータ（GUIで変更しても保存はしない）
    #[serde(default)]
    pub pose: PoseSettings,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// model_complexity = 0
    #[serde(default = "default_lite_path")]
    pub lite_path: PathBuf,
    /// model_complexity = 1
    #[serde(default = "default_full_path")]
    pub full_path: PathBuf,
    /// model_complexity = 2
    #[serde(default = "default_heavy_path")]
    pub heavy_path: PathBuf,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    /// [1, 195] ランドマーク出力 (39 x 5)
    #[serde(default = "default_landmarks_output")]
    pub landmarks_output: String,
    /// [1, 1] 人物存在スコア
    #[serde(default = "default_presence_output")]
    pub presence_output: String,
    /// 存在スコア出力がロジットか確率か
    #[serde(default)]
    pub presence_activation: ScoreActivation,
    /// 正方形入力の辺長（ピクセル）
    #[serde(default = "default_input_size")]
    pub input_size: usize,
    /// One Euro Filter の最小カットオフ周波数
    #[serde(default = "default_smoothing_min_cutoff")]
    pub smoothing_min_cutoff: f32,
    #[serde(default = "default_smoothing_beta")]
    pub smoothing_beta: f32,
}

fn default_lite_path() -> PathBuf { PathBuf::from("models/pose_landmark_lite.onnx") }
fn default_full_path() -> PathBuf { PathBuf::from("models/pose_landmark_full.onnx") }
fn default_heavy_path() -> PathBuf { PathBuf::from("models/pose_landmark_heavy.onnx") }
fn default_input_name() -> String { "input_1".to_string() }
fn default_landmarks_output() -> String { "Identity".to_string() }
fn default_presence_output() -> String { "Identity_1".to_string() }
fn default_input_size() -> usize { 256 }
fn default_smoothing_min_cutoff() -> f32 { 0.05 }
fn default_smoothing_beta() -> f32 { 80.0 }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            lite_path: default_lite_path(),
            full_path: default_full_path(),
            heavy_path: default_heavy_path(),
            input_name: default_input_name(),
            landmarks_output: default_landmarks_output(),
            presence_output: default_presence_output(),
            presence_activation: ScoreActivation::default(),
            input_size: default_input_size(),
            smoothing_min_cutoff: default_smoothing_min_cutoff(),
            smoothing_beta: default_smoothing_beta(),
        }
    }
}

/// モデルのスコア出力に掛ける活性化
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScoreActivation {
    /// ロジットを出力するモデル
    #[default]
    Sigmoid,
    /// 確率をそのまま出力するモデル
    Identity,
}

impl ScoreActivation {
    pub fn apply(self, raw: f32) -> f32 {
        match self {
            Self::Sigmoid => 1.0 / (1.0 + (-raw).exp()),
            Self::Identity => raw,
        }
    }
}

impl ModelConfig {
    pub fn path_for(&self, complexity: ModelComplexity) -> &Path {
        match complexity {
            ModelComplexity::Lite => &self.lite_path,
            ModelComplexity::Full => &self.full_path,
            ModelComplexity::Heavy => &self.heavy_path,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreviewConfig {
    /// 表示面の幅（フレームはこのサイズにリサイズされる）
    #[serde(default = "default_preview_width")]
    pub width: u32,
    #[serde(default = "default_preview_height")]
    pub height: u32,
    /// エッジ検出表示の初期値
    #[serde(default)]
    pub edge_filter: bool,
    #[serde(default = "default_canny_low")]
    pub canny_low: f64,
    #[serde(default = "default_canny_high")]
    pub canny_high: f64,
}

fn default_preview_width() -> u32 { 640 }
fn default_preview_height() -> u32 { 480 }
fn default_canny_low() -> f64 { 75.0 }
fn default_canny_high() -> f64 { 150.0 }

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: default_preview_width(),
            height: default_preview_height(),
            edge_filter: false,
            canny_low: default_canny_low(),
            canny_high: default_canny_high(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// 4文字のFourCC
    #[serde(default = "default_fourcc")]
    pub fourcc: String,
    /// 入力が FPS=0 を返した場合に使う値
    #[serde(default = "default_fallback_fps")]
    pub fallback_fps: f64,
}

fn default_fourcc() -> String { "mp4v".to_string() }
fn default_fallback_fps() -> f64 { 30.0 }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fourcc: default_fourcc(),
            fallback_fps: default_fallback_fps(),
        }
    }
}

impl OutputConfig {
    /// FourCC を4文字に分解。不正な長さなら mp4v
    pub fn fourcc_chars(&self) -> [char; 4] {
        let chars: Vec<char> = self.fourcc.chars().collect();
        match chars.as_slice() {
            [a, b, c, d] => [*a, *b, *c, *d],
            _ => {
                warn!("invalid fourcc {:?}, using mp4v", self.fourcc);
                ['m', 'p', '4', 'v']
            }
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// 読めなければデフォルト値
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pose, PoseSettings::default());
        assert_eq!(config.model.input_size, 256);
        assert_eq!(config.preview.width, 640);
        assert_eq!(config.preview.height, 480);
        assert_eq!(config.preview.canny_low, 75.0);
        assert_eq!(config.preview.canny_high, 150.0);
        assert_eq!(config.output.fourcc_chars(), ['m', 'p', '4', 'v']);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[pose]\nmodel_complexity = 0\nmin_detection_confidence = 0.7\n\n[preview]\nedge_filter = true"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.pose.model_complexity, ModelComplexity::Lite);
        assert_eq!(config.pose.min_detection_confidence, 0.7);
        assert_eq!(config.pose.min_tracking_confidence, 0.5);
        assert!(config.preview.edge_filter);
        assert_eq!(config.preview.width, 640);
        assert_eq!(config.model.landmarks_output, "Identity");
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.toml"));
        assert_eq!(config.output.fallback_fps, 30.0);
    }

    #[test]
    fn test_load_rejects_invalid_complexity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pose]\nmodel_complexity = 7").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_score_activation() {
        assert_eq!(ModelConfig::default().presence_activation, ScoreActivation::Sigmoid);
        // 0〜1 のロジットも必ずシグモイドを通す
        assert!((ScoreActivation::Sigmoid.apply(0.3) - 0.5744).abs() < 1e-3);
        assert_eq!(ScoreActivation::Identity.apply(0.3), 0.3);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[model]\npresence_activation = \"identity\"").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.model.presence_activation, ScoreActivation::Identity);
    }

    #[test]
    fn test_model_path_for_complexity() {
        let model = ModelConfig::default();
        assert_eq!(model.path_for(ModelComplexity::Lite), Path::new("models/pose_landmark_lite.onnx"));
        assert_eq!(model.path_for(ModelComplexity::Heavy), Path::new("models/pose_landmark_heavy.onnx"));
    }

    #[test]
    fn test_bad_fourcc_falls_back() {
        let output = OutputConfig {
            fourcc: "h264x".to_string(),
            ..OutputConfig::default()
        };
        assert_eq!(output.fourcc_chars(), ['m', 'p', '4', 'v']);
    }
}
