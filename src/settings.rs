use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::FormError;

/// 推定モデルの品質/速度トレードオフ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
#[repr(u8)]
pub enum ModelComplexity {
    Lite = 0,
    Full = 1,
    Heavy = 2,
}

impl ModelComplexity {
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<i64> for ModelComplexity {
    type Error = FormError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Lite),
            1 => Ok(Self::Full),
            2 => Ok(Self::Heavy),
            other => Err(FormError::InvalidModelComplexity(other)),
        }
    }
}

impl From<ModelComplexity> for i64 {
    fn from(value: ModelComplexity) -> Self {
        value as i64
    }
}

/// 姿勢推定のパラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSettings {
    /// true ならフレーム間の追跡・平滑化を行わない
    #[serde(default)]
    pub static_image_mode: bool,
    #[serde(default = "default_model_complexity")]
    pub model_complexity: ModelComplexity,
    #[serde(default = "default_confidence")]
    pub min_detection_confidence: f32,
    #[serde(default = "default_confidence")]
    pub min_tracking_confidence: f32,
}

fn default_model_complexity() -> ModelComplexity { ModelComplexity::Full }
fn default_confidence() -> f32 { 0.5 }

impl Default for PoseSettings {
    fn default() -> Self {
        Self {
            static_image_mode: false,
            model_complexity: default_model_complexity(),
            min_detection_confidence: default_confidence(),
            min_tracking_confidence: default_confidence(),
        }
    }
}

/// 信頼度を [0, 1] にクランプ。NaN は拒否
pub fn clamp_confidence(value: f32) -> Result<f32, FormError> {
    if value.is_nan() {
        return Err(FormError::InvalidConfidence(value));
    }
    Ok(value.clamp(0.0, 1.0))
}

/// GUI とループで共有する設定ハンドル
///
/// 読み出しは常に最後に書き込まれた値を返す。ループは毎フレーム
/// `snapshot()` を取り直すので、変更は次のフレームから反映される。
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<PoseSettings>>,
}

impl SettingsHandle {
    pub fn new(initial: PoseSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn snapshot(&self) -> PoseSettings {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut PoseSettings)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    pub fn static_image_mode(&self) -> bool {
        self.snapshot().static_image_mode
    }

    pub fn set_static_image_mode(&self, value: bool) {
        self.update(|s| s.static_image_mode = value);
    }

    pub fn model_complexity(&self) -> ModelComplexity {
        self.snapshot().model_complexity
    }

    pub fn set_model_complexity(&self, value: ModelComplexity) {
        self.update(|s| s.model_complexity = value);
    }

    /// スライダー値などの生の整数から設定。0/1/2 以外は拒否
    pub fn set_model_complexity_level(&self, level: i64) -> Result<ModelComplexity, FormError> {
        let complexity = ModelComplexity::try_from(level)?;
        self.set_model_complexity(complexity);
        Ok(complexity)
    }

    pub fn min_detection_confidence(&self) -> f32 {
        self.snapshot().min_detection_confidence
    }

    /// 格納された（クランプ後の）値を返す
    pub fn set_min_detection_confidence(&self, value: f32) -> Result<f32, FormError> {
        let value = clamp_confidence(value)?;
        self.update(|s| s.min_detection_confidence = value);
        Ok(value)
    }

    pub fn min_tracking_confidence(&self) -> f32 {
        self.snapshot().min_tracking_confidence
    }

    pub fn set_min_tracking_confidence(&self, value: f32) -> Result<f32, FormError> {
        let value = clamp_confidence(value)?;
        self.update(|s| s.min_tracking_confidence = value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = PoseSettings::default();
        assert!(!s.static_image_mode);
        assert_eq!(s.model_complexity, ModelComplexity::Full);
        assert_eq!(s.min_detection_confidence, 0.5);
        assert_eq!(s.min_tracking_confidence, 0.5);
    }

    #[test]
    fn test_model_complexity_round_trip() {
        let handle = SettingsHandle::default();
        for level in 0..=2 {
            let set = handle.set_model_complexity_level(level).unwrap();
            assert_eq!(handle.model_complexity(), set);
            assert_eq!(handle.model_complexity().level() as i64, level);
        }
    }

    #[test]
    fn test_model_complexity_rejects_out_of_range() {
        let handle = SettingsHandle::default();
        assert!(matches!(
            handle.set_model_complexity_level(3),
            Err(FormError::InvalidModelComplexity(3))
        ));
        assert!(handle.set_model_complexity_level(-1).is_err());
        // 拒否された場合は元の値のまま
        assert_eq!(handle.model_complexity(), ModelComplexity::Full);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let handle = SettingsHandle::default();
        assert_eq!(handle.set_min_detection_confidence(1.7).unwrap(), 1.0);
        assert_eq!(handle.min_detection_confidence(), 1.0);
        assert_eq!(handle.set_min_tracking_confidence(-0.2).unwrap(), 0.0);
        assert_eq!(handle.min_tracking_confidence(), 0.0);
        assert_eq!(handle.set_min_tracking_confidence(0.3).unwrap(), 0.3);
    }

    #[test]
    fn test_confidence_rejects_nan() {
        let handle = SettingsHandle::default();
        assert!(handle.set_min_detection_confidence(f32::NAN).is_err());
        assert_eq!(handle.min_detection_confidence(), 0.5);
    }

    #[test]
    fn test_clones_share_state() {
        let gui = SettingsHandle::default();
        let worker = gui.clone();
        gui.set_static_image_mode(true);
        assert!(worker.static_image_mode());
        assert!(worker.snapshot().static_image_mode);
    }

    #[test]
    fn test_deserialize_partial() {
        let s: PoseSettings = toml::from_str("model_complexity = 2").unwrap();
        assert_eq!(s.model_complexity, ModelComplexity::Heavy);
        assert_eq!(s.min_detection_confidence, 0.5);

        let bad: Result<PoseSettings, _> = toml::from_str("model_complexity = 5");
        assert!(bad.is_err());
    }
}
