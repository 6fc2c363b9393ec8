use anyhow::Result;

use super::estimator::PoseEstimator;
use super::landmark::Pose;
use crate::frame::{ChannelOrder, Frame};
use crate::render::skeleton::{draw_pose, OverlayStyle};
use crate::settings::PoseSettings;

/// 推定 + 骨格描画の1ステップ
///
/// 人物が検出された時だけフレームを書き換える。検出なしならフレームは不変。
pub struct PoseOverlay<E> {
    estimator: E,
    style: OverlayStyle,
}

impl<E: PoseEstimator> PoseOverlay<E> {
    pub fn new(estimator: E) -> Self {
        Self::with_style(estimator, OverlayStyle::default())
    }

    pub fn with_style(estimator: E, style: OverlayStyle) -> Self {
        Self { estimator, style }
    }

    /// RGB のフレームで推定のみ行う
    pub fn estimate(&mut self, frame: &Frame, settings: &PoseSettings) -> Result<Option<Pose>> {
        if frame.order() == ChannelOrder::Rgb {
            self.estimator.estimate(frame, settings)
        } else {
            let rgb = frame.clone().into_order(ChannelOrder::Rgb);
            self.estimator.estimate(&rgb, settings)
        }
    }

    pub fn prepare(&mut self, settings: &PoseSettings) -> Result<()> {
        self.estimator.prepare(settings)
    }

    pub fn draw(&self, frame: &mut Frame, pose: &Pose) {
        draw_pose(frame, pose, &self.style);
    }

    /// 推定して、検出されたら描画
    pub fn apply(&mut self, frame: &mut Frame, settings: &PoseSettings) -> Result<Option<Pose>> {
        let pose = self.estimate(frame, settings)?;
        if let Some(pose) = &pose {
            self.draw(frame, pose);
        }
        Ok(pose)
    }

    pub fn estimator_mut(&mut self) -> &mut E {
        &mut self.estimator
    }
}
