//! カメラ/動画ファイル共通のフレーム処理ループ
//!
//! source から1フレーム読み、推定・描画して sink に渡す。source と sink は
//! 値で受け取り、ループを抜けた時点で必ず1回だけ解放される。

use anyhow::Result;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::frame::{ChannelOrder, Frame};
use crate::pose::{PoseEstimator, PoseOverlay};
use crate::settings::SettingsHandle;
use crate::video::ops::{resize_frame, EdgeFilter};

/// 入力ストリームのメタデータ
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamProperties {
    /// カメラなど総数が不明なら None
    pub frame_count: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// フレームの読み出し元（カメラ / 動画ファイル）
pub trait FrameSource {
    /// `Ok(None)` はストリーム終端（カメラ切断を含む）
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    fn properties(&self) -> StreamProperties;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    Open,
    /// 表示先が閉じられた
    Closed,
}

/// フレームの書き出し先（表示面 / 動画ファイル）
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<SinkStatus>;

    /// 正常終了時に呼ばれる
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// ループ停止用のフラグ。1イテレーションに1回確認される
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// ループの終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// 停止要求
    Stopped,
    /// 入力の終端、または読み出し失敗
    Closed,
    /// 出力側が閉じられた
    SinkClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub frames: u64,
    pub exit: LoopExit,
}

/// 進捗（処理済みフレーム数 / 総数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub done: u64,
    pub total: Option<u64>,
}

impl Progress {
    /// 0.0〜1.0。総数 0 は完了扱い
    pub fn fraction(&self) -> Option<f32> {
        self.total.map(|total| {
            if total == 0 {
                1.0
            } else {
                (self.done as f32 / total as f32).min(1.0)
            }
        })
    }
}

/// フレームごとの前後処理
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineOptions {
    /// 推定前にこのサイズへリサイズ
    pub resize: Option<(u32, u32)>,
    /// 推定後、描画前にエッジ画像へ置き換え
    pub edge_filter: Option<EdgeFilter>,
    /// 出力のチャンネル順
    pub output_order: Option<ChannelOrder>,
}

pub struct FramePipeline<E> {
    overlay: PoseOverlay<E>,
    settings: SettingsHandle,
    options: PipelineOptions,
}

impl<E: PoseEstimator> FramePipeline<E> {
    pub fn new(overlay: PoseOverlay<E>, settings: SettingsHandle, options: PipelineOptions) -> Self {
        Self {
            overlay,
            settings,
            options,
        }
    }

    pub fn overlay_mut(&mut self) -> &mut PoseOverlay<E> {
        &mut self.overlay
    }

    /// 現在の設定でモデルを読み込む
    pub fn prepare(&mut self) -> Result<()> {
        let settings = self.settings.snapshot();
        self.overlay.prepare(&settings)
    }

    /// 1フレーム分の処理
    pub fn process_frame(&mut self, frame: Frame) -> Result<Frame> {
        let mut frame = frame.into_order(ChannelOrder::Rgb);
        if let Some((w, h)) = self.options.resize {
            if (frame.width(), frame.height()) != (w, h) {
                frame = resize_frame(&frame, w, h)?;
            }
        }

        // 設定は毎フレーム読み直す
        let settings = self.settings.snapshot();
        let pose = self.overlay.estimate(&frame, &settings)?;

        if let Some(filter) = &self.options.edge_filter {
            frame = filter.apply(&frame)?;
        }
        if let Some(pose) = &pose {
            self.overlay.draw(&mut frame, pose);
        }

        Ok(match self.options.output_order {
            Some(order) => frame.into_order(order),
            None => frame,
        })
    }

    /// source が尽きるか、停止要求か、sink が閉じるまで回す
    pub fn run<S, K>(
        &mut self,
        mut source: S,
        mut sink: K,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<LoopOutcome>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let total = source.properties().frame_count;
        let mut frames = 0u64;
        on_progress(Progress { done: 0, total });

        let exit = loop {
            if cancel.is_cancelled() {
                break LoopExit::Stopped;
            }

            let Some(frame) = source.read_frame()? else {
                break LoopExit::Closed;
            };

            let frame = self.process_frame(frame)?;
            if sink.write_frame(&frame)? == SinkStatus::Closed {
                break LoopExit::SinkClosed;
            }

            frames += 1;
            on_progress(Progress { done: frames, total });
        };

        debug!("pipeline exit {:?} after {} frames", exit, frames);
        sink.finish()?;
        info!("processed {} frames ({:?})", frames, exit);
        Ok(LoopOutcome { frames, exit })
    }
}
