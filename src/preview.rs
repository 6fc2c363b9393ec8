use anyhow::Result;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::config::Config;
use crate::error::FormError;
use crate::frame::{ChannelOrder, Frame};
use crate::pipeline::{
    CancelToken, FramePipeline, FrameSink, LoopExit, LoopOutcome, PipelineOptions, SinkStatus,
};
use crate::pose::{OnnxPoseEstimator, PoseOverlay};
use crate::settings::SettingsHandle;
use crate::video::{CaptureSession, EdgeFilter};

/// プレビューの状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    Capturing,
    /// 停止要求で終了
    Stopped,
    /// カメラが開けなかった、または処理中のエラー
    Failed(String),
    /// カメラから読めなくなった / 表示先が閉じた
    Closed,
}

impl PreviewState {
    fn from_result(result: &Result<LoopOutcome>) -> Self {
        match result {
            Ok(LoopOutcome { exit: LoopExit::Stopped, .. }) => Self::Stopped,
            Ok(_) => Self::Closed,
            Err(e) => Self::Failed(format!("{:#}", e)),
        }
    }
}

/// キャプチャスレッドから GUI スレッドへ最新フレームを渡す
///
/// 書き込み側は常に上書きし、GUI は描画のたびに新しいフレームだけ取り出す。
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    latest: Arc<Mutex<Option<Frame>>>,
    frame_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新フレームが到着するたびにインクリメントされる
    pub fn frame_id(&self) -> u64 {
        self.frame_id.load(Ordering::Acquire)
    }

    /// 最新フレームを取り出す。取り出し済みなら None
    pub fn take(&self) -> Option<Frame> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// 表示側が閉じたことを通知
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl FrameSink for FrameSlot {
    fn write_frame(&mut self, frame: &Frame) -> Result<SinkStatus> {
        if self.is_closed() {
            return Ok(SinkStatus::Closed);
        }
        let frame = frame.clone().into_order(ChannelOrder::Rgb);
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        self.frame_id.fetch_add(1, Ordering::Release);
        Ok(SinkStatus::Open)
    }
}

struct ActivePreview {
    cancel: CancelToken,
    handle: thread::JoinHandle<Result<LoopOutcome>>,
}

/// カメラプレビューのバックグラウンドスレッドを管理。同時に1つまで
pub struct PreviewController {
    active: Option<ActivePreview>,
    state: PreviewState,
}

impl Default for PreviewController {
    fn default() -> Self {
        Self {
            active: None,
            state: PreviewState::Idle,
        }
    }
}

impl PreviewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// ループをスレッドで開始。実行中なら拒否
    pub fn start<F>(&mut self, job: F) -> Result<(), FormError>
    where
        F: FnOnce(CancelToken) -> Result<LoopOutcome> + Send + 'static,
    {
        self.poll();
        if self.active.is_some() {
            return Err(FormError::PreviewAlreadyRunning);
        }

        let cancel = CancelToken::new();
        let cancel_ref = cancel.clone();
        let handle = thread::spawn(move || job(cancel_ref));
        self.active = Some(ActivePreview { cancel, handle });
        self.state = PreviewState::Capturing;
        Ok(())
    }

    /// スレッドが終了していれば回収して状態を更新
    pub fn poll(&mut self) -> &PreviewState {
        if self.active.as_ref().is_some_and(|a| a.handle.is_finished()) {
            self.join();
        }
        &self.state
    }

    /// 停止要求を出して終了を待つ（最大1フレーム分の処理時間）
    pub fn stop(&mut self) -> &PreviewState {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
        self.join();
        &self.state
    }

    fn join(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.state = match active.handle.join() {
            Ok(result) => PreviewState::from_result(&result),
            Err(_) => PreviewState::Failed("preview thread panicked".to_string()),
        };
        match &self.state {
            PreviewState::Failed(msg) => warn!("camera preview failed: {}", msg),
            state => info!("camera preview ended: {:?}", state),
        }
    }
}

impl Drop for PreviewController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// プレビュー用のパイプラインオプション
pub fn preview_options(config: &Config, edge_filter: bool) -> PipelineOptions {
    PipelineOptions {
        resize: Some((config.preview.width, config.preview.height)),
        edge_filter: edge_filter.then(|| EdgeFilter::new(config.preview.canny_low, config.preview.canny_high)),
        output_order: Some(ChannelOrder::Rgb),
    }
}

/// カメラ → 推定 → FrameSlot のジョブを作る
pub fn camera_preview_job(
    camera_index: i32,
    settings: SettingsHandle,
    config: &Config,
    edge_filter: bool,
    slot: FrameSlot,
) -> impl FnOnce(CancelToken) -> Result<LoopOutcome> + Send + 'static {
    let model = config.model.clone();
    let options = preview_options(config, edge_filter);
    move |cancel| {
        let camera = CaptureSession::open_camera(camera_index)?;
        let overlay = PoseOverlay::new(OnnxPoseEstimator::new(model));
        let mut pipeline = FramePipeline::new(overlay, settings, options);
        pipeline.prepare()?;
        pipeline.run(camera, slot, &cancel, |_| {})
    }
}
