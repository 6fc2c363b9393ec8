use anyhow::{bail, Result};
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::config::{Config, OutputConfig};
use crate::error::FormError;
use crate::frame::ChannelOrder;
use crate::pipeline::{
    CancelToken, FramePipeline, FrameSink, FrameSource, LoopExit, LoopOutcome, PipelineOptions, Progress,
    StreamProperties,
};
use crate::pose::{OnnxPoseEstimator, PoseEstimator, PoseOverlay};
use crate::settings::SettingsHandle;
use crate::video::{CaptureSession, WriterParams, WriterSession};

/// 出力動画のパラメータを入力から決める。FPS は整数に切り捨て
pub fn writer_params_for(props: &StreamProperties, output: &OutputConfig) -> WriterParams {
    let fps = props.fps.trunc();
    WriterParams {
        fourcc: output.fourcc_chars(),
        fps: if fps >= 1.0 { fps } else { output.fallback_fps },
        width: props.width,
        height: props.height,
    }
}

/// 変換ループ本体
///
/// 入力を開いてモデルを読み込むまで出力は作らない。
pub fn convert_with<E, S, K, FS, FK>(
    pipeline: &mut FramePipeline<E>,
    open_source: FS,
    open_sink: FK,
    cancel: &CancelToken,
    on_progress: impl FnMut(Progress),
) -> Result<LoopOutcome>
where
    E: PoseEstimator,
    S: FrameSource,
    K: FrameSink,
    FS: FnOnce() -> Result<S>,
    FK: FnOnce(&StreamProperties) -> Result<K>,
{
    let source = open_source()?;
    pipeline.prepare()?;
    let props = source.properties();
    let sink = open_sink(&props)?;
    pipeline.run(source, sink, cancel, on_progress)
}

/// 動画ファイルに骨格を描画して書き出す。成功時は出力パスを返す
pub fn convert_video<E: PoseEstimator>(
    pipeline: &mut FramePipeline<E>,
    input: &Path,
    output: &Path,
    output_config: &OutputConfig,
    cancel: &CancelToken,
    on_progress: impl FnMut(Progress),
) -> Result<PathBuf> {
    info!("converting {} -> {}", input.display(), output.display());
    let outcome = convert_with(
        pipeline,
        || CaptureSession::open_file(input),
        |props| WriterSession::create(output, writer_params_for(props, output_config)),
        cancel,
        on_progress,
    )?;
    finish_conversion(&outcome, output)
}

/// 停止要求で終わった変換は途中までの出力を消して `ConversionCancelled` にする
pub fn finish_conversion(outcome: &LoopOutcome, output: &Path) -> Result<PathBuf> {
    if outcome.exit == LoopExit::Stopped {
        info!("conversion cancelled after {} frames", outcome.frames);
        if let Err(e) = fs::remove_file(output) {
            warn!("failed to remove partial output {}: {}", output.display(), e);
        }
        return Err(FormError::ConversionCancelled.into());
    }
    info!("Processed video saved as {} ({} frames)", output.display(), outcome.frames);
    Ok(output.to_path_buf())
}

/// ファイル変換用のパイプラインオプション（リサイズなし、BGRで出力）
pub fn conversion_options() -> PipelineOptions {
    PipelineOptions {
        resize: None,
        edge_filter: None,
        output_order: Some(ChannelOrder::Bgr),
    }
}

/// バックグラウンドで動く変換ジョブ
///
/// GUI は `progress()` を毎フレーム読み、`poll()` で完了を受け取る。
pub struct ConversionJob {
    progress: Arc<Mutex<Progress>>,
    cancel: CancelToken,
    output: PathBuf,
    handle: Option<thread::JoinHandle<Result<PathBuf>>>,
}

impl ConversionJob {
    /// 任意の変換処理をスレッドで開始
    pub fn spawn_with<F>(output: PathBuf, job: F) -> Self
    where
        F: FnOnce(CancelToken, Box<dyn FnMut(Progress) + Send>) -> Result<PathBuf> + Send + 'static,
    {
        let progress = Arc::new(Mutex::new(Progress::default()));
        let cancel = CancelToken::new();

        let progress_ref = progress.clone();
        let cancel_ref = cancel.clone();
        let handle = thread::spawn(move || {
            let report = Box::new(move |p: Progress| {
                *progress_ref.lock().unwrap_or_else(PoisonError::into_inner) = p;
            });
            job(cancel_ref, report)
        });

        Self {
            progress,
            cancel,
            output,
            handle: Some(handle),
        }
    }

    /// ONNX 推定器で動画変換を開始
    pub fn spawn(input: PathBuf, output: PathBuf, settings: SettingsHandle, config: &Config) -> Self {
        let model = config.model.clone();
        let output_config = config.output.clone();
        let dst = output.clone();
        // モデルは変換スレッドで、出力を作る前に読み込む (convert_with)
        Self::spawn_with(output, move |cancel, report| {
            let overlay = PoseOverlay::new(OnnxPoseEstimator::new(model));
            let mut pipeline = FramePipeline::new(overlay, settings, conversion_options());
            convert_video(&mut pipeline, &input, &dst, &output_config, &cancel, report)
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn progress(&self) -> Progress {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// 終了していれば結果を返す（1回だけ）
    pub fn poll(&mut self) -> Option<Result<PathBuf>> {
        if !self.is_finished() {
            return None;
        }
        let handle = self.handle.take()?;
        Some(match handle.join() {
            Ok(result) => {
                if let Err(e) = &result {
                    error!("video conversion failed: {:#}", e);
                }
                result
            }
            Err(_) => Err(anyhow::anyhow!("conversion thread panicked")),
        })
    }
}

/// 同時に1本だけ変換を走らせる
#[derive(Default)]
pub struct ConversionSlot {
    job: Option<ConversionJob>,
}

impl ConversionSlot {
    pub fn start(&mut self, job: impl FnOnce() -> ConversionJob) -> Result<&ConversionJob> {
        if self.job.is_some() {
            bail!(FormError::ConversionAlreadyRunning);
        }
        Ok(self.job.insert(job()))
    }

    pub fn current(&self) -> Option<&ConversionJob> {
        self.job.as_ref()
    }

    pub fn cancel(&self) {
        if let Some(job) = &self.job {
            job.cancel();
        }
    }

    /// 完了していればスロットを空けて結果を返す
    pub fn poll(&mut self) -> Option<Result<PathBuf>> {
        let result = self.job.as_mut()?.poll()?;
        self.job = None;
        Some(result)
    }
}
