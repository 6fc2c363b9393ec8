use anyhow::{Context, Result};
use log::info;

use form_trainer::camera::detect_cameras;
use form_trainer::config::{Config, CONFIG_PATH};
use form_trainer::pipeline::{CancelToken, FramePipeline};
use form_trainer::pose::{OnnxPoseEstimator, PoseOverlay};
use form_trainer::preview::preview_options;
use form_trainer::render::MinifbRenderer;
use form_trainer::settings::SettingsHandle;
use form_trainer::video::CaptureSession;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Pose Viewer {}", env!("GIT_VERSION"));
    println!("Press ESC to exit");

    let config = Config::load_or_default(CONFIG_PATH);
    let settings = SettingsHandle::new(config.pose);

    let index = *detect_cameras().first().context("no camera found")?;
    let camera = CaptureSession::open_camera(index)?;

    let (width, height) = (config.preview.width, config.preview.height);
    let renderer = MinifbRenderer::new(
        &format!("Camera (model complexity: {})", settings.model_complexity().level()),
        width as usize,
        height as usize,
    )?;

    let options = preview_options(&config, config.preview.edge_filter);
    let estimator = OnnxPoseEstimator::new(config.model.clone());
    let mut pipeline = FramePipeline::new(PoseOverlay::new(estimator), settings, options);
    // モデルは最初のフレームを待たずに読む
    pipeline.prepare()?;

    // ESC でウィンドウが閉じるまで
    let outcome = pipeline.run(camera, renderer, &CancelToken::new(), |_| {})?;
    info!("Shutting down after {} frames ({:?})", outcome.frames, outcome.exit);
    Ok(())
}
