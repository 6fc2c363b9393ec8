use anyhow::{anyhow, Result};
use eframe::egui;
use log::info;

use form_trainer::config::{Config, CONFIG_PATH};
use form_trainer::gui::{ControlPanel, WINDOW_TITLE};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load_or_default(CONFIG_PATH);
    let title = format!("{} {}", WINDOW_TITLE, env!("GIT_VERSION"));
    info!("starting {}", title);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(title)
            .with_inner_size([460.0, 340.0]),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(ControlPanel::new(config)))),
    )
    .map_err(|e| anyhow!("GUI error: {}", e))
}
