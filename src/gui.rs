use eframe::egui;
use log::{info, warn};
use std::path::PathBuf;

use crate::camera::{cameras_found_message, detect_cameras};
use crate::config::Config;
use crate::convert::{ConversionJob, ConversionSlot};
use crate::error::FormError;
use crate::preview::{camera_preview_job, FrameSlot, PreviewController, PreviewState};
use crate::settings::SettingsHandle;

pub const WINDOW_TITLE: &str = "FormTrainer (prototype)";

const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mov", "MOV", "mkv"];
const DEFAULT_EXTENSION: &str = "mp4";

/// ダイアログの結果から入出力パスを決める。どちらかが閉じられたら中断
pub fn choose_paths(
    pick_input: impl FnOnce() -> Option<PathBuf>,
    pick_output: impl FnOnce() -> Option<PathBuf>,
) -> Result<(PathBuf, PathBuf), FormError> {
    let input = pick_input().ok_or(FormError::SelectionCancelled)?;
    let output = pick_output().ok_or(FormError::SelectionCancelled)?;
    Ok((input, with_default_extension(output)))
}

/// 拡張子がなければ .mp4
pub fn with_default_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(DEFAULT_EXTENSION)
    }
}

fn pick_video_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select a Video File")
        .add_filter("Video files", &VIDEO_EXTENSIONS)
        .add_filter("All files", &["*"])
        .pick_file()
}

fn pick_output_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Create output file")
        .set_file_name("output.mp4")
        .add_filter("Video files", &VIDEO_EXTENSIONS)
        .add_filter("All files", &["*"])
        .save_file()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Message {
    Info(String),
    Error(String),
}

fn conversion_message(result: anyhow::Result<PathBuf>) -> Message {
    match result {
        Ok(path) => Message::Info(format!("Processed video saved as {}", path.display())),
        Err(e) => match e.downcast_ref::<FormError>() {
            Some(FormError::ConversionCancelled) => Message::Info("Video processing was cancelled".to_string()),
            _ => Message::Error(format!("{:#}", e)),
        },
    }
}

struct PreviewWindow {
    title: String,
    slot: FrameSlot,
    texture: Option<egui::TextureHandle>,
}

/// 設定スライダーと起動ボタンを並べたメインウィンドウ
pub struct ControlPanel {
    config: Config,
    settings: SettingsHandle,
    edge_filter: bool,
    cameras: Vec<i32>,
    selected_camera: Option<i32>,
    preview: PreviewController,
    preview_window: Option<PreviewWindow>,
    conversion: ConversionSlot,
    message: Option<Message>,
}

impl ControlPanel {
    pub fn new(config: Config) -> Self {
        let settings = SettingsHandle::new(config.pose);
        let edge_filter = config.preview.edge_filter;
        Self {
            config,
            settings,
            edge_filter,
            cameras: Vec::new(),
            selected_camera: None,
            preview: PreviewController::new(),
            preview_window: None,
            conversion: ConversionSlot::default(),
            message: None,
        }
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// 設定の変更が拒否されたらメッセージに出す
    fn report<T>(&mut self, result: Result<T, FormError>) {
        if let Err(e) = result {
            warn!("{}", e);
            self.message = Some(Message::Error(e.to_string()));
        }
    }

    fn start_cameras(&mut self) {
        if self.preview.is_running() {
            self.message = Some(Message::Error(FormError::PreviewAlreadyRunning.to_string()));
            return;
        }

        self.cameras = detect_cameras();
        self.message = Some(Message::Info(cameras_found_message(self.cameras.len())));

        let index = match self.selected_camera.filter(|i| self.cameras.contains(i)) {
            Some(i) => i,
            None => match self.cameras.first() {
                Some(&i) => i,
                None => return,
            },
        };
        self.selected_camera = Some(index);

        let slot = FrameSlot::new();
        let job = camera_preview_job(index, self.settings.clone(), &self.config, self.edge_filter, slot.clone());
        match self.preview.start(job) {
            Ok(()) => {
                info!("camera preview started on camera {}", index);
                self.preview_window = Some(PreviewWindow {
                    title: format!("Camera (model complexity: {})", self.settings.model_complexity().level()),
                    slot,
                    texture: None,
                });
            }
            Err(e) => self.message = Some(Message::Error(e.to_string())),
        }
    }

    fn close_preview(&mut self) {
        if let Some(window) = self.preview_window.take() {
            window.slot.close();
        }
        self.preview.stop();
    }

    fn process_video_file(&mut self) {
        let (input, output) = match choose_paths(pick_video_file, pick_output_file) {
            Ok(paths) => paths,
            Err(FormError::SelectionCancelled) => return,
            Err(e) => {
                self.message = Some(Message::Error(e.to_string()));
                return;
            }
        };

        let settings = self.settings.clone();
        let config = &self.config;
        if let Err(e) = self
            .conversion
            .start(|| ConversionJob::spawn(input, output, settings, config))
        {
            self.message = Some(Message::Error(e.to_string()));
        }
    }

    /// バックグラウンド処理の終了を回収
    fn poll_background(&mut self) {
        if let Some(result) = self.conversion.poll() {
            self.message = Some(conversion_message(result));
        }

        if self.preview_window.is_some() {
            match self.preview.poll().clone() {
                PreviewState::Failed(msg) => {
                    warn!("{}", msg);
                    self.message = Some(Message::Error(msg));
                    self.preview_window = None;
                }
                PreviewState::Closed => {
                    self.message = Some(Message::Info("Camera stream ended".to_string()));
                    self.preview_window = None;
                }
                _ => {}
            }
        }
    }

    fn settings_ui(&mut self, ui: &mut egui::Ui) {
        let busy = self.conversion.current().is_some();

        egui::Grid::new("pose_settings")
            .num_columns(2)
            .spacing([20.0, 10.0])
            .show(ui, |ui| {
                ui.label("Select model complexity:");
                let mut level = self.settings.model_complexity().level();
                if ui.add(egui::Slider::new(&mut level, 0..=2)).changed() {
                    self.report(self.settings.set_model_complexity_level(level as i64));
                }
                ui.end_row();

                ui.label("Select min detection confidence:");
                let mut detection = self.settings.min_detection_confidence();
                if ui
                    .add(egui::Slider::new(&mut detection, 0.1..=1.0).step_by(0.1))
                    .changed()
                {
                    self.report(self.settings.set_min_detection_confidence(detection));
                }
                ui.end_row();

                ui.label("Select min tracking confidence:");
                let mut tracking = self.settings.min_tracking_confidence();
                if ui
                    .add(egui::Slider::new(&mut tracking, 0.1..=1.0).step_by(0.1))
                    .changed()
                {
                    self.report(self.settings.set_min_tracking_confidence(tracking));
                }
                ui.end_row();

                ui.label("Static image mode:");
                let mut static_mode = self.settings.static_image_mode();
                if ui.checkbox(&mut static_mode, "").changed() {
                    self.settings.set_static_image_mode(static_mode);
                }
                ui.end_row();

                ui.label("Edge filter (camera):");
                ui.checkbox(&mut self.edge_filter, "");
                ui.end_row();

                if !self.cameras.is_empty() {
                    ui.label("Camera:");
                    let selected = self.selected_camera.map_or("-".to_string(), |i| format!("camera {}", i));
                    egui::ComboBox::from_id_salt("camera_select")
                        .selected_text(selected)
                        .show_ui(ui, |ui| {
                            for &i in &self.cameras {
                                ui.selectable_value(&mut self.selected_camera, Some(i), format!("camera {}", i));
                            }
                        });
                    ui.end_row();
                }
            });

        ui.separator();

        ui.vertical_centered(|ui| {
            if ui
                .add_enabled(!self.preview.is_running(), egui::Button::new("Start cameras"))
                .clicked()
            {
                self.start_cameras();
            }
            if ui
                .add_enabled(!busy, egui::Button::new("Process video file"))
                .clicked()
            {
                self.process_video_file();
            }
        });

        if let Some(job) = self.conversion.current() {
            let progress = job.progress();
            let text = match progress.total {
                Some(total) => format!("Processing Video {}/{} frames", progress.done, total),
                None => format!("Processing Video {} frames", progress.done),
            };
            ui.separator();
            ui.label(job.output().display().to_string());
            ui.add(egui::ProgressBar::new(progress.fraction().unwrap_or(0.0)).text(text));
            if ui.button("Cancel").clicked() {
                self.conversion.cancel();
            }
        }
    }

    fn preview_ui(&mut self, ctx: &egui::Context) {
        let Some(window) = &mut self.preview_window else {
            return;
        };

        if let Some(frame) = window.slot.take() {
            let image =
                egui::ColorImage::from_rgb([frame.width() as usize, frame.height() as usize], frame.data());
            match &mut window.texture {
                Some(texture) => texture.set(image, egui::TextureOptions::default()),
                None => {
                    window.texture = Some(ctx.load_texture("camera_preview", image, egui::TextureOptions::default()))
                }
            }
        }

        let mut open = true;
        let mut close_clicked = false;
        egui::Window::new(&window.title)
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                match &window.texture {
                    Some(texture) => {
                        ui.image((texture.id(), texture.size_vec2()));
                    }
                    None => {
                        ui.label("Waiting for camera...");
                    }
                }
                ui.vertical_centered(|ui| {
                    if ui.button("Close").clicked() {
                        close_clicked = true;
                    }
                });
            });

        if !open || close_clicked {
            self.close_preview();
        }
    }

    fn message_ui(&mut self, ctx: &egui::Context) {
        let Some(message) = &self.message else {
            return;
        };
        let (title, text) = match message {
            Message::Info(text) => ("Info", text.clone()),
            Message::Error(text) => ("Error", text.clone()),
        };

        let mut dismissed = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(text);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.message = None;
        }
    }
}

impl eframe::App for ControlPanel {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_background();

        egui::CentralPanel::default().show(ctx, |ui| {
            self.settings_ui(ui);
        });
        self.preview_ui(ctx);
        self.message_ui(ctx);

        // キャプチャ/変換中は描画し続ける
        if self.preview_window.is_some() || self.conversion.current().is_some() {
            ctx.request_repaint();
        }
    }
}

impl Drop for ControlPanel {
    fn drop(&mut self) {
        self.close_preview();
        self.conversion.cancel();
    }
}
