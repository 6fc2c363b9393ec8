use anyhow::Result;
use minifb::{Key, Window, WindowOptions};

use crate::frame::Frame;
use crate::pipeline::{FrameSink, SinkStatus};

/// minifbを使用した専用プレビューウィンドウ
pub struct MinifbRenderer {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl MinifbRenderer {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        Ok(Self {
            window,
            buffer: vec![0u32; width * height],
            width,
            height,
        })
    }

    /// ウィンドウが開いているか（ESCで閉じる）
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// フレームをバッファにコピー
    pub fn draw_frame(&mut self, frame: &Frame) {
        copy_to_buffer(frame, &mut self.buffer, self.width, self.height);
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }
}

/// 0RGB の u32 バッファへコピー。サイズが違う場合はクロップ/パディング
pub fn copy_to_buffer(frame: &Frame, buffer: &mut [u32], width: usize, height: usize) {
    let fw = frame.width() as usize;
    let fh = frame.height() as usize;

    for y in 0..height.min(fh) {
        for x in 0..width.min(fw) {
            if let Some(px) = frame.pixel(x as u32, y as u32) {
                buffer[y * width + x] = ((px.0 as u32) << 16) | ((px.1 as u32) << 8) | px.2 as u32;
            }
        }
    }
}

impl FrameSink for MinifbRenderer {
    fn write_frame(&mut self, frame: &Frame) -> Result<SinkStatus> {
        if !self.is_open() {
            return Ok(SinkStatus::Closed);
        }
        self.draw_frame(frame);
        self.update()?;
        Ok(SinkStatus::Open)
    }
}
