pub mod camera;
pub mod config;
pub mod convert;
pub mod error;
pub mod frame;
pub mod gui;
pub mod pipeline;
pub mod pose;
pub mod preview;
pub mod render;
pub mod settings;
pub mod video;
