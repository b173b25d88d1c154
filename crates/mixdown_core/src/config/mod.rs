//! Configuration: explicit settings sections with eager validation, and a
//! TOML-backed manager with atomic saves.

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    AcquisitionSettings, AudioSettings, PathSettings, Settings, SettingsError, ToolSettings,
    VideoSettings, VizSettings,
};
