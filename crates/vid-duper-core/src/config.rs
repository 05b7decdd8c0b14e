use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: String,
    pub poll_interval_secs: f64,
    pub default_roots: Vec<String>,
    pub default_frames: usize,
    pub default_scale: u32,
    pub default_threshold: f64,
    pub ignore_patterns: Vec<String>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub parallel: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "vid_duper.db".to_string(),
            poll_interval_secs: 2.0,
            default_roots: Vec::new(),
            default_frames: 20,
            default_scale: 320,
            default_threshold: 0.88,
            ignore_patterns: Vec::new(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            parallel: true,
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs.max(0.0))
    }
}

/// Layered load: optional `Config.toml`, then `VID_DUPER_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("VID_DUPER")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("default_roots")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        if result.iter().any(|kept| dir_path.starts_with(Path::new(kept))) {
            continue;
        }
        result.retain(|kept| !Path::new(kept).starts_with(dir_path));
        result.push(dir);
    }

    result
}
