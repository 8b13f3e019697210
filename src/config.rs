use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub tool: Tool,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub copy: Copying,
    #[serde(default)]
    pub validation: Validation,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global: Default::default(),
            paths: Default::default(),
            tool: Default::default(),
            timeouts: Default::default(),
            copy: Default::default(),
            validation: Default::default(),
            logging: Default::default(),
            debug: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    /// "uimf" or "agilent_d".
    pub dataset_kind: String,
    pub keep_local_artifacts: bool,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            dataset_kind: "uimf".into(),
            keep_local_artifacts: false,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub work_dir: String,
    pub storage_volume: String,
    pub storage_path: String,
    pub failure_archive_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            work_dir: ".demux-work".into(),
            storage_volume: "".into(),
            storage_path: "".into(),
            failure_archive_dir: ".demux-failed".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub exe: String,
    /// "demux", "calibrate_only" or "convert".
    pub mode: String,
    pub bit_depth: u32,
    pub frames_to_sum: u32,
    pub min_pulse_coverage: f32,
    pub skip_calibration: bool,
}
impl Default for Tool {
    fn default() -> Self {
        Self {
            exe: "IMSDemultiplexer".into(),
            mode: "demux".into(),
            bit_depth: 24,
            frames_to_sum: 1,
            min_pulse_coverage: 0.5,
            skip_calibration: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    /// Wall-clock cap per mode. Demux jobs historically run up to five days.
    pub demux_max_runtime_minutes: u64,
    pub calibrate_max_runtime_minutes: u64,
    pub convert_max_runtime_minutes: u64,
    pub poll_interval_seconds: u64,
    pub status_interval_seconds: u64,
}
impl Default for Timeouts {
    fn default() -> Self {
        Self {
            demux_max_runtime_minutes: 5 * 24 * 60,
            calibrate_max_runtime_minutes: 5,
            convert_max_runtime_minutes: 12 * 60,
            poll_interval_seconds: 30,
            status_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Copying {
    pub max_retries: i32,
    pub retry_backoff_seconds: u64,
    pub backup_existing_destination: bool,
}
impl Default for Copying {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_seconds: 2,
            backup_existing_destination: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
    pub freshness_window_minutes: u64,
}
impl Default for Validation {
    fn default() -> Self {
        Self {
            freshness_window_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            dump_effective_config: false,
        }
    }
}
