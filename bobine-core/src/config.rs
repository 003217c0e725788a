use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub media: MediaConfig,
    pub transcode: TranscodeConfig,
    pub dlna: DlnaConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// Address LAN clients use to reach this instance. Advertised in SSDP
    /// LOCATION headers and DLNA stream URLs. If empty, the bound address
    /// is used.
    pub advertise_host: String,
    /// Enable the `/metrics` Prometheus endpoint.
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            advertise_host: String::new(),
            metrics_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    pub level: String,
    /// "json" for production, anything else for pretty output
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Library roots. The first path is also the disk the metrics
    /// collector samples for free-space alerts.
    pub library_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Root under which each session gets its own output directory.
    pub output_dir: PathBuf,
    pub segment_seconds: u32,
    /// A session untouched for this long is torn down by the sweep.
    pub session_ttl_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            output_dir: std::env::temp_dir().join("bobine-transcode"),
            segment_seconds: 6,
            session_ttl_seconds: 180,
            cleanup_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DlnaConfig {
    pub enabled: bool,
    pub friendly_name: String,
}

impl Default for DlnaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            friendly_name: "Bobine".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub collect_interval_seconds: u64,
    pub alert_interval_seconds: u64,
    pub retention_days: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            collect_interval_seconds: 60,
            alert_interval_seconds: 300,
            retention_days: 30,
        }
    }
}

impl Config {
    /// Load configuration from a file with environment variable overrides
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let settings = ConfigBuilder::builder()
            .add_source(File::from(Path::new(path)))
            .add_source(Environment::with_prefix("BOBINE").separator("__"))
            .build()?;
        settings.try_deserialize()
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = ConfigBuilder::builder()
            .add_source(Environment::with_prefix("BOBINE").separator("__"))
            .build()?;
        settings.try_deserialize()
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Address advertised to LAN clients (SSDP LOCATION, DLNA `<res>` URLs).
    #[must_use]
    pub fn advertise_address(&self) -> String {
        if self.server.advertise_host.is_empty() {
            self.http_address()
        } else {
            format!("{}:{}", self.server.advertise_host, self.server.http_port)
        }
    }

    /// Validate configuration, collecting every violation before failing.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.transcode.segment_seconds == 0 {
            errors.push("transcode.segment_seconds must be non-zero".to_string());
        }
        if self.transcode.session_ttl_seconds == 0 {
            errors.push("transcode.session_ttl_seconds must be non-zero".to_string());
        }
        if self.transcode.cleanup_interval_seconds == 0 {
            errors.push("transcode.cleanup_interval_seconds must be non-zero".to_string());
        }
        if self.monitor.collect_interval_seconds == 0 {
            errors.push("monitor.collect_interval_seconds must be non-zero".to_string());
        }
        if self.monitor.retention_days <= 0 {
            errors.push("monitor.retention_days must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Load configuration from config file or environment variables
///
/// Config file search order:
/// 1. `BOBINE_CONFIG_PATH` environment variable (explicit path)
/// 2. ./config.yaml (current working directory)
/// 3. Fall back to environment variables only
pub fn load_config() -> anyhow::Result<Config> {
    let config_path = std::env::var("BOBINE_CONFIG_PATH")
        .ok()
        .filter(|p| Path::new(p).exists())
        .or_else(|| {
            let cwd = "config.yaml";
            Path::new(cwd).exists().then(|| cwd.to_string())
        });

    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        match Config::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                eprintln!("Falling back to environment variables");
                Config::from_env().unwrap_or_default()
            }
        }
    } else {
        Config::from_env().unwrap_or_default()
    };

    if let Err(errors) = config.validate() {
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}
