//! Configuration loading, CLI overrides and validation.
//!
//! Precedence is CLI (if provided) > config file > defaults. Config files may
//! be YAML, JSON or TOML, chosen by extension.

use anyhow::{bail, Context};
use herakles_proc_top::{ProcFs, ProcessOrder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::cli::{Args, ConfigFormat};

// Default configuration constants
pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const DEFAULT_PASSWD_PATH: &str = "/etc/passwd";
pub const DEFAULT_OS_RELEASE_PATH: &str = "/etc/os-release";
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_INPUT_SLICE_MS: u64 = 250;
pub const DEFAULT_ROWS: usize = 10;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/herakles/proc-top.yaml",
    "/etc/herakles/proc-top.yml",
    "/etc/herakles/proc-top.json",
    "/etc/herakles/proc-top.toml",
    "./herakles-proc-top.yaml",
    "./herakles-proc-top.yml",
    "./herakles-proc-top.json",
    "./herakles-proc-top.toml",
];

/// Effective configuration of the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Data sources
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    #[serde(alias = "passwd-path")]
    pub passwd_path: Option<PathBuf>,
    #[serde(alias = "os-release-path")]
    pub os_release_path: Option<PathBuf>,

    // Refresh loop
    #[serde(alias = "refresh-interval-ms")]
    pub refresh_interval_ms: Option<u64>,
    #[serde(alias = "input-slice-ms")]
    pub input_slice_ms: Option<u64>,

    // Display
    pub rows: Option<usize>,
    /// "cpu-asc" | "cpu-desc" | "mem-asc" | "mem-desc"
    #[serde(alias = "sort-order")]
    pub sort_order: Option<String>,

    // Performance tuning
    #[serde(alias = "parallel-refresh")]
    pub parallel_refresh: Option<bool>,
    pub parallelism: Option<usize>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
    #[serde(alias = "enable-file-logging")]
    pub enable_file_logging: Option<bool>,
    #[serde(alias = "log-file")]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            passwd_path: Some(PathBuf::from(DEFAULT_PASSWD_PATH)),
            os_release_path: Some(PathBuf::from(DEFAULT_OS_RELEASE_PATH)),
            refresh_interval_ms: Some(DEFAULT_REFRESH_INTERVAL_MS),
            input_slice_ms: Some(DEFAULT_INPUT_SLICE_MS),
            rows: Some(DEFAULT_ROWS),
            sort_order: Some(ProcessOrder::default().to_string()),
            parallel_refresh: Some(false),
            parallelism: None,
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
            enable_file_logging: Some(false),
            log_file: None,
        }
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(
            self.refresh_interval_ms
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_MS),
        )
    }

    pub fn input_slice(&self) -> Duration {
        Duration::from_millis(self.input_slice_ms.unwrap_or(DEFAULT_INPUT_SLICE_MS))
    }

    pub fn rows(&self) -> usize {
        self.rows.unwrap_or(DEFAULT_ROWS)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Log file, if file logging is enabled.
    pub fn log_file(&self) -> Option<&Path> {
        if self.enable_file_logging.unwrap_or(false) {
            self.log_file.as_deref()
        } else {
            None
        }
    }

    pub fn sort_order(&self) -> anyhow::Result<ProcessOrder> {
        match self.sort_order.as_deref() {
            Some(order) => order.parse::<ProcessOrder>().map_err(anyhow::Error::msg),
            None => Ok(ProcessOrder::default()),
        }
    }

    /// Builds the /proc reader for the configured paths.
    pub fn proc_fs(&self) -> ProcFs {
        ProcFs::new(
            self.proc_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT)),
            self.passwd_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PASSWD_PATH)),
            self.os_release_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OS_RELEASE_PATH)),
        )
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> anyhow::Result<()> {
    let interval = cfg
        .refresh_interval_ms
        .unwrap_or(DEFAULT_REFRESH_INTERVAL_MS);
    if interval == 0 {
        bail!("refresh_interval_ms must be greater than 0");
    }

    let slice = cfg.input_slice_ms.unwrap_or(DEFAULT_INPUT_SLICE_MS);
    if slice == 0 || slice > interval {
        bail!(
            "input_slice_ms must be between 1 and refresh_interval_ms ({}), got {}",
            interval,
            slice
        );
    }

    if cfg.rows() == 0 {
        bail!("rows must be at least 1");
    }

    cfg.sort_order()?;

    match cfg.log_level() {
        "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
        other => bail!(
            "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
            other
        ),
    }

    if cfg.enable_file_logging.unwrap_or(false) && cfg.log_file.is_none() {
        bail!("enable_file_logging is set, but no log_file defined");
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults
pub fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(interval) = args.interval_ms {
        config.refresh_interval_ms = Some(interval);
        // keep the slice inside a shortened interval
        if let Some(slice) = config.input_slice_ms {
            config.input_slice_ms = Some(slice.min(interval));
        }
    }
    if let Some(rows) = args.rows {
        config.rows = Some(rows);
    }
    if let Some(sort) = &args.sort {
        config.sort_order = Some(sort.clone());
    }
    if args.parallel {
        config.parallel_refresh = Some(true);
    }
    if args.parallelism.is_some() {
        config.parallelism = args.parallelism;
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }
    if let Some(file) = &args.log_file {
        config.log_file = Some(file.clone());
        config.enable_file_logging = Some(true);
    }

    Ok(config)
}

/// Loads a config file, or the first existing default location, or defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                bail!("Config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
        {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = parse_config(&content, &path)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config content in the format implied by the file extension.
pub fn parse_config(content: &str, path: &Path) -> anyhow::Result<Config> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)
            .with_context(|| format!("Invalid JSON configuration in {}", path.display()))?,
        Some("toml") => toml::from_str(content)
            .with_context(|| format!("Invalid TOML configuration in {}", path.display()))?,
        _ => serde_yaml::from_str(content)
            .with_context(|| format!("Invalid YAML configuration in {}", path.display()))?,
    };
    Ok(config)
}

/// Renders configuration in the requested format
pub fn render_config(config: &Config, format: ConfigFormat) -> anyhow::Result<String> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> anyhow::Result<()> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

/// Adds comments to YAML configuration
pub fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Proc Top Configuration
# ================================
#
# Data Sources
# ------------
# proc_root: "/proc"               # Root of the proc filesystem
# passwd_path: "/etc/passwd"       # User database for uid -> name lookups
# os_release_path: "/etc/os-release"
#
# Refresh Loop
# ------------
# refresh_interval_ms: 1000        # Time between refresh cycles
# input_slice_ms: 250              # Key polling slice within one interval
#
# Display
# -------
# rows: 10                         # Process rows shown (adjust with +/-)
# sort_order: "cpu-desc"           # cpu-asc, cpu-desc, mem-asc, mem-desc
#
# Performance Tuning
# ------------------
# parallel_refresh: false          # Refresh processes on a thread pool
# parallelism: null                # Pool threads (null = auto)
#
# Logging
# -------
# log_level: "warn"                # off, error, warn, info, debug, trace
# enable_file_logging: false       # Dashboard logs are discarded unless enabled
# log_file: null                   # Log file path
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["herakles-proc-top", "--no-config"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            Config {
                refresh_interval_ms: Some(0),
                ..Config::default()
            },
            Config {
                input_slice_ms: Some(5000),
                ..Config::default()
            },
            Config {
                rows: Some(0),
                ..Config::default()
            },
            Config {
                sort_order: Some("pid".into()),
                ..Config::default()
            },
            Config {
                log_level: Some("loud".into()),
                ..Config::default()
            },
            Config {
                enable_file_logging: Some(true),
                log_file: None,
                ..Config::default()
            },
        ];
        for cfg in bad {
            assert!(validate_effective_config(&cfg).is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let cfg = resolve_config(&args(&[
            "-i",
            "100",
            "-n",
            "3",
            "--sort",
            "mem-asc",
            "--parallel",
            "--log-file",
            "/tmp/top.log",
        ]))
        .expect("config resolves");

        assert_eq!(cfg.refresh_interval_ms, Some(100));
        // slice shrinks with the interval
        assert_eq!(cfg.input_slice_ms, Some(100));
        assert_eq!(cfg.rows(), 3);
        assert_eq!(cfg.sort_order().ok(), Some(ProcessOrder::MemAsc));
        assert_eq!(cfg.parallel_refresh, Some(true));
        assert_eq!(cfg.log_file(), Some(Path::new("/tmp/top.log")));
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = parse_config("rows: 25\nsort-order: mem-desc\n", Path::new("top.yaml"))
            .expect("yaml parses");
        assert_eq!(cfg.rows(), 25);
        assert_eq!(cfg.sort_order().ok(), Some(ProcessOrder::MemDesc));
        assert_eq!(cfg.refresh_interval_ms, Some(DEFAULT_REFRESH_INTERVAL_MS));
        assert_eq!(cfg.proc_root, Some(PathBuf::from(DEFAULT_PROC_ROOT)));
    }

    #[test]
    fn test_parse_json_and_toml() {
        let json = parse_config(r#"{"refresh_interval_ms": 2000}"#, Path::new("top.json"))
            .expect("json parses");
        assert_eq!(json.refresh_interval(), Duration::from_secs(2));

        let toml = parse_config("input_slice_ms = 100\n", Path::new("top.toml"))
            .expect("toml parses");
        assert_eq!(toml.input_slice(), Duration::from_millis(100));
    }

    #[test]
    fn test_render_roundtrips_through_each_format() {
        let cfg = Config {
            rows: Some(7),
            log_file: Some(PathBuf::from("/var/log/top.log")),
            ..Config::default()
        };
        for (format, ext) in [
            (ConfigFormat::Yaml, "yaml"),
            (ConfigFormat::Json, "json"),
            (ConfigFormat::Toml, "toml"),
        ] {
            let text = render_config(&cfg, format).expect("renders");
            let parsed =
                parse_config(&text, Path::new(&format!("cfg.{ext}"))).expect("parses back");
            assert_eq!(parsed, cfg, "format {ext}");
        }
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("tempfile");
        writeln!(file, "rows: 4\nrefresh_interval_ms: 500").expect("write");

        let cfg = load_config(Some(file.path())).expect("loads");
        assert_eq!(cfg.rows(), 4);
        assert_eq!(cfg.refresh_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_load_config_missing_explicit_path_fails() {
        assert!(load_config(Some(Path::new("/nonexistent/herakles-proc-top.yaml"))).is_err());
    }

    #[test]
    fn test_commented_yaml_still_parses() {
        let yaml = serde_yaml::to_string(&Config::default()).expect("yaml");
        let commented = add_config_comments(yaml);
        let cfg = parse_config(&commented, Path::new("c.yaml")).expect("parses");
        assert_eq!(cfg, Config::default());
    }
}
