/// Tracing setup
///
/// Logs are written to:
/// - macOS: ~/Library/Application Support/CameraCalibrator/logs/
/// - Windows: %APPDATA%/CameraCalibrator/logs/
/// - Linux: ~/.config/CameraCalibrator/logs/
///
/// Log rotation:
/// - Daily rotation (new file each day)
/// - Files named: camera-calibrator.log.YYYY-MM-DD
///
/// Log output:
/// - Debug builds: Console + File
/// - Release builds: File only
use std::path::{Path, PathBuf};

use sysinfo::System;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_TARGET_STARTUP: &str = "camera_calibrator::startup";

const LOG_FILE_NAME: &str = "camera-calibrator.log";

/// Platform log directory, `./logs` when there is no config dir
pub fn default_log_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("CameraCalibrator").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the global subscriber
///
/// Returns false when a subscriber was already installed; the existing one
/// stays in place.
pub fn initialize_tracing(log_dir: &Path) -> bool {
    // Create log directory if it doesn't exist
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(log_dir, LOG_FILE_NAME);

    // Configure filter (info level by default)
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    let installed = {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .try_init()
            .is_ok()
    };

    #[cfg(not(debug_assertions))]
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Log directory: {}", log_dir.display());
    }
    installed
}

/// Log version, OS and architecture once at startup
pub fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting camera calibrator v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
}
