use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;

use crate::domain::mec_system_model::utils::statistics::ANALYTICS_TARGET;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "scheduler.log";

/// Initializes the global logger.
///
/// Call once at the start of `main`. The level is read from `RUST_LOG`
/// (e.g. `RUST_LOG=debug`) and defaults to `info`. Output goes to stderr
/// (colored) and to `logs/scheduler.log`.
pub fn init() {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("Failed to create log directory at '{}': {}", LOG_DIR, e);
    }

    let log_file_path = format!("{}/{}", LOG_DIR, LOG_FILE);

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let log_level_filter = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

    let base_config = Dispatch::new()
        .level(log_level_filter)
        .level_for("serde", LevelFilter::Warn)
        .level_for("minilp", LevelFilter::Warn)
        // analytics events are routed by init_analytics, keep them out of the text log
        .filter(|metadata| metadata.target() != ANALYTICS_TARGET);

    let console_config = Dispatch::new()
        .format(|out, message, record| {
            let colors = fern::colors::ColoredLevelConfig::new()
                .error(fern::colors::Color::Red)
                .warn(fern::colors::Color::Yellow)
                .info(fern::colors::Color::Green)
                .debug(fern::colors::Color::Blue)
                .trace(fern::colors::Color::BrightBlack);

            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = base_config.chain(console_config);

    match fern::log_file(&log_file_path) {
        Ok(file) => {
            let file_config = Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "[{} {} {}] {}",
                        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(file);
            dispatch = dispatch.chain(file_config);
        }
        Err(e) => eprintln!("Failed to open log file '{}': {}", log_file_path, e),
    }

    dispatch.apply().unwrap_or_else(|e| {
        eprintln!("Failed to apply logger configuration: {}", e);
    });

    log::info!("Logger initialized. Logging to console and '{}'.", log_file_path);
}

/// Installs a tracing subscriber that writes the structured analytics events
/// (cycle and grant records) to `<dir>/<file_name>`.
///
/// The returned guard flushes the non-blocking writer when dropped, so keep it
/// alive for the lifetime of the run.
pub fn init_analytics(dir: &str, file_name: &str) -> Option<WorkerGuard> {
    if let Err(e) = fs::create_dir_all(dir) {
        eprintln!("Failed to create analytics directory at '{}': {}", dir, e);
        return None;
    }

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false).with_target(false);
    let filter = Targets::new().with_target(ANALYTICS_TARGET, tracing::Level::INFO);

    // set_global_default leaves the `log` facade to fern
    let subscriber = tracing_subscriber::registry().with(layer.with_filter(filter));
    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => Some(guard),
        Err(e) => {
            log::warn!("Analytics subscriber not installed: {}", e);
            None
        }
    }
}
