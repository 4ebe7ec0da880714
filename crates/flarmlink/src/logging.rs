use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Crates whose events follow `--log-level`; everything else stays at warn or quieter.
const LINK_TARGETS: [&str; 4] = [
    "flarmlink",
    "flarmlink_transport",
    "flarmlink_frame",
    "flarmlink_device",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        let level = match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        };
        LevelFilter::from_level(level)
    }
}

fn link_filter(level: LogLevel) -> Targets {
    let link = LevelFilter::from(level);
    LINK_TARGETS
        .iter()
        .fold(Targets::new().with_default(link.min(LevelFilter::WARN)), |targets, name| {
            targets.with_target(*name, link)
        })
}

/// Route protocol events to stderr so stdout carries only command output.
///
/// Event targets are printed once the level reaches debug, where frames from
/// the transport, framing and device layers interleave.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let show_targets = LevelFilter::from(level) >= LevelFilter::DEBUG;
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(show_targets);

    let layer = match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(layer.with_filter(link_filter(level)))
        .try_init();
    if let Err(err) = installed {
        eprintln!("warning: logging not initialised: {err}");
    }
}
