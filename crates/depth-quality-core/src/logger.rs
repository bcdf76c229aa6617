//! Stderr logger for the `log` facade, plus an optional `tracing` subscriber.
//!
//! Records from the `depth_quality*` crates are shown at the requested level;
//! everything else (image decoders, etc.) is capped at `warn`.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    EnvFilter,
};

const OWN_TARGET_PREFIX: &str = "depth_quality";

/// Filter used by [`init_tracing`] when `RUST_LOG` is unset.
#[cfg(feature = "tracing")]
pub const DEFAULT_TRACING_FILTER: &str = "warn,depth_quality=info,depth_quality_core=info,\
depth_quality_fixture=info,depth_quality_metrics=info";

struct StderrLogger {
    own: LevelFilter,
    foreign: LevelFilter,
    started: Instant,
}

impl StderrLogger {
    fn level_for(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_TARGET_PREFIX) {
            self.own
        } else {
            self.foreign
        }
    }
}

/// Last `::` segment of a module path: `depth_quality_metrics::align` -> `align`.
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{:8.3}s {:>5} {}] {}\n",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            short_target(record.target()),
            record.args()
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger.
///
/// Only the first call installs; later calls leave the existing logger and
/// level in place.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        own: level,
        foreign: level.min(LevelFilter::Warn),
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`
/// (default [`DEFAULT_TRACING_FILTER`]).
///
/// Span close events carry per-stage timings. With `json` every event is one
/// flattened JSON object per line. `log` records are not bridged here; install
/// `tracing_log::LogTracer` for that. Returns `false` if a global subscriber
/// was already set.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACING_FILTER));

    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_timer(fmt::time::Uptime::default())
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer);
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
