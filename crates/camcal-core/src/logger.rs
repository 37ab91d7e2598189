//! Stderr logger for the camcal binaries.
//!
//! Lines read `[  1.234s  INFO collector] message`, with the target cut to
//! its last path segment. Records from other crates (capture backends,
//! detectors) only pass at `warn` and above unless the level is `trace`.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::{format::FmtSpan, time::Uptime};
#[cfg(feature = "tracing")]
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

fn is_camcal(target: &str) -> bool {
    target.starts_with("camcal")
}

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

impl StderrLogger {
    fn cap_for(&self, target: &str) -> LevelFilter {
        if is_camcal(target) || self.level == LevelFilter::Trace {
            self.level
        } else {
            self.level.min(LevelFilter::Warn)
        }
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.cap_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let secs = self.started.elapsed().as_secs_f64();
        let target = if is_camcal(record.target()) {
            short_target(record.target())
        } else {
            record.target()
        };
        let mut err = std::io::stderr().lock();
        let _ = writeln!(
            err,
            "[{secs:8.3}s {:>5} {target}] {}",
            record.level(),
            record.args()
        );
        if record.level() == Level::Error {
            let _ = err.flush();
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger at `level`.
///
/// Only the first call installs anything; later calls return `Ok(())`
/// and leave the level unchanged.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}

#[cfg(feature = "tracing")]
const DEFAULT_FILTER: &str = "warn,camcal=info,camcal_core=info,camcal_detect=info,camcal_solve=info";

/// Install a `tracing` fmt subscriber. `RUST_LOG` overrides the default
/// filter; `log` records are forwarded into it.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder.with_timer(Uptime::default()).finish().try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_targets_are_capped_at_warn() {
        let logger = StderrLogger {
            level: LevelFilter::Debug,
            started: Instant::now(),
        };
        assert_eq!(logger.cap_for("camcal::collector"), LevelFilter::Debug);
        assert_eq!(logger.cap_for("nokhwa::backends"), LevelFilter::Warn);

        let trace = StderrLogger {
            level: LevelFilter::Trace,
            started: Instant::now(),
        };
        assert_eq!(trace.cap_for("nokhwa::backends"), LevelFilter::Trace);
    }

    #[test]
    fn targets_are_shortened() {
        assert_eq!(short_target("camcal::pipeline"), "pipeline");
        assert_eq!(short_target("camcal_solve"), "camcal_solve");
    }

    #[test]
    fn init_errors_box_into_dyn_error() {
        fn boxed<E: std::error::Error + 'static>(e: E) -> Box<dyn std::error::Error> {
            Box::new(e)
        }
        let _ = init_with_level(LevelFilter::Warn).map_err(boxed);
    }

    #[test]
    fn repeated_init_keeps_the_first_level() {
        init_with_level(LevelFilter::Warn).expect("first init");
        init_with_level(LevelFilter::Trace).expect("second init is ignored");
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
