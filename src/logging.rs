//! Stderr logger behind the `log` facade.

use log::{LevelFilter, Log, Metadata, Record};

/// Environment variable that overrides the `-v` level (`off`, `error`, ..., `trace`).
pub const LOG_ENV: &str = "MDCORPUS_LOG";

/// Writes `level target: message` lines to stderr for this crate's records.
struct StderrLogger {
    /// Most verbose level printed.
    level: LevelFilter,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        return metadata.level() <= self.level && metadata.target().starts_with(env!("CARGO_CRATE_NAME"));
    }

    fn flush(&self) {}

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = record.level().as_str().to_lowercase();
        eprintln!("{level:>5} {}: {}", record.target(), record.args());
    }
}

/// Install the logger. `MDCORPUS_LOG` wins over the `-v` count when it parses.
/// Calling twice keeps the first logger.
pub fn init(verbosity: u8) {
    let level = resolve_level(std::env::var(LOG_ENV).ok().as_deref(), verbosity);
    if log::set_boxed_logger(Box::new(StderrLogger { level })).is_ok() {
        log::set_max_level(level);
    }
}

/// Level from an optional environment value, falling back to the `-v` count.
fn resolve_level(env_value: Option<&str>, verbosity: u8) -> LevelFilter {
    if let Some(level) = env_value.and_then(|v| return v.trim().parse::<LevelFilter>().ok()) {
        return level;
    }
    return match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(resolve_level(None, 0), LevelFilter::Warn);
        assert_eq!(resolve_level(None, 1), LevelFilter::Info);
        assert_eq!(resolve_level(None, 2), LevelFilter::Debug);
        assert_eq!(resolve_level(None, 7), LevelFilter::Trace);
    }

    #[test]
    fn environment_overrides_verbosity() {
        assert_eq!(resolve_level(Some("debug"), 0), LevelFilter::Debug);
        assert_eq!(resolve_level(Some("OFF"), 3), LevelFilter::Off);
    }

    #[test]
    fn unparseable_environment_is_ignored() {
        assert_eq!(resolve_level(Some("loud"), 1), LevelFilter::Info);
    }
}
