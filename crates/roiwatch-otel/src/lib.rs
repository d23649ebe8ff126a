//! Tracing setup shared by the roiwatch binaries.
//!
//! Console output honours `RUST_LOG` (default `info`). Setting
//! `ROIWATCH_LOG_ROLL=1` adds a rolling file that captures the feed target.

use once_cell::sync::OnceCell;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Target used for per-batch feed activity.
pub const FEED_TARGET: &str = "roiwatch.feed";

static FEED_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
struct RollSettings {
    dir: String,
    prefix: String,
    rotation: String,
}

fn roll_settings<F>(var: F) -> Option<RollSettings>
where
    F: Fn(&str) -> Option<String>,
{
    if var("ROIWATCH_LOG_ROLL").as_deref() != Some("1") {
        return None;
    }
    Some(RollSettings {
        dir: var("ROIWATCH_LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        prefix: var("ROIWATCH_LOG_PREFIX").unwrap_or_else(|| "roiwatch".into()),
        rotation: var("ROIWATCH_LOG_ROTATION")
            .unwrap_or_else(|| "daily".into())
            .to_lowercase(),
    })
}

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(fmt_layer.with_filter(filter));

    let Some(roll) = roll_settings(|key| std::env::var(key).ok()) else {
        let _ = registry.try_init();
        return;
    };
    if std::fs::create_dir_all(&roll.dir).is_err() {
        tracing::warn!(directory = %roll.dir, "failed to create feed log directory");
    }
    let writer = match roll.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&roll.dir, &roll.prefix),
        "minutely" => tracing_appender::rolling::minutely(&roll.dir, &roll.prefix),
        _ => tracing_appender::rolling::daily(&roll.dir, &roll.prefix),
    };
    let (nb, guard) = tracing_appender::non_blocking(writer);
    let _ = FEED_GUARD.set(guard);
    let targets = Targets::new().with_target(FEED_TARGET, tracing::Level::DEBUG);
    let feed_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(nb)
        .with_filter(targets);
    let _ = registry.with(feed_layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Option<RollSettings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        roll_settings(|key| vars.get(key).cloned())
    }

    #[test]
    fn rolling_file_is_opt_in() {
        assert_eq!(settings(&[]), None);
        assert_eq!(settings(&[("ROIWATCH_LOG_ROLL", "yes")]), None);
    }

    #[test]
    fn roll_settings_fill_defaults_and_normalise_rotation() {
        let roll = settings(&[
            ("ROIWATCH_LOG_ROLL", "1"),
            ("ROIWATCH_LOG_ROTATION", "Hourly"),
        ])
        .expect("enabled");
        assert_eq!(roll.dir, "logs");
        assert_eq!(roll.prefix, "roiwatch");
        assert_eq!(roll.rotation, "hourly");

        let custom = settings(&[
            ("ROIWATCH_LOG_ROLL", "1"),
            ("ROIWATCH_LOG_DIR", "/var/log/roiwatch"),
            ("ROIWATCH_LOG_PREFIX", "feed"),
        ])
        .expect("enabled");
        assert_eq!(custom.dir, "/var/log/roiwatch");
        assert_eq!(custom.prefix, "feed");
        assert_eq!(custom.rotation, "daily");
    }
}
