use std::io::Write;

use env_logger::{Builder, Env};

use crate::common::Result;
use crate::config::AppConfig;

/// Install the global logger. `filter` follows the `RUST_LOG` syntax and is
/// overridden by the `RUST_LOG` environment variable when that is set.
pub fn init_logger(filter: &str) -> Result<()> {
    build_logger(filter, false).try_init()?;
    Ok(())
}

/// Install the global logger with the `log_level` of the `[app]` section.
pub fn init_app_logger(app: &AppConfig) -> Result<()> {
    init_logger(app.get_log_level())
}

/// Logger for unit tests: output captured by the test harness, repeated calls are ignored.
pub fn init_test_logger() {
    let _ = build_logger("debug", true).try_init();
}

fn build_logger(filter: &str, is_test: bool) -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or(filter));
    builder
        .is_test(is_test)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        });
    builder
}

#[cfg(test)]
mod tests {
    use crate::config::MeshConfig;
    use crate::logging::{init_app_logger, init_test_logger};

    #[test]
    fn test_init_test_logger_twice() {
        init_test_logger();
        init_test_logger();
        log::debug!("logger installed");
    }

    #[test]
    fn test_app_logger_is_installed_once() {
        init_test_logger();
        let config = MeshConfig::from_str("[app]\nlog_level = \"debug\"").unwrap();
        let err = init_app_logger(config.get_app()).unwrap_err();
        assert!(err.to_string().contains("logger"));
    }
}
