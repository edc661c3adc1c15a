//! 日志
//!
//! 两部分：进程级的 tracing 订阅器初始化（[`init_logging`]），
//! 以及容器内可注入的 [`Logger`] 抽象。解析失败通过容器中注册的 `dyn Logger` 报告，
//! 默认实现 [`ConsoleLogger`] 把消息转发给 tracing。

use std::error::Error;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSection;
use crate::errors::ConfigError;

/// 日志环境配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoggingEnvironment {
    #[default]
    Development,
    Testing,
    Production,
}

/// 日志格式配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 人类可读格式
    #[default]
    Pretty,
    /// 紧凑格式
    Compact,
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub environment: LoggingEnvironment,
    /// 日志级别，`RUST_LOG` 存在时以它为准
    pub level: Level,
    pub format: LogFormat,
    /// 是否显示目标模块
    pub show_target: bool,
    pub show_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            level: Level::INFO,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// 开发环境：输出容器的 debug 事件（作用域创建与释放、注册覆盖）
    pub fn development() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: true,
        }
    }

    pub fn production() -> Self {
        Self {
            environment: LoggingEnvironment::Production,
            level: Level::INFO,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
        }
    }

    /// 测试环境：只输出错误
    pub fn testing() -> Self {
        Self {
            environment: LoggingEnvironment::Testing,
            level: Level::ERROR,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
        }
    }

    /// 从配置文件的 `[logging]` 段创建
    pub fn from_section(section: &LoggingSection) -> Result<Self, ConfigError> {
        let level = section
            .level
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: section.level.clone(),
            })?;

        Ok(Self {
            environment: section.environment,
            level,
            format: section.format,
            show_target: section.show_target,
            ..Self::default()
        })
    }
}

/// 初始化全局日志订阅器
///
/// 已有全局订阅器时返回错误（例如在测试中重复初始化）。
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));
    let ansi = config.environment != LoggingEnvironment::Production;

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);

            tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);

            tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
        }
    }

    tracing::info!(
        environment = ?config.environment,
        level = %config.level,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}

/// 容器使用的日志抽象
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    /// 记录带错误的消息，默认附带完整的错误来源链
    fn exception(&self, message: &str, error: &(dyn Error + 'static)) {
        let mut text = format!("{message} {error}");
        let mut source = error.source();
        while let Some(cause) = source {
            text.push_str(&format!(" (caused by: {cause})"));
            source = cause.source();
        }
        self.log(Level::ERROR, &text);
    }
}

crate::interface!(dyn Logger);

/// 默认日志实现，写入 tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "lifescope", "{}", message),
            Level::WARN => tracing::warn!(target: "lifescope", "{}", message),
            Level::INFO => tracing::info!(target: "lifescope", "{}", message),
            Level::DEBUG => tracing::debug!(target: "lifescope", "{}", message),
            _ => tracing::trace!(target: "lifescope", "{}", message),
        }
    }

    fn exception(&self, message: &str, error: &(dyn Error + 'static)) {
        tracing::error!(target: "lifescope", error = %error, "{}", message);
    }
}

crate::injectable!(ConsoleLogger);
crate::implements!(ConsoleLogger => dyn Logger);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        lines: Mutex<Vec<(Level, String)>>,
    }

    impl Logger for Recording {
        fn log(&self, level: Level, message: &str) {
            self.lines.lock().push((level, message.to_string()));
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_logging_config_presets() {
        let dev = LoggingConfig::development();
        assert_eq!(dev.environment, LoggingEnvironment::Development);
        assert_eq!(dev.level, Level::DEBUG);

        let prod = LoggingConfig::production();
        assert_eq!(prod.format, LogFormat::Compact);
        assert!(!prod.show_target);

        let test = LoggingConfig::testing();
        assert_eq!(test.level, Level::ERROR);
    }

    #[test]
    fn test_from_section_parses_level() {
        let section = LoggingSection {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            show_target: false,
            ..LoggingSection::default()
        };
        let config = LoggingConfig::from_section(&section).unwrap();
        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.environment, LoggingEnvironment::Development);
    }

    #[test]
    fn test_from_section_keeps_production_environment() {
        let section: LoggingSection =
            toml::from_str("environment = \"production\"\nformat = \"compact\"").unwrap();
        let config = LoggingConfig::from_section(&section).unwrap();

        assert_eq!(config.environment, LoggingEnvironment::Production);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.level, Level::INFO);
    }

    #[test]
    fn test_from_section_rejects_unknown_level() {
        let section = LoggingSection {
            level: "loud".to_string(),
            ..LoggingSection::default()
        };
        assert!(matches!(
            LoggingConfig::from_section(&section),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_default_exception_includes_source_chain() {
        let logger = Recording::default();
        let err = Outer(std::io::Error::new(std::io::ErrorKind::NotFound, "missing file"));

        logger.exception("Failed to construct instance of type 'Repo'.", &err);

        let lines = logger.lines.lock();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Level::ERROR);
        assert_eq!(
            lines[0].1,
            "Failed to construct instance of type 'Repo'. outer (caused by: missing file)"
        );
    }

    #[test]
    fn test_console_logger_accepts_all_levels() {
        let logger = ConsoleLogger;
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            logger.log(level, "message");
        }
    }
}
