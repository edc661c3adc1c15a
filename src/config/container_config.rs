use serde::{Deserialize, Serialize};

use crate::logging::{LogFormat, LoggingEnvironment};

/// 容器配置
///
/// 对应配置文件：
///
/// ```toml
/// register_defaults = true
/// trace_resolutions = false
///
/// [logging]
/// environment = "development"
/// level = "info"
/// format = "pretty"
/// show_target = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 是否注册默认服务（`dyn Logger`）
    pub register_defaults: bool,
    /// 是否为每次解析输出 trace 日志
    pub trace_resolutions: bool,
    pub logging: LoggingSection,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            register_defaults: true,
            trace_resolutions: false,
            logging: LoggingSection::default(),
        }
    }
}

/// `[logging]` 配置段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `production` 环境关闭 ANSI 颜色
    pub environment: LoggingEnvironment,
    pub level: String,
    pub format: LogFormat,
    pub show_target: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            level: "info".to_string(),
            format: LogFormat::Pretty,
            show_target: true,
        }
    }
}
