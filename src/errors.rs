use thiserror::Error;
use uuid::Uuid;

/// 工厂与构造函数可返回的任意错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 解析错误
#[derive(Debug, Error)]
pub enum ResolveError {
    /// 请求的抽象类型没有任何注册，且无法直接构造
    #[error("Expected a constructible type, received abstraction '{type_name}' with no registration")]
    UnregisteredInterface { type_name: &'static str },

    /// 构造函数或工厂失败
    #[error("Failed to construct instance of type '{type_name}'")]
    Construction {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    /// `resolve_required_service` 找不到注册
    #[error("No service for type '{type_name}' has been registered")]
    UnregisteredService { type_name: &'static str },

    /// 作用域已释放
    #[error("Lifetime scope {scope_id} has been disposed")]
    DisposedScope { scope_id: Uuid },

    /// 构造链中出现环
    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CyclicDependency { chain: Vec<&'static str> },

    /// 注册表中的实例与请求类型不匹配
    #[error("Type cast failed: expected '{expected}', registration produced '{registered}'")]
    TypeCastFailed {
        expected: &'static str,
        registered: &'static str,
    },
}

impl ResolveError {
    /// 沿着 `Construction` 包装链找到最内层的解析错误
    pub fn root_cause(&self) -> &ResolveError {
        let mut current = self;
        while let ResolveError::Construction { source, .. } = current {
            match source.downcast_ref::<ResolveError>() {
                Some(inner) => current = inner,
                None => break,
            }
        }
        current
    }

    /// 失败类型名（如果有）
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            ResolveError::UnregisteredInterface { type_name }
            | ResolveError::Construction { type_name, .. }
            | ResolveError::UnregisteredService { type_name } => Some(type_name),
            ResolveError::TypeCastFailed { expected, .. } => Some(expected),
            ResolveError::DisposedScope { .. } | ResolveError::CyclicDependency { .. } => None,
        }
    }
}

/// 容器构建错误
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Registration of '{type_name}' was never finalized with as_self() or as_service()")]
    IncompleteRegistration { type_name: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}
