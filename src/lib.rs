pub mod config;
pub mod container;
pub mod errors;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::{ConfigLoader, ContainerConfig};
pub use container::{
    Container, ContainerBuilder, ContainerStats, Dependency, Dispose, Implements, Injectable, Lifetime,
    LifetimeScope, Owned, RegistrationBuilder, Resolvable, Resolver, ScopeInfo, ScopeState, ServiceProvider,
    TypeKey,
};
pub use errors::{BoxError, BuildError, ConfigError, ResolveError};
pub use logging::{init_logging, ConsoleLogger, LogFormat, Logger, LoggingConfig, LoggingEnvironment};
