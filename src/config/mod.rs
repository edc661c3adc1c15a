pub mod container_config;
pub mod loader;

pub use container_config::{ContainerConfig, LoggingSection};
pub use loader::ConfigLoader;
