//! 依赖注入容器
//!
//! 注册 → 构建 → 在生命周期作用域中解析 → 释放作用域。
//! 单例在根作用域中构造并缓存，作用域实例在每个作用域中各缓存一份，瞬态实例每次新建。

pub mod activation;
pub mod builder;
pub mod owned;
pub mod provider;
pub mod registration;
pub mod resolver;
pub mod root;
pub mod scope;
pub mod stats;

pub use activation::{Dependency, Implements, Injectable, Resolvable};
pub use builder::{ContainerBuilder, RegistrationBuilder};
pub use owned::Owned;
pub use provider::ServiceProvider;
pub use registration::{Instance, Lifetime, TypeKey};
pub use resolver::Resolver;
pub use root::Container;
pub use scope::{Dispose, LifetimeScope, ScopeInfo, ScopeState};
pub use stats::ContainerStats;
