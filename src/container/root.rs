use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::activation::Injectable;
use super::resolver::Resolver;
use super::scope::{ContainerShared, LifetimeScope};
use super::stats::ContainerStats;
use crate::errors::BoxError;

/// 构建完成的容器，即根生命周期作用域
///
/// 克隆得到的是同一个容器的句柄。容器注册了自身，可以被注入到任何构造函数中。
#[derive(Clone)]
pub struct Container {
    root: LifetimeScope,
}

impl Container {
    pub(crate) fn new(shared: ContainerShared) -> Self {
        Self {
            root: LifetimeScope::new_root(Arc::new(shared)),
        }
    }

    pub(crate) fn from_root(root: LifetimeScope) -> Self {
        Self { root }
    }

    /// 根作用域
    pub fn root(&self) -> &LifetimeScope {
        &self.root
    }

    pub fn stats(&self) -> ContainerStats {
        let shared = self.root.shared();
        shared.stats.snapshot(shared.table.len())
    }

    /// 已注册的服务名，按字母排序
    pub fn registered_services(&self) -> Vec<&'static str> {
        self.root.table().service_names()
    }

    /// 两个句柄是否指向同一个容器
    pub fn same_as(&self, other: &Container) -> bool {
        self.root.ptr_eq(&other.root)
    }
}

impl Deref for Container {
    type Target = LifetimeScope;

    fn deref(&self) -> &LifetimeScope {
        &self.root
    }
}

impl Injectable for Container {
    fn construct(resolver: &mut Resolver) -> Result<Self, BoxError> {
        Ok(resolver.scope().container())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.root.id())
            .field("services", &self.root.table().len())
            .field("disposed", &self.root.is_disposed())
            .finish()
    }
}
