//! 所有权转移包装
//!
//! `Owned<T>` 在一个独立的（不被父作用域跟踪的）生命周期作用域中解析 `T`，
//! 由持有者负责释放。释放 `Owned` 会释放该作用域，以及其中构造的所有可释放实例。

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::scope::{Dispose, LifetimeScope};

pub struct Owned<T: ?Sized> {
    value: Arc<T>,
    scope: LifetimeScope,
}

impl<T: ?Sized> Owned<T> {
    pub(crate) fn new(value: Arc<T>, scope: LifetimeScope) -> Self {
        Self { value, scope }
    }

    /// 被持有的实例
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    /// 持有实例的作用域
    pub fn scope(&self) -> &LifetimeScope {
        &self.scope
    }

    pub fn is_disposed(&self) -> bool {
        self.scope.is_disposed()
    }

    /// 释放实例及其依赖，可重复调用
    pub fn dispose(&self) {
        self.scope.dispose();
    }
}

impl<T: ?Sized> Deref for Owned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: ?Sized + Send + Sync> Dispose for Owned<T> {
    fn dispose(&self) {
        Owned::dispose(self);
    }
}

/// 持有者放弃所有权时释放
impl<T: ?Sized> Drop for Owned<T> {
    fn drop(&mut self) {
        self.scope.dispose();
    }
}

impl<T: ?Sized> fmt::Debug for Owned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("type", &std::any::type_name::<T>())
            .field("scope", &self.scope.id())
            .field("disposed", &self.scope.is_disposed())
            .finish()
    }
}
