//! 解析引擎
//!
//! 一次顶层解析对应一个 [`Resolver`]。它记录当前作用域和正在构造的类型链，
//! 构造函数通过它递归解析自己的依赖。

use std::any::type_name;
use std::sync::Arc;

use tracing::{error, trace};

use super::activation::{construct_erased, injectable_disposer, Injectable, Resolvable};
use super::owned::Owned;
use super::registration::{Activator, Binding, Instance, Lifetime, Registration, TypeKey};
use super::scope::LifetimeScope;
use crate::errors::{BoxError, ResolveError};
use crate::logging::Logger;

/// 解析上下文
pub struct Resolver {
    scope: LifetimeScope,
    chain: Vec<TypeKey>,
    reporting: bool,
}

impl Resolver {
    pub(crate) fn new(scope: LifetimeScope) -> Self {
        Self {
            scope,
            chain: Vec::new(),
            reporting: false,
        }
    }

    /// 当前解析所在的作用域
    pub fn scope(&self) -> &LifetimeScope {
        &self.scope
    }

    /// 正在构造的类型链，最外层在前
    pub fn chain(&self) -> &[TypeKey] {
        &self.chain
    }

    /// 解析服务
    ///
    /// 已注册的服务按注册的生命周期解析；未注册的具体类型按瞬态构造；
    /// 未注册的抽象返回 [`ResolveError::UnregisteredInterface`]。
    pub fn resolve<T: Resolvable + ?Sized>(&mut self) -> Result<Arc<T>, ResolveError> {
        self.scope.ensure_active()?;

        let key = TypeKey::of::<T>();
        self.scope.stats().record_resolution();
        if self.scope.shared().trace_resolutions {
            trace!(
                service = key.name(),
                scope = %self.scope.id(),
                depth = self.chain.len(),
                "Resolving service"
            );
        }

        let binding = self.scope.table().get(&key).cloned();
        match binding {
            Some(binding) => {
                let instance = self.resolve_binding(&binding)?;
                downcast_service::<T>(&binding, instance)
            }
            None => T::resolve_unregistered(self),
        }
    }

    /// 在新的独立作用域中解析服务，返回由调用方持有的 [`Owned`]
    pub fn resolve_owned<T: Resolvable + ?Sized>(&mut self) -> Result<Owned<T>, ResolveError> {
        let owner = self.scope.begin_detached_scope()?;
        match self.within(owner.clone(), |resolver| resolver.resolve::<T>()) {
            Ok(value) => Ok(Owned::new(value, owner)),
            Err(err) => {
                owner.dispose();
                Err(err)
            }
        }
    }

    /// 仅在已注册时解析，未注册返回 `Ok(None)`
    pub fn resolve_service<T: Resolvable + ?Sized>(&mut self) -> Result<Option<Arc<T>>, ResolveError> {
        self.scope.ensure_active()?;
        if !self.scope.is_registered::<T>() {
            return Ok(None);
        }
        self.resolve::<T>().map(Some)
    }

    /// 未注册时返回 [`ResolveError::UnregisteredService`]
    pub fn resolve_required_service<T: Resolvable + ?Sized>(&mut self) -> Result<Arc<T>, ResolveError> {
        self.resolve_service::<T>()?
            .ok_or(ResolveError::UnregisteredService {
                type_name: type_name::<T>(),
            })
    }

    /// 直接构造未注册的具体类型，实例归当前作用域
    pub(crate) fn construct_unregistered<C: Injectable>(&mut self) -> Result<Arc<C>, ResolveError> {
        let target = TypeKey::of::<C>();
        let instance = self.activate(target, construct_erased::<C>)?;
        if let Some(disposable) = injectable_disposer::<C>(&instance) {
            self.scope.track(disposable)?;
        }

        instance
            .downcast::<C>()
            .map_err(|_| ResolveError::TypeCastFailed {
                expected: type_name::<C>(),
                registered: target.name(),
            })
    }

    fn resolve_binding(&mut self, binding: &Binding) -> Result<Instance, ResolveError> {
        let registration = &binding.registration;

        // 根容器每次返回新的句柄，不进入缓存
        if let Activator::Root = registration.activator {
            return Ok(Arc::new(self.scope.container()));
        }

        match registration.lifetime {
            Lifetime::Transient => self.construct(registration),
            Lifetime::Scoped => self.resolve_scoped(registration),
            Lifetime::Singleton => self.resolve_singleton(registration),
        }
    }

    fn resolve_singleton(&mut self, registration: &Registration) -> Result<Instance, ResolveError> {
        // 单例缓存在根作用域中，根作用域释放后不再提供
        let root = self.scope.root_scope();
        root.ensure_active()?;
        if let Some(instance) = root.cached(registration.id) {
            root.stats().record_singleton_hit();
            return Ok(instance);
        }

        // 单例及其依赖都在根作用域中构造，由根作用域负责释放
        self.within(root, |resolver| {
            let _guard = registration.construction_lock.lock();
            if let Some(instance) = resolver.scope.cached(registration.id) {
                resolver.scope.stats().record_singleton_hit();
                return Ok(instance);
            }

            let instance = resolver.construct(registration)?;
            resolver.scope.cache(registration.id, instance.clone())?;
            Ok(instance)
        })
    }

    fn resolve_scoped(&mut self, registration: &Registration) -> Result<Instance, ResolveError> {
        if let Some(instance) = self.scope.cached(registration.id) {
            self.scope.stats().record_scoped_hit();
            return Ok(instance);
        }

        let _guard = registration.construction_lock.lock();
        if let Some(instance) = self.scope.cached(registration.id) {
            self.scope.stats().record_scoped_hit();
            return Ok(instance);
        }

        let instance = self.construct(registration)?;
        self.scope.cache(registration.id, instance.clone())?;
        Ok(instance)
    }

    fn construct(&mut self, registration: &Registration) -> Result<Instance, ResolveError> {
        let activator = match &registration.activator {
            Activator::Constructor(activator) | Activator::Factory(activator) => activator.clone(),
            Activator::Instance(instance) => return Ok(instance.clone()),
            Activator::Root => return Ok(Arc::new(self.scope.container())),
        };

        let instance = self.activate(registration.target, |resolver| (*activator)(resolver))?;
        if let Some(disposable) = registration.disposable_of(&instance) {
            self.scope.track(disposable)?;
        }
        Ok(instance)
    }

    /// 运行一次构造：检测依赖环，失败时报告并包装错误
    fn activate<F>(&mut self, target: TypeKey, activator: F) -> Result<Instance, ResolveError>
    where
        F: FnOnce(&mut Resolver) -> Result<Instance, BoxError>,
    {
        self.enter(target)?;
        let outcome = activator(self);
        self.chain.pop();

        match outcome {
            Ok(instance) => {
                self.scope.stats().record_construction();
                Ok(instance)
            }
            Err(cause) => Err(self.construction_failed(target, cause)),
        }
    }

    fn enter(&mut self, target: TypeKey) -> Result<(), ResolveError> {
        if self.chain.contains(&target) {
            let mut chain: Vec<_> = self.chain.iter().map(TypeKey::name).collect();
            chain.push(target.name());
            return Err(ResolveError::CyclicDependency { chain });
        }
        self.chain.push(target);
        Ok(())
    }

    fn within<R>(&mut self, scope: LifetimeScope, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = previous;
        result
    }

    /// 只有最内层的失败会被报告，外层只做包装
    fn construction_failed(&mut self, target: TypeKey, cause: BoxError) -> ResolveError {
        let nested = matches!(
            cause.downcast_ref::<ResolveError>(),
            Some(ResolveError::Construction { .. })
        );

        if !nested {
            let message = format!("Failed to construct instance of type '{}'.", target.name());
            self.report(&message, cause.as_ref());
        }

        ResolveError::Construction {
            type_name: target.name(),
            source: cause,
        }
    }

    fn report(&mut self, message: &str, err: &(dyn std::error::Error + 'static)) {
        if !self.reporting {
            self.reporting = true;
            let logger = self.resolve::<dyn Logger>();
            self.reporting = false;

            if let Ok(logger) = logger {
                logger.exception(message, err);
                return;
            }
        }

        error!(error = %err, "{}", message);
    }
}

fn downcast_service<T: ?Sized + 'static>(binding: &Binding, instance: Instance) -> Result<Arc<T>, ResolveError> {
    (binding.upcast)(instance)
        .and_then(|boxed| boxed.downcast::<Arc<T>>().ok())
        .map(|service| *service)
        .ok_or(ResolveError::TypeCastFailed {
            expected: type_name::<T>(),
            registered: binding.registration.target.name(),
        })
}
