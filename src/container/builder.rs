//! 容器构建器
//!
//! 注册分两步：先声明组件（构造方式与生命周期），再用 `as_self` / `as_service`
//! 声明它以哪些服务类型暴露。`build` 会拒绝没有暴露任何服务的声明。

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info};

use super::activation::{construct_erased, dispose_hook, injectable_disposer, upcast_to, Implements, Injectable};
use super::registration::{
    Activator, ActivatorFn, Binding, DisposerFn, Instance, Lifetime, Registration, RegistrationTable, TypeKey,
    UpcastFn,
};
use super::resolver::Resolver;
use super::root::Container;
use super::scope::{ContainerShared, Dispose};
use crate::config::ContainerConfig;
use crate::errors::{BoxError, BuildError};
use crate::logging::{ConsoleLogger, Logger};

struct Declaration {
    target: TypeKey,
    lifetime: Lifetime,
    activator: Activator,
    disposer: Option<DisposerFn>,
    services: Vec<(TypeKey, UpcastFn)>,
}

/// 容器构建器
pub struct ContainerBuilder {
    declarations: Vec<Declaration>,
    trace_resolutions: bool,
}

impl ContainerBuilder {
    /// 创建构建器并注册默认服务（`dyn Logger` → [`ConsoleLogger`]）
    pub fn new() -> Self {
        Self::with_defaults(true)
    }

    /// 不注册任何默认服务
    pub fn without_defaults() -> Self {
        Self::with_defaults(false)
    }

    pub fn with_defaults(register_defaults: bool) -> Self {
        let mut builder = Self {
            declarations: Vec::new(),
            trace_resolutions: false,
        };
        if register_defaults {
            builder.register_singleton::<ConsoleLogger>().as_service::<dyn Logger>();
        }
        builder
    }

    /// 按配置创建构建器
    pub fn from_config(config: &ContainerConfig) -> Self {
        let mut builder = Self::with_defaults(config.register_defaults);
        builder.trace_resolutions = config.trace_resolutions;
        builder
    }

    /// 为每次解析输出 trace 级别日志
    pub fn trace_resolutions(&mut self, enabled: bool) -> &mut Self {
        self.trace_resolutions = enabled;
        self
    }

    /// 注册具体类型，生命周期取 `C::LIFETIME`
    pub fn register<C: Injectable>(&mut self) -> RegistrationBuilder<'_, C> {
        let activator: ActivatorFn = Arc::new(construct_erased::<C>);
        self.declare(
            TypeKey::of::<C>(),
            C::LIFETIME,
            Activator::Constructor(activator),
            Some(injectable_disposer::<C> as DisposerFn),
        )
    }

    pub fn register_singleton<C: Injectable>(&mut self) -> RegistrationBuilder<'_, C> {
        self.register::<C>().singleton()
    }

    pub fn register_scoped<C: Injectable>(&mut self) -> RegistrationBuilder<'_, C> {
        self.register::<C>().scoped()
    }

    /// 注册工厂，默认瞬态
    ///
    /// 工厂应通过传入的 `Resolver` 解析依赖，这样依赖环检测和作用域归属才能生效。
    /// 只由工厂提供的类型需要用 [`interface!`](crate::interface) 声明后才能解析。
    pub fn register_factory<C, E, F>(&mut self, factory: F) -> RegistrationBuilder<'_, C>
    where
        C: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn(&mut Resolver) -> Result<C, E> + Send + Sync + 'static,
    {
        let activator: ActivatorFn = Arc::new(move |resolver: &mut Resolver| {
            factory(resolver)
                .map(|component| Arc::new(component) as Instance)
                .map_err(Into::into)
        });
        self.declare(TypeKey::of::<C>(), Lifetime::Transient, Activator::Factory(activator), None)
    }

    /// 注册已有实例，容器不负责释放它
    pub fn register_instance<C: Send + Sync + 'static>(&mut self, instance: C) -> RegistrationBuilder<'_, C> {
        self.declare(
            TypeKey::of::<C>(),
            Lifetime::Singleton,
            Activator::Instance(Arc::new(instance)),
            None,
        )
    }

    /// 声明数量
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    fn declare<C>(
        &mut self,
        target: TypeKey,
        lifetime: Lifetime,
        activator: Activator,
        disposer: Option<DisposerFn>,
    ) -> RegistrationBuilder<'_, C> {
        self.declarations.push(Declaration {
            target,
            lifetime,
            activator,
            disposer,
            services: Vec::new(),
        });
        let index = self.declarations.len() - 1;

        RegistrationBuilder {
            builder: self,
            index,
            _component: PhantomData,
        }
    }

    /// 冻结注册表并创建根作用域
    ///
    /// 同一服务类型被多次注册时，后注册的生效。
    pub fn build(mut self) -> Result<Container, BuildError> {
        self.declare::<Container>(TypeKey::of::<Container>(), Lifetime::Singleton, Activator::Root, None)
            .as_self();

        let mut table = RegistrationTable::default();
        for declaration in self.declarations {
            if declaration.services.is_empty() {
                return Err(BuildError::IncompleteRegistration {
                    type_name: declaration.target.name(),
                });
            }

            let registration = Arc::new(Registration::new(
                declaration.target,
                declaration.lifetime,
                declaration.activator,
                declaration.disposer,
            ));
            debug!(registration = ?registration, services = declaration.services.len(), "Registered component");

            for (service, upcast) in declaration.services {
                let binding = Binding {
                    service,
                    registration: registration.clone(),
                    upcast,
                };
                if let Some(previous) = table.insert(binding) {
                    debug!(
                        service = service.name(),
                        replaced = previous.registration.target.name(),
                        "Service registration overridden"
                    );
                }
            }
        }

        let services = table.len();
        let container = Container::new(ContainerShared::new(table, self.trace_resolutions));
        info!(services, root = %container.id(), "Container built");
        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 单个组件的注册声明
pub struct RegistrationBuilder<'b, C> {
    builder: &'b mut ContainerBuilder,
    index: usize,
    _component: PhantomData<fn() -> C>,
}

impl<'b, C: Send + Sync + 'static> RegistrationBuilder<'b, C> {
    /// 以服务类型 `I` 暴露组件，可多次调用
    pub fn as_service<I>(mut self) -> Self
    where
        C: Implements<I>,
        I: ?Sized + Send + Sync + 'static,
    {
        self.declaration()
            .services
            .push((TypeKey::of::<I>(), upcast_to::<C, I> as UpcastFn));
        self
    }

    /// 以组件自身的类型暴露
    pub fn as_self(self) -> Self {
        self.as_service::<C>()
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.declaration().lifetime = lifetime;
        self
    }

    pub fn singleton(self) -> Self {
        self.with_lifetime(Lifetime::Singleton)
    }

    pub fn scoped(self) -> Self {
        self.with_lifetime(Lifetime::Scoped)
    }

    pub fn transient(self) -> Self {
        self.with_lifetime(Lifetime::Transient)
    }

    /// 构造出的实例由所在作用域释放
    pub fn disposable(mut self) -> Self
    where
        C: Dispose,
    {
        self.declaration().disposer = Some(dispose_hook::<C> as DisposerFn);
        self
    }

    fn declaration(&mut self) -> &mut Declaration {
        &mut self.builder.declarations[self.index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ResolveError;

    #[derive(Debug, Default)]
    struct Plain;
    crate::injectable!(Plain);

    #[test]
    fn default_builder_registers_logger() {
        let container = ContainerBuilder::new().build().unwrap();
        assert!(container.is_registered::<dyn Logger>());
        assert!(container.is_registered::<Container>());
    }

    #[test]
    fn without_defaults_only_registers_container() {
        let container = ContainerBuilder::without_defaults().build().unwrap();
        assert_eq!(container.registered_services(), vec![std::any::type_name::<Container>()]);
    }

    #[test]
    fn unfinalized_declaration_fails_build() {
        let mut builder = ContainerBuilder::without_defaults();
        let _ = builder.register::<Plain>();

        match builder.build() {
            Err(BuildError::IncompleteRegistration { type_name }) => assert!(type_name.ends_with("Plain")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn factory_errors_are_wrapped() {
        let mut builder = ContainerBuilder::without_defaults();
        builder
            .register_factory(|_| Err::<Plain, _>("no plain today"))
            .as_self();
        let container = builder.build().unwrap();

        let err = container.resolve::<Plain>().unwrap_err();
        assert!(matches!(err, ResolveError::Construction { .. }));
        assert_eq!(
            std::error::Error::source(&err).map(ToString::to_string),
            Some("no plain today".to_string())
        );
    }

    #[test]
    fn from_config_respects_defaults_flag() {
        let config = ContainerConfig {
            register_defaults: false,
            ..ContainerConfig::default()
        };
        let container = ContainerBuilder::from_config(&config).build().unwrap();
        assert!(!container.is_registered::<dyn Logger>());
    }
}
