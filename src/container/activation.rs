//! 构造绑定
//!
//! 容器不做运行时反射：每个可构造类型通过 [`Injectable`] 声明唯一的构造绑定，
//! 抽象类型通过 [`Resolvable`] 的默认实现声明“只能经由注册解析”，
//! 具体类型到抽象的转换由 [`Implements`] 提供。构造参数按声明类型经 [`Dependency`] 解析。

use std::any::Any;
use std::sync::Arc;

use super::owned::Owned;
use super::registration::{Instance, Lifetime};
use super::resolver::Resolver;
use super::scope::{Dispose, LifetimeScope};
use crate::errors::{BoxError, ResolveError};

/// 可由容器构造的具体类型
///
/// 通常通过 [`injectable!`](crate::injectable) 生成。
pub trait Injectable: Sized + Send + Sync + 'static {
    /// `ContainerBuilder::register` 使用的默认生命周期
    const LIFETIME: Lifetime = Lifetime::Transient;

    /// 构造函数绑定，参数通过 `resolver` 递归解析
    fn construct(resolver: &mut Resolver) -> Result<Self, BoxError>;

    /// 如果实例需要显式释放，返回释放句柄
    fn as_disposable(this: &Arc<Self>) -> Option<Arc<dyn Dispose>> {
        let _ = this;
        None
    }
}

/// 可以请求解析的类型
///
/// 默认实现表示一个抽象：没有注册时解析失败并返回
/// [`ResolveError::UnregisteredInterface`]，不会尝试构造。
/// 所有 [`Injectable`] 类型自动实现，未注册时按瞬态构造。
pub trait Resolvable: Send + Sync + 'static {
    fn resolve_unregistered(resolver: &mut Resolver) -> Result<Arc<Self>, ResolveError> {
        let _ = resolver;
        Err(ResolveError::UnregisteredInterface {
            type_name: std::any::type_name::<Self>(),
        })
    }
}

impl<T: Injectable> Resolvable for T {
    fn resolve_unregistered(resolver: &mut Resolver) -> Result<Arc<Self>, ResolveError> {
        resolver.construct_unregistered::<T>()
    }
}

/// 具体类型 `Self` 可以作为服务 `I` 暴露
pub trait Implements<I: ?Sized> {
    fn upcast(self: Arc<Self>) -> Arc<I>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// 构造参数：按参数的声明类型决定解析方式
pub trait Dependency: Sized {
    fn resolve_from(resolver: &mut Resolver) -> Result<Self, ResolveError>;
}

impl<T: Resolvable + ?Sized> Dependency for Arc<T> {
    fn resolve_from(resolver: &mut Resolver) -> Result<Self, ResolveError> {
        resolver.resolve::<T>()
    }
}

impl<T: Resolvable + ?Sized> Dependency for Owned<T> {
    fn resolve_from(resolver: &mut Resolver) -> Result<Self, ResolveError> {
        resolver.resolve_owned::<T>()
    }
}

/// 可选依赖：仅在已注册时解析
impl<T: Resolvable + ?Sized> Dependency for Option<Arc<T>> {
    fn resolve_from(resolver: &mut Resolver) -> Result<Self, ResolveError> {
        resolver.resolve_service::<T>()
    }
}

impl Dependency for LifetimeScope {
    fn resolve_from(resolver: &mut Resolver) -> Result<Self, ResolveError> {
        Ok(resolver.scope().clone())
    }
}

pub(crate) fn construct_erased<C: Injectable>(resolver: &mut Resolver) -> Result<Instance, BoxError> {
    let component = C::construct(resolver)?;
    Ok(Arc::new(component))
}

pub(crate) fn injectable_disposer<C: Injectable>(instance: &Instance) -> Option<Arc<dyn Dispose>> {
    instance
        .clone()
        .downcast::<C>()
        .ok()
        .and_then(|component| C::as_disposable(&component))
}

pub(crate) fn dispose_hook<C: Dispose + 'static>(instance: &Instance) -> Option<Arc<dyn Dispose>> {
    instance
        .clone()
        .downcast::<C>()
        .ok()
        .map(|component| component as Arc<dyn Dispose>)
}

pub(crate) fn upcast_to<C, I>(instance: Instance) -> Option<Box<dyn Any + Send + Sync>>
where
    C: Implements<I> + Send + Sync + 'static,
    I: ?Sized + Send + Sync + 'static,
{
    let concrete = instance.downcast::<C>().ok()?;
    let service: Arc<I> = <C as Implements<I>>::upcast(concrete);
    Some(Box::new(service))
}

/// 为具体类型生成 [`Injectable`] 实现
///
/// ```
/// use std::sync::Arc;
/// use lifescope::{injectable, implements, interface};
///
/// pub trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
/// interface!(dyn Clock);
///
/// #[derive(Default)]
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 { 42 }
/// }
/// injectable!(FixedClock);
/// implements!(FixedClock => dyn Clock);
///
/// struct Report { clock: Arc<dyn Clock> }
/// injectable!(Report: |clock| Report { clock }, [Arc<dyn Clock>]);
///
/// let mut builder = lifescope::ContainerBuilder::without_defaults();
/// builder.register_singleton::<FixedClock>().as_service::<dyn Clock>();
/// let container = builder.build().unwrap();
/// assert_eq!(container.resolve::<Report>().unwrap().clock.now(), 42);
/// ```
///
/// 形式：
/// - `injectable!(T)`：以 `Default` 构造
/// - `injectable!(T: ctor, [Arg1, Arg2])`：按参数类型解析后调用 `ctor`
/// - 前缀 `dispose` 表示实例实现了 [`Dispose`]，由构造它的作用域负责释放
#[macro_export]
macro_rules! injectable {
    (dispose $ty:ty : $ctor:expr, [$($arg:ty),* $(,)?]) => {
        impl $crate::Injectable for $ty {
            #[allow(unused_variables)]
            fn construct(
                resolver: &mut $crate::Resolver,
            ) -> ::std::result::Result<Self, $crate::BoxError> {
                ::std::result::Result::Ok(($ctor)(
                    $(<$arg as $crate::Dependency>::resolve_from(resolver)?),*
                ))
            }

            fn as_disposable(
                this: &::std::sync::Arc<Self>,
            ) -> ::std::option::Option<::std::sync::Arc<dyn $crate::Dispose>> {
                ::std::option::Option::Some(this.clone())
            }
        }
    };
    (dispose $ty:ty) => {
        $crate::injectable!(dispose $ty: <$ty as ::std::default::Default>::default, []);
    };
    ($ty:ty : $ctor:expr, [$($arg:ty),* $(,)?]) => {
        impl $crate::Injectable for $ty {
            #[allow(unused_variables)]
            fn construct(
                resolver: &mut $crate::Resolver,
            ) -> ::std::result::Result<Self, $crate::BoxError> {
                ::std::result::Result::Ok(($ctor)(
                    $(<$arg as $crate::Dependency>::resolve_from(resolver)?),*
                ))
            }
        }
    };
    ($ty:ty) => {
        $crate::injectable!($ty: <$ty as ::std::default::Default>::default, []);
    };
}

/// 声明具体类型实现的服务抽象
#[macro_export]
macro_rules! implements {
    ($ty:ty => $($service:ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$service> for $ty {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    self
                }
            }
        )+
    };
}

/// 声明只能经由注册解析的类型（通常是 `dyn Trait`）
#[macro_export]
macro_rules! interface {
    ($($ty:ty),+ $(,)?) => {
        $(impl $crate::Resolvable for $ty {})+
    };
}
