//! 注册记录与注册表
//!
//! 注册表在 `ContainerBuilder::build` 之后冻结，所有作用域与线程共享只读访问。

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use super::resolver::Resolver;
use super::scope::Dispose;
use crate::errors::BoxError;

/// 类型擦除后的实例（始终持有具体类型的 `Arc`）
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type ActivatorFn = Arc<dyn Fn(&mut Resolver) -> Result<Instance, BoxError> + Send + Sync>;
pub(crate) type DisposerFn = fn(&Instance) -> Option<Arc<dyn Dispose>>;
pub(crate) type UpcastFn = fn(Instance) -> Option<Box<dyn Any + Send + Sync>>;

/// 服务生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// 瞬态 - 每次请求都创建新实例
    #[default]
    Transient,
    /// 作用域 - 每个生命周期作用域一个实例
    Scoped,
    /// 单例 - 整个容器一个实例，由根作用域解析
    Singleton,
}

/// 稳定的类型标识
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 注册的唯一编号，用作作用域缓存的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RegistrationId(usize);

impl RegistrationId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// 实例的产生方式
#[derive(Clone)]
pub(crate) enum Activator {
    /// `Injectable::construct` 绑定
    Constructor(ActivatorFn),
    /// 用户提供的工厂
    Factory(ActivatorFn),
    /// 预先创建的实例，由外部持有，容器不负责释放
    Instance(Instance),
    /// 解析为根作用域自身
    Root,
}

impl Activator {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Activator::Constructor(_) => "constructor",
            Activator::Factory(_) => "factory",
            Activator::Instance(_) => "instance",
            Activator::Root => "root",
        }
    }
}

/// 注册记录
pub(crate) struct Registration {
    pub(crate) id: RegistrationId,
    pub(crate) target: TypeKey,
    pub(crate) lifetime: Lifetime,
    pub(crate) activator: Activator,
    pub(crate) disposer: Option<DisposerFn>,
    /// 串行化首次构造（单例与作用域实例）
    pub(crate) construction_lock: ReentrantMutex<()>,
}

impl Registration {
    pub(crate) fn new(
        target: TypeKey,
        lifetime: Lifetime,
        activator: Activator,
        disposer: Option<DisposerFn>,
    ) -> Self {
        Self {
            id: RegistrationId::next(),
            target,
            lifetime,
            activator,
            disposer,
            construction_lock: ReentrantMutex::new(()),
        }
    }

    pub(crate) fn disposable_of(&self, instance: &Instance) -> Option<Arc<dyn Dispose>> {
        self.disposer.and_then(|disposer| disposer(instance))
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("target", &self.target)
            .field("lifetime", &self.lifetime)
            .field("activator", &self.activator.kind())
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

/// 服务键到注册记录的绑定
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) service: TypeKey,
    pub(crate) registration: Arc<Registration>,
    pub(crate) upcast: UpcastFn,
}

/// 冻结后的注册表
#[derive(Default)]
pub(crate) struct RegistrationTable {
    bindings: HashMap<TypeKey, Binding>,
}

impl RegistrationTable {
    /// 插入绑定，返回被覆盖的旧绑定
    pub(crate) fn insert(&mut self, binding: Binding) -> Option<Binding> {
        self.bindings.insert(binding.service, binding)
    }

    pub(crate) fn get(&self, key: &TypeKey) -> Option<&Binding> {
        self.bindings.get(key)
    }

    pub(crate) fn contains(&self, key: &TypeKey) -> bool {
        self.bindings.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }

    /// 已注册服务名，按字母排序（用于诊断）
    pub(crate) fn service_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.bindings.keys().map(TypeKey::name).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Marker: Send + Sync {}

    #[test]
    fn type_key_identity_ignores_name() {
        let a = TypeKey::of::<String>();
        let b = TypeKey::of::<String>();
        let c = TypeKey::of::<dyn Marker>();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(c.name().contains("Marker"));
    }

    #[test]
    fn instance_registration_has_no_disposer() {
        let value: Instance = Arc::new(7u32);
        let registration = Registration::new(
            TypeKey::of::<u32>(),
            Lifetime::Singleton,
            Activator::Instance(value.clone()),
            None,
        );

        assert!(registration.disposable_of(&value).is_none());
        assert_eq!(registration.activator.kind(), "instance");
    }

    #[test]
    fn registration_ids_are_unique() {
        let first = RegistrationId::next();
        let second = RegistrationId::next();
        assert_ne!(first, second);
    }

    #[test]
    fn table_later_binding_wins() {
        let mut table = RegistrationTable::default();
        let make = |n: u32| {
            let instance: Instance = Arc::new(n);
            Binding {
                service: TypeKey::of::<u32>(),
                registration: Arc::new(Registration::new(
                    TypeKey::of::<u32>(),
                    Lifetime::Singleton,
                    Activator::Instance(instance),
                    None,
                )),
                upcast: |instance| Some(Box::new(instance) as Box<dyn Any + Send + Sync>),
            }
        };

        assert!(table.insert(make(1)).is_none());
        assert!(table.insert(make(2)).is_some());
        assert_eq!(table.len(), 1);
        assert!(table.contains(&TypeKey::of::<u32>()));
        assert_eq!(table.service_names(), vec!["u32"]);
    }
}
