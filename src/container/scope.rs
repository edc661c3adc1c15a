//! 生命周期作用域
//!
//! 作用域组成一棵树：根作用域由 `ContainerBuilder::build` 创建，子作用域由
//! `begin_lifetime_scope` 创建并登记在父作用域中，因此释放父作用域会级联释放所有后代。
//!
//! 子作用域强引用父作用域，父作用域只弱引用子作用域。只要还有存活的子作用域，
//! 根作用域就不会被回收；最后一个句柄被丢弃时，作用域会自行释放。

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use tracing::debug;
use uuid::Uuid;

use super::activation::{Injectable, Resolvable};
use super::owned::Owned;
use super::registration::{Instance, RegistrationId, RegistrationTable, TypeKey};
use super::resolver::Resolver;
use super::root::Container;
use super::stats::InnerStats;
use crate::errors::{BoxError, ResolveError};

/// 需要显式释放的实例
pub trait Dispose: Send + Sync {
    fn dispose(&self);
}

/// 作用域状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// 可以解析
    Active,
    /// 正在释放
    Disposing,
    /// 已释放，不能继续使用
    Disposed,
}

/// 作用域信息快照
#[derive(Debug, Clone)]
pub struct ScopeInfo {
    pub id: Uuid,
    pub name: Option<String>,
    pub parent_id: Option<Uuid>,
    pub depth: usize,
    pub state: ScopeState,
    /// 当前登记的可释放对象数量（包括存活的子作用域）
    pub tracked_disposables: usize,
    /// 作用域缓存的实例数量（根作用域包括单例）
    pub cached_instances: usize,
}

/// 整棵作用域树共享的状态
pub(crate) struct ContainerShared {
    pub(crate) table: RegistrationTable,
    pub(crate) stats: InnerStats,
    pub(crate) trace_resolutions: bool,
}

impl ContainerShared {
    pub(crate) fn new(table: RegistrationTable, trace_resolutions: bool) -> Self {
        Self {
            table,
            stats: InnerStats::default(),
            trace_resolutions,
        }
    }
}

/// 作用域登记的一项
enum Tracked {
    Instance(Arc<dyn Dispose>),
    /// 子作用域释放自己时会按 id 把这一项移除
    Scope { id: Uuid, scope: Weak<ScopeInner> },
}

impl Tracked {
    fn release(&self) {
        match self {
            Tracked::Instance(disposable) => disposable.dispose(),
            Tracked::Scope { scope, .. } => {
                if let Some(scope) = scope.upgrade() {
                    scope.dispose();
                }
            }
        }
    }
}

struct ScopeBook {
    state: ScopeState,
    tracked: Vec<Tracked>,
}

struct ScopeInner {
    id: Uuid,
    name: Option<String>,
    depth: usize,
    parent: Option<Arc<ScopeInner>>,
    /// 根作用域自身为 `None`
    root: Option<Arc<ScopeInner>>,
    shared: Arc<ContainerShared>,
    instances: DashMap<RegistrationId, Instance>,
    // 可重入：可释放对象在释放时可能回调自己所在的作用域
    book: ReentrantMutex<RefCell<ScopeBook>>,
    disposed: AtomicBool,
}

impl ScopeInner {
    fn new(
        name: Option<String>,
        parent: Option<Arc<ScopeInner>>,
        root: Option<Arc<ScopeInner>>,
        shared: Arc<ContainerShared>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            depth: parent.as_ref().map_or(0, |parent| parent.depth + 1),
            parent,
            root,
            shared,
            instances: DashMap::new(),
            book: ReentrantMutex::new(RefCell::new(ScopeBook {
                state: ScopeState::Active,
                tracked: Vec::new(),
            })),
            disposed: AtomicBool::new(false),
        }
    }

    fn dispose(&self) {
        let released = {
            let guard = self.book.lock();

            let tracked = {
                let mut book = guard.borrow_mut();
                if book.state != ScopeState::Active {
                    return;
                }
                book.state = ScopeState::Disposing;
                self.disposed.store(true, Ordering::Release);
                std::mem::take(&mut book.tracked)
            };

            let released = tracked.len();
            for entry in &tracked {
                entry.release();
            }
            drop(tracked);
            self.instances.clear();

            guard.borrow_mut().state = ScopeState::Disposed;
            released
        };

        // 先放开自己的锁再去锁父作用域，避免与正在级联释放的父作用域互相等待
        if let Some(parent) = &self.parent {
            parent.forget_child(self.id);
        }

        self.shared.stats.record_disposed(released);
        debug!(
            scope = %self.id,
            name = self.name.as_deref().unwrap_or(""),
            released,
            "Lifetime scope disposed"
        );
    }

    fn forget_child(&self, child: Uuid) {
        let guard = self.book.lock();
        guard
            .borrow_mut()
            .tracked
            .retain(|entry| !matches!(entry, Tracked::Scope { id, .. } if *id == child));
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// 生命周期作用域句柄，克隆开销很小，所有克隆指向同一个作用域
#[derive(Clone)]
pub struct LifetimeScope {
    inner: Arc<ScopeInner>,
}

impl LifetimeScope {
    pub(crate) fn new_root(shared: Arc<ContainerShared>) -> Self {
        let inner = Arc::new(ScopeInner::new(Some("root".to_string()), None, None, shared));
        inner.shared.stats.record_scope_created();
        Self { inner }
    }

    // ===== 解析 =====

    /// 解析服务
    pub fn resolve<T: Resolvable + ?Sized>(&self) -> Result<Arc<T>, ResolveError> {
        Resolver::new(self.clone()).resolve::<T>()
    }

    /// 在独立作用域中解析服务，所有权交给调用方
    pub fn resolve_owned<T: Resolvable + ?Sized>(&self) -> Result<Owned<T>, ResolveError> {
        Resolver::new(self.clone()).resolve_owned::<T>()
    }

    /// 检查服务是否已注册
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.inner.shared.table.contains(&TypeKey::of::<T>())
    }

    /// 根容器句柄
    pub fn container(&self) -> Container {
        Container::from_root(self.root_scope())
    }

    // ===== 作用域树 =====

    /// 开始新的子作用域
    pub fn begin_lifetime_scope(&self) -> Result<LifetimeScope, ResolveError> {
        self.spawn_child(None, true)
    }

    /// 开始新的命名子作用域
    pub fn begin_named_scope(&self, name: impl Into<String>) -> Result<LifetimeScope, ResolveError> {
        self.spawn_child(Some(name.into()), true)
    }

    /// 不被父作用域跟踪的子作用域，用于 `Owned<T>`
    pub(crate) fn begin_detached_scope(&self) -> Result<LifetimeScope, ResolveError> {
        self.spawn_child(Some(format!("owned-by-{}", self.inner.id)), false)
    }

    fn spawn_child(&self, name: Option<String>, tracked: bool) -> Result<LifetimeScope, ResolveError> {
        self.ensure_active()?;

        let root = self.inner.root.clone().unwrap_or_else(|| self.inner.clone());
        let child = LifetimeScope {
            inner: Arc::new(ScopeInner::new(
                name,
                Some(self.inner.clone()),
                Some(root),
                self.inner.shared.clone(),
            )),
        };

        if tracked {
            self.track_entry(Tracked::Scope {
                id: child.inner.id,
                scope: Arc::downgrade(&child.inner),
            })?;
        }
        self.inner.shared.stats.record_scope_created();

        debug!(
            scope = %child.inner.id,
            parent = %self.inner.id,
            depth = child.inner.depth,
            tracked,
            "Lifetime scope started"
        );

        Ok(child)
    }

    // ===== 释放 =====

    /// 释放作用域：按登记顺序释放所有子作用域与可释放实例。
    ///
    /// 可重复调用，并发调用时只有一个线程执行清理，其余调用在清理完成后返回。
    /// 释放完成后作用域从父作用域的登记中移除。
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// 释放是否已开始
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    pub fn state(&self) -> ScopeState {
        let guard = self.inner.book.lock();
        let state = guard.borrow().state;
        state
    }

    // ===== 信息 =====

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.inner.parent.as_ref().map(|parent| parent.id)
    }

    /// 根作用域深度为 0
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    pub fn is_root(&self) -> bool {
        self.inner.root.is_none()
    }

    pub fn ptr_eq(&self, other: &LifetimeScope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 当前登记的可释放对象数量
    pub fn tracked_disposables(&self) -> usize {
        let guard = self.inner.book.lock();
        let count = guard.borrow().tracked.len();
        count
    }

    pub fn info(&self) -> ScopeInfo {
        let (state, tracked_disposables) = {
            let guard = self.inner.book.lock();
            let book = guard.borrow();
            (book.state, book.tracked.len())
        };

        ScopeInfo {
            id: self.inner.id,
            name: self.inner.name.clone(),
            parent_id: self.parent_id(),
            depth: self.inner.depth,
            state,
            tracked_disposables,
            cached_instances: self.inner.instances.len(),
        }
    }

    // ===== 引擎内部接口 =====

    pub(crate) fn ensure_active(&self) -> Result<(), ResolveError> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        Ok(())
    }

    pub(crate) fn root_scope(&self) -> LifetimeScope {
        let inner = self.inner.root.clone().unwrap_or_else(|| self.inner.clone());
        LifetimeScope { inner }
    }

    pub(crate) fn table(&self) -> &RegistrationTable {
        &self.inner.shared.table
    }

    pub(crate) fn stats(&self) -> &InnerStats {
        &self.inner.shared.stats
    }

    pub(crate) fn shared(&self) -> &ContainerShared {
        &self.inner.shared
    }

    /// 登记可释放对象；作用域已开始释放时立即释放该对象
    pub(crate) fn track(&self, disposable: Arc<dyn Dispose>) -> Result<(), ResolveError> {
        self.track_entry(Tracked::Instance(disposable))
    }

    fn track_entry(&self, entry: Tracked) -> Result<(), ResolveError> {
        let guard = self.inner.book.lock();
        let rejected = {
            let mut book = guard.borrow_mut();
            if book.state == ScopeState::Active {
                book.tracked.push(entry);
                None
            } else {
                Some(entry)
            }
        };
        drop(guard);

        match rejected {
            None => Ok(()),
            Some(entry) => {
                entry.release();
                Err(self.disposed_error())
            }
        }
    }

    pub(crate) fn cached(&self, id: RegistrationId) -> Option<Instance> {
        self.inner.instances.get(&id).map(|entry| entry.value().clone())
    }

    /// 缓存实例；检查状态与写入都在登记锁内完成，不会与 `dispose` 的清空交错
    pub(crate) fn cache(&self, id: RegistrationId, instance: Instance) -> Result<(), ResolveError> {
        let guard = self.inner.book.lock();
        let active = guard.borrow().state == ScopeState::Active;
        if !active {
            return Err(self.disposed_error());
        }
        self.inner.instances.insert(id, instance);
        drop(guard);
        Ok(())
    }

    fn disposed_error(&self) -> ResolveError {
        ResolveError::DisposedScope {
            scope_id: self.inner.id,
        }
    }
}

impl Dispose for LifetimeScope {
    fn dispose(&self) {
        LifetimeScope::dispose(self);
    }
}

/// 解析 `LifetimeScope` 得到当前作用域
impl Injectable for LifetimeScope {
    fn construct(resolver: &mut Resolver) -> Result<Self, BoxError> {
        Ok(resolver.scope().clone())
    }
}

impl fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("depth", &self.inner.depth)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
