use std::any::type_name;
use std::sync::Arc;

use super::activation::Resolvable;
use super::resolver::Resolver;
use super::scope::LifetimeScope;
use crate::errors::ResolveError;

/// 按需查询服务的接口，未注册不视为错误
pub trait ServiceProvider {
    /// 已注册时解析，未注册返回 `Ok(None)`
    fn resolve_service<T: Resolvable + ?Sized>(&self) -> Result<Option<Arc<T>>, ResolveError>;

    /// 未注册返回 [`ResolveError::UnregisteredService`]
    fn resolve_required_service<T: Resolvable + ?Sized>(&self) -> Result<Arc<T>, ResolveError> {
        self.resolve_service::<T>()?
            .ok_or(ResolveError::UnregisteredService {
                type_name: type_name::<T>(),
            })
    }
}

impl ServiceProvider for LifetimeScope {
    fn resolve_service<T: Resolvable + ?Sized>(&self) -> Result<Option<Arc<T>>, ResolveError> {
        Resolver::new(self.clone()).resolve_service::<T>()
    }
}
