use std::sync::atomic::{AtomicU64, Ordering};

/// 容器内部计数器
#[derive(Debug, Default)]
pub(crate) struct InnerStats {
    total_resolutions: AtomicU64,
    singleton_hits: AtomicU64,
    scoped_hits: AtomicU64,
    constructions: AtomicU64,
    disposables_released: AtomicU64,
    scopes_created: AtomicU64,
}

impl InnerStats {
    pub(crate) fn record_resolution(&self) {
        self.total_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_singleton_hit(&self) {
        self.singleton_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scoped_hit(&self) {
        self.scoped_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_construction(&self) {
        self.constructions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disposed(&self, released: usize) {
        self.disposables_released.fetch_add(released as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_scope_created(&self) {
        self.scopes_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, registered_services: usize) -> ContainerStats {
        ContainerStats {
            registered_services,
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            singleton_hits: self.singleton_hits.load(Ordering::Relaxed),
            scoped_hits: self.scoped_hits.load(Ordering::Relaxed),
            constructions: self.constructions.load(Ordering::Relaxed),
            disposables_released: self.disposables_released.load(Ordering::Relaxed),
            scopes_created: self.scopes_created.load(Ordering::Relaxed),
        }
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    pub registered_services: usize,
    pub total_resolutions: u64,
    pub singleton_hits: u64,
    pub scoped_hits: u64,
    /// 实际调用构造函数或工厂的次数
    pub constructions: u64,
    pub disposables_released: u64,
    /// 包括根作用域
    pub scopes_created: u64,
}

impl ContainerStats {
    /// 缓存命中率：命中次数 / 总解析次数
    pub fn hit_rate(&self) -> f64 {
        if self.total_resolutions == 0 {
            0.0
        } else {
            (self.singleton_hits + self.scoped_hits) as f64 / self.total_resolutions as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_of_empty_stats_is_zero() {
        assert_eq!(ContainerStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let stats = InnerStats::default();
        for _ in 0..4 {
            stats.record_resolution();
        }
        stats.record_singleton_hit();
        stats.record_scoped_hit();
        stats.record_construction();
        stats.record_disposed(3);

        let snapshot = stats.snapshot(2);
        assert_eq!(snapshot.registered_services, 2);
        assert_eq!(snapshot.total_resolutions, 4);
        assert_eq!(snapshot.constructions, 1);
        assert_eq!(snapshot.disposables_released, 3);
        assert!((snapshot.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
