use crate::reconcile::ReconciledBenchmarkView;
use moka::sync::Cache;
use std::sync::Arc;

/// Last good reconciled view per benchmark id. Bounded; old entries are
/// evicted once `max_entries` is reached.
#[derive(Clone)]
pub struct ViewCache {
    inner: Cache<i64, Arc<ReconciledBenchmarkView>>,
}

impl ViewCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            inner: Cache::new(max_entries),
        }
    }

    pub fn get(&self, benchmark_id: i64) -> Option<Arc<ReconciledBenchmarkView>> {
        self.inner.get(&benchmark_id)
    }

    pub fn insert(&self, view: Arc<ReconciledBenchmarkView>) {
        self.inner.insert(view.benchmark_id, view);
    }

    pub fn invalidate(&self, benchmark_id: i64) {
        self.inner.invalidate(&benchmark_id);
    }

    /// First cached view matching `pred`.
    pub fn find<F>(&self, mut pred: F) -> Option<Arc<ReconciledBenchmarkView>>
    where
        F: FnMut(&ReconciledBenchmarkView) -> bool,
    {
        self.inner.iter().map(|(_, v)| v).find(|v| pred(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Benchmark;
    use crate::reconcile::reconcile;

    #[test]
    fn test_insert_get_invalidate() {
        let cache = ViewCache::new(8);
        let view = Arc::new(reconcile(&Benchmark {
            id: 4,
            ..Default::default()
        }));
        cache.insert(view.clone());
        assert_eq!(cache.get(4).map(|v| v.benchmark_id), Some(4));
        assert!(cache.find(|v| v.benchmark_id == 4).is_some());

        cache.invalidate(4);
        assert!(cache.get(4).is_none());
    }
}
