//! 曲目身份注册表
//!
//! 保证同一个远程 id 只对应一个存活的 `Track` 实例。
//! 注册表只持有弱引用，实例的生命周期完全由外部持有者决定；
//! 最后一个持有者释放后，再次解析会得到一个全新的记录（liked/local/进度状态随之丢失）。

use super::model::Track;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// 触发清理失效条目的表大小下限
const PURGE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
pub struct TrackRegistry {
    entries: Mutex<HashMap<u64, Weak<Track>>>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析曲目：存在存活实例则直接返回，否则调用 `factory` 创建
    ///
    /// 查找与插入在同一把锁内完成，并发解析同一个新 id 只会创建一个实例
    pub fn resolve<F>(&self, id: u64, factory: F) -> Arc<Track>
    where
        F: FnOnce() -> Track,
    {
        let mut entries = self.entries.lock();

        if let Some(track) = entries.get(&id).and_then(Weak::upgrade) {
            return track;
        }

        let track = Arc::new(factory());
        debug_assert_eq!(track.id, id);
        entries.insert(id, Arc::downgrade(&track));

        if entries.len() >= PURGE_THRESHOLD && entries.len().is_power_of_two() {
            let before = entries.len();
            entries.retain(|_, weak| weak.strong_count() > 0);
            debug!("清理失效曲目条目: {} -> {}", before, entries.len());
        }

        track
    }

    /// 仅查找，不创建
    pub fn get(&self, id: u64) -> Option<Arc<Track>> {
        self.entries.lock().get(&id).and_then(Weak::upgrade)
    }

    /// 当前存活的曲目数量
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// 移除所有已失效的条目，返回移除数量
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, weak| weak.strong_count() > 0);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::model::descriptor;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn test_resolve_returns_same_instance_while_held() {
        let registry = TrackRegistry::new();
        let first = registry.resolve(42, || Track::new(descriptor(42, "a")));
        let second = registry.resolve(42, || Track::new(descriptor(42, "b")));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.name, "a");
    }

    #[test]
    fn test_state_is_shared_between_holders() {
        let registry = TrackRegistry::new();
        let menu_copy = registry.resolve(7, || Track::new(descriptor(7, "x")));
        let search_copy = registry.resolve(7, || Track::new(descriptor(7, "x")));

        menu_copy.set_liked(true);
        assert!(search_copy.is_liked());
    }

    #[test]
    fn test_released_track_is_recreated() {
        let registry = TrackRegistry::new();
        let track = registry.resolve(1, || Track::new(descriptor(1, "x")));
        track.set_liked(true);
        drop(track);

        assert!(registry.get(1).is_none());
        assert_eq!(registry.live_count(), 0);

        let fresh = registry.resolve(1, || Track::new(descriptor(1, "x")));
        assert!(!fresh.is_liked());
        assert_eq!(registry.purge(), 0);
    }

    #[test]
    fn test_registry_does_not_pin_tracks() {
        let registry = TrackRegistry::new();
        let track = registry.resolve(5, || Track::new(descriptor(5, "x")));
        assert_eq!(Arc::strong_count(&track), 1);
    }

    #[test]
    fn test_purge_removes_dead_entries() {
        let registry = TrackRegistry::new();
        let kept = registry.resolve(1, || Track::new(descriptor(1, "x")));
        drop(registry.resolve(2, || Track::new(descriptor(2, "y"))));
        drop(registry.resolve(3, || Track::new(descriptor(3, "z"))));

        assert_eq!(registry.purge(), 2);
        assert_eq!(registry.live_count(), 1);
        assert!(registry.get(1).is_some());
        drop(kept);
    }

    #[test]
    fn test_resolve_purges_dead_entries_past_threshold() {
        let registry = TrackRegistry::new();
        let held = registry.resolve(1_000_000, || Track::new(descriptor(1_000_000, "held")));

        // 解析后立即释放，条目只剩弱引用
        for id in 0..2000u64 {
            registry.resolve(id, || Track::new(descriptor(id, "tmp")));
        }

        let len = registry.entries.lock().len();
        assert!(len < PURGE_THRESHOLD, "dead entries were not purged: {}", len);
        assert_eq!(registry.live_count(), 1);
        assert!(Arc::ptr_eq(&registry.get(1_000_000).unwrap(), &held));
    }

    #[test]
    fn test_concurrent_resolve_creates_one_instance() {
        let registry = TrackRegistry::new();
        let created = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        let tracks: Vec<Arc<Track>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        registry.resolve(99, || {
                            created.fetch_add(1, Ordering::SeqCst);
                            Track::new(descriptor(99, "race"))
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(tracks.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    proptest! {
        #[test]
        fn prop_resolve_is_identity_while_held(id in any::<u64>()) {
            let registry = TrackRegistry::new();
            let held = registry.resolve(id, || Track::new(descriptor(id, "p")));
            let again = registry.resolve(id, || Track::new(descriptor(id, "q")));
            prop_assert!(Arc::ptr_eq(&held, &again));
        }
    }
}
