//! 请求结果记忆化缓存
//!
//! 每个 key 在缓存生命周期内最多向远程请求成功一次，没有失效机制：
//! 远程数据变化后调用方看到的仍是旧结果。
//! 请求失败不会写入缓存，下次访问会重新请求。

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::catalog::{Page, PageKey, TrackListRef};
use crate::track::TrackDescriptor;

/// 分页结果缓存：(资源, 归属, 页码) -> 一页
pub type PageCache = MemoCache<PageKey, Page>;

/// 曲目列表缓存：列表引用 -> 曲目描述
pub type TrackListCache = MemoCache<TrackListRef, Vec<TrackDescriptor>>;

pub struct MemoCache<K, V> {
    cells: DashMap<K, Arc<OnceCell<V>>>,
    /// 实际发起的远程请求次数（含失败）
    fetches: AtomicU64,
}

impl<K, V> std::fmt::Debug for MemoCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoCache")
            .field("entries", &self.cells.len())
            .field("fetches", &self.fetches.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> Default for MemoCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            cells: DashMap::new(),
            fetches: AtomicU64::new(0),
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// 命中缓存直接返回，否则执行 `fetch` 并记住成功结果
    ///
    /// 同一 key 的并发调用只有一个会真正执行 `fetch`，其余等待其结果
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // 先克隆出 cell 再 await，不能跨 await 持有 DashMap 的分片锁
        let cell = self
            .cells
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_try_init(|| {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                fetch()
            })
            .await
            .cloned();

        // 失败的 key 不留空 cell，避免离线时反复失败的请求堆积
        if result.is_err() {
            self.cells
                .remove_if(key, |_, current| Arc::ptr_eq(current, &cell) && !current.initialized());
        }
        result
    }

    /// 仅查询缓存
    pub fn get(&self, key: &K) -> Option<V> {
        self.cells
            .get(key)
            .and_then(|cell| cell.value().get().cloned())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// 已缓存的条目数
    pub fn len(&self) -> usize {
        self.cells.iter().filter(|cell| cell.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 实际发起的远程请求次数
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memoizes_success() {
        let cache: MemoCache<u32, String> = MemoCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let v = cache
                .get_or_fetch(&1, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>("page-1".to_string())
                })
                .await
                .unwrap();
            assert_eq!(v, "page-1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.fetch_count(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&1));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache: MemoCache<u32, u32> = MemoCache::new();

        let err = cache.get_or_fetch(&7, || async { Err::<u32, _>("boom") }).await;
        assert_eq!(err, Err("boom"));
        assert!(cache.is_empty());
        assert_eq!(cache.cells.len(), 0);

        let ok = cache.get_or_fetch(&7, || async { Ok::<_, &str>(70) }).await;
        assert_eq!(ok, Ok(70));
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache: Arc<MemoCache<u32, u32>> = Arc::new(MemoCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(&3, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, ()>(30)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(30));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_keys_do_not_accumulate() {
        let cache: MemoCache<String, u32> = MemoCache::new();

        for i in 0..50 {
            let key = format!("离线搜索-{}", i);
            let result = cache.get_or_fetch(&key, || async { Err::<u32, _>(()) }).await;
            assert!(result.is_err());
        }

        assert_eq!(cache.cells.len(), 0);
        assert_eq!(cache.fetch_count(), 50);
        assert!(format!("{:?}", cache).contains("entries: 0"));
    }
}
