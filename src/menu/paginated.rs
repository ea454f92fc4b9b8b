//! 分页菜单
//!
//! 惰性翻页的远程列表游标。状态机：
//! - `Unloaded -> Loaded(0)`：`load()`
//! - `Loaded(p) -> Loaded(p+1)`：`next()`，仅当 `has_more`
//! - `Loaded(p) -> Loaded(p-1)`：`prev()`，仅当 `p > 0`
//!
//! 在末页 `next()`、在首页 `prev()` 都是无操作。
//! 同一菜单的请求严格串行：状态锁在整个请求期间持有。

use crate::catalog::{Page, PageKey, PageItem};
use crate::error::FetchError;
use crate::menu::cache::PageCache;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// 上一页条目标签
pub const PREV_PAGE_LABEL: &str = "<上一页";
/// 下一页条目标签
pub const NEXT_PAGE_LABEL: &str = "下一页>";

/// 远程分页数据源
#[async_trait]
pub trait PageSource: Send + Sync {
    /// 第 `page` 页的缓存键
    fn key(&self, page: u32) -> PageKey;

    /// 请求第 `page` 页；同一页多次请求结果相同
    async fn request(&self, page: u32) -> Result<Page, FetchError>;
}

/// 菜单条目 key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKey {
    Item(u64),
    PrevPage,
    NextPage,
}

/// 菜单条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub label: String,
    pub key: EntryKey,
}

impl MenuEntry {
    fn prev_page() -> Self {
        Self {
            label: PREV_PAGE_LABEL.to_string(),
            key: EntryKey::PrevPage,
        }
    }

    fn next_page() -> Self {
        Self {
            label: NEXT_PAGE_LABEL.to_string(),
            key: EntryKey::NextPage,
        }
    }
}

impl From<PageItem> for MenuEntry {
    fn from(item: PageItem) -> Self {
        Self {
            label: item.label,
            key: EntryKey::Item(item.key),
        }
    }
}

/// 菜单状态快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuState {
    /// 当前页码，`None` 表示尚未加载
    pub page: Option<u32>,
    /// 当前页请求返回的 has_more
    pub has_more: bool,
    /// 当前显示的条目（含翻页条目）
    pub entries: Vec<MenuEntry>,
}

impl MenuState {
    pub fn is_loaded(&self) -> bool {
        self.page.is_some()
    }

    /// 数据条目（不含翻页条目）
    pub fn items(&self) -> impl Iterator<Item = &MenuEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.key, EntryKey::Item(_)))
    }

    /// 用新的一页覆盖显示条目
    ///
    /// 逐个复用已有条目位置，只在尾部截断或追加，
    /// 使界面树的光标位置在翻页前后保持稳定
    fn apply(&mut self, page_index: u32, page: Page) {
        let mut fresh = Vec::with_capacity(page.items.len() + 2);
        if page_index > 0 {
            fresh.push(MenuEntry::prev_page());
        }
        fresh.extend(page.items.into_iter().map(MenuEntry::from));
        if page.has_more {
            fresh.push(MenuEntry::next_page());
        }

        let reused = self.entries.len().min(fresh.len());
        let mut fresh = fresh.into_iter();
        for slot in self.entries.iter_mut().take(reused) {
            if let Some(entry) = fresh.next() {
                slot.label = entry.label;
                slot.key = entry.key;
            }
        }
        self.entries.truncate(reused);
        self.entries.extend(fresh);

        self.page = Some(page_index);
        self.has_more = page.has_more;
    }
}

/// 选中条目的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// 选中数据条目
    Item(u64),
    /// 选中翻页条目，已翻页
    Turned(MenuState),
    /// 越界或菜单未加载
    Nothing,
}

/// 分页菜单
pub struct PaginatedMenu {
    title: String,
    source: Arc<dyn PageSource>,
    cache: Arc<PageCache>,
    state: Mutex<MenuState>,
}

impl std::fmt::Debug for PaginatedMenu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedMenu")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

impl PaginatedMenu {
    pub fn new(title: impl Into<String>, source: Arc<dyn PageSource>, cache: Arc<PageCache>) -> Self {
        Self {
            title: title.into(),
            source,
            cache,
            state: Mutex::new(MenuState::default()),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// 通过缓存请求一页；已请求过的页不会再访问远程
    pub async fn request(&self, page: u32) -> Result<Page, FetchError> {
        let key = self.source.key(page);
        self.cache
            .get_or_fetch(&key, || self.source.request(page))
            .await
    }

    /// 加载第 0 页
    pub async fn load(&self) -> Result<MenuState, FetchError> {
        let mut state = self.state.lock().await;
        self.turn_to(&mut state, 0).await
    }

    /// 下一页；未加载时等同于 `load()`
    pub async fn next(&self) -> Result<MenuState, FetchError> {
        let mut state = self.state.lock().await;
        let current = state.page;
        match current {
            None => self.turn_to(&mut state, 0).await,
            Some(page) if state.has_more => self.turn_to(&mut state, page + 1).await,
            Some(_) => Ok(state.clone()),
        }
    }

    /// 上一页
    pub async fn prev(&self) -> Result<MenuState, FetchError> {
        let mut state = self.state.lock().await;
        let current = state.page;
        match current {
            Some(page) if page > 0 => self.turn_to(&mut state, page - 1).await,
            _ => Ok(state.clone()),
        }
    }

    /// 选中第 `index` 个条目，翻页条目会触发翻页
    pub async fn select(&self, index: usize) -> Result<Selection, FetchError> {
        let key = {
            let state = self.state.lock().await;
            match state.entries.get(index) {
                Some(entry) => entry.key,
                None => return Ok(Selection::Nothing),
            }
        };

        match key {
            EntryKey::Item(id) => Ok(Selection::Item(id)),
            EntryKey::PrevPage => self.prev().await.map(Selection::Turned),
            EntryKey::NextPage => self.next().await.map(Selection::Turned),
        }
    }

    /// 当前状态快照
    pub async fn state(&self) -> MenuState {
        self.state.lock().await.clone()
    }

    async fn turn_to(&self, state: &mut MenuState, page: u32) -> Result<MenuState, FetchError> {
        match self.request(page).await {
            Ok(data) => {
                debug!(
                    "菜单 [{}] 翻到第 {} 页: {} 条, has_more={}",
                    self.title,
                    page,
                    data.items.len(),
                    data.has_more
                );
                state.apply(page, data);
                Ok(state.clone())
            }
            Err(e) => {
                warn!("菜单 [{}] 请求第 {} 页失败，保持当前页: {}", self.title, page, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Resource;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// 内存分页数据源
    struct FakeSource {
        pages: HashMap<u32, Page>,
        calls: AtomicUsize,
        fail: AtomicBool,
        delay: Duration,
    }

    impl FakeSource {
        fn new(pages: Vec<Vec<&str>>) -> Self {
            let total = pages.len();
            let pages = pages
                .into_iter()
                .enumerate()
                .map(|(i, labels)| {
                    let items = labels
                        .into_iter()
                        .enumerate()
                        .map(|(j, l)| PageItem::new(l, (i * 100 + j) as u64))
                        .collect();
                    (
                        i as u32,
                        Page {
                            items,
                            has_more: i + 1 < total,
                        },
                    )
                })
                .collect();
            Self {
                pages,
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        fn key(&self, page: u32) -> PageKey {
            PageKey {
                resource: Resource::SubscribedArtists,
                owner: 1,
                page,
            }
        }

        async fn request(&self, page: u32) -> Result<Page, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::Api {
                    code: 502,
                    message: "bad gateway".to_string(),
                });
            }
            Ok(self.pages.get(&page).cloned().unwrap_or_default())
        }
    }

    fn menu_with(source: Arc<FakeSource>) -> PaginatedMenu {
        PaginatedMenu::new("关注的艺人", source, Arc::new(PageCache::new()))
    }

    fn labels(state: &MenuState) -> Vec<&str> {
        state.entries.iter().map(|e| e.label.as_str()).collect()
    }

    #[tokio::test]
    async fn test_single_page_menu() {
        let source = Arc::new(FakeSource::new(vec![vec!["a", "b", "c", "d", "e"]]));
        let menu = menu_with(source.clone());

        let loaded = menu.load().await.unwrap();
        assert_eq!(loaded.page, Some(0));
        assert!(!loaded.has_more);
        assert_eq!(loaded.entries.len(), 5);

        let after = menu.next().await.unwrap();
        assert_eq!(after, loaded);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prev_at_first_page_is_noop() {
        let source = Arc::new(FakeSource::new(vec![vec!["a"], vec!["b"]]));
        let menu = menu_with(source);

        let loaded = menu.load().await.unwrap();
        let after = menu.prev().await.unwrap();
        assert_eq!(after, loaded);
        assert_eq!(after.page, Some(0));
    }

    #[tokio::test]
    async fn test_prev_before_load_is_noop() {
        let source = Arc::new(FakeSource::new(vec![vec!["a"]]));
        let menu = menu_with(source.clone());

        let state = menu.prev().await.unwrap();
        assert!(!state.is_loaded());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_navigation_entries() {
        let source = Arc::new(FakeSource::new(vec![
            vec!["a1", "a2"],
            vec!["b1", "b2"],
            vec!["c1"],
        ]));
        let menu = menu_with(source);

        let first = menu.load().await.unwrap();
        assert_eq!(labels(&first), vec!["a1", "a2", NEXT_PAGE_LABEL]);

        let second = menu.next().await.unwrap();
        assert_eq!(second.page, Some(1));
        assert_eq!(
            labels(&second),
            vec![PREV_PAGE_LABEL, "b1", "b2", NEXT_PAGE_LABEL]
        );

        let last = menu.next().await.unwrap();
        assert_eq!(last.page, Some(2));
        assert!(!last.has_more);
        assert_eq!(labels(&last), vec![PREV_PAGE_LABEL, "c1"]);
        assert_eq!(last.items().count(), 1);

        let back = menu.prev().await.unwrap();
        assert_eq!(back, second);
    }

    #[tokio::test]
    async fn test_pages_are_fetched_once() {
        let source = Arc::new(FakeSource::new(vec![vec!["a"], vec!["b"]]));
        let menu = menu_with(source.clone());

        menu.load().await.unwrap();
        menu.next().await.unwrap();
        menu.prev().await.unwrap();
        menu.next().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        let a = menu.request(1).await.unwrap();
        let b = menu.request(1).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_last_page() {
        let source = Arc::new(FakeSource::new(vec![vec!["a"], vec!["b"]]));
        let menu = menu_with(source.clone());

        let loaded = menu.load().await.unwrap();
        source.fail.store(true, Ordering::SeqCst);

        let err = menu.next().await.unwrap_err();
        assert!(matches!(err, FetchError::Api { code: 502, .. }));
        assert_eq!(menu.state().await, loaded);

        // 恢复后重新请求成功
        source.fail.store(false, Ordering::SeqCst);
        let second = menu.next().await.unwrap();
        assert_eq!(second.page, Some(1));
    }

    #[tokio::test]
    async fn test_select_entries() {
        let source = Arc::new(FakeSource::new(vec![vec!["a", "b"], vec!["c"]]));
        let menu = menu_with(source);
        menu.load().await.unwrap();

        assert_eq!(menu.select(1).await.unwrap(), Selection::Item(1));
        assert_eq!(menu.select(9).await.unwrap(), Selection::Nothing);

        // 选中 "下一页>"
        match menu.select(2).await.unwrap() {
            Selection::Turned(state) => assert_eq!(state.page, Some(1)),
            other => panic!("unexpected selection: {:?}", other),
        }

        // 选中 "<上一页"
        match menu.select(0).await.unwrap() {
            Selection::Turned(state) => assert_eq!(state.page, Some(0)),
            other => panic!("unexpected selection: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_next_is_serialized() {
        let mut fake = FakeSource::new(vec![vec!["a"], vec!["b"], vec!["c"]]);
        fake.delay = Duration::from_millis(20);
        let source = Arc::new(fake);
        let menu = Arc::new(menu_with(source.clone()));
        menu.load().await.unwrap();

        let m1 = menu.clone();
        let m2 = menu.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { m1.next().await }),
            tokio::spawn(async move { m2.next().await })
        );
        let mut pages = vec![r1.unwrap().unwrap().page, r2.unwrap().unwrap().page];
        pages.sort();

        // 两次翻页依次生效，互不交错
        assert_eq!(pages, vec![Some(1), Some(2)]);
        assert_eq!(menu.state().await.page, Some(2));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_apply_reuses_slots() {
        let mut state = MenuState::default();
        state.apply(
            0,
            Page {
                items: vec![PageItem::new("x", 1), PageItem::new("y", 2)],
                has_more: true,
            },
        );
        assert_eq!(state.entries.len(), 3);

        state.apply(
            1,
            Page {
                items: vec![PageItem::new("z", 3)],
                has_more: false,
            },
        );
        assert_eq!(
            state.entries,
            vec![
                MenuEntry::prev_page(),
                MenuEntry {
                    label: "z".to_string(),
                    key: EntryKey::Item(3)
                },
            ]
        );
    }
}
