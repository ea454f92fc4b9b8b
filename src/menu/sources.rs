// 具体的分页数据源：订阅列表、歌单、搜索

use super::cache::PageCache;
use super::paginated::{PageSource, PaginatedMenu};
use crate::catalog::{CatalogApi, Page, PageKey, Resource, SearchKind};
use crate::error::FetchError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// 基于远程曲库的分页数据源
pub struct CatalogPageSource {
    api: Arc<dyn CatalogApi>,
    resource: Resource,
    owner: u64,
}

impl CatalogPageSource {
    pub fn new(api: Arc<dyn CatalogApi>, resource: Resource, owner: u64) -> Self {
        Self {
            api,
            resource,
            owner,
        }
    }
}

#[async_trait]
impl PageSource for CatalogPageSource {
    fn key(&self, page: u32) -> PageKey {
        PageKey {
            resource: self.resource.clone(),
            owner: self.owner,
            page,
        }
    }

    async fn request(&self, page: u32) -> Result<Page, FetchError> {
        self.api.fetch_page(&self.resource, self.owner, page).await
    }
}

/// 资源菜单：分页菜单 + 所属资源（用于把条目 key 解析为曲目列表）
#[derive(Debug)]
pub struct ResourceMenu {
    pub resource: Resource,
    pub menu: PaginatedMenu,
}

impl ResourceMenu {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        cache: Arc<PageCache>,
        resource: Resource,
        owner: u64,
    ) -> Self {
        let source = Arc::new(CatalogPageSource::new(api, resource.clone(), owner));
        let menu = PaginatedMenu::new(resource.title(), source, cache);
        Self { resource, menu }
    }
}

/// 启动时创建的固定菜单：关注的艺人、收藏的专辑、创建的歌单
pub fn standard_menus(
    api: Arc<dyn CatalogApi>,
    cache: Arc<PageCache>,
    user_id: u64,
) -> Vec<ResourceMenu> {
    [
        Resource::SubscribedArtists,
        Resource::SubscribedAlbums,
        Resource::UserPlaylists,
    ]
    .into_iter()
    .map(|resource| ResourceMenu::new(api.clone(), cache.clone(), resource, user_id))
    .collect()
}

/// 搜索栏状态：当前搜索类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBar {
    kind: SearchKind,
}

impl Default for SearchBar {
    fn default() -> Self {
        Self {
            kind: SearchKind::Song,
        }
    }
}

impl SearchBar {
    pub fn kind(&self) -> SearchKind {
        self.kind
    }

    pub fn placeholder(&self) -> &'static str {
        self.kind.placeholder()
    }

    pub fn next_kind(&mut self) -> SearchKind {
        self.kind = self.kind.next();
        self.kind
    }

    pub fn prev_kind(&mut self) -> SearchKind {
        self.kind = self.kind.prev();
        self.kind
    }

    /// 提交搜索，得到一个新的结果菜单；空关键字不搜索
    pub fn submit(
        &self,
        keyword: &str,
        api: Arc<dyn CatalogApi>,
        cache: Arc<PageCache>,
    ) -> Option<ResourceMenu> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return None;
        }

        info!("搜索 [{}]: {}", self.kind.placeholder(), keyword);
        let resource = Resource::Search {
            kind: self.kind,
            keyword: keyword.to_string(),
        };
        Some(ResourceMenu::new(api, cache, resource, 0))
    }
}
