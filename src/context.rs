// 应用上下文

use crate::catalog::{ByteSource, CatalogApi, CatalogClient, Resource};
use crate::config::AppConfig;
use crate::downloader::DownloadManager;
use crate::error::FetchError;
use crate::library::TrackCatalog;
use crate::menu::{standard_menus, PageCache, ResourceMenu, SearchBar, TrackListCache};
use crate::playqueue::PlayQueue;
use crate::track::{Track, TrackRegistry};
use std::sync::Arc;
use tracing::info;

/// 应用上下文，启动时创建一次，各组件共享
#[derive(Clone)]
pub struct AppContext {
    /// 应用配置
    pub config: Arc<AppConfig>,
    /// 曲目身份注册表
    pub registry: Arc<TrackRegistry>,
    /// 远程曲库
    pub api: Arc<dyn CatalogApi>,
    /// 分页缓存（所有菜单共享）
    pub pages: Arc<PageCache>,
    /// 曲目列表
    pub catalog: Arc<TrackCatalog>,
    /// 下载管理器
    pub downloads: Arc<DownloadManager>,
}

impl AppContext {
    /// 使用 HTTP 曲库客户端创建
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let client = Arc::new(CatalogClient::new(&config.catalog)?);
        Self::with_backends(config, client.clone(), client)
    }

    pub fn with_backends(
        config: AppConfig,
        api: Arc<dyn CatalogApi>,
        source: Arc<dyn ByteSource>,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(TrackRegistry::new());
        let pages = Arc::new(PageCache::new());
        let lists = Arc::new(TrackListCache::new());

        let catalog = Arc::new(TrackCatalog::new(
            api.clone(),
            registry.clone(),
            lists,
            config.download.clone(),
            config.catalog.user_id,
        ));

        let downloads = Arc::new(DownloadManager::new(
            config.download.clone(),
            config.catalog.audio_quality.clone(),
            api.clone(),
            source,
        )?);

        info!(
            "✓ 应用上下文已创建: 用户={}, 接口={}",
            config.catalog.user_id, config.catalog.api_base_url
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            api,
            pages,
            catalog,
            downloads,
        })
    }

    /// 关注的艺人、收藏的专辑、创建的歌单
    pub fn standard_menus(&self) -> Vec<ResourceMenu> {
        standard_menus(
            self.api.clone(),
            self.pages.clone(),
            self.config.catalog.user_id,
        )
    }

    /// 提交搜索
    pub fn search(&self, bar: &SearchBar, keyword: &str) -> Option<ResourceMenu> {
        bar.submit(keyword, self.api.clone(), self.pages.clone())
    }

    /// 打开菜单条目对应的曲目列表
    pub async fn open_entry(
        &self,
        resource: &Resource,
        key: u64,
    ) -> Result<Vec<Arc<Track>>, FetchError> {
        self.catalog.tracks(resource.track_list(key)).await
    }

    pub fn play_queue(&self) -> PlayQueue {
        PlayQueue::new(self.config.download.clone(), &self.config.ui)
    }

    /// 等待下载全部结束
    pub async fn shutdown(&self) {
        self.downloads.shutdown().await;
    }
}
