//! 曲目列表解析
//!
//! 远程曲目列表以描述的形式缓存，每次取用时重新经过 `TrackRegistry` 解析，
//! 因此同一首歌出现在不同菜单、搜索结果中时共享同一条记录。
//! 首次解析出的记录会执行一次 liked/local 探测。

use crate::catalog::{CatalogApi, TrackListRef};
use crate::config::DownloadConfig;
use crate::error::FetchError;
use crate::menu::TrackListCache;
use crate::track::{Track, TrackRegistry};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub struct TrackCatalog {
    api: Arc<dyn CatalogApi>,
    registry: Arc<TrackRegistry>,
    lists: Arc<TrackListCache>,
    download: DownloadConfig,
    user_id: u64,
    /// 用户喜欢的曲目 id，整个会话只请求一次
    likes: OnceCell<HashSet<u64>>,
}

impl std::fmt::Debug for TrackCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackCatalog")
            .field("user_id", &self.user_id)
            .field("lists", &self.lists.len())
            .finish_non_exhaustive()
    }
}

impl TrackCatalog {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        registry: Arc<TrackRegistry>,
        lists: Arc<TrackListCache>,
        download: DownloadConfig,
        user_id: u64,
    ) -> Self {
        Self {
            api,
            registry,
            lists,
            download,
            user_id,
            likes: OnceCell::new(),
        }
    }

    /// 取曲目列表并解析为共享记录
    pub async fn tracks(&self, list: TrackListRef) -> Result<Vec<Arc<Track>>, FetchError> {
        let descriptors = self
            .lists
            .get_or_fetch(&list, || self.api.fetch_tracks(list))
            .await?;

        let tracks: Vec<Arc<Track>> = descriptors
            .into_iter()
            .map(|d| self.registry.resolve(d.id, move || Track::new(d)))
            .collect();

        self.probe(&tracks).await;
        debug!("曲目列表 {:?}: {} 首", list, tracks.len());
        Ok(tracks)
    }

    /// 每日推荐歌曲
    pub async fn daily_recommend(&self) -> Result<Vec<Arc<Track>>, FetchError> {
        self.tracks(TrackListRef::DailyRecommend).await
    }

    /// 喜欢 / 取消喜欢，远程成功后才更新记录
    pub async fn set_liked(&self, track: &Track, liked: bool) -> Result<(), FetchError> {
        self.api.set_like(track.id, liked).await?;
        track.set_liked(liked);
        info!(
            "{} 曲目: {} ({})",
            if liked { "喜欢" } else { "取消喜欢" },
            track.name,
            track.id
        );
        Ok(())
    }

    /// 时长未知时向远程请求一次
    pub async fn ensure_duration(&self, track: &Track) -> Result<u64, FetchError> {
        let current = track.duration_ms();
        if current > 0 {
            return Ok(current);
        }

        let ms = self.api.fetch_track_duration(track.id).await?;
        track.set_duration_ms(ms);
        Ok(ms)
    }

    /// 对尚未探测过的记录执行 liked/local 探测
    ///
    /// 喜欢列表请求失败时跳过整批探测，下次取列表时重试
    async fn probe(&self, tracks: &[Arc<Track>]) {
        let likes = match self.like_set().await {
            Ok(likes) => likes,
            Err(e) => {
                warn!("获取喜欢列表失败，暂不探测曲目状态: {}", e);
                return;
            }
        };

        for track in tracks {
            track.probe_once(|| {
                let liked = likes.contains(&track.id);
                let local = self.download.track_path(track.id).exists();
                (liked, local)
            });
        }
    }

    async fn like_set(&self) -> Result<&HashSet<u64>, FetchError> {
        self.likes
            .get_or_try_init(|| async {
                if self.user_id == 0 {
                    return Ok(HashSet::new());
                }
                let ids = self.api.fetch_like_list(self.user_id).await?;
                info!("✓ 喜欢列表加载完成: {} 首", ids.len());
                Ok::<_, FetchError>(ids.into_iter().collect())
            })
            .await
    }
}
