// 曲库 HTTP 客户端实现

use super::api::{AudioStream, ByteSource, CatalogApi};
use super::types::{
    DailyRecommendResponse, LikeListResponse, Page, PageItem, Resource, SearchResponse,
    SongUrlResponse, SongsResponse, StreamRef, SublistResponse, TrackListRef,
    UserPlaylistResponse,
};
use crate::config::CatalogConfig;
use crate::error::{FetchError, TransferError};
use crate::track::TrackDescriptor;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// 曲库客户端
///
/// 对接 NeteaseCloudMusicApi 兼容的 HTTP 网关，会话 Cookie 由配置提供
#[derive(Debug, Clone)]
pub struct CatalogClient {
    /// HTTP客户端
    client: Client,
    /// 网关地址（不含结尾斜杠）
    base_url: String,
    /// 订阅列表每页条目数
    page_size: u32,
    /// 搜索每页条目数
    search_limit: u32,
}

impl CatalogClient {
    /// 创建新的曲库客户端
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        if let Some(cookie) = config.cookie.as_deref().filter(|c| !c.is_empty()) {
            let value = HeaderValue::from_str(cookie).context("Cookie 含有非法字符")?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            "初始化曲库客户端: base_url={}, 用户={}, Cookie={}",
            config.api_base_url,
            config.user_id,
            if config.cookie.is_some() { "已设置" } else { "未设置" }
        );

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            search_limit: config.search_limit,
        })
    }

    /// GET 请求并检查业务码
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("请求 {} {:?}", path, query);

        let value: Value = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        decode_response(value)
    }

    async fn fetch_sublist(&self, path: &str, page: u32) -> Result<Page, FetchError> {
        let offset = page as u64 * self.page_size as u64;
        let resp: SublistResponse = self
            .get_json(
                path,
                &[
                    ("limit", self.page_size.to_string()),
                    ("offset", offset.to_string()),
                ],
            )
            .await?;

        Ok(Page {
            items: resp
                .data
                .into_iter()
                .map(|entry| PageItem::new(entry.name, entry.id))
                .collect(),
            has_more: resp.has_more,
        })
    }
}

/// 检查 `code` 字段后反序列化响应
fn decode_response<T: DeserializeOwned>(value: Value) -> Result<T, FetchError> {
    let code = value.get("code").and_then(Value::as_i64).unwrap_or(200);
    if code != 200 {
        let message = value
            .get("message")
            .or_else(|| value.get("msg"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(FetchError::Api { code, message });
    }
    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn fetch_page(
        &self,
        resource: &Resource,
        owner: u64,
        page: u32,
    ) -> Result<Page, FetchError> {
        info!("获取列表: {:?}, page={}", resource, page);

        match resource {
            Resource::SubscribedArtists => self.fetch_sublist("/artist/sublist", page).await,
            Resource::SubscribedAlbums => self.fetch_sublist("/album/sublist", page).await,
            Resource::UserPlaylists => {
                // 歌单接口一次返回全部，忽略页码
                let resp: UserPlaylistResponse = self
                    .get_json("/user/playlist", &[("uid", owner.to_string())])
                    .await?;
                Ok(Page {
                    items: resp
                        .playlist
                        .into_iter()
                        .map(|pl| PageItem::new(pl.name, pl.id))
                        .collect(),
                    has_more: false,
                })
            }
            Resource::Search { kind, keyword } => {
                let offset = page as u64 * self.search_limit as u64;
                let resp: SearchResponse = self
                    .get_json(
                        "/cloudsearch",
                        &[
                            ("keywords", keyword.clone()),
                            ("type", kind.code().to_string()),
                            ("limit", self.search_limit.to_string()),
                            ("offset", offset.to_string()),
                        ],
                    )
                    .await?;
                Ok(resp.result.into_page(*kind, offset))
            }
        }
    }

    async fn fetch_tracks(&self, list: TrackListRef) -> Result<Vec<TrackDescriptor>, FetchError> {
        let songs = match list {
            TrackListRef::ArtistTop(id) => {
                self.get_json::<SongsResponse>("/artist/top/song", &[("id", id.to_string())])
                    .await?
                    .songs
            }
            TrackListRef::Album(id) => {
                self.get_json::<SongsResponse>("/album", &[("id", id.to_string())])
                    .await?
                    .songs
            }
            TrackListRef::Playlist(id) => {
                self.get_json::<SongsResponse>("/playlist/track/all", &[("id", id.to_string())])
                    .await?
                    .songs
            }
            TrackListRef::Song(id) => {
                self.get_json::<SongsResponse>("/song/detail", &[("ids", id.to_string())])
                    .await?
                    .songs
            }
            TrackListRef::DailyRecommend => {
                self.get_json::<DailyRecommendResponse>("/recommend/songs", &[])
                    .await?
                    .data
                    .daily_songs
            }
        };

        debug!("{:?} 获取到 {} 首曲目", list, songs.len());
        Ok(songs.into_iter().map(TrackDescriptor::from).collect())
    }

    async fn fetch_stream_ref(
        &self,
        track_id: u64,
        quality: &str,
    ) -> Result<Option<StreamRef>, FetchError> {
        let resp: SongUrlResponse = self
            .get_json(
                "/song/url/v1",
                &[("id", track_id.to_string()), ("level", quality.to_string())],
            )
            .await?;

        let stream = resp
            .data
            .into_iter()
            .find(|item| item.id == track_id)
            .and_then(|item| match item.url {
                Some(url) if !url.is_empty() => Some(StreamRef {
                    track_id,
                    url,
                    size: item.size,
                }),
                _ => None,
            });

        if stream.is_none() {
            warn!("曲目 {} 没有可用的音频地址 (level={})", track_id, quality);
        }
        Ok(stream)
    }

    async fn fetch_track_duration(&self, track_id: u64) -> Result<u64, FetchError> {
        let resp: SongsResponse = self
            .get_json("/song/detail", &[("ids", track_id.to_string())])
            .await?;

        resp.songs
            .into_iter()
            .find(|song| song.id == track_id)
            .map(|song| song.dt)
            .ok_or_else(|| FetchError::Decode(format!("曲目 {} 不存在", track_id)))
    }

    async fn fetch_like_list(&self, user_id: u64) -> Result<Vec<u64>, FetchError> {
        let resp: LikeListResponse = self
            .get_json("/likelist", &[("uid", user_id.to_string())])
            .await?;
        Ok(resp.ids)
    }

    async fn set_like(&self, track_id: u64, like: bool) -> Result<(), FetchError> {
        let _: Value = self
            .get_json(
                "/like",
                &[("id", track_id.to_string()), ("like", like.to_string())],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ByteSource for CatalogClient {
    async fn open(&self, stream: &StreamRef) -> Result<AudioStream, TransferError> {
        // 音频 CDN 下载可能远超接口超时，这里不设置整体超时
        let resp = self
            .client
            .get(&stream.url)
            .timeout(Duration::from_secs(24 * 3600))
            .send()
            .await?
            .error_for_status()?;

        let content_length = resp.content_length();
        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(TransferError::from))
            .boxed();

        Ok(AudioStream {
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_success() {
        let resp: SublistResponse = decode_response(json!({
            "code": 200,
            "data": [{"id": 6452, "name": "周杰伦"}],
            "hasMore": true
        }))
        .unwrap();
        assert_eq!(resp.data.len(), 1);
        assert!(resp.has_more);
    }

    #[test]
    fn test_decode_api_error() {
        let err = decode_response::<SublistResponse>(json!({
            "code": 301,
            "msg": "需要登录"
        }))
        .unwrap_err();

        match err {
            FetchError::Api { code, message } => {
                assert_eq!(code, 301);
                assert_eq!(message, "需要登录");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed() {
        let err = decode_response::<SongUrlResponse>(json!({
            "code": 200,
            "data": "oops"
        }))
        .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn test_client_creation() {
        let config = CatalogConfig {
            api_base_url: "http://localhost:3000/".to_string(),
            cookie: Some("MUSIC_U=abc".to_string()),
            ..CatalogConfig::default()
        };
        let client = CatalogClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:3000");
        assert_eq!(client.page_size, 7);
    }

    #[test]
    fn test_client_rejects_bad_cookie() {
        let config = CatalogConfig {
            cookie: Some("MUSIC_U=a\nb".to_string()),
            ..CatalogConfig::default()
        };
        assert!(CatalogClient::new(&config).is_err());
    }
}
