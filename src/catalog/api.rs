//! 远程协作方接口
//!
//! 核心模块只依赖这里的 trait，HTTP 实现见 `client.rs`，测试使用内存实现

use super::types::{Page, Resource, StreamRef, TrackListRef};
use crate::error::{FetchError, TransferError};
use crate::track::TrackDescriptor;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// 远程曲库
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// 分页列表；同一参数多次调用必须返回相同结果
    async fn fetch_page(&self, resource: &Resource, owner: u64, page: u32)
        -> Result<Page, FetchError>;

    /// 曲目列表
    async fn fetch_tracks(&self, list: TrackListRef) -> Result<Vec<TrackDescriptor>, FetchError>;

    /// 可播放音频地址，`None` 表示没有可用音频（非异常）
    async fn fetch_stream_ref(
        &self,
        track_id: u64,
        quality: &str,
    ) -> Result<Option<StreamRef>, FetchError>;

    /// 曲目时长（毫秒）
    async fn fetch_track_duration(&self, track_id: u64) -> Result<u64, FetchError>;

    /// 用户喜欢的曲目 id
    async fn fetch_like_list(&self, user_id: u64) -> Result<Vec<u64>, FetchError>;

    /// 喜欢 / 取消喜欢
    async fn set_like(&self, track_id: u64, like: bool) -> Result<(), FetchError>;
}

/// 音频字节流
pub struct AudioStream {
    /// 响应头给出的总长度
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Vec<u8>, TransferError>>,
}

impl std::fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// 打开音频地址得到字节流
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn open(&self, stream: &StreamRef) -> Result<AudioStream, TransferError>;
}
