//! 播放队列
//!
//! 只负责“下一首放什么、从哪里放”，真正的解码播放交给外部媒体引擎。

use crate::config::{DownloadConfig, UiConfig};
use crate::error::FetchError;
use crate::library::TrackCatalog;
use crate::track::Track;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// 播放模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayMode {
    /// 列表循环
    #[default]
    Loop,
    /// 单曲循环
    Single,
    /// 随机播放
    Shuffle,
}

impl PlayMode {
    /// 列表循环 -> 单曲循环 -> 随机播放 -> 列表循环
    pub fn toggle(self) -> Self {
        match self {
            PlayMode::Loop => PlayMode::Single,
            PlayMode::Single => PlayMode::Shuffle,
            PlayMode::Shuffle => PlayMode::Loop,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlayMode::Loop => "🔁 列表循环",
            PlayMode::Single => "🔂 单曲循环",
            PlayMode::Shuffle => "🔀 随机播放",
        }
    }
}

/// 交给媒体引擎的音源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaySource {
    /// 本地文件
    Local(PathBuf),
    /// 本地音频代理地址
    Remote(String),
}

#[derive(Debug)]
pub struct PlayQueue {
    playlist: Vec<Arc<Track>>,
    index: usize,
    current: Option<Arc<Track>>,
    mode: PlayMode,
    download: DownloadConfig,
    proxy_base_url: String,
}

impl PlayQueue {
    pub fn new(download: DownloadConfig, ui: &UiConfig) -> Self {
        Self {
            playlist: Vec::new(),
            index: 0,
            current: None,
            mode: PlayMode::default(),
            download,
            proxy_base_url: ui.proxy_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn toggle_mode(&mut self) -> PlayMode {
        self.mode = self.mode.toggle();
        debug!("播放模式: {}", self.mode.label());
        self.mode
    }

    pub fn current(&self) -> Option<&Arc<Track>> {
        self.current.as_ref()
    }

    pub fn playlist(&self) -> &[Arc<Track>] {
        &self.playlist
    }

    /// 开始播放某首曲目
    pub fn play(&mut self, track: Arc<Track>) {
        if let Some(pos) = self.playlist.iter().position(|t| t.id == track.id) {
            self.index = pos;
        }
        self.current = Some(track);
    }

    /// 替换播放列表，游标定位到当前曲目（不在列表中则为开头）
    pub fn set_playlist(&mut self, playlist: Vec<Arc<Track>>) {
        self.index = self
            .current
            .as_ref()
            .and_then(|cur| playlist.iter().position(|t| t.id == cur.id))
            .unwrap_or(0);
        self.playlist = playlist;
    }

    /// 下一首；随机模式下随机选一首
    pub fn next(&mut self) -> Option<Arc<Track>> {
        let len = self.playlist.len();
        if len == 0 {
            return None;
        }
        self.index = match self.mode {
            PlayMode::Shuffle => rand::thread_rng().gen_range(0..len),
            _ => (self.index + 1) % len,
        };
        self.advance()
    }

    pub fn prev(&mut self) -> Option<Arc<Track>> {
        let len = self.playlist.len();
        if len == 0 {
            return None;
        }
        self.index = (self.index + len - 1) % len;
        self.advance()
    }

    /// 当前曲目播放结束后接下来播放的曲目
    pub fn on_finished(&mut self) -> Option<Arc<Track>> {
        match (self.mode, &self.current) {
            (PlayMode::Single, Some(current)) => Some(current.clone()),
            _ => self.next(),
        }
    }

    /// 决定媒体引擎的音源
    ///
    /// 已在本地时直接播放文件；否则走本地代理，并先补全时长供进度条使用
    pub async fn source_for(
        &self,
        track: &Track,
        catalog: &TrackCatalog,
    ) -> Result<PlaySource, FetchError> {
        if track.is_local() {
            return Ok(PlaySource::Local(self.download.track_path(track.id)));
        }

        catalog.ensure_duration(track).await?;
        Ok(PlaySource::Remote(format!(
            "{}/{}",
            self.proxy_base_url, track.id
        )))
    }

    fn advance(&mut self) -> Option<Arc<Track>> {
        let track = self.playlist.get(self.index).cloned()?;
        self.current = Some(track.clone());
        Some(track)
    }
}

/// 毫秒时长格式化为 `m:ss`
pub fn format_duration(ms: u64) -> String {
    let secs = (ms + 500) / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}
