use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 艺人（id, 名称）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: u64,
    pub name: String,
}

/// 曲目描述（远程列表返回的不可变元数据）
///
/// 描述本身不带任何可变状态，可以放心缓存；
/// 需要共享状态时通过 `TrackRegistry` 解析为 `Arc<Track>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: u64,
    pub name: String,
    pub artists: Vec<Artist>,
    pub album: String,
    pub album_id: u64,
    /// 时长（毫秒），未知为 0
    #[serde(default)]
    pub duration_ms: u64,
}

/// 曲目记录
///
/// 同一 id 在任意时刻只有一个存活实例（由 `TrackRegistry` 保证），
/// 菜单、曲目表、播放器、下载管理器共享同一份。
///
/// 可变字段全部是原子量：每个字段同一时刻只有一个写者
/// （下载任务写传输计数，UI 写 liked），轮询读取无需加锁。
#[derive(Debug)]
pub struct Track {
    pub id: u64,
    pub name: String,
    pub artists: Vec<Artist>,
    pub album: String,
    pub album_id: u64,

    duration_ms: AtomicU64,
    /// 音频总字节数，未知为 0
    size: AtomicU64,
    /// 本次下载已传输字节数
    transferred: AtomicU64,
    /// 本地文件是否存在
    local: AtomicBool,
    liked: AtomicBool,
    downloading: AtomicBool,
    /// liked/local 探测是否已执行
    probed: AtomicBool,
}

impl Track {
    pub fn new(descriptor: TrackDescriptor) -> Self {
        Self {
            id: descriptor.id,
            name: descriptor.name,
            artists: descriptor.artists,
            album: descriptor.album,
            album_id: descriptor.album_id,
            duration_ms: AtomicU64::new(descriptor.duration_ms),
            size: AtomicU64::new(0),
            transferred: AtomicU64::new(0),
            local: AtomicBool::new(false),
            liked: AtomicBool::new(false),
            downloading: AtomicBool::new(false),
            probed: AtomicBool::new(false),
        }
    }

    /// 艺人名拼接，用于列表展示
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms.load(Ordering::Acquire)
    }

    pub fn set_duration_ms(&self, ms: u64) {
        self.duration_ms.store(ms, Ordering::Release);
    }

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Acquire)
    }

    pub fn is_local(&self) -> bool {
        self.local.load(Ordering::SeqCst)
    }

    pub fn is_liked(&self) -> bool {
        self.liked.load(Ordering::Acquire)
    }

    pub fn set_liked(&self, liked: bool) {
        self.liked.store(liked, Ordering::Release);
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading.load(Ordering::SeqCst)
    }

    /// 执行一次性的 liked/local 探测
    ///
    /// 只有第一个调用者会执行 `probe`，返回是否真正执行了探测。
    /// 探测结果不会覆盖下载中途或已完成下载得到的状态。
    pub fn probe_once<F>(&self, probe: F) -> bool
    where
        F: FnOnce() -> (bool, bool),
    {
        if self
            .probed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let (liked, local) = probe();
        self.liked.store(liked, Ordering::Release);
        if local && !self.is_downloading() {
            self.local.store(true, Ordering::SeqCst);
        }
        true
    }

    // === 下载状态（仅由下载管理器调用） ===

    /// 开始新一轮下载：置 downloading，并重置传输计数
    ///
    /// 已在下载或已在本地时返回 false
    pub(crate) fn begin_download(&self) -> bool {
        if self.is_local() {
            return false;
        }
        if self
            .downloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.transferred.store(0, Ordering::Release);
        true
    }

    pub(crate) fn set_size(&self, size: u64) {
        self.size.store(size, Ordering::Release);
    }

    /// 累加已传输字节，返回累加后的值
    pub(crate) fn add_transferred(&self, len: u64) -> u64 {
        self.transferred.fetch_add(len, Ordering::AcqRel) + len
    }

    /// 下载成功：先清 downloading 再置 local，
    /// 观察到 local 的读者必然看到 downloading == false
    pub(crate) fn finish_download(&self) {
        self.downloading.store(false, Ordering::SeqCst);
        self.local.store(true, Ordering::SeqCst);
    }

    pub(crate) fn abort_download(&self) {
        self.downloading.store(false, Ordering::SeqCst);
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl std::hash::Hash for Track {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
pub(crate) fn descriptor(id: u64, name: &str) -> TrackDescriptor {
    TrackDescriptor {
        id,
        name: name.to_string(),
        artists: vec![Artist {
            id: 1000 + id,
            name: format!("artist-{}", id),
        }],
        album: format!("album-{}", id),
        album_id: 2000 + id,
        duration_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_creation() {
        let track = Track::new(descriptor(1, "晴天"));
        assert_eq!(track.id, 1);
        assert_eq!(track.size(), 0);
        assert_eq!(track.transferred(), 0);
        assert!(!track.is_local());
        assert!(!track.is_liked());
        assert!(!track.is_downloading());
    }

    #[test]
    fn test_artist_names() {
        let mut d = descriptor(1, "x");
        d.artists.push(Artist {
            id: 9,
            name: "second".to_string(),
        });
        let track = Track::new(d);
        assert_eq!(track.artist_names(), "artist-1 / second");
    }

    #[test]
    fn test_probe_runs_once() {
        let track = Track::new(descriptor(1, "x"));
        assert!(track.probe_once(|| (true, true)));
        assert!(track.is_liked());
        assert!(track.is_local());

        // 第二次探测不执行
        assert!(!track.probe_once(|| (false, false)));
        assert!(track.is_liked());
        assert!(track.is_local());
    }

    #[test]
    fn test_download_state_transitions() {
        let track = Track::new(descriptor(1, "x"));
        assert!(track.begin_download());
        assert!(!track.begin_download());
        assert!(track.is_downloading());

        track.set_size(100);
        assert_eq!(track.add_transferred(40), 40);
        assert_eq!(track.add_transferred(60), 100);

        track.finish_download();
        assert!(track.is_local());
        assert!(!track.is_downloading());

        // 已在本地，不会再次开始
        assert!(!track.begin_download());
    }

    #[test]
    fn test_new_attempt_resets_transferred() {
        let track = Track::new(descriptor(1, "x"));
        assert!(track.begin_download());
        track.add_transferred(500);
        track.abort_download();
        assert!(!track.is_local());

        assert!(track.begin_download());
        assert_eq!(track.transferred(), 0);
    }
}
