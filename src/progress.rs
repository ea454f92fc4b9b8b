//! 下载进度
//!
//! 进度不单独存储，每次轮询都从曲目记录的原子计数现算。

use crate::track::Track;
use std::sync::Arc;
use tracing::debug;

/// 可渲染的进度
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressView {
    /// 总大小未知
    Indeterminate,
    /// 已在本地
    Completed,
    /// 0.0 ~ 1.0
    Fraction(f64),
}

impl ProgressView {
    pub fn of(track: &Track) -> Self {
        if track.is_local() {
            return ProgressView::Completed;
        }
        let size = track.size();
        if size == 0 {
            return ProgressView::Indeterminate;
        }
        let fraction = track.transferred() as f64 / size as f64;
        ProgressView::Fraction(fraction.clamp(0.0, 1.0))
    }

    /// 百分比，大小未知时为 None
    pub fn percent(&self) -> Option<f64> {
        match self {
            ProgressView::Indeterminate => None,
            ProgressView::Completed => Some(100.0),
            ProgressView::Fraction(f) => Some(f * 100.0),
        }
    }
}

impl std::fmt::Display for ProgressView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressView::Indeterminate => write!(f, "--"),
            ProgressView::Completed => write!(f, "✓"),
            ProgressView::Fraction(v) => write!(f, "{:.0}%", v * 100.0),
        }
    }
}

/// 轮询中的曲目
///
/// 曲目进入本地或下载失败（不再 downloading 也不在本地）后移出
#[derive(Debug, Default)]
pub struct Watchlist {
    tracks: Vec<Arc<Track>>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入轮询，重复加入忽略
    pub fn add(&mut self, track: Arc<Track>) {
        if !self.tracks.iter().any(|t| t.id == track.id) {
            self.tracks.push(track);
        }
    }

    /// 读取一次所有曲目的进度，并移出已结束的曲目
    pub fn poll(&mut self) -> Vec<(Arc<Track>, ProgressView)> {
        let snapshot: Vec<_> = self
            .tracks
            .iter()
            .map(|t| (t.clone(), ProgressView::of(t)))
            .collect();

        let before = self.tracks.len();
        self.tracks.retain(|t| t.is_downloading() && !t.is_local());
        if self.tracks.len() != before {
            debug!("轮询列表: {} -> {}", before, self.tracks.len());
        }

        snapshot
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::model::descriptor;

    #[test]
    fn test_progress_view() {
        let track = Track::new(descriptor(1, "x"));
        assert_eq!(ProgressView::of(&track), ProgressView::Indeterminate);
        assert_eq!(ProgressView::of(&track).percent(), None);

        assert!(track.begin_download());
        track.set_size(1000);
        track.add_transferred(250);
        assert_eq!(ProgressView::of(&track), ProgressView::Fraction(0.25));
        assert_eq!(ProgressView::of(&track).to_string(), "25%");

        track.add_transferred(750);
        track.finish_download();
        assert_eq!(ProgressView::of(&track), ProgressView::Completed);
        assert_eq!(ProgressView::of(&track).percent(), Some(100.0));
    }

    #[test]
    fn test_fraction_is_clamped() {
        let track = Track::new(descriptor(1, "x"));
        assert!(track.begin_download());
        track.set_size(100);
        track.add_transferred(150);
        assert_eq!(ProgressView::of(&track), ProgressView::Fraction(1.0));
    }

    #[test]
    fn test_watchlist_drops_finished_tracks() {
        let done = Arc::new(Track::new(descriptor(1, "done")));
        let failed = Arc::new(Track::new(descriptor(2, "failed")));
        let running = Arc::new(Track::new(descriptor(3, "running")));
        for t in [&done, &failed, &running] {
            assert!(t.begin_download());
        }

        let mut watchlist = Watchlist::new();
        watchlist.add(done.clone());
        watchlist.add(failed.clone());
        watchlist.add(running.clone());
        watchlist.add(running.clone());
        assert_eq!(watchlist.len(), 3);

        done.finish_download();
        failed.abort_download();

        let views = watchlist.poll();
        assert_eq!(views.len(), 3);
        assert_eq!(views[0].1, ProgressView::Completed);
        assert_eq!(watchlist.len(), 1);

        running.finish_download();
        watchlist.poll();
        assert!(watchlist.is_empty());
    }
}
