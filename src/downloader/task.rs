use crate::error::FailureKind;
use crate::track::Track;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// 未完成下载文件的后缀
const PART_SUFFIX: &str = ".part";

/// 下载任务状态
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskStatus {
    /// 排队中
    Queued,
    /// 下载中
    Downloading,
    /// 已完成
    Completed,
    /// 失败
    Failed { kind: FailureKind, error: String },
}

impl TaskStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed { .. })
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            TaskStatus::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// 下载任务
///
/// 同一曲目 id 同一时刻最多只有一个存活任务（由 `DownloadManager` 保证）
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// 任务ID
    pub id: String,
    pub track: Arc<Track>,
    /// 本地保存路径
    pub local_path: PathBuf,
    /// 创建时间 (Unix timestamp)
    pub created_at: i64,
}

impl DownloadTask {
    pub fn new(track: Arc<Track>, local_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            track,
            local_path,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn track_id(&self) -> u64 {
        self.track.id
    }

    /// 下载中的临时文件：`<id>.<ext>.part`，成功后改名为 `local_path`
    ///
    /// 本地是否已下载只看 `local_path` 是否存在，半截文件不能落在这个路径上
    pub fn part_path(&self) -> PathBuf {
        let mut name = self.local_path.clone().into_os_string();
        name.push(PART_SUFFIX);
        PathBuf::from(name)
    }
}
