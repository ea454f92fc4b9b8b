//! 下载事件
//!
//! 通过 broadcast 通道推送，界面可以订阅事件而不必轮询

use crate::error::FailureKind;
use serde::Serialize;

/// 下载任务事件
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// 任务入队
    Queued { task_id: String, track_id: u64 },
    /// 进度更新（每个分片一次）
    Progress {
        task_id: String,
        track_id: u64,
        /// 本片长度
        chunk: u64,
        transferred: u64,
        /// 总大小，未知为 0
        size: u64,
    },
    /// 任务完成
    Completed {
        task_id: String,
        track_id: u64,
        size: u64,
    },
    /// 任务失败
    Failed {
        task_id: String,
        track_id: u64,
        kind: FailureKind,
        error: String,
    },
}

impl DownloadEvent {
    pub fn task_id(&self) -> &str {
        match self {
            DownloadEvent::Queued { task_id, .. } => task_id,
            DownloadEvent::Progress { task_id, .. } => task_id,
            DownloadEvent::Completed { task_id, .. } => task_id,
            DownloadEvent::Failed { task_id, .. } => task_id,
        }
    }

    pub fn track_id(&self) -> u64 {
        match self {
            DownloadEvent::Queued { track_id, .. }
            | DownloadEvent::Progress { track_id, .. }
            | DownloadEvent::Completed { track_id, .. }
            | DownloadEvent::Failed { track_id, .. } => *track_id,
        }
    }

    /// 是否为终态事件
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadEvent::Completed { .. } | DownloadEvent::Failed { .. }
        )
    }
}
