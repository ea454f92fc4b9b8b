//! 核心错误类型
//!
//! 所有错误都在组件边界被恢复，并以状态/标记的形式交给 UI 渲染，
//! 不会导致整个会话退出

use thiserror::Error;

/// 远程列表/元数据请求失败
#[derive(Debug, Error)]
pub enum FetchError {
    /// 网络层错误
    #[error("网络请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// 接口返回非 200 业务码
    #[error("API 错误 {code}: {message}")]
    Api { code: i64, message: String },

    /// 响应结构无法解析
    #[error("响应解析失败: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}

/// 传输中途失败（网络或本地 I/O）
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("读取数据流失败: {0}")]
    Stream(String),

    #[error("写入文件失败: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TransferError {
    fn from(e: reqwest::Error) -> Self {
        TransferError::Stream(e.to_string())
    }
}

/// 下载任务错误
#[derive(Debug, Error)]
pub enum DownloadError {
    /// 没有可用的音频地址（无版权等），非异常情况
    #[error("曲目 {track_id} 没有可用的音频资源")]
    MissingResource { track_id: u64 },

    /// 获取音频地址时远程接口失败
    #[error("曲目 {track_id} 获取音频地址失败: {source}")]
    Resolve {
        track_id: u64,
        #[source]
        source: FetchError,
    },

    #[error("曲目 {track_id} 传输失败: {source}")]
    Transfer {
        track_id: u64,
        #[source]
        source: TransferError,
    },

    /// 下载管理器已停止接受新任务
    #[error("下载管理器正在关闭")]
    ShuttingDown,
}

/// 下载失败分类（可克隆，用于任务状态广播）
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingResource,
    Resolve,
    Transfer,
    ShuttingDown,
}

impl DownloadError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DownloadError::MissingResource { .. } => FailureKind::MissingResource,
            DownloadError::Resolve { .. } => FailureKind::Resolve,
            DownloadError::Transfer { .. } => FailureKind::Transfer,
            DownloadError::ShuttingDown => FailureKind::ShuttingDown,
        }
    }
}
