// NetEase Cloud Music Rust Library
// 网易云音乐终端客户端核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 错误类型
pub mod error;

// 曲目模型与身份注册表
pub mod track;

// 曲库API模块
pub mod catalog;

// 分页菜单模块
pub mod menu;

// 曲目列表解析
pub mod library;

// 下载引擎模块
pub mod downloader;

// 下载进度
pub mod progress;

// 播放队列
pub mod playqueue;

// 应用上下文
pub mod context;

// 导出常用类型
pub use catalog::{CatalogApi, CatalogClient, Resource, SearchKind, TrackListRef};
pub use config::AppConfig;
pub use context::AppContext;
pub use downloader::{DownloadEvent, DownloadHandle, DownloadManager, DownloadTask, TaskStatus};
pub use error::{DownloadError, FailureKind, FetchError, TransferError};
pub use library::TrackCatalog;
pub use menu::{MenuState, PaginatedMenu, SearchBar, Selection};
pub use playqueue::{PlayMode, PlayQueue, PlaySource};
pub use progress::{ProgressView, Watchlist};
pub use track::{Track, TrackRegistry};
