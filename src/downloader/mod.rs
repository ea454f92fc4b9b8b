pub mod events;
pub mod manager;
pub mod task;
pub mod transfer;

pub use events::DownloadEvent;
pub use manager::{DownloadHandle, DownloadManager};
pub use task::{DownloadTask, TaskStatus};
