//! 下载管理器
//!
//! 固定数量的下载线程从同一个队列取任务。
//! 同一曲目同一时刻最多一个存活任务：`tasks` 表的 entry 锁把同 id 的提交串行化，
//! 重复提交拿到的是已有任务的句柄。

use crate::catalog::{ByteSource, CatalogApi};
use crate::config::DownloadConfig;
use crate::downloader::events::DownloadEvent;
use crate::downloader::task::{DownloadTask, TaskStatus};
use crate::downloader::transfer;
use crate::error::{DownloadError, TransferError};
use crate::track::Track;
use anyhow::{Context, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 事件通道容量
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 存活任务
#[derive(Debug)]
struct LiveTask {
    task_id: String,
    status: Arc<watch::Sender<TaskStatus>>,
}

/// 队列中的任务
struct Job {
    task: DownloadTask,
    status: Arc<watch::Sender<TaskStatus>>,
}

/// 下载线程共享的状态
struct Shared {
    api: Arc<dyn CatalogApi>,
    source: Arc<dyn ByteSource>,
    quality: String,
    chunk_size: usize,
    tasks: DashMap<u64, LiveTask>,
    events: broadcast::Sender<DownloadEvent>,
}

/// 下载管理器
pub struct DownloadManager {
    shared: Arc<Shared>,
    config: DownloadConfig,
    /// 关闭后为 None，不再接受新任务
    queue_tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("download_dir", &self.config.download_dir)
            .field("active", &self.shared.tasks.len())
            .finish_non_exhaustive()
    }
}

impl DownloadManager {
    /// 创建下载管理器并启动下载线程，需在 tokio 运行时内调用
    pub fn new(
        config: DownloadConfig,
        quality: impl Into<String>,
        api: Arc<dyn CatalogApi>,
        source: Arc<dyn ByteSource>,
    ) -> Result<Self> {
        if !config.download_dir.exists() {
            std::fs::create_dir_all(&config.download_dir).context("创建下载目录失败")?;
            info!("✓ 下载目录已创建: {:?}", config.download_dir);
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            api,
            source,
            quality: quality.into(),
            chunk_size: config.chunk_size(),
            tasks: DashMap::new(),
            events,
        });

        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Job>();
        let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));

        let worker_count = config.max_workers.max(1);
        let workers = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(worker_loop(worker_id, shared.clone(), queue_rx.clone()))
            })
            .collect();

        info!(
            "创建下载管理器: 下载目录={:?}, 下载线程数={}, 分片大小={}KB",
            config.download_dir, worker_count, config.chunk_size_kb
        );

        Ok(Self {
            shared,
            config,
            queue_tx: Mutex::new(Some(queue_tx)),
            workers: Mutex::new(workers),
        })
    }

    /// 提交下载
    ///
    /// - 已在本地：返回已完成的句柄，不发起任何请求
    /// - 已有存活任务：返回该任务的句柄
    /// - 否则置 downloading、重置传输计数并入队
    pub fn submit(&self, track: Arc<Track>) -> Result<DownloadHandle, DownloadError> {
        let track_id = track.id;
        if track.is_local() {
            return Ok(DownloadHandle::detached(track_id, TaskStatus::Completed));
        }

        let guard = self.queue_tx.lock();
        let Some(queue) = guard.as_ref() else {
            return Err(DownloadError::ShuttingDown);
        };

        match self.shared.tasks.entry(track_id) {
            Entry::Occupied(live) => {
                debug!("曲目 {} 已有下载任务 {}", track_id, live.get().task_id);
                Ok(DownloadHandle::new(
                    Some(live.get().task_id.clone()),
                    track_id,
                    live.get().status.subscribe(),
                ))
            }
            Entry::Vacant(slot) => {
                if !track.begin_download() {
                    if track.is_local() {
                        return Ok(DownloadHandle::detached(track_id, TaskStatus::Completed));
                    }
                    // downloading 已置位却没有本管理器的任务：由别处在下载
                    warn!("曲目 {} 正在由其他下载器下载，本次提交不创建任务", track_id);
                    return Ok(DownloadHandle::detached(track_id, TaskStatus::Downloading));
                }

                let task = DownloadTask::new(track, self.config.track_path(track_id));
                let task_id = task.id.clone();
                let (status_tx, status_rx) = watch::channel(TaskStatus::Queued);
                let status = Arc::new(status_tx);

                let job = Job {
                    task,
                    status: status.clone(),
                };
                if let Err(mpsc::error::SendError(job)) = queue.send(job) {
                    // 下载线程已全部退出
                    job.task.track.abort_download();
                    return Err(DownloadError::ShuttingDown);
                }

                slot.insert(LiveTask {
                    task_id: task_id.clone(),
                    status,
                });
                info!("下载任务入队: track_id={}, task_id={}", track_id, task_id);
                self.shared.publish(DownloadEvent::Queued {
                    task_id: task_id.clone(),
                    track_id,
                });

                Ok(DownloadHandle::new(Some(task_id), track_id, status_rx))
            }
        }
    }

    /// 停止接受新任务，等待队列中和进行中的任务全部结束
    pub async fn shutdown(&self) {
        // 释放发送端后，下载线程取完剩余任务即退出
        let sender = self.queue_tx.lock().take();
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }

        info!("等待 {} 个下载线程结束...", workers.len());
        for worker in workers {
            if let Err(e) = worker.await {
                error!("下载线程异常退出: {}", e);
            }
        }
        info!("✓ 下载管理器已关闭");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.queue_tx.lock().is_none()
    }

    /// 存活任务数（排队中 + 下载中）
    pub fn active_count(&self) -> usize {
        self.shared.tasks.len()
    }

    /// 曲目当前任务状态，无存活任务时为 None
    pub fn task_status(&self, track_id: u64) -> Option<TaskStatus> {
        self.shared
            .tasks
            .get(&track_id)
            .map(|live| live.status.borrow().clone())
    }

    /// 订阅下载事件
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.shared.events.subscribe()
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }
}

/// 下载线程：从共享队列取任务直到队列关闭
async fn worker_loop(
    worker_id: usize,
    shared: Arc<Shared>,
    queue: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>>,
) {
    debug!("下载线程 #{} 启动", worker_id);
    loop {
        let job = {
            let mut queue = queue.lock().await;
            queue.recv().await
        };
        let Some(job) = job else {
            break;
        };
        shared.run(worker_id, job).await;
    }
    debug!("下载线程 #{} 退出", worker_id);
}

impl Shared {
    fn publish(&self, event: DownloadEvent) {
        // 没有订阅者时发送失败，忽略
        let _ = self.events.send(event);
    }

    async fn run(&self, worker_id: usize, job: Job) {
        let Job { task, status } = job;
        let track = task.track.clone();
        status.send_replace(TaskStatus::Downloading);
        debug!(
            "[下载线程{}] 开始下载: {} ({})",
            worker_id, track.name, track.id
        );

        match self.execute(&task).await {
            Ok(size) => {
                // 顺序：曲目状态 -> 移出存活表 -> 终态。
                // 等到终态的调用方再次提交时，必然不会拿到这个旧任务
                track.finish_download();
                self.tasks.remove(&track.id);
                info!("✓ 下载完成: {} ({}), {} bytes", track.name, track.id, size);
                status.send_replace(TaskStatus::Completed);
                self.publish(DownloadEvent::Completed {
                    task_id: task.id,
                    track_id: track.id,
                    size,
                });
            }
            Err(e) => {
                track.abort_download();
                self.tasks.remove(&track.id);
                match &e {
                    DownloadError::MissingResource { .. } => warn!("{}", e),
                    _ => error!("下载失败: {}", e),
                }
                let kind = e.kind();
                let message = e.to_string();
                status.send_replace(TaskStatus::Failed {
                    kind,
                    error: message.clone(),
                });
                self.publish(DownloadEvent::Failed {
                    task_id: task.id,
                    track_id: track.id,
                    kind,
                    error: message,
                });
            }
        }
    }

    /// 获取音频地址并写盘，返回文件大小
    async fn execute(&self, task: &DownloadTask) -> Result<u64, DownloadError> {
        let track = &task.track;
        let track_id = track.id;

        let stream_ref = self
            .api
            .fetch_stream_ref(track_id, &self.quality)
            .await
            .map_err(|source| DownloadError::Resolve { track_id, source })?
            .ok_or(DownloadError::MissingResource { track_id })?;
        if stream_ref.size > 0 {
            track.set_size(stream_ref.size);
        }

        let transfer_err = |source: TransferError| DownloadError::Transfer { track_id, source };

        let stream = self.source.open(&stream_ref).await.map_err(transfer_err)?;
        let expected = stream.content_length;
        if let Some(len) = expected {
            track.set_size(len);
        }

        // 先写 .part，校验完整后再改名，进程中途退出不会留下被当作已下载的半截文件
        let part_path = task.part_path();
        let result = transfer::write_stream(stream, &part_path, self.chunk_size, |chunk| {
            let transferred = track.add_transferred(chunk);
            self.publish(DownloadEvent::Progress {
                task_id: task.id.clone(),
                track_id,
                chunk,
                transferred,
                size: track.size(),
            });
        })
        .await
        .and_then(|written| match expected {
            Some(len) if len != written => Err(TransferError::Stream(format!(
                "数据不完整: {}/{} bytes",
                written, len
            ))),
            _ => Ok(written),
        });
        let result = match result {
            Ok(written) => tokio::fs::rename(&part_path, &task.local_path)
                .await
                .map(|()| written)
                .map_err(TransferError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(written) => {
                track.set_size(written);
                Ok(written)
            }
            Err(source) => {
                remove_partial(&part_path).await;
                Err(transfer_err(source))
            }
        }
    }
}

/// 删除未完成的文件
async fn remove_partial(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("已删除未完成的文件: {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("删除未完成的文件失败 {:?}: {}", path, e),
    }
}

/// 下载任务句柄
#[derive(Debug, Clone)]
pub struct DownloadHandle {
    task_id: Option<String>,
    track_id: u64,
    status: watch::Receiver<TaskStatus>,
}

impl DownloadHandle {
    fn new(task_id: Option<String>, track_id: u64, status: watch::Receiver<TaskStatus>) -> Self {
        Self {
            task_id,
            track_id,
            status,
        }
    }

    /// 不关联任务的句柄，状态不再变化
    fn detached(track_id: u64, status: TaskStatus) -> Self {
        let (_, rx) = watch::channel(status);
        Self::new(None, track_id, rx)
    }

    /// 任务 id，未创建任务时为 None
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status.borrow().clone()
    }

    /// 等待任务结束，返回终态
    pub async fn wait(mut self) -> TaskStatus {
        loop {
            let current = self.status.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.status.changed().await.is_err() {
                // 发送端已释放（下载线程异常退出）
                return self.status.borrow().clone();
            }
        }
    }
}
