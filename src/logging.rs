//! 日志系统
//!
//! 终端界面占用标准输出，控制台层写到 stderr；
//! 文件层经 `tracing_appender::non_blocking` 写入按大小滚动的日志文件，
//! 启动时清理超过保留天数的旧文件。

use crate::config::LogConfig;
use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "netease-music.";
const LOG_FILE_SUFFIX: &str = ".log";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

struct RotationState {
    dir: PathBuf,
    /// 启动时间（YYYY-MM-DD-HHMMSS），同一次运行的文件共用
    session: String,
    /// 滚动序号，0 为首个文件
    index: u32,
    file: File,
    written: u64,
    max_size: u64,
}

impl RotationState {
    fn path_for(dir: &Path, session: &str, index: u32) -> PathBuf {
        let name = match index {
            0 => format!("{}{}{}", LOG_FILE_PREFIX, session, LOG_FILE_SUFFIX),
            n => format!("{}{}_{}{}", LOG_FILE_PREFIX, session, n, LOG_FILE_SUFFIX),
        };
        dir.join(name)
    }

    fn open(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // 空文件总是接受写入，单条超长日志不会无限滚动
        if self.written > 0 && self.written + buf.len() as u64 > self.max_size {
            self.file.flush()?;
            self.index += 1;
            self.file = Self::open(&Self::path_for(&self.dir, &self.session, self.index))?;
            self.written = 0;
        }

        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }
}

/// 按大小滚动的日志文件
#[derive(Clone)]
pub struct RotatingLogFile {
    state: Arc<Mutex<RotationState>>,
}

impl RotatingLogFile {
    pub fn new(dir: impl Into<PathBuf>, max_size: u64) -> io::Result<Self> {
        let dir = dir.into();
        let session = Local::now().format("%Y-%m-%d-%H%M%S").to_string();
        let file = RotationState::open(&RotationState::path_for(&dir, &session, 0))?;

        Ok(Self {
            state: Arc::new(Mutex::new(RotationState {
                dir,
                session,
                index: 0,
                file,
                written: 0,
                max_size: max_size.max(1),
            })),
        })
    }

    /// 当前写入的文件路径
    pub fn current_path(&self) -> PathBuf {
        let state = self.state.lock();
        RotationState::path_for(&state.dir, &state.session, state.index)
    }
}

impl Write for RotatingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.lock().file.flush()
    }
}

/// 日志守卫，drop 时刷出文件层缓冲
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 初始化全局日志
///
/// `RUST_LOG` 优先于配置中的级别。文件层创建失败时只保留控制台输出。
pub fn init_logging(config: &LogConfig) -> LogGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_writer(io::stderr);

    let (file_layer, file_guard) = match config.enabled.then(|| open_log_file(config)) {
        Some(Ok(file)) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_target(true)
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Some(Err(e)) => {
            eprintln!("日志文件创建失败，仅输出到控制台: {}", e);
            (None, None)
        }
        None => (None, None),
    };
    let file_enabled = file_layer.is_some();

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed && file_enabled {
        info!(
            "日志系统初始化完成: 目录={:?}, 保留天数={}, 级别={}, 单文件最大={:.1}MB",
            config.log_dir,
            config.retention_days,
            config.level,
            config.max_file_size as f64 / 1024.0 / 1024.0
        );
        let removed = cleanup_old_logs(&config.log_dir, config.retention_days, Local::now().date_naive());
        if removed > 0 {
            info!("已清理 {} 个过期日志文件", removed);
        }
    } else if installed {
        info!("日志系统初始化完成（仅控制台输出）");
    }

    LogGuard {
        _file_guard: file_guard,
    }
}

fn open_log_file(config: &LogConfig) -> io::Result<RotatingLogFile> {
    fs::create_dir_all(&config.log_dir)?;
    RotatingLogFile::new(&config.log_dir, config.max_file_size)
}

/// 删除超过保留天数的日志文件，返回删除数量
///
/// 日期优先取文件名中的 YYYY-MM-DD，取不到时用修改时间
fn cleanup_old_logs(dir: &Path, retention_days: u32, today: NaiveDate) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("读取日志目录失败: {:?}, 错误: {}", dir, e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file() || !name.starts_with(LOG_FILE_PREFIX) || !name.ends_with(LOG_FILE_SUFFIX)
        {
            continue;
        }

        let date = log_file_date(name).or_else(|| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(|t| chrono::DateTime::<Local>::from(t).date_naive())
        });
        let Some(date) = date else {
            continue;
        };

        if (today - date).num_days() > retention_days as i64 {
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!("已删除过期日志文件: {:?}", path);
                }
                Err(e) => tracing::warn!("删除过期日志文件失败: {:?}, 错误: {}", path, e),
            }
        }
    }
    removed
}

/// `netease-music.2024-05-01-083000_2.log` -> 2024-05-01
fn log_file_date(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix(LOG_FILE_PREFIX)?;
    let date = stem.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
