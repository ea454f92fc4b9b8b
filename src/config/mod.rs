// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 曲库接口配置
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// 下载配置
    #[serde(default)]
    pub download: DownloadConfig,
    /// 界面轮询配置
    #[serde(default)]
    pub ui: UiConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 曲库接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// 接口网关地址（NeteaseCloudMusicApi 兼容）
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// 登录后的会话 Cookie（登录流程不在本程序内）
    #[serde(default)]
    pub cookie: Option<String>,
    /// 当前用户 id
    #[serde(default)]
    pub user_id: u64,
    /// 订阅列表每页条目数
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// 搜索每页条目数
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    /// 音质等级
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
    /// 请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_page_size() -> u32 {
    7
}

fn default_search_limit() -> u32 {
    50
}

fn default_audio_quality() -> String {
    "exhigh".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            cookie: None,
            user_id: 0,
            page_size: default_page_size(),
            search_limit: default_search_limit(),
            audio_quality: default_audio_quality(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// 下载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// 下载目录
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// 下载线程数
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// 写盘分片大小 (KB)
    #[serde(default = "default_chunk_size_kb")]
    pub chunk_size_kb: u64,
    /// 文件扩展名
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_workers() -> usize {
    4
}

fn default_chunk_size_kb() -> u64 {
    128
}

fn default_file_extension() -> String {
    "mp3".to_string()
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_workers: default_max_workers(),
            chunk_size_kb: default_chunk_size_kb(),
            file_extension: default_file_extension(),
        }
    }
}

impl DownloadConfig {
    /// 分片大小（字节）
    pub fn chunk_size(&self) -> usize {
        (self.chunk_size_kb * 1024) as usize
    }

    /// 曲目的本地文件路径：`<download_dir>/<id>.<ext>`
    pub fn track_path(&self, track_id: u64) -> PathBuf {
        self.download_dir
            .join(format!("{}.{}", track_id, self.file_extension))
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            anyhow::bail!("下载线程数必须大于 0");
        }
        if self.chunk_size_kb == 0 {
            anyhow::bail!("分片大小必须大于 0");
        }
        if self.file_extension.is_empty() || self.file_extension.contains(|c| matches!(c, '/' | '\\' | '.')) {
            anyhow::bail!("文件扩展名无效: {:?}", self.file_extension);
        }
        Ok(())
    }
}

/// 界面配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// 下载进度轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 本地音频代理地址，在线播放时交给播放器
    #[serde(default = "default_proxy_base_url")]
    pub proxy_base_url: String,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_proxy_base_url() -> String {
    "http://127.0.0.1:5000/track".to_string()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            proxy_base_url: default_proxy_base_url(),
        }
    }
}

impl UiConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否写日志文件（终端界面运行时控制台输出会被界面覆盖）
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

impl AppConfig {
    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.catalog.page_size == 0 || self.catalog.search_limit == 0 {
            anyhow::bail!("每页条目数必须大于 0");
        }
        if self.catalog.api_base_url.trim().is_empty() {
            anyhow::bail!("接口地址不能为空");
        }
        self.download.validate().context("下载配置无效")
    }

    /// 从文件加载配置
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        let config: AppConfig = toml::from_str(&content).context("解析配置文件失败")?;
        config.validate()?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.validate().context("保存配置失败")?;

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        // 确保父目录存在
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("创建配置目录失败")?;
            }
        }

        fs::write(path, content).await.context("写入配置文件失败")?;

        tracing::info!("✓ 配置已保存: {:?}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {:?}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                let default_config = Self::default();

                // 首次启动：自动创建默认下载目录
                if !default_config.download.download_dir.exists() {
                    match std::fs::create_dir_all(&default_config.download.download_dir) {
                        Ok(()) => tracing::info!(
                            "✓ 已创建默认下载目录: {:?}",
                            default_config.download.download_dir
                        ),
                        Err(e) => tracing::error!(
                            "无法创建默认下载目录 {:?}: {}",
                            default_config.download.download_dir,
                            e
                        ),
                    }
                }

                // 配置文件不存在时写入默认配置；解析失败时保留原文件
                if !path.exists() {
                    if let Err(e) = default_config.save_to_file(path).await {
                        tracing::error!("保存默认配置失败: {:#}", e);
                    }
                }

                default_config
            }
        }
    }
}
