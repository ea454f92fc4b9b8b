use netease_music_rust::{
    config::{AppConfig, LogConfig, DEFAULT_CONFIG_PATH},
    logging, AppContext, DownloadError, DownloadEvent, TrackListRef, Watchlist,
};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 加载日志配置
///
/// 日志系统要先于完整配置初始化，这里只读取 `[log]` 段，失败时用默认值
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(DEFAULT_CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

/// 命令行参数中的曲目 id
fn track_ids_from_args() -> Vec<u64> {
    std::env::args()
        .skip(1)
        .filter_map(|arg| match arg.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("忽略无效的曲目 id: {}", arg);
                None
            }
        })
        .collect()
}

/// 加载首页菜单与每日推荐
async fn load_home(ctx: &AppContext) {
    for menu in ctx.standard_menus() {
        match menu.menu.load().await {
            Ok(state) => info!(
                "[{}] {} 项{}",
                menu.menu.title(),
                state.items().count(),
                if state.has_more { "，还有更多" } else { "" }
            ),
            Err(e) => warn!("[{}] 加载失败: {}", menu.menu.title(), e),
        }
    }

    match ctx.catalog.daily_recommend().await {
        Ok(tracks) => info!("[每日推荐] {} 首", tracks.len()),
        Err(e) => warn!("[每日推荐] 加载失败: {}", e),
    }
}

/// 提交下载并加入轮询列表
async fn submit_downloads(ctx: &AppContext, ids: &[u64], watchlist: &mut Watchlist) {
    for &id in ids {
        let tracks = match ctx.catalog.tracks(TrackListRef::Song(id)).await {
            Ok(tracks) => tracks,
            Err(e) => {
                error!("获取曲目 {} 详情失败: {}", id, e);
                continue;
            }
        };

        for track in tracks {
            if track.is_local() {
                info!("已在本地: {} - {}", track.name, track.artist_names());
                continue;
            }
            match ctx.downloads.submit(track.clone()) {
                Ok(_) => watchlist.add(track),
                Err(DownloadError::ShuttingDown) => return,
                Err(e) => error!("提交下载失败: {}", e),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 先初始化日志（必须保持 _log_guard 存活）
    let log_config = load_log_config().await;
    let _log_guard = logging::init_logging(&log_config);

    info!("网易云音乐客户端 v{} 启动", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(DEFAULT_CONFIG_PATH).await;
    let ctx = AppContext::new(config)?;

    load_home(&ctx).await;

    let mut watchlist = Watchlist::new();
    let mut events = ctx.downloads.subscribe();
    submit_downloads(&ctx, &track_ids_from_args(), &mut watchlist).await;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    let mut ticker = tokio::time::interval(ctx.config.ui.poll_interval());
    while !watchlist.is_empty() {
        tokio::select! {
            _ = ticker.tick() => {
                for (track, view) in watchlist.poll() {
                    info!("{} - {} [{}]", track.name, track.artist_names(), view);
                }
            }
            event = events.recv() => match event {
                Ok(DownloadEvent::Failed { track_id, error, .. }) => {
                    warn!("曲目 {} 下载失败: {}", track_id, error);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("下载事件积压，跳过 {} 条", n),
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.cancelled() => {
                info!("收到 Ctrl+C，等待进行中的下载结束...");
                break;
            }
        }
    }

    ctx.shutdown().await;
    info!("应用已安全退出");

    Ok(())
}
