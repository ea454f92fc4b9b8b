// 曲库 API 数据类型

use crate::track::{Artist, TrackDescriptor};
use serde::{Deserialize, Serialize};

/// 分页资源
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// 关注的艺人
    SubscribedArtists,
    /// 收藏的专辑
    SubscribedAlbums,
    /// 创建的歌单（单页）
    UserPlaylists,
    /// 搜索结果
    Search { kind: SearchKind, keyword: String },
}

impl Resource {
    /// 菜单标题
    pub fn title(&self) -> String {
        match self {
            Resource::SubscribedArtists => "关注的艺人".to_string(),
            Resource::SubscribedAlbums => "收藏的专辑".to_string(),
            Resource::UserPlaylists => "创建的歌单".to_string(),
            Resource::Search { kind, keyword } => format!("{}: {}", kind.placeholder(), keyword),
        }
    }

    /// 列表条目 key 对应的曲目列表
    pub fn track_list(&self, key: u64) -> TrackListRef {
        match self {
            Resource::SubscribedArtists => TrackListRef::ArtistTop(key),
            Resource::SubscribedAlbums => TrackListRef::Album(key),
            Resource::UserPlaylists => TrackListRef::Playlist(key),
            Resource::Search { kind, .. } => match kind {
                SearchKind::Song => TrackListRef::Song(key),
                SearchKind::Album => TrackListRef::Album(key),
                SearchKind::Artist => TrackListRef::ArtistTop(key),
                SearchKind::Playlist => TrackListRef::Playlist(key),
            },
        }
    }
}

/// 搜索类型，数值即 cloudsearch 的 type 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Song,
    Album,
    Artist,
    Playlist,
}

impl SearchKind {
    pub fn code(self) -> u32 {
        match self {
            SearchKind::Song => 1,
            SearchKind::Album => 10,
            SearchKind::Artist => 100,
            SearchKind::Playlist => 1000,
        }
    }

    /// 单曲 -> 专辑 -> 创作者 -> 歌单 -> 单曲
    pub fn next(self) -> Self {
        match self {
            SearchKind::Song => SearchKind::Album,
            SearchKind::Album => SearchKind::Artist,
            SearchKind::Artist => SearchKind::Playlist,
            SearchKind::Playlist => SearchKind::Song,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            SearchKind::Song => SearchKind::Playlist,
            SearchKind::Album => SearchKind::Song,
            SearchKind::Artist => SearchKind::Album,
            SearchKind::Playlist => SearchKind::Artist,
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            SearchKind::Song => "搜索单曲",
            SearchKind::Album => "搜索专辑",
            SearchKind::Artist => "搜索创作者",
            SearchKind::Playlist => "搜索歌单",
        }
    }
}

/// 分页缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub resource: Resource,
    /// 资源归属的用户 id，与用户无关的资源为 0
    pub owner: u64,
    pub page: u32,
}

/// 列表条目（显示文本，不透明 key）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageItem {
    pub label: String,
    pub key: u64,
}

impl PageItem {
    pub fn new(label: impl Into<String>, key: u64) -> Self {
        Self {
            label: label.into(),
            key,
        }
    }
}

/// 一页远程列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<PageItem>,
    pub has_more: bool,
}

/// 曲目列表引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackListRef {
    /// 艺人热门歌曲
    ArtistTop(u64),
    /// 专辑曲目
    Album(u64),
    /// 歌单曲目
    Playlist(u64),
    /// 单曲
    Song(u64),
    /// 每日推荐歌曲
    DailyRecommend,
}

/// 可播放音频地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRef {
    pub track_id: u64,
    pub url: String,
    /// 接口给出的文件大小，0 表示未知
    pub size: u64,
}

// === 接口响应结构 ===

/// 名称 + id 的通用条目（艺人、专辑订阅列表）
#[derive(Debug, Deserialize)]
pub struct NamedEntry {
    pub id: u64,
    pub name: String,
}

/// 订阅列表响应（/artist/sublist, /album/sublist）
#[derive(Debug, Deserialize)]
pub struct SublistResponse {
    #[serde(default)]
    pub data: Vec<NamedEntry>,
    #[serde(default, rename = "hasMore")]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct Creator {
    #[serde(default)]
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistEntry {
    pub id: u64,
    pub name: String,
    #[serde(default, rename = "trackCount")]
    pub track_count: u64,
    #[serde(default)]
    pub creator: Option<Creator>,
}

/// 用户歌单响应（/user/playlist）
#[derive(Debug, Deserialize)]
pub struct UserPlaylistResponse {
    #[serde(default)]
    pub playlist: Vec<PlaylistEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SongArtist {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SongAlbum {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// 歌曲详情
#[derive(Debug, Deserialize)]
pub struct Song {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub ar: Vec<SongArtist>,
    pub al: SongAlbum,
    /// 时长（毫秒）
    #[serde(default)]
    pub dt: u64,
}

impl From<Song> for TrackDescriptor {
    fn from(song: Song) -> Self {
        TrackDescriptor {
            id: song.id,
            name: song.name,
            artists: song
                .ar
                .into_iter()
                .map(|ar| Artist {
                    id: ar.id,
                    name: ar.name.unwrap_or_default(),
                })
                .collect(),
            album: song.al.name.unwrap_or_default(),
            album_id: song.al.id,
            duration_ms: song.dt,
        }
    }
}

/// 歌曲列表响应（/artist/top/song, /album, /playlist/track/all, /song/detail）
#[derive(Debug, Deserialize)]
pub struct SongsResponse {
    #[serde(default)]
    pub songs: Vec<Song>,
}

#[derive(Debug, Deserialize)]
pub struct DailySongs {
    #[serde(default, rename = "dailySongs")]
    pub daily_songs: Vec<Song>,
}

/// 每日推荐响应（/recommend/songs）
#[derive(Debug, Deserialize)]
pub struct DailyRecommendResponse {
    pub data: DailySongs,
}

#[derive(Debug, Deserialize)]
pub struct SongUrl {
    pub id: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// 音频地址响应（/song/url/v1）
#[derive(Debug, Deserialize)]
pub struct SongUrlResponse {
    #[serde(default)]
    pub data: Vec<SongUrl>,
}

/// 喜欢列表响应（/likelist）
#[derive(Debug, Deserialize)]
pub struct LikeListResponse {
    #[serde(default)]
    pub ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchAlbum {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub artist: Option<NamedEntry>,
    /// 发行时间（毫秒时间戳）
    #[serde(default, rename = "publishTime")]
    pub publish_time: i64,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub songs: Vec<Song>,
    #[serde(default, rename = "songCount")]
    pub song_count: u64,
    #[serde(default)]
    pub albums: Vec<SearchAlbum>,
    #[serde(default, rename = "albumCount")]
    pub album_count: u64,
    #[serde(default)]
    pub artists: Vec<NamedEntry>,
    #[serde(default, rename = "artistCount")]
    pub artist_count: u64,
    #[serde(default)]
    pub playlists: Vec<PlaylistEntry>,
    #[serde(default, rename = "playlistCount")]
    pub playlist_count: u64,
}

/// 搜索响应（/cloudsearch）
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub result: SearchResult,
}

impl SearchResult {
    /// 转换为一页列表条目
    ///
    /// `offset` 为本页第一条在全部结果中的位置，用于判断是否还有下一页
    pub fn into_page(self, kind: SearchKind, offset: u64) -> Page {
        let (items, total): (Vec<PageItem>, u64) = match kind {
            SearchKind::Song => (
                self.songs
                    .into_iter()
                    .map(|song| {
                        let artists = song
                            .ar
                            .iter()
                            .filter_map(|ar| ar.name.as_deref())
                            .collect::<Vec<_>>()
                            .join(" / ");
                        PageItem::new(format!("{} - {}", song.name, artists), song.id)
                    })
                    .collect(),
                self.song_count,
            ),
            SearchKind::Album => (
                self.albums
                    .into_iter()
                    .map(|al| {
                        let artist = al.artist.map(|ar| ar.name).unwrap_or_default();
                        let release = chrono::DateTime::from_timestamp_millis(al.publish_time)
                            .map(|t| t.date_naive().to_string())
                            .unwrap_or_default();
                        PageItem::new(
                            format!("{} - {} ({}, {}首)", al.name, artist, release, al.size),
                            al.id,
                        )
                    })
                    .collect(),
                self.album_count,
            ),
            SearchKind::Artist => (
                self.artists
                    .into_iter()
                    .map(|ar| PageItem::new(ar.name, ar.id))
                    .collect(),
                self.artist_count,
            ),
            SearchKind::Playlist => (
                self.playlists
                    .into_iter()
                    .map(|pl| {
                        let curator = pl.creator.map(|c| c.nickname).unwrap_or_default();
                        PageItem::new(
                            format!("{} by {} ({}首)", pl.name, curator, pl.track_count),
                            pl.id,
                        )
                    })
                    .collect(),
                self.playlist_count,
            ),
        };

        let has_more = offset + (items.len() as u64) < total;
        Page { items, has_more }
    }
}
