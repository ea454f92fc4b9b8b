// 分页菜单模块

pub mod cache;
pub mod paginated;
pub mod sources;

pub use cache::{MemoCache, PageCache, TrackListCache};
pub use paginated::{EntryKey, MenuEntry, MenuState, PageSource, PaginatedMenu, Selection};
pub use sources::{standard_menus, CatalogPageSource, ResourceMenu, SearchBar};
