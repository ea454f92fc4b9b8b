// 曲目模型与身份注册表

pub mod model;
pub mod registry;

pub use model::{Artist, Track, TrackDescriptor};
pub use registry::TrackRegistry;
