pub mod load;
pub mod save;
pub mod types;

pub use types::{
    Config, CutterSettings, DetectionOrder, DetectionSettings, FileTypeTable, MAX_RECENT_PATHS,
    ProxyMode, UserSettings,
};
