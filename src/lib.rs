//! Metadata management for locally stored model checkpoint files: per-model
//! JSON records (source URL, trigger words, named prompt presets), Civitai
//! metadata retrieval, a bounded thumbnail cache and prompt/trigger-word
//! reconciliation. The interactive surface is external; hosts bind these
//! functions to whatever widgets they use.

pub mod civitai;
pub mod error;
pub mod hash;
pub mod manager;
pub mod prompt;
pub mod record;
pub mod store;
pub mod thumbnail;

pub use civitai::{CivitaiClient, HashLookup};
pub use error::{Error, Result};
pub use manager::{ModelOverview, PresetManager, APP_ID};
pub use record::{ModelRecord, DEFAULT_PRESET_NAME};
pub use store::{PresetStore, PRESET_SHARING_PREFIX};
pub use thumbnail::ThumbnailCache;
