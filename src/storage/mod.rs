pub mod backend;
pub mod codec;

pub use backend::{JsonFileStorage, Storage};

/// Keys of the flat key/value storage document.
pub const KEY_FINDINGS: &str = "findings";
pub const KEY_FINDINGS_MAP: &str = "findingsMap";
pub const KEY_ACTIVE_TAB: &str = "activeTab";
pub const KEY_NOTIFICATIONS: &str = "notifications";
pub const KEY_PATTERNS: &str = "patterns";
