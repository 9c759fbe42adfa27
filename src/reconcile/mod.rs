pub mod merge;
pub mod store;

pub use merge::merge;
pub use store::FindingStore;
