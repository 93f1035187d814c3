pub mod models;

pub use models::{MusicCatalog, MusicEntry, Tier, TierLevels};
