//! Application services for the moodtunes server.

pub mod classifier;
pub mod library;
pub mod metadata;
pub mod resolver;
pub mod storage;

pub use classifier::EmotionClassifier;
pub use library::{import_library, ImportSummary};
pub use resolver::{MediaKind, PathResolver};
pub use storage::MediaStorage;
