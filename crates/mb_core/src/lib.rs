pub mod error;
pub mod services;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use services::{Analyzer, ContentExtractor, Publisher, SourceFeed};
pub use storage::ArticleStore;
pub use types::*;
