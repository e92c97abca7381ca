pub mod config;
pub mod error;
pub mod event;
pub mod filemap;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{FileError, GraphError, Result, TaskloomError};
pub use event::EventBus;
pub use filemap::FileMap;
pub use types::*;
