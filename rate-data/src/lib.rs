pub mod config;
pub mod loader;
pub mod logging;
pub mod report;

pub use config::{ConfigError, ToolConfig};
pub use loader::{BandRecord, LegacyFormat, TableLoader, TableLoaderError};
