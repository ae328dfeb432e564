pub mod app_config;
pub mod config;
pub mod error;
pub mod profile;
pub mod records;
pub mod result;
pub mod store;

pub use app_config::{seconds, AppConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, StoreError};
pub use profile::{load_profile, ScrapeProfile};
pub use records::{review_id, ProductRecord, ReviewDate, ReviewDraft, ReviewRecord};
pub use result::{ReviewSource, ScrapeData, ScrapeMethod, ScrapeResponse, ScrapeResult};
pub use store::{JsonFileStore, MemoryStore, ScrapeSession, ScrapeStore, StoreSummary};
