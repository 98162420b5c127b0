pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use config::{get_config_path, Config};
pub use db::{BackendType, PersistenceBackend};
pub use error::{StoreError, ValidationError};
pub use export::ExportFormat;
pub use models::{EntityKind, FamilyData, Person, PersonInput, RelativeRole, Sex, Tree};
pub use storage::Storage;
pub use store::{OwnerStats, RelationshipStore, Relatives};
