//! Persistent tables: deal ledger, folder and channel registries, template catalog
//!
//! Each table is a trait so the pipeline can run against the in-memory backend in
//! tests and the JSON-file backend from the CLI.

pub mod channels;
pub mod file;
pub mod folders;
pub mod ledger;
pub mod memory;
pub mod state;
pub mod templates;

pub use channels::{ChannelRecord, ChannelRegistry, WonDeal};
pub use file::JsonFileStore;
pub use folders::{AccountFolder, AreaFolders, FolderIds, FolderRegistry};
pub use ledger::{DealLedger, LedgerRecord};
pub use memory::MemoryStore;
pub use state::StoreState;
pub use templates::{TemplateCatalog, TemplateRecord};
