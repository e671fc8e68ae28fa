pub mod error;
pub mod types;
pub mod store;
pub mod memory_store;
pub mod config;
pub mod dialect;

pub use config::{DriverConfig, MissingKeyPolicy};
pub use error::{Error, Result};
pub use memory_store::{MemoryStore, StoreOp};
pub use store::StoreClient;
pub use types::*;
