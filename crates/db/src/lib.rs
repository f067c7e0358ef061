pub mod errors;
pub mod memory;
pub mod models;
pub mod pg;
pub mod stores;

pub use errors::DbError;
pub use memory::MemoryStores;
pub use models::*;
pub use stores::*;
