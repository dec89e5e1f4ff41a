pub mod error;
pub mod index;
pub mod kv;
pub mod models;
pub mod store;
pub mod templates;

pub use error::PersistError;
pub use index::ThreadIndex;
pub use kv::{KvStore, MemoryKv, RedisKv};
pub use models::{Message, MessageRole, ThreadMetadata, ThreadState, ThreadSummary};
pub use store::StateStore;
pub use templates::DEFAULT_SYSTEM_PROMPT;
