//! Byte-string key-value boundary.
//!
//! Everything the store needs from a backend: get, atomic single-key set,
//! and key enumeration by prefix. Implementations encapsulate their own
//! connection handling and are swappable without touching the store.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryKv;
pub use self::redis::RedisKv;

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the value at `key`. Single-key writes are atomic: readers
    /// observe either the previous value or the new one, never a mix.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Enumerate every key starting with `prefix`. No ordering guarantee.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}
