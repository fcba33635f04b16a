//! Canvas storage backends
//!
//! The canvas is one contiguous byte string, one ASCII digit per cell.
//! `RedisCanvasStore` is the production backend; `MemoryCanvasStore` keeps
//! the canvas in-process and is used for development and tests.

mod memory;
mod redis_store;

pub use memory::MemoryCanvasStore;
pub use redis_store::RedisCanvasStore;

use crate::error::Result;
use async_trait::async_trait;

/// Default key holding the canvas bytes
pub const DEFAULT_CANVAS_KEY: &str = "pixels";

/// Persistent byte string holding the canvas
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CanvasStore: Send + Sync {
    /// Read the whole canvas. A missing canvas reads as empty.
    async fn get(&self) -> Result<Vec<u8>>;

    /// Overwrite `bytes.len()` bytes starting at `offset`
    async fn set_range(&self, offset: usize, bytes: &[u8]) -> Result<()>;

    /// Seed a blank canvas of `len` bytes unless one already exists.
    ///
    /// Returns `true` if the canvas was created.
    async fn initialize(&self, len: usize) -> Result<bool>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}
