//! In-process canvas store

use super::CanvasStore;
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory canvas (for development/testing)
///
/// The canvas is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCanvasStore {
    bytes: RwLock<Vec<u8>>,
}

impl MemoryCanvasStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `bytes`
    #[must_use]
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: RwLock::new(bytes.into()),
        }
    }
}

#[async_trait]
impl CanvasStore for MemoryCanvasStore {
    async fn get(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.read().await.clone())
    }

    async fn set_range(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let mut canvas = self.bytes.write().await;
        let end = offset + bytes.len();
        // SETRANGE semantics: pad with zero bytes when writing past the end
        if canvas.len() < end {
            canvas.resize(end, 0);
        }
        canvas[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    async fn initialize(&self, len: usize) -> Result<bool> {
        let mut canvas = self.bytes.write().await;
        if !canvas.is_empty() {
            return Ok(false);
        }
        *canvas = vec![b'0'; len];
        debug!(len, "Seeded blank in-memory canvas");
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_canvas_reads_empty() {
        let store = MemoryCanvasStore::new();
        assert!(store.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_once() {
        let store = MemoryCanvasStore::new();
        assert!(store.initialize(4).await.unwrap());
        assert_eq!(store.get().await.unwrap(), b"0000".to_vec());

        tokio_test::assert_ok!(store.set_range(1, b"7").await);
        assert!(!store.initialize(4).await.unwrap());
        assert_eq!(store.get().await.unwrap(), b"0700".to_vec());
    }

    #[tokio::test]
    async fn test_set_range_past_end_pads() {
        let store = MemoryCanvasStore::with_bytes(b"01".to_vec());
        store.set_range(4, b"9").await.unwrap();
        assert_eq!(store.get().await.unwrap(), vec![b'0', b'1', 0, 0, b'9']);
    }
}
