//! Lazily opened, shareable storage connection

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::OnceCell;

use super::{LibSqlBackend, StorageBackend};
use crate::error::{Error, Result};

type OpenFuture<B> = Pin<Box<dyn Future<Output = Result<B>> + Send>>;
type Opener<B> = Box<dyn Fn() -> OpenFuture<B> + Send + Sync>;

/// Open-once handle to a storage backend.
///
/// The backend is opened on first use. Concurrent first callers wait on the
/// same in-flight open instead of racing their own; a failed open is not
/// cached, so the next caller tries again. Share one handle (behind an `Arc`)
/// between every store that should use the same connection.
pub struct StoreHandle<B> {
    backend: OnceCell<Arc<B>>,
    opener: Option<Opener<B>>,
}

impl<B: StorageBackend> StoreHandle<B> {
    /// Create a handle that opens the backend with `open` on first use
    pub fn new<F, Fut>(open: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<B>> + Send + 'static,
    {
        Self {
            backend: OnceCell::new(),
            opener: Some(Box::new(move || Box::pin(open()))),
        }
    }

    /// Wrap an already opened backend
    pub fn from_backend(backend: B) -> Self {
        Self {
            backend: OnceCell::new_with(Some(Arc::new(backend))),
            opener: None,
        }
    }

    /// Get the backend, opening it if this is the first call
    pub async fn get(&self) -> Result<Arc<B>> {
        let backend = self
            .backend
            .get_or_try_init(|| async {
                let opener = self
                    .opener
                    .as_ref()
                    .ok_or_else(|| Error::Storage("storage backend has no opener".into()))?;
                tracing::debug!("Opening storage backend");
                opener().await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(backend))
    }

    /// Whether the backend has been opened
    pub fn is_open(&self) -> bool {
        self.backend.initialized()
    }
}

impl StoreHandle<LibSqlBackend> {
    /// Handle that lazily opens a libSQL database file
    pub fn libsql(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(move || {
            let path = path.clone();
            async move { LibSqlBackend::open(path).await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handle(opens: Arc<AtomicUsize>, fail_first: bool) -> StoreHandle<MemoryBackend> {
        StoreHandle::new(move || {
            let opens = Arc::clone(&opens);
            async move {
                let attempt = opens.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                if fail_first && attempt == 0 {
                    return Err(Error::Storage("disk unavailable".into()));
                }
                Ok(MemoryBackend::new())
            }
        })
    }

    #[tokio::test]
    async fn concurrent_first_use_opens_once() {
        let opens = Arc::new(AtomicUsize::new(0));
        let handle = Arc::new(counting_handle(Arc::clone(&opens), false));
        assert!(!handle.is_open());

        let (a, b, c) = tokio::join!(handle.get(), handle.get(), handle.get());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert!(handle.is_open());
    }

    #[tokio::test]
    async fn failed_open_is_retried_by_next_caller() {
        let opens = Arc::new(AtomicUsize::new(0));
        let handle = counting_handle(Arc::clone(&opens), true);

        assert!(handle.get().await.is_err());
        assert!(handle.get().await.is_ok());
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn from_backend_is_already_open() {
        let handle = StoreHandle::from_backend(MemoryBackend::new());
        assert!(handle.is_open());
        assert!(handle.get().await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn libsql_handle_opens_file_lazily() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("lazy.db");
        let handle = StoreHandle::libsql(&path);

        assert!(!path.exists());
        handle.get().await.unwrap();
        assert!(path.exists());
    }
}
