use intent_core::Hub;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub hub: Arc<Hub>,
}

impl AppState {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            root: hub.root().to_path_buf(),
            hub,
        }
    }

    /// Run a blocking core call off the async executor.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, crate::error::AppError>
    where
        F: FnOnce(&Hub) -> intent_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let hub = Arc::clone(&self.hub);
        let value = tokio::task::spawn_blocking(move || f(&hub))
            .await
            .map_err(|e| crate::error::AppError(anyhow::anyhow!("task join error: {e}")))??;
        Ok(value)
    }
}
