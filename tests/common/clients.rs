#![allow(dead_code)]

use async_trait::async_trait;
use followgraph::invoker::{
    ModelClient, ModelClientError, ModelRequest, ModelResponse, OfflineClient,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Wraps another client and counts every call that reaches it.
pub struct CountingClient {
    inner: Arc<dyn ModelClient>,
    calls: AtomicU32,
}

impl CountingClient {
    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(OfflineClient),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for CountingClient {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.complete(request).await
    }
}

/// Always answers with text that is not JSON at all.
pub struct MalformedClient;

#[async_trait]
impl ModelClient for MalformedClient {
    async fn complete(&self, _request: ModelRequest) -> Result<ModelResponse, ModelClientError> {
        Ok(ModelResponse {
            text: "Sure! Here is my analysis: the customer seems fine.".to_string(),
            tokens_in: 12,
            tokens_out: 12,
        })
    }
}

/// Fails with a transport error `failures` times, then behaves like
/// [`OfflineClient`].
pub struct FlakyClient {
    failures: AtomicU32,
}

impl FlakyClient {
    pub fn new(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl ModelClient for FlakyClient {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelClientError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ModelClientError::Transport("connection reset".into()));
        }
        OfflineClient.complete(request).await
    }
}

/// Sleeps far past any sane stage timeout before answering.
pub struct SlowClient;

#[async_trait]
impl ModelClient for SlowClient {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelClientError> {
        sleep(Duration::from_secs(120)).await;
        OfflineClient.complete(request).await
    }
}
