//! Remote endpoint abstraction for offline-sync.
//!
//! The manager never talks HTTP itself. It hands a [`RemoteRequest`]
//! (method, path, optional JSON body, timeout) to a [`RemoteInvoker`] and
//! only cares whether the call succeeded.
//!
//! # Example
//!
//! ```ignore
//! let invoker = MockInvoker::new();
//! invoker.fail_next(1, InvokeError::Status { status: 503, message: "busy".into() });
//!
//! let request = RemoteRequest::new(HttpMethod::Post, "/teachers", None, Duration::from_secs(30));
//! assert!(invoker.invoke(request.clone()).await.is_err());
//! assert!(invoker.invoke(request).await.is_ok());
//! ```

mod mock;

pub use mock::MockInvoker;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use sync_types::HttpMethod;
use thiserror::Error;

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server-provided message.
        message: String,
    },

    /// No answer within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// The request never reached the server.
    #[error("transport error: {0}")]
    Transport(String),
}

/// One call to a remote endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Endpoint path.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Deadline for the call.
    pub timeout: Duration,
}

impl RemoteRequest {
    /// Create a request.
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        body: Option<Value>,
        timeout: Duration,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            timeout,
        }
    }
}

/// Something that can deliver a request to the server.
///
/// Implementations should honor [`RemoteRequest::timeout`]; the manager
/// also enforces it from the outside.
#[async_trait]
pub trait RemoteInvoker: Send + Sync {
    /// Perform the call.
    async fn invoke(&self, request: RemoteRequest) -> Result<(), InvokeError>;
}
