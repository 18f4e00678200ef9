//! Inbound ports: what a node plugs into the bus.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::domain::{RemoteError, RfcHandlerError};

/// Executes one named call on the executor node.
#[async_trait]
pub trait RfcHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> Result<Value, RfcHandlerError>;
}

/// Runs on the requesting node after the response arrives and before the
/// caller's future resolves.
///
/// Used to block until a side effect of the call is visible locally.
#[async_trait]
pub trait ResolverHook: Send + Sync {
    async fn resolve(&self, err: Option<&RemoteError>, ack: Option<&Value>);
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> RfcHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RfcHandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: Value) -> Result<Value, RfcHandlerError> {
        (self.0)(payload).await
    }
}

/// Wrap an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn RfcHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RfcHandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
