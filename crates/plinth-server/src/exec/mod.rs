//! Handler execution model.
//!
//! Transformed handler modules run against an isolated [`ModuleScope`] with
//! a fresh mock request/response pair per invocation. Completion is tracked
//! by the response state machine, not the handler's return: some handlers
//! end the response from asynchronous continuations that outlive the handler
//! function itself. The executor therefore races "handler returned and
//! response ended" against the response's completion signal, bounded by the
//! configured timeout.
//!
//! Timing out fails the response but never cancels the handler's own work;
//! anything it spawned keeps running in the background (log-and-continue,
//! preserved from the reference design).

pub mod request;
pub mod response;
pub mod scope;

pub use request::MockRequest;
pub use response::{
    status_text, CompletionReceiver, MockResponse, ResponseParts, ResponseState, StreamSink,
};
pub use scope::ModuleScope;

use crate::error::HandlerError;
use plinth_router::RouteParams;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Boxed future returned by handler invocations.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// Pages-convention API handler: `(request, response)`, completion via the
/// response state machine.
pub type ApiHandlerFn = Arc<dyn Fn(MockRequest, MockResponse) -> HandlerFuture + Send + Sync>;

/// Boxed future resolving to a route handler reply.
pub type RouteReplyFuture = Pin<Box<dyn Future<Output = Result<RouteReply, HandlerError>> + Send>>;

/// App-convention route handler: `(request, params)`, reply via return
/// value.
pub type RouteHandlerFn = Arc<dyn Fn(MockRequest, RouteParams) -> RouteReplyFuture + Send + Sync>;

/// Return value of an app-convention route handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteReply {
    /// A response-like object carrying status, headers, and a text body
    Response {
        /// Numeric status
        status: u16,
        /// Header map
        headers: HashMap<String, String>,
        /// Body text
        body: String,
    },
    /// A plain value to serialize as JSON
    Json(serde_json::Value),
    /// Plain text
    Text(String),
}

/// A loaded handler module.
///
/// Pages-convention API files expose a default export; app-convention route
/// files expose one export per HTTP method, keyed by uppercase name.
pub trait HandlerModule: Send + Sync {
    /// The default export, for flat API files.
    fn default_export(&self) -> Option<ApiHandlerFn> {
        None
    }

    /// A per-method export, for nested route files. `method` arrives
    /// uppercased; the executor handles case-insensitivity.
    fn method_export(&self, method: &str) -> Option<RouteHandlerFn> {
        let _ = method;
        None
    }
}

/// Collaborator that turns compiled module text into a [`HandlerModule`].
pub trait ModuleLoader: Send + Sync {
    /// Instantiate a module inside the given scope.
    fn load(
        &self,
        compiled: &str,
        file: &Path,
        scope: &ModuleScope,
    ) -> Result<Box<dyn HandlerModule>, HandlerError>;
}

/// Executes handlers with per-call isolation and a completion bound.
#[derive(Debug, Clone)]
pub struct HandlerExecutionContext {
    scope: ModuleScope,
    timeout: Duration,
}

impl HandlerExecutionContext {
    /// Create a context with the given scope and completion bound.
    pub fn new(scope: ModuleScope, timeout: Duration) -> Self {
        Self { scope, timeout }
    }

    /// The execution scope handed to module loaders.
    pub fn scope(&self) -> &ModuleScope {
        &self.scope
    }

    /// Run a pages-convention API handler to a buffered response.
    pub async fn execute_api(
        &self,
        handler: ApiHandlerFn,
        request: MockRequest,
    ) -> Result<ResponseParts, HandlerError> {
        let (response, done) = MockResponse::buffered();
        self.drive(handler, request, response, done).await
    }

    /// Run a pages-convention API handler, streaming through `sink`.
    pub async fn execute_api_streaming(
        &self,
        handler: ApiHandlerFn,
        request: MockRequest,
        sink: Box<dyn StreamSink>,
    ) -> Result<ResponseParts, HandlerError> {
        let (response, done) = MockResponse::streaming(sink);
        self.drive(handler, request, response, done).await
    }

    /// Dispatch to a nested route handler by HTTP method.
    ///
    /// Method lookup is case-insensitive; a module without the requested
    /// export yields [`HandlerError::MethodNotAllowed`], which is distinct
    /// from the route not existing at all.
    pub async fn execute_route(
        &self,
        module: &dyn HandlerModule,
        method: &str,
        request: MockRequest,
        params: RouteParams,
    ) -> Result<RouteReply, HandlerError> {
        let Some(handler) = module.method_export(&method.to_ascii_uppercase()) else {
            return Err(HandlerError::MethodNotAllowed(method.to_string()));
        };

        let future = handler(request, params);
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(future.await);
        });

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(HandlerError::Fault(
                "handler task aborted before returning".to_string(),
            )),
            Err(_) => {
                tracing::warn!(method, "route handler exceeded completion bound");
                Err(HandlerError::Timeout)
            }
        }
    }

    /// Drive one handler invocation to completion.
    ///
    /// The handler runs on its own task so that a timeout fails only the
    /// response; the handler (and anything it spawned) continues in the
    /// background.
    async fn drive(
        &self,
        handler: ApiHandlerFn,
        request: MockRequest,
        response: MockResponse,
        mut done: CompletionReceiver,
    ) -> Result<ResponseParts, HandlerError> {
        let future = handler(request, response);
        let (handler_tx, mut handler_rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = handler_tx.send(future.await);
        });

        let mut handler_finished = false;
        let bounded = tokio::time::timeout(self.timeout, async {
            loop {
                tokio::select! {
                    biased;
                    parts = &mut done => {
                        return match parts {
                            Ok(parts) => Ok(parts),
                            // Channel closed without a terminal call: the
                            // response was dropped and can never complete.
                            Err(_) => Err(HandlerError::Incomplete),
                        };
                    }
                    result = &mut handler_rx, if !handler_finished => {
                        handler_finished = true;
                        match result {
                            Ok(Err(err)) => return Err(err),
                            // Returned cleanly; completion may still arrive
                            // from a spawned continuation.
                            Ok(Ok(())) => {}
                            Err(_) => {
                                return Err(HandlerError::Fault(
                                    "handler task aborted before returning".to_string(),
                                ))
                            }
                        }
                    }
                }
            }
        })
        .await;

        match bounded {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "handler exceeded completion bound; its work continues in the background"
                );
                Err(HandlerError::Timeout)
            }
        }
    }
}
