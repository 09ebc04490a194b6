//! Framework dev-server emulation.
//!
//! `plinth-server` reimplements the serving half of a framework development
//! server as an embeddable library: requests come in through
//! [`Dispatcher::handle`] (or [`Dispatcher::handle_streaming`]), resolve to
//! project source files, pass through a content-addressed
//! [`TransformCache`], and — for API routes — execute inside an isolated
//! [`exec::HandlerExecutionContext`] against mock request/response pairs.
//! File changes republish through the [`ChangeNotifier`] as classified
//! reload events.
//!
//! There is no real backend process here: the filesystem, the compiler, the
//! module loader, and the page templating are all injected collaborators.
//!
//! # Wiring
//!
//! ```rust,no_run
//! use plinth_server::{Dispatcher, IncomingRequest, ServerConfig, BasicPageRenderer};
//! use plinth_vfs::{MemoryVfs, Vfs};
//! use std::sync::Arc;
//!
//! # use plinth_server::exec::{HandlerModule, ModuleLoader, ModuleScope};
//! # use plinth_server::transform::{TransformError, Transformer};
//! # use plinth_server::error::HandlerError;
//! # use std::path::Path;
//! # struct MyCompiler;
//! # impl Transformer for MyCompiler {
//! #     fn transform(&self, source: &str, _file: &Path) -> Result<String, TransformError> {
//! #         Ok(source.to_string())
//! #     }
//! # }
//! # struct MyLoader;
//! # impl ModuleLoader for MyLoader {
//! #     fn load(&self, _compiled: &str, _file: &Path, _scope: &ModuleScope)
//! #         -> Result<Box<dyn HandlerModule>, HandlerError> {
//! #         Err(HandlerError::Load("no modules in this example".into()))
//! #     }
//! # }
//! # async fn example() {
//! let vfs = Arc::new(MemoryVfs::with_files([
//!     ("/project/pages/index.jsx", "export default () => null"),
//! ]));
//!
//! let dispatcher = Dispatcher::new(
//!     ServerConfig::new("/project"),
//!     vfs.clone(),
//!     Arc::new(MyCompiler),
//!     Arc::new(MyLoader),
//!     Arc::new(BasicPageRenderer),
//! );
//!
//! // Bridge VFS changes into reload events
//! let mut changes = vfs.watch();
//! let notifier = dispatcher.notifier().clone();
//! tokio::spawn(async move {
//!     while let Some(change) = changes.recv().await {
//!         notifier.notify(&change.path);
//!     }
//! });
//!
//! let response = dispatcher.handle(IncomingRequest::new("GET", "/")).await;
//! assert_eq!(response.status_code, 200);
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod logger;
pub mod notify;
pub mod transform;

pub use config::ServerConfig;
pub use dispatch::{
    BasicPageRenderer, Dispatcher, IncomingRequest, PageRenderer, ResolvedPage, ResolvedPageKind,
    ServerResponse, EVENTS_ROUTE, RELOAD_CLIENT_ROUTE,
};
pub use error::{HandlerError, ServerError};
pub use exec::{
    HandlerExecutionContext, MockRequest, MockResponse, ModuleScope, ResponseParts, RouteReply,
    StreamSink,
};
pub use notify::{ChangeEvent, ChangeNotifier, ReloadKind};
pub use transform::{TransformCache, TransformError, Transformer};
