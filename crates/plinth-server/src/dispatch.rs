//! Top-level request dispatch.
//!
//! One [`Dispatcher`] owns the transform cache, the execution context, and
//! the change notifier for the lifetime of the server instance. Each request
//! walks a fixed fallback chain: shim routes, static assets, client module
//! fetches, API handlers, public files, direct project files, and finally
//! page-route resolution; whatever fails to match falls through to the
//! not-found handling at the end.

use crate::config::{join_url_path, ServerConfig};
use crate::error::{HandlerError, ServerError};
use crate::exec::{
    status_text, ApiHandlerFn, HandlerExecutionContext, HandlerModule, MockRequest, ModuleLoader,
    ModuleScope, ResponseParts, RouteReply, StreamSink,
};
use crate::notify::ChangeNotifier;
use crate::transform::{error_script, TransformCache, Transformer};
use plinth_router::{ApiHandlerResolver, ApiMatch, ApiRouteKind, AppRoute, AppRouteResolver,
    PagesMatch, PagesRouteResolver};
use plinth_vfs::Vfs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shim route serving the reload client script.
pub const RELOAD_CLIENT_ROUTE: &str = "/__plinth_reload__.js";

/// Shim route for the change event stream (server-sent events).
pub const EVENTS_ROUTE: &str = "/__plinth_events__";

/// Client script injected into rendered pages for live reload.
const RELOAD_CLIENT: &str = r#"// plinth reload client
(() => {
  if (!("EventSource" in globalThis)) return;
  const source = new EventSource("/__plinth_events__");
  source.onmessage = (message) => {
    const change = JSON.parse(message.data);
    if (change.kind === "full-reload") {
      location.reload();
      return;
    }
    for (const link of document.querySelectorAll("link[rel=stylesheet]")) {
      const href = link.getAttribute("href").split("?")[0];
      link.setAttribute("href", href + "?t=" + change.timestamp_ms);
    }
  };
})();
"#;

/// An incoming request, as delivered by the host bridge.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// HTTP method
    pub method: String,
    /// Request URL (path plus optional query)
    pub url: String,
    /// Raw header map
    pub headers: HashMap<String, String>,
    /// Raw body bytes, if any
    pub body: Option<Vec<u8>>,
}

impl IncomingRequest {
    /// Create a request with no headers or body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Attach a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach a body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A complete outgoing response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResponse {
    /// Numeric status
    pub status_code: u16,
    /// Status reason phrase
    pub status_message: String,
    /// Header map with lowercased names
    pub headers: HashMap<String, String>,
    /// Body bytes
    pub body: Vec<u8>,
}

impl ServerResponse {
    /// Build a response with one content-type header.
    pub fn new(status_code: u16, body: Vec<u8>, content_type: &str) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        Self {
            status_code,
            status_message: status_text(status_code).to_string(),
            headers,
            body,
        }
    }

    /// 200 response.
    pub fn ok(body: Vec<u8>, content_type: &str) -> Self {
        Self::new(200, body, content_type)
    }

    /// 204 response with no body.
    pub fn no_content() -> Self {
        Self {
            status_code: 204,
            status_message: status_text(204).to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Rebuild from a completed mock response.
    pub fn from_parts(parts: ResponseParts) -> Self {
        Self {
            status_code: parts.status_code,
            status_message: parts.status_message,
            headers: parts.headers,
            body: parts.body,
        }
    }

    /// Body as UTF-8, for assertions and logs.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl From<ServerError> for ServerResponse {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::NotFound(path) => ServerResponse::new(
                404,
                builtin_not_found_page(&path).into_bytes(),
                "text/html; charset=utf-8",
            ),
            ServerError::MethodNotAllowed(method) => ServerResponse::new(
                405,
                format!("Method {method} not allowed").into_bytes(),
                "text/plain; charset=utf-8",
            ),
            ServerError::HandlerFault(message) => ServerResponse::new(
                500,
                format!("Internal server error: {message}").into_bytes(),
                "text/plain; charset=utf-8",
            ),
            ServerError::HandlerTimeout => ServerResponse::new(
                500,
                b"Internal server error: handler timed out".to_vec(),
                "text/plain; charset=utf-8",
            ),
            ServerError::TransformFault { file, message } => ServerResponse::new(
                500,
                format!("Failed to compile {}: {message}", file.display()).into_bytes(),
                "text/plain; charset=utf-8",
            ),
        }
    }
}

/// A page route handed to the renderer collaborator.
#[derive(Debug)]
pub struct ResolvedPage<'a> {
    /// Request path that resolved here
    pub path: &'a str,
    /// URL the client fetches for this page's module
    pub module_url: String,
    /// Script installing the client-visible environment
    pub env_script: String,
    /// Which convention matched
    pub kind: ResolvedPageKind<'a>,
}

/// The two page conventions a request can resolve through.
#[derive(Debug)]
pub enum ResolvedPageKind<'a> {
    /// Flat pages convention
    Pages(&'a PagesMatch),
    /// Nested app convention, with layouts and params
    App(&'a AppRoute),
}

/// HTML templating collaborator.
///
/// Correctness of the generated markup is out of scope here; the default
/// implementation produces a minimal shell that loads the page module.
pub trait PageRenderer: Send + Sync {
    /// Wrap a resolved page into an HTML document.
    fn render(&self, page: &ResolvedPage<'_>) -> String;

    /// Render the not-found page. `file` is the project's custom
    /// not-found source when one exists.
    fn render_not_found(&self, file: Option<&Path>, path: &str) -> String {
        let _ = file;
        builtin_not_found_page(path)
    }
}

/// Minimal built-in renderer.
#[derive(Debug, Default)]
pub struct BasicPageRenderer;

impl PageRenderer for BasicPageRenderer {
    fn render(&self, page: &ResolvedPage<'_>) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <script>{env}</script>\n</head>\n<body>\n<div id=\"root\"></div>\n\
             <script type=\"module\" src=\"{module}\"></script>\n\
             <script src=\"{reload}\"></script>\n</body>\n</html>\n",
            env = page.env_script,
            module = page.module_url,
            reload = RELOAD_CLIENT_ROUTE,
        )
    }
}

fn builtin_not_found_page(path: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>404</title></head>\n\
         <body>\n<h1>404</h1>\n<p>This page could not be found: {path}</p>\n</body>\n</html>\n"
    )
}

/// Top-level request router.
pub struct Dispatcher {
    config: ServerConfig,
    vfs: Arc<dyn Vfs>,
    cache: TransformCache,
    transformer: Arc<dyn Transformer>,
    loader: Arc<dyn ModuleLoader>,
    renderer: Arc<dyn PageRenderer>,
    exec: HandlerExecutionContext,
    notifier: Arc<ChangeNotifier>,
}

impl Dispatcher {
    /// Assemble a dispatcher from its collaborators.
    pub fn new(
        config: ServerConfig,
        vfs: Arc<dyn Vfs>,
        transformer: Arc<dyn Transformer>,
        loader: Arc<dyn ModuleLoader>,
        renderer: Arc<dyn PageRenderer>,
    ) -> Self {
        let scope = ModuleScope::new(config.env.clone(), config.public_env_prefix.clone());
        let exec = HandlerExecutionContext::new(scope, config.handler_timeout);
        let cache = TransformCache::new(config.cache_capacity);
        Self {
            config,
            vfs,
            cache,
            transformer,
            loader,
            renderer,
            exec,
            notifier: Arc::new(ChangeNotifier::new()),
        }
    }

    /// The change notifier composed into this server.
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// The transform cache owned by this server.
    pub fn cache(&self) -> &TransformCache {
        &self.cache
    }

    /// Handle one request to a buffered response.
    pub async fn handle(&self, request: IncomingRequest) -> ServerResponse {
        let raw_path = request_path(&request.url);
        let Some(path) = self.config.strip_base_path(raw_path) else {
            tracing::debug!(url = %request.url, "request outside base path");
            return ServerError::NotFound(raw_path.to_string()).into();
        };
        let path = path.to_string();
        tracing::debug!(method = %request.method, path = %path, "dispatching request");

        // Shim routes
        if path == "/favicon.ico" {
            return ServerResponse::no_content();
        }
        if path == RELOAD_CLIENT_ROUTE {
            return ServerResponse::ok(RELOAD_CLIENT.as_bytes().to_vec(), "application/javascript");
        }
        if path == EVENTS_ROUTE {
            // The live stream needs the streaming entry point; buffered
            // callers get an empty event-stream body.
            return ServerResponse::ok(
                b": plinth event stream\n\n".to_vec(),
                "text/event-stream",
            );
        }

        // Static asset passthrough
        if let Some(rest) = path.strip_prefix("/_next/static/") {
            return self.serve_static(rest, &path);
        }

        // Client-navigation module fetches
        if let Some(rest) = path.strip_prefix("/_next/pages/") {
            return self.serve_module(&self.config.pages_root(), rest, &path);
        }
        if let Some(rest) = path.strip_prefix("/_next/app/") {
            return self.serve_module(&self.config.app_root(), rest, &path);
        }

        // API and route handlers
        if let Some(api) = self.api_resolver().resolve(&path) {
            return self.run_api(api, &request).await;
        }

        // Public directory passthrough
        if let Some(response) = self.serve_public(&path) {
            return response;
        }

        // Direct project file requests
        if let Some(response) = self.serve_project_file(&path) {
            return response;
        }

        // Page routes
        self.render_page(&path)
    }

    /// Handle one request, delivering the response through `sink`.
    ///
    /// Flat API handlers stream natively (chunks reach the sink as the
    /// handler writes them); the event-stream shim forwards change events
    /// until the caller drops the future; every other branch buffers and
    /// then emits start/chunk/end.
    pub async fn handle_streaming(&self, request: IncomingRequest, mut sink: Box<dyn StreamSink>) {
        let raw_path = request_path(&request.url).to_string();
        if let Some(path) = self.config.strip_base_path(&raw_path) {
            let path = path.to_string();

            if path == EVENTS_ROUTE {
                self.stream_events(sink).await;
                return;
            }

            if let Some(api) = self.api_resolver().resolve(&path) {
                if api.kind == ApiRouteKind::Flat {
                    let handler = match self.load_flat_handler(&api) {
                        Ok(handler) => handler,
                        Err(response) => {
                            emit(&mut sink, response);
                            return;
                        }
                    };
                    let mock = mock_request(&request);
                    if let Err(err) = self
                        .exec
                        .execute_api_streaming(handler, mock, sink)
                        .await
                    {
                        // The sink is gone; all that is left is the log.
                        tracing::error!(path = %path, error = %err, "streaming handler failed");
                    }
                    return;
                }
            }
        }

        let response = self.handle(request).await;
        emit(&mut sink, response);
    }

    /// Forward change events to the sink as server-sent events.
    async fn stream_events(&self, mut sink: Box<dyn StreamSink>) {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/event-stream".to_string());
        headers.insert("cache-control".to_string(), "no-cache".to_string());
        sink.on_start(200, status_text(200), &headers);

        let (id, mut rx) = self.notifier.subscribe();
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
            sink.on_chunk(format!("data: {data}\n\n").as_bytes());
        }
        self.notifier.unsubscribe(id);
        sink.on_end();
    }

    fn api_resolver(&self) -> ApiHandlerResolver {
        let app_root = self.config.app_root();
        let pages_root = self.config.pages_root();
        ApiHandlerResolver::new(
            Arc::clone(&self.vfs),
            self.vfs.is_dir(&app_root).then_some(app_root),
            self.vfs.is_dir(&pages_root).then_some(pages_root),
        )
    }

    /// Serve a file from the build static directory.
    fn serve_static(&self, rest: &str, path: &str) -> ServerResponse {
        let Some(file) = join_url_path(&self.config.static_root(), rest) else {
            return ServerError::NotFound(path.to_string()).into();
        };
        match self.vfs.read(&file) {
            Ok(content) => ServerResponse::ok(content, content_type(path)),
            Err(_) => ServerError::NotFound(path.to_string()).into(),
        }
    }

    /// Resolve a client module fetch back to a source file and serve its
    /// compiled form.
    fn serve_module(&self, source_root: &Path, rest: &str, path: &str) -> ServerResponse {
        let base = rest.strip_suffix(".js").unwrap_or(rest);
        for ext in &self.config.extensions {
            // The extension is appended to the raw name rather than via
            // `with_extension`: catch-all names like `[...slug]` contain
            // dots that are not extensions.
            let Some(candidate) = join_url_path(source_root, &format!("{base}.{ext}")) else {
                return ServerError::NotFound(path.to_string()).into();
            };
            if self.vfs.exists(&candidate) && !self.vfs.is_dir(&candidate) {
                return self.transform_and_serve(&candidate, path);
            }
        }
        ServerError::NotFound(path.to_string()).into()
    }

    /// Compile a source file through the cache and serve it as a module.
    ///
    /// Transform failures come back as a substitute script with a success
    /// status so one broken file cannot cascade into unrelated failed
    /// imports.
    fn transform_and_serve(&self, file: &Path, path: &str) -> ServerResponse {
        let source = match self.vfs.read_to_string(file) {
            Ok(source) => source,
            Err(_) => return ServerError::NotFound(path.to_string()).into(),
        };
        match self.cache.get_or_compute(file, &source, |src| {
            self.transformer.transform(src, file)
        }) {
            Ok(compiled) => {
                ServerResponse::ok(compiled.into_bytes(), "application/javascript")
            }
            Err(err) => {
                tracing::error!(file = %err.file.display(), message = %err.message, "transform failed");
                ServerResponse::ok(
                    error_script(&err.file, &err.message).into_bytes(),
                    "application/javascript",
                )
            }
        }
    }

    /// Serve a file from the public directory, if one matches.
    fn serve_public(&self, path: &str) -> Option<ServerResponse> {
        let file = join_url_path(&self.config.public_root(), path)?;
        if !self.vfs.exists(&file) || self.vfs.is_dir(&file) {
            return None;
        }
        let content = self.vfs.read(&file).ok()?;
        Some(ServerResponse::ok(content, content_type(path)))
    }

    /// Serve a direct project file request: sources are compiled, anything
    /// else passes through.
    fn serve_project_file(&self, path: &str) -> Option<ServerResponse> {
        let file = join_url_path(&self.config.root, path)?;
        if !self.vfs.exists(&file) || self.vfs.is_dir(&file) {
            return None;
        }
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");
        if self.config.is_source_extension(ext) {
            return Some(self.transform_and_serve(&file, path));
        }
        let content = self.vfs.read(&file).ok()?;
        Some(ServerResponse::ok(content, content_type(path)))
    }

    /// Resolve a page route and hand it to the renderer.
    fn render_page(&self, path: &str) -> ServerResponse {
        let env_script = self.exec.scope().client_env_script();

        let app_root = self.config.app_root();
        if self.vfs.is_dir(&app_root) {
            let resolver = AppRouteResolver::new(Arc::clone(&self.vfs), app_root.clone())
                .with_extensions(self.config.extensions.clone());
            if let Some(route) = resolver.resolve(path) {
                let page = ResolvedPage {
                    path,
                    module_url: module_url("/_next/app", &app_root, &route.page),
                    env_script,
                    kind: ResolvedPageKind::App(&route),
                };
                return ServerResponse::ok(
                    self.renderer.render(&page).into_bytes(),
                    "text/html; charset=utf-8",
                );
            }
        }

        let pages_root = self.config.pages_root();
        if self.vfs.is_dir(&pages_root) {
            let resolver = PagesRouteResolver::new(Arc::clone(&self.vfs), pages_root.clone())
                .with_extensions(self.config.extensions.clone());
            if let Some(matched) = resolver.resolve(path) {
                let page = ResolvedPage {
                    path,
                    module_url: module_url("/_next/pages", &pages_root, &matched.file),
                    env_script,
                    kind: ResolvedPageKind::Pages(&matched),
                };
                return ServerResponse::ok(
                    self.renderer.render(&page).into_bytes(),
                    "text/html; charset=utf-8",
                );
            }
        }

        self.not_found_response(path)
    }

    /// Not-found fallthrough: the project's custom not-found page when one
    /// exists, otherwise the built-in minimal page.
    fn not_found_response(&self, path: &str) -> ServerResponse {
        let custom = self
            .convention_file(&self.config.app_root(), "not-found")
            .or_else(|| self.convention_file(&self.config.pages_root(), "404"));

        tracing::debug!(path, custom = custom.is_some(), "no route matched");
        ServerResponse::new(
            404,
            self.renderer
                .render_not_found(custom.as_deref(), path)
                .into_bytes(),
            "text/html; charset=utf-8",
        )
    }

    fn convention_file(&self, dir: &Path, base: &str) -> Option<PathBuf> {
        for ext in &self.config.extensions {
            let candidate = dir.join(format!("{base}.{ext}"));
            if self.vfs.exists(&candidate) && !self.vfs.is_dir(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Execute a resolved API match.
    async fn run_api(&self, api: ApiMatch, request: &IncomingRequest) -> ServerResponse {
        let mock = mock_request(request);
        match api.kind {
            ApiRouteKind::Nested => {
                let module = match self.load_module(&api.file) {
                    Ok(module) => module,
                    Err(response) => return response,
                };
                match self
                    .exec
                    .execute_route(module.as_ref(), &request.method, mock, api.params)
                    .await
                {
                    Ok(reply) => reply_response(reply),
                    Err(err) => self.handler_error_response(err, &api.file),
                }
            }
            ApiRouteKind::Flat => {
                let handler = match self.load_flat_handler(&api) {
                    Ok(handler) => handler,
                    Err(response) => return response,
                };
                match self.exec.execute_api(handler, mock).await {
                    Ok(parts) => ServerResponse::from_parts(parts),
                    Err(err) => self.handler_error_response(err, &api.file),
                }
            }
        }
    }

    /// Load and compile a handler module.
    fn load_module(&self, file: &Path) -> Result<Box<dyn HandlerModule>, ServerResponse> {
        let source = self.vfs.read_to_string(file).map_err(|err| {
            tracing::error!(file = %file.display(), error = %err, "handler source unreadable");
            ServerResponse::from(ServerError::HandlerFault(err.to_string()))
        })?;
        let compiled = self
            .cache
            .get_or_compute(file, &source, |src| self.transformer.transform(src, file))
            .map_err(|err| {
                tracing::error!(file = %err.file.display(), message = %err.message, "handler transform failed");
                ServerResponse::from(ServerError::TransformFault {
                    file: err.file.clone(),
                    message: err.message.clone(),
                })
            })?;
        self.loader
            .load(&compiled, file, self.exec.scope())
            .map_err(|err| {
                tracing::error!(file = %file.display(), error = %err, "module load failed");
                ServerResponse::from(ServerError::HandlerFault(err.to_string()))
            })
    }

    fn load_flat_handler(&self, api: &ApiMatch) -> Result<ApiHandlerFn, ServerResponse> {
        let module = self.load_module(&api.file)?;
        module.default_export().ok_or_else(|| {
            tracing::error!(file = %api.file.display(), "api file has no default handler export");
            ServerResponse::from(ServerError::HandlerFault(
                "API file does not export a handler".to_string(),
            ))
        })
    }

    /// Map an execution failure to a response; timeouts and faults share a
    /// response shape and differ only in logs.
    fn handler_error_response(&self, err: HandlerError, file: &Path) -> ServerResponse {
        match err {
            HandlerError::MethodNotAllowed(method) => {
                ServerError::MethodNotAllowed(method).into()
            }
            HandlerError::Timeout => {
                tracing::error!(file = %file.display(), "handler timed out");
                ServerError::HandlerTimeout.into()
            }
            other => {
                tracing::error!(file = %file.display(), error = %other, "handler faulted");
                ServerError::HandlerFault(other.to_string()).into()
            }
        }
    }
}

/// Path component of a request URL.
fn request_path(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or("")
}

fn mock_request(request: &IncomingRequest) -> MockRequest {
    MockRequest::new(
        request.method.clone(),
        request.url.clone(),
        request.headers.clone(),
        request.body.as_deref(),
    )
}

/// Convert a route handler reply to a response.
fn reply_response(reply: RouteReply) -> ServerResponse {
    match reply {
        RouteReply::Response {
            status,
            headers,
            body,
        } => {
            let mut response = ServerResponse::new(status, body.into_bytes(), "text/plain; charset=utf-8");
            for (name, value) in headers {
                response.headers.insert(name.to_ascii_lowercase(), value);
            }
            response
        }
        RouteReply::Json(value) => {
            let body = serde_json::to_vec(&value).unwrap_or_else(|_| b"null".to_vec());
            ServerResponse::ok(body, "application/json")
        }
        RouteReply::Text(text) => {
            ServerResponse::ok(text.into_bytes(), "text/plain; charset=utf-8")
        }
    }
}

/// Deliver a buffered response through a streaming sink.
fn emit(sink: &mut Box<dyn StreamSink>, response: ServerResponse) {
    sink.on_start(
        response.status_code,
        &response.status_message,
        &response.headers,
    );
    if !response.body.is_empty() {
        sink.on_chunk(&response.body);
    }
    sink.on_end();
}

/// Build the client module fetch URL for a resolved source file.
fn module_url(prefix: &str, root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file).with_extension("js");
    let joined = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/");
    format!("{prefix}/{joined}")
}

/// Content type from a URL path's extension.
fn content_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "wasm" => "application/wasm",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
