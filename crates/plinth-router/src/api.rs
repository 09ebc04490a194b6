//! API endpoint resolution for both conventions.
//!
//! Nested `route.<ext>` handlers in the app tree are tried first; the flat
//! `api/*` convention under the pages root is the fallback. Method dispatch
//! (and the method-not-allowed distinction) happens at execution time, one
//! layer up; this module only locates the handler file.

use crate::app::AppRouteResolver;
use crate::params::RouteParams;
use crate::{split_pathname, DEFAULT_EXTENSIONS};
use plinth_vfs::Vfs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which convention produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRouteKind {
    /// Nested `route.<ext>` file in the app tree
    Nested,
    /// Flat file under the pages `api/` directory
    Flat,
}

/// A resolved API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiMatch {
    /// Handler source file
    pub file: PathBuf,
    /// Parameters bound during descent (always empty for flat matches)
    pub params: RouteParams,
    /// Which convention matched
    pub kind: ApiRouteKind,
}

/// Resolver composing both API conventions by priority.
#[derive(Debug)]
pub struct ApiHandlerResolver {
    vfs: Arc<dyn Vfs>,
    app: Option<AppRouteResolver>,
    /// The flat API directory (`<pages>/api`), when a pages root exists
    api_root: Option<PathBuf>,
    extensions: Vec<String>,
}

impl ApiHandlerResolver {
    /// Create a resolver.
    ///
    /// `app_root` enables nested route handlers; `pages_root` enables the
    /// flat convention. Either may be absent.
    pub fn new(
        vfs: Arc<dyn Vfs>,
        app_root: Option<PathBuf>,
        pages_root: Option<PathBuf>,
    ) -> Self {
        Self {
            app: app_root.map(|root| AppRouteResolver::new(Arc::clone(&vfs), root)),
            api_root: pages_root.map(|root| root.join("api")),
            vfs,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Resolve a URL pathname to an API handler file.
    ///
    /// A nested route handler takes precedence over a flat API file for the
    /// same URL.
    pub fn resolve(&self, pathname: &str) -> Option<ApiMatch> {
        if let Some(app) = &self.app {
            if let Some((file, params)) = app.resolve_route(pathname) {
                tracing::debug!(pathname, file = %file.display(), "nested route handler resolved");
                return Some(ApiMatch {
                    file,
                    params,
                    kind: ApiRouteKind::Nested,
                });
            }
        }
        self.resolve_flat(pathname)
    }

    /// Flat convention: `/api/x` maps to `<pages>/api/x.<ext>` then
    /// `<pages>/api/x/index.<ext>`.
    fn resolve_flat(&self, pathname: &str) -> Option<ApiMatch> {
        let api_root = self.api_root.as_ref()?;
        let rest = pathname.strip_prefix("/api")?;
        // `/apifoo` shares the byte prefix but not a segment boundary
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        let segments = split_pathname(rest);

        let file = match segments.split_last() {
            None => self.try_file(api_root, "index")?,
            Some((last, parents)) => {
                let dir = parents.iter().fold(api_root.clone(), |d, s| d.join(s));
                match self.try_file(&dir, last) {
                    Some(file) => file,
                    None => self.try_file(&dir.join(last), "index")?,
                }
            }
        };

        tracing::debug!(pathname, file = %file.display(), "flat api route resolved");
        Some(ApiMatch {
            file,
            params: RouteParams::new(),
            kind: ApiRouteKind::Flat,
        })
    }

    fn try_file(&self, dir: &Path, base: &str) -> Option<PathBuf> {
        for ext in &self.extensions {
            let candidate = dir.join(format!("{base}.{ext}"));
            if self.vfs.exists(&candidate) && !self.vfs.is_dir(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}
