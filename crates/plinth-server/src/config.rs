//! Server configuration.
//!
//! A plain value owned by the server instance; no config files are read
//! here. Defaults mirror the emulated framework's conventions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on in-flight handler completion.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Default transform cache capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Only environment variables with this prefix are ever serialized into
/// client-visible output.
pub const DEFAULT_PUBLIC_ENV_PREFIX: &str = "NEXT_PUBLIC_";

/// Development server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Project root inside the VFS
    pub root: PathBuf,

    /// Pages directory name, relative to the root
    pub pages_dir: String,

    /// App directory name, relative to the root
    pub app_dir: String,

    /// Public assets directory name, relative to the root
    pub public_dir: String,

    /// Build static assets directory, relative to the root, served under
    /// `/_next/static/`
    pub static_dir: String,

    /// URL prefix stripped from every incoming request ("" for none)
    pub base_path: String,

    /// Source extensions tried during resolution, in priority order
    pub extensions: Vec<String>,

    /// Transform cache entry bound
    pub cache_capacity: usize,

    /// Upper bound on handler response completion
    pub handler_timeout: Duration,

    /// Prefix gating client-visible environment variables
    pub public_env_prefix: String,

    /// Environment exposed to handler execution
    pub env: HashMap<String, String>,
}

impl ServerConfig {
    /// Create a config rooted at the given VFS directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pages_dir: "pages".to_string(),
            app_dir: "app".to_string(),
            public_dir: "public".to_string(),
            static_dir: ".next/static".to_string(),
            base_path: String::new(),
            extensions: plinth_router::DEFAULT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            public_env_prefix: DEFAULT_PUBLIC_ENV_PREFIX.to_string(),
            env: HashMap::new(),
        }
    }

    /// Set the stripped URL base path.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Set the handler completion bound.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Set the transform cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set environment variables visible to handler execution.
    pub fn with_env(
        mut self,
        env: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.env = env
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Absolute pages directory.
    pub fn pages_root(&self) -> PathBuf {
        self.root.join(&self.pages_dir)
    }

    /// Absolute app directory.
    pub fn app_root(&self) -> PathBuf {
        self.root.join(&self.app_dir)
    }

    /// Absolute public directory.
    pub fn public_root(&self) -> PathBuf {
        self.root.join(&self.public_dir)
    }

    /// Absolute static assets directory.
    pub fn static_root(&self) -> PathBuf {
        self.root.join(&self.static_dir)
    }

    /// Check whether an extension is a transform-needing source extension.
    pub fn is_source_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    /// Strip the configured base path from a request path.
    ///
    /// Returns `None` when the path lives outside the base path entirely.
    pub fn strip_base_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.base_path.is_empty() {
            return Some(path);
        }
        match path.strip_prefix(self.base_path.as_str()) {
            Some("") => Some("/"),
            Some(rest) if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("/")
    }
}

/// Join a URL path onto a directory, rejecting traversal components.
pub(crate) fn join_url_path(root: &Path, url_path: &str) -> Option<PathBuf> {
    let mut out = root.to_path_buf();
    for segment in url_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            other => out.push(other),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_framework_conventions() {
        let config = ServerConfig::new("/project");
        assert_eq!(config.pages_root(), PathBuf::from("/project/pages"));
        assert_eq!(config.app_root(), PathBuf::from("/project/app"));
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.handler_timeout, DEFAULT_HANDLER_TIMEOUT);
        assert_eq!(config.public_env_prefix, "NEXT_PUBLIC_");
    }

    #[test]
    fn strip_base_path_without_base_is_identity() {
        let config = ServerConfig::new("/project");
        assert_eq!(config.strip_base_path("/about"), Some("/about"));
    }

    #[test]
    fn strip_base_path_requires_prefix() {
        let config = ServerConfig::new("/project").with_base_path("/preview");
        assert_eq!(config.strip_base_path("/preview/about"), Some("/about"));
        assert_eq!(config.strip_base_path("/preview"), Some("/"));
        assert_eq!(config.strip_base_path("/other/about"), None);
        // `/previewer` shares bytes but not a segment boundary
        assert_eq!(config.strip_base_path("/previewer"), None);
    }

    #[test]
    fn join_url_path_rejects_traversal() {
        let root = Path::new("/project/public");
        assert_eq!(
            join_url_path(root, "/img/logo.svg"),
            Some(PathBuf::from("/project/public/img/logo.svg"))
        );
        assert_eq!(join_url_path(root, "/../secret"), None);
    }
}
