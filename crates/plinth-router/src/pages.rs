//! Flat "pages" convention resolver.
//!
//! Each file under the pages root is one route: `/about` resolves to
//! `about.<ext>` or `about/index.<ext>`, `/` to `index.<ext>`. Dynamic and
//! catch-all entries are tried only after literal candidates fail, with full
//! backtracking across sibling branches.

use crate::params::{ParamValue, RouteParams};
use crate::segment::SegmentPattern;
use crate::{split_extension, split_pathname, DEFAULT_EXTENSIONS};
use plinth_vfs::Vfs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A resolved pages route.
///
/// No params are retained here; they are re-derived on demand from the
/// matched file path via [`PagesRouteResolver::derive_params`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagesMatch {
    /// Source file implementing the route
    pub file: PathBuf,
}

/// Resolver for the flat pages convention.
#[derive(Debug)]
pub struct PagesRouteResolver {
    vfs: Arc<dyn Vfs>,
    root: PathBuf,
    extensions: Vec<String>,
}

impl PagesRouteResolver {
    /// Create a resolver over `root` (the pages directory).
    pub fn new(vfs: Arc<dyn Vfs>, root: impl Into<PathBuf>) -> Self {
        Self {
            vfs,
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Override the extension priority list.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// The pages root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a URL pathname to a source file.
    ///
    /// Returns `None` when no file matches; directory read failures along the
    /// way count as "no match" for that branch, never as a request failure.
    pub fn resolve(&self, pathname: &str) -> Option<PagesMatch> {
        let segments = split_pathname(pathname);
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        let file = self.resolve_in(&self.root, &refs)?;
        tracing::debug!(pathname, file = %file.display(), "pages route resolved");
        Some(PagesMatch { file })
    }

    fn resolve_in(&self, dir: &Path, segments: &[&str]) -> Option<PathBuf> {
        let Some((segment, rest)) = segments.split_first() else {
            // End of the URL: this directory's index file, or an optional
            // catch-all matching zero segments.
            if let Some(file) = self.try_file(dir, "index") {
                return Some(file);
            }
            return self.find_catch_all(dir, &[]);
        };

        // Literal file wins over everything when this is the last segment
        if rest.is_empty() {
            if let Some(file) = self.try_file(dir, segment) {
                return Some(file);
            }
        }

        // Literal directory; backtrack into siblings if its subtree fails
        let literal = dir.join(segment);
        if self.vfs.is_dir(&literal) {
            if let Some(found) = self.resolve_in(&literal, rest) {
                return Some(found);
            }
        }

        if let Some(found) = self.find_dynamic(dir, rest) {
            return Some(found);
        }

        self.find_catch_all(dir, segments)
    }

    /// Try `[name].<ext>` files (terminal only) and `[name]/` directories.
    fn find_dynamic(&self, dir: &Path, rest: &[&str]) -> Option<PathBuf> {
        let entries = self.vfs.read_dir(dir).unwrap_or_default();
        for entry in &entries {
            let (base, ext) = split_extension(entry);
            if !matches!(SegmentPattern::parse(base), SegmentPattern::Dynamic(_)) {
                continue;
            }
            let path = dir.join(entry);
            match ext {
                Some(e) if rest.is_empty() && self.is_supported(e) && !self.vfs.is_dir(&path) => {
                    return Some(path);
                }
                None if self.vfs.is_dir(&path) => {
                    if let Some(found) = self.resolve_in(&path, rest) {
                        return Some(found);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Try `[...name]` / `[[...name]]` entries against all remaining
    /// segments. A plain catch-all needs at least one segment left.
    fn find_catch_all(&self, dir: &Path, remaining: &[&str]) -> Option<PathBuf> {
        let entries = self.vfs.read_dir(dir).unwrap_or_default();
        for entry in &entries {
            let (base, ext) = split_extension(entry);
            let accepts = match SegmentPattern::parse(base) {
                SegmentPattern::CatchAll(_) => !remaining.is_empty(),
                SegmentPattern::OptionalCatchAll(_) => true,
                _ => false,
            };
            if !accepts {
                continue;
            }
            let path = dir.join(entry);
            match ext {
                Some(e) if self.is_supported(e) && !self.vfs.is_dir(&path) => {
                    return Some(path);
                }
                None if self.vfs.is_dir(&path) => {
                    if let Some(found) = self.try_file(&path, "index") {
                        return Some(found);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Try `<dir>/<base>.<ext>` for each supported extension.
    fn try_file(&self, dir: &Path, base: &str) -> Option<PathBuf> {
        for ext in &self.extensions {
            let candidate = dir.join(format!("{base}.{ext}"));
            if self.vfs.exists(&candidate) && !self.vfs.is_dir(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn is_supported(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    /// Re-derive params by replaying the matched file's path pattern against
    /// the URL. Matches are lenient: anything that lines up gets bound.
    pub fn derive_params(&self, file: &Path, pathname: &str) -> RouteParams {
        let mut params = RouteParams::new();
        let Ok(relative) = file.strip_prefix(&self.root) else {
            return params;
        };
        let segments = split_pathname(pathname);
        let mut remaining = segments.as_slice();

        let components: Vec<&str> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        for (i, component) in components.iter().enumerate() {
            let is_last = i + 1 == components.len();
            let base = if is_last {
                split_extension(component).0
            } else {
                component
            };
            match SegmentPattern::parse(base) {
                SegmentPattern::Dynamic(name) => {
                    if let Some((value, rest)) = remaining.split_first() {
                        params.insert(name, ParamValue::Single(value.clone()));
                        remaining = rest;
                    }
                }
                SegmentPattern::CatchAll(name) | SegmentPattern::OptionalCatchAll(name) => {
                    params.insert(name, ParamValue::Many(remaining.to_vec()));
                    remaining = &[];
                }
                SegmentPattern::Group(_) => {}
                SegmentPattern::Literal(lit) => {
                    // An index leaf consumes nothing
                    if !(is_last && lit == "index") && !remaining.is_empty() {
                        remaining = &remaining[1..];
                    }
                }
            }
        }
        params
    }
}
