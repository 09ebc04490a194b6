//! Nested "app directory" convention resolver.
//!
//! Routes are directories; reserved filenames inside them carry the
//! behavior: `page` renders the route, `layout` wraps every descendant,
//! `route` is an HTTP handler, and `loading`/`error`/`not-found` provide
//! subtree UI resolved by nearest ancestor. Route groups `(name)` organize
//! files without contributing a URL segment, so descent looks through them
//! transparently, on both sides of every dynamic branch.

use crate::params::{ParamValue, RouteParams};
use crate::segment::SegmentPattern;
use crate::{split_pathname, DEFAULT_EXTENSIONS};
use plinth_vfs::Vfs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A fully resolved app route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRoute {
    /// The page file for the terminal directory
    pub page: PathBuf,
    /// Ancestor layout chain, outermost first; the first entry, if any, is
    /// the project root layout, and no path appears twice
    pub layouts: Vec<PathBuf>,
    /// Parameters bound by dynamic and catch-all segments along the way
    pub params: RouteParams,
    /// Nearest-ancestor `loading` file, if any
    pub loading: Option<PathBuf>,
    /// Nearest-ancestor `error` file, if any
    pub error: Option<PathBuf>,
    /// Nearest-ancestor `not-found` file, if any
    pub not_found: Option<PathBuf>,
}

/// What a descent is looking for at the terminal directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Page,
    Route,
}

impl Terminal {
    fn base(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Route => "route",
        }
    }
}

/// Accumulated state of one descent branch.
///
/// Branches clone this before exploring, so backtracking needs no rollback.
#[derive(Debug, Clone, Default)]
struct Walk {
    layouts: Vec<PathBuf>,
    params: RouteParams,
}

/// Resolver for the nested app convention.
#[derive(Debug)]
pub struct AppRouteResolver {
    vfs: Arc<dyn Vfs>,
    root: PathBuf,
    extensions: Vec<String>,
}

impl AppRouteResolver {
    /// Create a resolver over `root` (the app directory).
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

    /// The app root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a URL pathname to a page plus its layout chain and
    /// convention files.
    pub fn resolve(&self, pathname: &str) -> Option<AppRoute> {
        let segments = split_pathname(pathname);
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        let (page, walk) = self.descend(&self.root, &refs, Walk::default(), Terminal::Page)?;
        tracing::debug!(pathname, page = %page.display(), "app route resolved");

        let page_dir = page.parent().unwrap_or(&self.root).to_path_buf();
        Some(AppRoute {
            loading: self.nearest_convention(&page_dir, "loading"),
            error: self.nearest_convention(&page_dir, "error"),
            not_found: self.nearest_convention(&page_dir, "not-found"),
            page,
            layouts: walk.layouts,
            params: walk.params,
        })
    }

    /// Resolve a URL pathname to a nested `route.<ext>` handler file.
    ///
    /// Same descent rules as [`resolve`](Self::resolve), but the terminal
    /// directory must hold a route file; layouts are irrelevant here.
    pub fn resolve_route(&self, pathname: &str) -> Option<(PathBuf, RouteParams)> {
        let segments = split_pathname(pathname);
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        let (file, walk) = self.descend(&self.root, &refs, Walk::default(), Terminal::Route)?;
        Some((file, walk.params))
    }

    /// Depth-first descent with backtracking.
    ///
    /// Branch order at each directory: literal child, route groups, dynamic
    /// children, catch-all children. A branch that fails to produce a
    /// terminal file returns `None` and the caller moves on to the next.
    fn descend(
        &self,
        dir: &Path,
        segments: &[&str],
        mut walk: Walk,
        terminal: Terminal,
    ) -> Option<(PathBuf, Walk)> {
        // A layout at any visited directory wraps everything below it,
        // including directories reached through route groups.
        if let Some(layout) = self.convention_file(dir, "layout") {
            if !walk.layouts.contains(&layout) {
                walk.layouts.push(layout);
            }
        }

        let Some((segment, rest)) = segments.split_first() else {
            return self.finish(dir, walk, terminal);
        };

        // Literal child directory
        let literal = dir.join(segment);
        if self.vfs.is_dir(&literal)
            && !SegmentPattern::parse(segment).is_dynamic()
        {
            if let Some(found) = self.descend(&literal, rest, walk.clone(), terminal) {
                return Some(found);
            }
        }

        // Route groups do not consume the segment; a literal inside a group
        // still outranks a dynamic sibling outside it
        for entry in self.group_children(dir) {
            if let Some(found) = self.descend(&entry, segments, walk.clone(), terminal) {
                return Some(found);
            }
        }

        // Single dynamic children
        for (name, child) in self.pattern_children(dir, |p| matches!(p, SegmentPattern::Dynamic(_)))
        {
            let mut branch = walk.clone();
            branch
                .params
                .insert(name, ParamValue::Single(segment.to_string()));
            if let Some(found) = self.descend(&child, rest, branch, terminal) {
                return Some(found);
            }
        }

        // Catch-all children consume every remaining segment
        for (name, child) in self.pattern_children(dir, |p| {
            matches!(
                p,
                SegmentPattern::CatchAll(_) | SegmentPattern::OptionalCatchAll(_)
            )
        }) {
            let mut branch = walk.clone();
            branch.params.insert(
                name,
                ParamValue::Many(segments.iter().map(|s| s.to_string()).collect()),
            );
            if let Some(found) = self.descend(&child, &[], branch, terminal) {
                return Some(found);
            }
        }

        None
    }

    /// Terminal handling once the URL is fully consumed.
    fn finish(&self, dir: &Path, walk: Walk, terminal: Terminal) -> Option<(PathBuf, Walk)> {
        if let Some(file) = self.convention_file(dir, terminal.base()) {
            return Some((file, walk));
        }

        // A page inside a route group satisfies the parent URL
        for entry in self.group_children(dir) {
            if let Some(found) = self.descend(&entry, &[], walk.clone(), terminal) {
                return Some(found);
            }
        }

        // Optional catch-all may match zero remaining segments
        for (name, child) in self.pattern_children(dir, |p| {
            matches!(p, SegmentPattern::OptionalCatchAll(_))
        }) {
            let mut branch = walk.clone();
            branch.params.insert(name, ParamValue::Many(Vec::new()));
            if let Some(found) = self.descend(&child, &[], branch, terminal) {
                return Some(found);
            }
        }

        None
    }

    /// Route-group child directories, in listing order.
    fn group_children(&self, dir: &Path) -> Vec<PathBuf> {
        self.vfs
            .read_dir(dir)
            .unwrap_or_default()
            .iter()
            .filter(|entry| SegmentPattern::parse(entry).is_group())
            .map(|entry| dir.join(entry))
            .filter(|path| self.vfs.is_dir(path))
            .collect()
    }

    /// Child directories whose pattern satisfies `filter`, as
    /// `(param_name, path)` pairs in listing order.
    fn pattern_children(
        &self,
        dir: &Path,
        filter: impl Fn(&SegmentPattern) -> bool,
    ) -> Vec<(String, PathBuf)> {
        self.vfs
            .read_dir(dir)
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| {
                let pattern = SegmentPattern::parse(entry);
                if !filter(&pattern) {
                    return None;
                }
                let path = dir.join(entry);
                if !self.vfs.is_dir(&path) {
                    return None;
                }
                Some((pattern.name().to_string(), path))
            })
            .collect()
    }

    /// Walk upward from `start` to the app root, returning the first
    /// directory that defines `<base>.<ext>`. Each convention resolves
    /// independently, so callers invoke this once per convention name.
    fn nearest_convention(&self, start: &Path, base: &str) -> Option<PathBuf> {
        let mut dir = start;
        loop {
            if !dir.starts_with(&self.root) {
                return None;
            }
            if let Some(file) = self.convention_file(dir, base) {
                return Some(file);
            }
            if dir == self.root {
                return None;
            }
            dir = dir.parent()?;
        }
    }

    /// Try `<dir>/<base>.<ext>` for each supported extension.
    fn convention_file(&self, dir: &Path, base: &str) -> Option<PathBuf> {
        for ext in &self.extensions {
            let candidate = dir.join(format!("{base}.{ext}"));
            if self.vfs.exists(&candidate) && !self.vfs.is_dir(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}
