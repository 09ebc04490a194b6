//! File-convention route resolution.
//!
//! Maps URL paths to source files under two competing conventions:
//!
//! - **Pages**: a flat convention where each file under the pages root is one
//!   route ([`PagesRouteResolver`]).
//! - **App**: a nested convention using reserved filenames (`page`, `layout`,
//!   `route`, `loading`, `error`, `not-found`) per directory, with nested
//!   layouts, route groups, and catch-all segments ([`AppRouteResolver`]).
//!
//! API endpoints for both conventions resolve through
//! [`ApiHandlerResolver`]. All resolvers share the segment grammar in
//! [`segment`]: literal > dynamic > catch-all precedence with depth-first
//! backtracking, so a literal directory whose subtree fails to resolve hands
//! control back to sibling dynamic branches.
//!
//! Resolution is computed fresh per request and never cached; only transform
//! output is cached, one layer up.

pub mod api;
pub mod app;
pub mod pages;
pub mod params;
pub mod segment;

pub use api::{ApiHandlerResolver, ApiMatch, ApiRouteKind};
pub use app::{AppRoute, AppRouteResolver};
pub use pages::{PagesMatch, PagesRouteResolver};
pub use params::{ParamValue, RouteParams};
pub use segment::SegmentPattern;

/// Source extensions tried during resolution, in priority order.
pub const DEFAULT_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// Split a URL pathname into its non-empty segments.
///
/// Query strings and fragments must already be stripped by the caller.
pub fn split_pathname(pathname: &str) -> Vec<String> {
    pathname
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a directory entry name into `(base, extension)`.
///
/// `"route.ts"` becomes `("route", Some("ts"))`; names without a dot come
/// back unchanged with `None`.
pub fn split_extension(entry: &str) -> (&str, Option<&str>) {
    match entry.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base, Some(ext)),
        _ => (entry, None),
    }
}
