//! End-to-end resolution scenarios across whole project shapes.

use plinth_router::{ApiHandlerResolver, AppRouteResolver, PagesRouteResolver};
use plinth_vfs::MemoryVfs;
use std::path::PathBuf;
use std::sync::Arc;

fn vfs(files: &[&str]) -> Arc<MemoryVfs> {
    Arc::new(MemoryVfs::with_files(
        files.iter().map(|f| (f.to_string(), "export {}")),
    ))
}

#[test]
fn pages_only_project() {
    let vfs = vfs(&["/project/pages/index.jsx", "/project/pages/about.jsx"]);
    let resolver = PagesRouteResolver::new(vfs, "/project/pages");

    assert_eq!(
        resolver.resolve("/").unwrap().file,
        PathBuf::from("/project/pages/index.jsx")
    );
    assert_eq!(
        resolver.resolve("/about").unwrap().file,
        PathBuf::from("/project/pages/about.jsx")
    );
    assert!(resolver.resolve("/xyz").is_none());
}

#[test]
fn app_project_with_grouped_root_page() {
    let vfs = vfs(&["/project/app/layout.tsx", "/project/app/(marketing)/page.tsx"]);
    let resolver = AppRouteResolver::new(vfs, "/project/app");

    let route = resolver.resolve("/").unwrap();
    assert_eq!(route.page, PathBuf::from("/project/app/(marketing)/page.tsx"));
    assert_eq!(route.layouts, vec![PathBuf::from("/project/app/layout.tsx")]);
}

#[test]
fn three_level_layout_chain_is_ordered() {
    let vfs = vfs(&[
        "/project/app/layout.tsx",
        "/project/app/docs/layout.tsx",
        "/project/app/docs/guides/layout.tsx",
        "/project/app/docs/guides/page.tsx",
    ]);
    let resolver = AppRouteResolver::new(vfs, "/project/app");

    let route = resolver.resolve("/docs/guides").unwrap();
    assert_eq!(
        route.layouts,
        vec![
            PathBuf::from("/project/app/layout.tsx"),
            PathBuf::from("/project/app/docs/layout.tsx"),
            PathBuf::from("/project/app/docs/guides/layout.tsx"),
        ]
    );
}

#[test]
fn catch_all_binding_is_ordered() {
    let vfs = vfs(&["/project/app/blog/[...slug]/page.tsx"]);
    let resolver = AppRouteResolver::new(vfs, "/project/app");

    let route = resolver.resolve("/blog/a/b/c").unwrap();
    assert_eq!(
        route.params.get("slug").unwrap().as_many(),
        Some(&["a".to_string(), "b".to_string(), "c".to_string()][..])
    );
}

#[test]
fn literal_sibling_outranks_dynamic() {
    let vfs = vfs(&[
        "/project/app/about/page.tsx",
        "/project/app/[slug]/page.tsx",
    ]);
    let resolver = AppRouteResolver::new(vfs, "/project/app");

    let route = resolver.resolve("/about").unwrap();
    assert_eq!(route.page, PathBuf::from("/project/app/about/page.tsx"));
}

#[test]
fn mixed_project_resolves_api_before_pages() {
    // A project carrying both conventions: the nested route handler and the
    // flat API file coexist, and the nested one wins for the shared URL.
    let vfs = vfs(&[
        "/project/app/api/ping/route.ts",
        "/project/pages/api/ping.js",
        "/project/pages/api/legacy.js",
    ]);
    let resolver = ApiHandlerResolver::new(
        vfs,
        Some(PathBuf::from("/project/app")),
        Some(PathBuf::from("/project/pages")),
    );

    let nested = resolver.resolve("/api/ping").unwrap();
    assert_eq!(nested.file, PathBuf::from("/project/app/api/ping/route.ts"));

    let flat = resolver.resolve("/api/legacy").unwrap();
    assert_eq!(flat.file, PathBuf::from("/project/pages/api/legacy.js"));
}

#[test]
fn repeated_resolution_is_stable_for_plain_paths() {
    let vfs = vfs(&[
        "/project/pages/index.jsx",
        "/project/pages/a/b/c.jsx",
        "/project/pages/a/[x]/c.jsx",
        "/project/pages/[y]/index.jsx",
    ]);
    let resolver = PagesRouteResolver::new(vfs, "/project/pages");

    for path in ["/", "/a/b/c", "/a/z/c", "/q", "/nope/nope"] {
        let first = resolver.resolve(path);
        for _ in 0..5 {
            assert_eq!(resolver.resolve(path), first, "unstable for {path}");
        }
    }
}
