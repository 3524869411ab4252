//! Integration tests for import resolution and the sync/async build paths.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use l20n::{Context, ContextError, MemoryLoader};

/// A chain of `depth` linked documents, each defining `probe` and importing
/// the next.
fn chained_loader(depth: usize) -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    for level in 1..=depth {
        let mut text = format!("<probe \"r{level}\">");
        if level < depth {
            text.push_str(&format!(" import(\"r{}.lol\")", level + 1));
        }
        loader.add(format!("r{level}.lol"), text);
    }
    loader
}

fn chained_context(depth: usize) -> Context {
    let ctx = Context::builder()
        .loader(Box::new(chained_loader(depth)))
        .build();
    ctx.add_resource(r#"<probe "root"> import("r1.lol")"#).unwrap();
    ctx
}

// =============================================================================
// Nesting limits
// =============================================================================

#[test]
fn six_nested_imports_build_and_flatten_in_declaration_order() {
    let ctx = chained_context(6);
    ctx.freeze().unwrap();
    // every document's entries made it in, in document order: the deepest
    // definition of `probe` is spliced last and wins
    assert_eq!(ctx.get("probe").unwrap(), "r6");
}

#[test]
fn eight_nested_imports_are_a_fatal_build_error() {
    let ctx = chained_context(8);
    assert_eq!(ctx.freeze(), Err(ContextError::TooManyNestedImports));
}

// =============================================================================
// Splicing
// =============================================================================

#[test]
fn imported_bodies_are_spliced_at_the_import_position() {
    let mut loader = MemoryLoader::new();
    loader.add("mid.lol", r#"<x "mid"> <y "mid">"#);
    let ctx = Context::builder().loader(Box::new(loader)).build();
    ctx.add_resource(r#"<x "before"> import("mid.lol") <y "after">"#)
        .unwrap();
    ctx.freeze().unwrap();
    // later document-order definitions overwrite earlier ones
    assert_eq!(ctx.get("x").unwrap(), "mid");
    assert_eq!(ctx.get("y").unwrap(), "after");
}

#[test]
fn sibling_imports_splice_without_invalidating_positions() {
    let mut loader = MemoryLoader::new();
    loader.add("a.lol", r#"<a "A">"#);
    loader.add("b.lol", r#"<b "B">"#);
    let ctx = Context::builder().loader(Box::new(loader)).build();
    ctx.add_resource(r#"import("a.lol") <mid "M"> import("b.lol")"#)
        .unwrap();
    ctx.freeze().unwrap();
    assert_eq!(ctx.get("a").unwrap(), "A");
    assert_eq!(ctx.get("mid").unwrap(), "M");
    assert_eq!(ctx.get("b").unwrap(), "B");
}

#[test]
fn import_uris_resolve_relative_to_the_importer() {
    let mut loader = MemoryLoader::new();
    loader.add("en/app.lol", r#"<a "A"> import("shared.lol")"#);
    loader.add("en/shared.lol", r#"<s "S">"#);
    let ctx = Context::builder().loader(Box::new(loader)).build();
    ctx.register_locales(["en"]).unwrap();
    ctx.link_resource_template(|code| format!("{code}/app.lol"))
        .unwrap();
    ctx.freeze().unwrap();
    assert_eq!(ctx.get("s").unwrap(), "S");
}

// =============================================================================
// Fetch failures
// =============================================================================

#[test]
fn a_missing_import_degrades_to_an_empty_resource() {
    let ctx = Context::new();
    let debug_lines = Rc::new(RefCell::new(Vec::new()));
    let sink = debug_lines.clone();
    ctx.add_debug_listener(move |line: &String| sink.borrow_mut().push(line.clone()));
    ctx.add_resource(r#"<a "A"> import("gone.lol") <b "B">"#)
        .unwrap();
    ctx.freeze().unwrap();
    assert_eq!(ctx.get("a").unwrap(), "A");
    assert_eq!(ctx.get("b").unwrap(), "B");
    let lines = debug_lines.borrow();
    assert!(lines.iter().any(|line| line.contains("gone.lol")));
}

// =============================================================================
// Async build parity
// =============================================================================

#[tokio::test]
async fn async_builds_have_identical_splicing_semantics() {
    let ctx = chained_context(6);
    ctx.freeze_async().await.unwrap();
    assert_eq!(ctx.get("probe").unwrap(), "r6");
}

#[tokio::test]
async fn async_builds_enforce_the_nesting_limit() {
    let ctx = chained_context(8);
    assert_eq!(
        ctx.freeze_async().await,
        Err(ContextError::TooManyNestedImports)
    );
}

#[tokio::test]
async fn async_and_sync_builds_agree() {
    let sync_ctx = chained_context(4);
    sync_ctx.freeze().unwrap();
    let async_ctx = chained_context(4);
    async_ctx.freeze_async().await.unwrap();
    assert_eq!(
        sync_ctx.get("probe").unwrap(),
        async_ctx.get("probe").unwrap()
    );
}

// =============================================================================
// File loading
// =============================================================================

#[test]
fn file_loader_reads_linked_resources_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("en")).unwrap();
    fs::write(
        dir.path().join("en/app.lol"),
        r#"<hello "Hello from disk"> import("extra.lol")"#,
    )
    .unwrap();
    fs::write(dir.path().join("en/extra.lol"), r#"<extra "More">"#).unwrap();

    let ctx = Context::builder()
        .loader(Box::new(l20n::FileLoader::new(dir.path())))
        .build();
    ctx.register_locales(["en"]).unwrap();
    ctx.link_resource_template(|code| format!("{code}/app.lol"))
        .unwrap();
    ctx.freeze().unwrap();
    assert_eq!(ctx.get("hello").unwrap(), "Hello from disk");
    assert_eq!(ctx.get("extra").unwrap(), "More");
}
