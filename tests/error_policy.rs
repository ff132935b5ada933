// tests/error_policy.rs

//! Failure handling: optional-dependency isolation, fatal non-optional
//! failures, and the root-only devDependencies policy.

mod common;

use canopy::{CollectingSink, Error};
use common::{resolver_with, write_project, MockFetcher};
use semver::Version;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

#[tokio::test]
async fn test_missing_non_optional_dependency_is_fatal() {
    let mock = Arc::new(MockFetcher::new());

    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    write_project(&project, r#"{ "dependencies": { "ghost": "^1.0.0" } }"#);

    let resolver = resolver_with(mock, &temp.path().join("cache"));
    let result = resolver.resolve(&project).await;

    // The error names the offending package and range
    match result {
        Err(Error::NotFound(spec)) => assert_eq!(spec, "ghost@^1.0.0"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failing_optional_dependency_is_dropped() {
    let mut mock = MockFetcher::new();
    mock.add_package(
        "a",
        "1.0.0",
        &[("b", "^1.0.0")],
        &[("native-extras", "^1.0.0")],
    );
    mock.add("b", "1.0.0", &[]);
    let mock = Arc::new(mock);

    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    write_project(&project, r#"{ "dependencies": { "a": "^1.0.0" } }"#);

    let sink = Arc::new(CollectingSink::new());
    let resolver = resolver_with(mock, &temp.path().join("cache")).with_sink(sink.clone());
    let plan = resolver.resolve(&project).await.unwrap();

    // Siblings resolve; the failed optional leaves no trace
    assert_eq!(
        plan.install_path("b", &v("1.0.0")),
        Some(Path::new("node_modules/b"))
    );
    assert!(plan.get("native-extras").is_none());
    assert!(sink.events().iter().all(|e| e.name != "native-extras"));
}

#[tokio::test]
async fn test_root_optional_dependency_is_dropped() {
    let mut mock = MockFetcher::new();
    mock.add("a", "1.0.0", &[]);
    let mock = Arc::new(mock);

    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    write_project(
        &project,
        r#"{
            "dependencies": { "a": "^1.0.0" },
            "optionalDependencies": { "fsevents": "^2.0.0" }
        }"#,
    );

    let resolver = resolver_with(mock, &temp.path().join("cache"));
    let plan = resolver.resolve(&project).await.unwrap();

    assert!(plan.get("a").is_some());
    assert!(plan.get("fsevents").is_none());
}

#[tokio::test]
async fn test_failure_inside_optional_subtree_is_absorbed() {
    let mut mock = MockFetcher::new();
    mock.add("solid", "1.0.0", &[]);
    // opt resolves, but its own non-optional dependency does not exist
    mock.add("opt", "1.0.0", &[("missing", "^1.0.0")]);
    let mock = Arc::new(mock);

    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    write_project(
        &project,
        r#"{
            "dependencies": { "solid": "^1.0.0" },
            "optionalDependencies": { "opt": "^1.0.0" }
        }"#,
    );

    let resolver = resolver_with(mock, &temp.path().join("cache"));
    let plan = resolver.resolve(&project).await.unwrap();

    // The failure two levels inside the optional subtree never surfaces
    assert!(plan.get("solid").is_some());
    assert!(plan.get("opt").is_some());
    assert!(plan.get("missing").is_none());
}

#[tokio::test]
async fn test_dev_dependencies_root_only() {
    let mut mock = MockFetcher::new();
    mock.add("tool", "1.0.0", &[("helper", "^1.0.0")]);
    mock.add("helper", "1.0.0", &[]);
    let mock = Arc::new(mock);

    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    write_project(&project, r#"{ "devDependencies": { "tool": "^1.0.0" } }"#);

    let resolver = resolver_with(mock.clone(), &temp.path().join("cache"));
    let plan = resolver.resolve(&project).await.unwrap();

    // Root devDependencies install, along with their regular deps
    assert!(plan.get("tool").is_some());
    assert!(plan.get("helper").is_some());
}

#[tokio::test]
async fn test_dev_dependencies_excluded_when_disabled() {
    let mut mock = MockFetcher::new();
    mock.add("tool", "1.0.0", &[]);
    mock.add("lib", "1.0.0", &[]);
    let mock = Arc::new(mock);

    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    write_project(
        &project,
        r#"{
            "dependencies": { "lib": "^1.0.0" },
            "devDependencies": { "tool": "^1.0.0" }
        }"#,
    );

    let config = canopy::ResolverConfig::default()
        .with_registry_url("https://mock.registry")
        .with_cache_root(temp.path().join("cache"))
        .with_dev(false);
    let resolver = canopy::Resolver::with_fetcher(config, mock);
    let plan = resolver.resolve(&project).await.unwrap();

    assert!(plan.get("lib").is_some());
    assert!(plan.get("tool").is_none());
}

#[tokio::test]
async fn test_missing_project_manifest_is_io_error() {
    let mock = Arc::new(MockFetcher::new());

    let temp = TempDir::new().unwrap();
    let resolver = resolver_with(mock, &temp.path().join("cache"));
    let result = resolver.resolve(&temp.path().join("no-such-project")).await;

    assert!(matches!(result, Err(Error::IoError(_))));
}

#[tokio::test]
async fn test_first_failure_in_precedence_order_reported() {
    let mut mock = MockFetcher::new();
    mock.add("ok", "1.0.0", &[]);
    let mock = Arc::new(mock);

    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    // Two missing packages; "alpha" precedes "zeta" in precedence order
    write_project(
        &project,
        r#"{ "dependencies": { "zeta": "^1.0.0", "ok": "^1.0.0", "alpha": "^1.0.0" } }"#,
    );

    let resolver = resolver_with(mock, &temp.path().join("cache"));
    let result = resolver.resolve(&project).await;

    match result {
        Err(Error::NotFound(spec)) => assert_eq!(spec, "alpha@^1.0.0"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}
