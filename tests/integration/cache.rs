use anyhow::Result;
use reqwest::Url;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::TestProject;
use stackctl::cache::{Cache, Category, checksum_path};
use stackctl::core::{Deadline, StackError};
use stackctl::document::Reference;
use stackctl::utils::sha256_hex;

async fn serve(server: &MockServer, route: &str, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_remote_includes_are_fetched_once_and_cached() -> Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/stacks/base.yaml", "tier: base\ninclude:\n  - url: db.yaml\n", 1).await;
    serve(&server, "/stacks/db.yaml", "db:\n  engine: postgres\n", 1).await;

    let project = TestProject::new()?;
    let root = project.write(
        "stack.yaml",
        &format!("name: remote\ninclude:\n  - url: {}/stacks/base.yaml\n", server.uri()),
    )?;

    let first = project.resolve(std::slice::from_ref(&root)).await?;
    assert_eq!(first.tree()["tier"], "base");
    assert_eq!(first.tree()["db"]["engine"], "postgres");

    let base = Url::parse(&format!("{}/stacks/base.yaml", server.uri()))?;
    let cached = first.cache().keyed_path(Category::Configs, base.as_str(), ".yaml");
    assert!(cached.exists());
    assert!(cached.starts_with(project.cache_root().join("remote").join("configs")));

    // Second run is served from the cache; the mocks expect one hit each.
    let second = project.resolve(&[root]).await?;
    assert_eq!(first.tree(), second.tree());
    Ok(())
}

#[tokio::test]
async fn test_remote_root_name_is_a_stable_project_identity() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stack.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("name: shop
port: 80
"))
        .mount(&server)
        .await;

    let project = TestProject::new()?;
    let root = format!("{}/stack.yaml", server.uri());

    let first = project.resolve(std::slice::from_ref(&root)).await?;
    let second = project.resolve(&[root]).await?;
    assert_eq!(first.project_id(), "shop");
    assert_eq!(second.project_id(), first.project_id());
    assert_eq!(first.cache().dir(), project.cache_root().join("shop"));
    assert_eq!(second.tree()["port"], 80);
    Ok(())
}

#[tokio::test]
async fn test_http_error_status_is_a_fetch_error() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.yaml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let project = TestProject::new()?;
    let root = project.write(
        "stack.yaml",
        &format!("name: gone\ninclude:\n  - url: {}/gone.yaml\n", server.uri()),
    )?;

    let err = project.resolve(&[root]).await.unwrap_err();
    match err.downcast_ref::<StackError>() {
        Some(StackError::FetchError { url, reason }) => {
            assert!(url.ends_with("/gone.yaml"));
            assert!(reason.contains("404"));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }

    let leftover = project.cache_root().join("gone").join("configs");
    let entries = std::fs::read_dir(&leftover).map(|dir| dir.count()).unwrap_or(0);
    assert_eq!(entries, 0);
    Ok(())
}

fn reference(server: &MockServer, name: &str) -> Result<Reference> {
    let mut reference = Reference::new(Url::parse(&format!("{}/{name}", server.uri()))?);
    reference.checksum = Some(Url::parse(&format!("{}/{name}.sha256", server.uri()))?);
    Ok(reference)
}

#[tokio::test]
async fn test_checksum_mismatch_keeps_failing() -> Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/tool.bin", "payload", 1).await;
    serve(&server, "/tool.bin.sha256", &format!("{}  tool.bin\n", sha256_hex(b"other")), 1).await;

    let temp = TempDir::new()?;
    let cache = Cache::with_dir(temp.path().to_path_buf())?;
    let reference = reference(&server, "tool.bin")?;

    let err = cache.resolve(&reference, Category::Files).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StackError>(),
        Some(StackError::ChecksumMismatch { .. })
    ));

    // The untrusted file stays in place but is not served on the next run.
    let err = cache.resolve(&reference, Category::Files).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StackError>(),
        Some(StackError::ChecksumMismatch { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_checksum_match_is_case_insensitive() -> Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/tool.bin", "payload", 1).await;
    serve(&server, "/tool.bin.sha256", &sha256_hex(b"payload").to_uppercase(), 1).await;

    let temp = TempDir::new()?;
    let cache = Cache::with_dir(temp.path().to_path_buf())?;
    let reference = reference(&server, "tool.bin")?;

    let path = cache.resolve(&reference, Category::Files).await?;
    assert_eq!(std::fs::read_to_string(&path)?, "payload");
    assert!(checksum_path(&path).exists());

    let again = cache.resolve(&reference, Category::Files).await?;
    assert_eq!(path, again);
    Ok(())
}

#[tokio::test]
async fn test_slow_fetch_is_cancelled_by_deadline() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a: 1\n").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let temp = TempDir::new()?;
    let cache = Cache::with_dir(temp.path().to_path_buf())?
        .with_deadline(Deadline::after(Duration::from_millis(200)));
    let slow = Reference::new(Url::parse(&format!("{}/slow.yaml", server.uri()))?);

    let err = cache.resolve(&slow, Category::Configs).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StackError>(),
        Some(StackError::Cancelled { .. })
    ));
    Ok(())
}
