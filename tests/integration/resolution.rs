use anyhow::Result;
use serde_json::json;

use crate::common::TestProject;
use stackctl::core::{MultiError, StackError};
use stackctl::resolver::Node;

fn layered_project() -> Result<(TestProject, Vec<String>)> {
    let project = TestProject::new()?;
    let r1 = project.write(
        "r1.yaml",
        r#"
name: demo
order: [R1]
owner: r1
include:
  - url: layers/i1a.yaml
  - url: layers/i1b.yaml
"#,
    )?;
    project.write("layers/i1a.yaml", "order: [I1a]\nowner: i1a\nregion: eu\n")?;
    project.write("layers/i1b.yaml", "order: [I1b]\nowner: i1b\nregion: us\nreplicas: 2\n")?;
    let r2 = project.write(
        "r2.json",
        r#"{"order": ["R2"], "owner": "r2", "include": [{"url": "i2a.toml"}]}"#,
    )?;
    project.write("i2a.toml", "order = [\"I2a\"]\nowner = \"i2a\"\nzone = \"z1\"\n")?;
    Ok((project, vec![r1, r2]))
}

#[tokio::test]
async fn test_priority_order_across_roots_and_includes() -> Result<()> {
    let (project, roots) = layered_project()?;
    let config = project.resolve(&roots).await?;
    let tree = config.tree();

    assert_eq!(tree["order"], json!(["R1", "I1a", "I1b", "R2", "I2a"]));
    assert_eq!(tree["owner"], "r1");
    assert_eq!(tree["region"], "eu");
    assert_eq!(tree["replicas"], 2);
    assert_eq!(tree["zone"], "z1");
    assert!(!tree.contains_key("include"));
    assert_eq!(config.project_id(), "demo");

    let walked: Vec<_> = config
        .documents()
        .iter()
        .flat_map(|root| root.flatten())
        .map(|doc| doc.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(walked, vec!["r1.yaml", "i1a.yaml", "i1b.yaml", "r2.json", "i2a.toml"]);
    Ok(())
}

#[tokio::test]
async fn test_resolution_is_idempotent() -> Result<()> {
    let (project, roots) = layered_project()?;
    let first = project.resolve(&roots).await?;
    let second = project.resolve(&roots).await?;
    assert_eq!(first.tree(), second.tree());
    Ok(())
}

#[tokio::test]
async fn test_cycles_and_diamonds_resolve_each_document_once() -> Result<()> {
    let project = TestProject::new()?;
    let a = project.write(
        "a.yaml",
        "name: cyc\nseen: [a]\ninclude:\n  - url: b.yaml\n  - url: c.yaml\n",
    )?;
    project.write("b.yaml", "seen: [b]\ninclude:\n  - url: a.yaml\n  - url: c.yaml\n")?;
    project.write("c.yaml", "seen: [c]\n")?;

    let config = project.resolve(&[a]).await?;
    assert_eq!(config.tree()["seen"], json!(["a", "b", "c"]));
    Ok(())
}

#[tokio::test]
async fn test_repo_graph_is_merged_under_repos() -> Result<()> {
    let project = TestProject::new()?;
    let root = project.write(
        "stack.yaml",
        r#"
name: repos
repos:
  include:
    - url: repos/base.yaml
  operators:
    local:
      source:
        path: ./ops
        binary: local-op
  files:
    motd:
      url: files/motd.txt
"#,
    )?;
    project.write(
        "repos/base.yaml",
        r#"
operators:
  local:
    source:
      path: ./ignored
      binary: other
  remote:
    binary: {}
files:
  banner:
    url: banner.txt
"#,
    )?;
    project.write("files/motd.txt", "hello\n")?;
    project.write("repos/banner.txt", "banner\n")?;

    let config = project.resolve(&[root]).await?;
    let repos = config.repos();

    assert!(repos.operators.contains_key("remote"));
    let local = repos.operators["local"].source.as_ref().unwrap();
    assert_eq!(local.binary, "local-op");
    assert!(local.path.as_deref().unwrap().ends_with("ops"));

    // Relative file URLs resolve against the declaring document.
    assert_eq!(repos.files["motd"].url, Some(project.url("files/motd.txt")?));
    assert_eq!(repos.files["banner"].url, Some(project.url("repos/banner.txt")?));

    let stored = &config.tree()["repos"];
    assert!(stored.get("include").is_none());
    assert!(stored["operators"].get("remote").is_some());
    Ok(())
}

#[tokio::test]
async fn test_sibling_failures_are_collected() -> Result<()> {
    let project = TestProject::new()?;
    let root = project.write(
        "root.yaml",
        "name: broken\ninclude:\n  - url: missing-one.yaml\n  - url: good.yaml\n  - url: missing-two.yaml\n",
    )?;
    project.write("good.yaml", "ok: true\n")?;

    let err = project.resolve(&[root]).await.unwrap_err();
    let multi = err.downcast_ref::<MultiError>().expect("aggregated error");
    assert_eq!(multi.errors().len(), 2);
    let text = format!("{err}");
    assert!(text.contains("missing-one.yaml"));
    assert!(text.contains("missing-two.yaml"));
    Ok(())
}

#[tokio::test]
async fn test_single_failure_is_not_wrapped() -> Result<()> {
    let project = TestProject::new()?;
    let root = project.write("root.yaml", "name: one\ninclude:\n  - url: broken.yaml\n")?;
    project.write("broken.yaml", "key: [unclosed\n")?;

    let err = project.resolve(&[root]).await.unwrap_err();
    assert!(err.downcast_ref::<MultiError>().is_none());
    assert!(matches!(
        err.downcast_ref::<StackError>(),
        Some(StackError::ParseError { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_shape_conflict_fails_the_run() -> Result<()> {
    let project = TestProject::new()?;
    let root = project.write(
        "root.yaml",
        "name: clash\ndb:\n  host: a\ninclude:\n  - url: other.yaml\n",
    )?;
    project.write("other.yaml", "db: [a, b]\n")?;

    let err = project.resolve(&[root]).await.unwrap_err();
    match err.downcast_ref::<StackError>() {
        Some(StackError::MergeConflict { path, .. }) => assert_eq!(path, "db"),
        other => panic!("expected merge conflict, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_unknown_extension_is_rejected() -> Result<()> {
    let project = TestProject::new()?;
    let root = project.write("stack.ini", "name = x\n")?;
    let err = project.resolve(&[root]).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StackError>(),
        Some(StackError::UnknownFormat { .. })
    ));
    Ok(())
}
