use anyhow::Result;
use predicates::prelude::*;
use serde_json::Value;

use crate::common::TestProject;

fn simple_project() -> Result<(TestProject, String)> {
    let project = TestProject::new()?;
    let root = project.write(
        "stack.yaml",
        "name: cli\nport: 8080\ninclude:\n  - url: extra.yaml\n",
    )?;
    project.write("extra.yaml", "port: 1\nregion: eu\n")?;
    Ok((project, root))
}

#[test]
fn test_config_show_as_json() -> Result<()> {
    let (project, root) = simple_project()?;
    let output = project
        .stackctl()
        .args(["config", "show", "--format", "json", "-c", &root])
        .output()?;
    assert!(output.status.success());

    let tree: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(tree["port"], 8080);
    assert_eq!(tree["region"], "eu");
    assert!(tree.get("include").is_none());
    Ok(())
}

#[test]
fn test_config_show_defaults_to_yaml() -> Result<()> {
    let (project, root) = simple_project()?;
    project
        .stackctl()
        .args(["-c", &root, "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("region: eu"));
    Ok(())
}

#[test]
fn test_config_write_toml() -> Result<()> {
    let (project, root) = simple_project()?;
    let out = project.path().join("resolved.toml");
    project
        .stackctl()
        .args(["-c", &root, "config", "write"])
        .arg(&out)
        .assert()
        .success();

    let written: toml::Value = toml::from_str(&std::fs::read_to_string(&out)?)?;
    assert_eq!(written["port"].as_integer(), Some(8080));
    Ok(())
}

#[test]
fn test_missing_config_reports_error() -> Result<()> {
    let project = TestProject::new()?;
    project
        .stackctl()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--config"));
    Ok(())
}

#[test]
fn test_undefined_template_variable_fails() -> Result<()> {
    let project = TestProject::new()?;
    let root = project.write(
        "stack.yaml",
        "name: bad\ndomain: x\nservices:\n  web:\n    host: \"{{ domian }}\"\n",
    )?;
    project
        .stackctl()
        .args(["-c", &root, "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("web"));
    Ok(())
}

#[test]
fn test_cache_clear_removes_project_namespace() -> Result<()> {
    let (project, root) = simple_project()?;
    let namespace = project.cache_root().join("cli").join("configs");
    std::fs::create_dir_all(&namespace)?;

    project.stackctl().args(["-c", &root, "cache", "clear"]).assert().success();
    assert!(!namespace.exists());
    Ok(())
}

#[test]
fn test_operator_path_without_operator() -> Result<()> {
    let (project, root) = simple_project()?;
    project
        .stackctl()
        .args(["-c", &root, "operator", "path"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stackctl.operator"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_operator_path_builds_local_source() -> Result<()> {
    let project = TestProject::new()?;
    std::fs::create_dir_all(project.path().join("op"))?;
    let root = project.write(
        "stack.yaml",
        r#"
name: op
stackctl:
  operator: local
repos:
  operators:
    local:
      source:
        path: op
        binary: run-op
        buildCmds:
          - "sh -c 'printf x > run-op'"
"#,
    )?;

    project
        .stackctl()
        .args(["-c", &root, "operator", "path"])
        .assert()
        .success()
        .stdout(predicate::str::ends_with("run-op\n"));
    assert!(project.path().join("op/run-op").exists());
    Ok(())
}
