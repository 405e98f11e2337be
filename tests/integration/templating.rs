use anyhow::Result;
use serde_json::json;

use crate::common::TestProject;
use stackctl::core::{MultiError, StackError};

#[tokio::test]
async fn test_full_pipeline_renders_files_and_services() -> Result<()> {
    let project = TestProject::new()?;
    let root = project.write(
        "stack.yaml",
        r#"
name: shop
domain: shop.example
globals:
  postgres:
    port: 5432
    user: app
configs:
  api:
    user: api
services:
  api:
    host: "api.{{ domain }}"
    db_port: "{{ configs.api.port }}"
    stackctl:
      config:
        globals: postgres
  raw:
    command: "{{ not_rendered }}"
    stackctl:
      config:
        noTemplate: true
repos:
  files:
    nginx:
      url: templates/nginx.conf
      template: true
    logo:
      url: static/logo.txt
"#,
    )?;
    project.write(
        "templates/nginx.conf",
        "server_name {{ domain }};\n# {{ projectID }} on {{ OS }}\n",
    )?;
    project.write("static/logo.txt", "{{ left alone }}\n")?;

    let config = project.resolve(&[root]).await?;
    let tree = config.tree();

    // Globals are folded into the service config and dropped.
    assert!(!tree.contains_key("globals"));
    assert_eq!(tree["configs"]["api"], json!({"user": "api", "port": 5432}));

    assert_eq!(tree["services"]["api"]["host"], "api.shop.example");
    assert_eq!(tree["services"]["api"]["db_port"], "5432");
    assert_eq!(tree["services"]["raw"]["command"], "{{ not_rendered }}");

    let nginx = config.repos().files["nginx"].path.clone().expect("rendered path");
    assert!(nginx.starts_with(project.cache_root().join("shop").join("template")));
    let rendered = std::fs::read_to_string(&nginx)?;
    assert!(rendered.starts_with("server_name shop.example;\n# shop on "));

    let logo = config.repos().files["logo"].path.clone().expect("cached path");
    assert_eq!(std::fs::read_to_string(logo)?, "{{ left alone }}\n");

    // The stored repos section carries the rendered path too.
    assert!(tree["repos"]["files"]["nginx"]["path"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_undefined_global_fails_the_run() -> Result<()> {
    let project = TestProject::new()?;
    let root = project.write(
        "stack.yaml",
        r#"
name: typo
globals:
  postgres: {port: 5432}
services:
  api:
    stackctl: {config: {globals: postgress}}
"#,
    )?;

    let err = project.resolve(&[root]).await.unwrap_err();
    match err.downcast_ref::<StackError>() {
        Some(StackError::UndefinedGlobal { service, global }) => {
            assert_eq!(service, "api");
            assert_eq!(global, "postgress");
        }
        other => panic!("expected undefined global, got {other:?}"),
    }
    assert!(format!("{err:#}").contains("did you mean 'postgres'"));
    Ok(())
}

#[tokio::test]
async fn test_every_broken_service_is_reported() -> Result<()> {
    let project = TestProject::new()?;
    let root = project.write(
        "stack.yaml",
        r#"
name: broken
services:
  one:
    cmd: "{{ missing_one }}"
  two:
    cmd: "{{ missing_two }}"
  fine:
    cmd: "ok"
"#,
    )?;

    let err = project.resolve(&[root]).await.unwrap_err();
    let multi = err.downcast_ref::<MultiError>().expect("aggregated error");
    assert_eq!(multi.errors().len(), 2);
    assert!(multi.errors().iter().all(|e| matches!(
        e.downcast_ref::<StackError>(),
        Some(StackError::TemplateError { .. })
    )));
    Ok(())
}
