use anyhow::Result;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::TestProject;
use stackctl::build::{ComponentKind, SourceBuilder, resolve_binary};
use stackctl::core::StackError;
use stackctl::utils::{platform_key, sha256_hex};

#[tokio::test]
async fn test_operator_distribution_is_fetched_and_verified() -> Result<()> {
    let server = MockServer::start().await;
    let body = "#!/bin/sh\necho operator\n";
    for (route, content) in [
        ("/dist/op-cli".to_string(), body.to_string()),
        ("/dist/op-cli.sha256".to_string(), format!("{}  op-cli\n", sha256_hex(body.as_bytes()))),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(content))
            .expect(1)
            .mount(&server)
            .await;
    }

    let project = TestProject::new()?;
    let root = project.write(
        "stack.yaml",
        &format!(
            r#"
name: dist
stackctl:
  operator: remote
repos:
  operators:
    remote:
      binary:
        {platform}:
          url: {uri}/dist/op-cli
          sha256Url: {uri}/dist/op-cli.sha256
"#,
            platform = platform_key(),
            uri = server.uri()
        ),
    )?;

    let config = project.resolve(&[root]).await?;
    let baremetal = ComponentKind::Operator.lookup(config.repos(), "remote")?;
    let context = config.template_context()?;
    let builder = SourceBuilder::new(config.cache(), &context);

    let binary = resolve_binary(ComponentKind::Operator, "remote", baremetal, &builder).await?;
    assert_eq!(binary.file_name().and_then(|n| n.to_str()), Some("op-cli"));
    assert!(binary.starts_with(project.cache_root().join("dist").join("operators")));
    assert_eq!(std::fs::read_to_string(&binary)?, body);

    // Cached binary is reused without another download.
    let again = resolve_binary(ComponentKind::Operator, "remote", baremetal, &builder).await?;
    assert_eq!(binary, again);
    Ok(())
}

#[tokio::test]
async fn test_operator_without_matching_platform_or_source() -> Result<()> {
    let project = TestProject::new()?;
    let root = project.write(
        "stack.yaml",
        r#"
name: exotic
repos:
  operators:
    only-plan9:
      binary:
        plan9_mips:
          url: https://example.invalid/op
"#,
    )?;
    let config = project.resolve(&[root]).await?;
    let baremetal = ComponentKind::Operator.lookup(config.repos(), "only-plan9")?;
    let context = config.template_context()?;
    let builder = SourceBuilder::new(config.cache(), &context);

    let err = resolve_binary(ComponentKind::Operator, "only-plan9", baremetal, &builder)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StackError>(),
        Some(StackError::PlatformNotSupported { .. })
    ));

    let err = ComponentKind::Tool.lookup(config.repos(), "absent").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StackError>(),
        Some(StackError::ComponentNotFound { .. })
    ));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_tool_built_from_local_source() -> Result<()> {
    let project = TestProject::new()?;
    std::fs::create_dir_all(project.path().join("tool-src"))?;
    let root = project.write(
        "stack.yaml",
        r#"
name: local-build
version: "1.4"
repos:
  tools:
    greeter:
      baremetal:
        source:
          path: tool-src
          binary: "greeter-{{ version }}"
          buildCmds:
            - "OUT=greeter-{{ version }} sh -c 'printf built > \"$OUT\"'"
"#,
    )?;

    let config = project.resolve(&[root]).await?;
    let baremetal = ComponentKind::Tool.lookup(config.repos(), "greeter")?;
    let context = config.template_context()?;
    let builder = SourceBuilder::new(config.cache(), &context);

    let binary = resolve_binary(ComponentKind::Tool, "greeter", baremetal, &builder).await?;
    assert_eq!(binary.file_name().and_then(|n| n.to_str()), Some("greeter-1.4"));
    assert_eq!(std::fs::read_to_string(&binary)?, "built");
    Ok(())
}
