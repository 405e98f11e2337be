//! Service pass: render each service definition as a template.
//!
//! A definition is serialized to YAML, rendered, and parsed back in place.
//! Services that set `stackctl.config.noTemplate: true` are left alone.

use anyhow::Result;
use serde_json::Value;
use tera::Context as TeraContext;

use crate::constants::{SERVICES_KEY, TOOL_KEY};
use crate::core::{ErrorSet, StackError};
use crate::document::{Tree, extract_optional};

fn template_disabled(definition: &Value) -> Result<bool, StackError> {
    Ok(extract_optional::<bool>(definition, &[TOOL_KEY, "config", "noTemplate"])?.unwrap_or(false))
}

/// Render one service definition.
pub fn render_service(name: &str, definition: &Value, context: &TeraContext) -> Result<Value> {
    let text = serde_yaml::to_string(definition).map_err(|e| StackError::TemplateError {
        name: name.to_string(),
        message: format!("cannot serialize definition: {e}"),
    })?;
    let rendered = super::render(name, &text, context)?;
    let parsed = serde_yaml::from_str(&rendered).map_err(|e| StackError::TemplateError {
        name: name.to_string(),
        message: format!("rendered definition is not valid YAML: {e}"),
    })?;
    Ok(parsed)
}

/// Render every service under `services`, replacing each definition.
pub fn render_services(tree: &mut Tree, context: &TeraContext) -> Result<()> {
    let Some(Value::Object(services)) = tree.get_mut(SERVICES_KEY) else {
        return Ok(());
    };

    let mut errors = ErrorSet::default();
    for (name, definition) in services.iter_mut() {
        match template_disabled(definition) {
            Ok(true) => {
                tracing::debug!("Service {} opted out of templating", name);
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                errors.push(e.into());
                continue;
            }
        }

        if let Some(rendered) = errors.collect(render_service(name, definition, context)) {
            *definition = rendered;
        }
    }

    errors.finish()
}
