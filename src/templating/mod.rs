//! Configuration-time templating
//!
//! Templates use Tera syntax (`{{ var }}`, `{% if %}`, filters). The variable
//! context is the merged configuration tree plus a few injected names:
//!
//! | Variable | Value |
//! |---|---|
//! | `projectID` | project identity of the run |
//! | `OS` | operating system (`linux`, `darwin`, `windows`) |
//! | `ARCH` | architecture (`amd64`, `arm64`, ...) |
//! | `env` | map of the process environment |
//!
//! Two passes use it: [`files::render_files`] renders template file entries
//! into the `template` cache category, and [`services::render_services`]
//! renders each service definition in place. The build pipeline uses the same
//! renderer for binary names and build commands.

pub mod files;
pub mod services;

use regex::Regex;
use std::collections::BTreeMap;
use strsim::levenshtein;
use tera::{Context as TeraContext, Tera};

use crate::core::StackError;
use crate::document::Tree;
use crate::utils::platform::{arch_name, os_name};

pub use files::render_files;
pub use services::render_services;

/// Build the shared variable context.
pub fn build_context(tree: &Tree, project_id: &str) -> Result<TeraContext, StackError> {
    let mut context =
        TeraContext::from_value(serde_json::Value::Object(tree.clone())).map_err(|e| {
            StackError::TemplateError {
                name: "context".to_string(),
                message: format_tera_error(&e),
            }
        })?;

    let env: BTreeMap<String, String> = std::env::vars().collect();
    context.insert("projectID", project_id);
    context.insert("OS", os_name());
    context.insert("ARCH", arch_name());
    context.insert("env", &env);
    Ok(context)
}

/// Render `template` against `context`. `name` identifies the template in errors.
pub fn render(name: &str, template: &str, context: &TeraContext) -> Result<String, StackError> {
    let mut tera = Tera::default();
    tera.render_str(template, context).map_err(|e| {
        let mut message = format_tera_error(&e);
        if let Some(variable) = extract_variable_name(&message) {
            if let Some(suggestion) = closest_variable(&variable, context) {
                message.push_str(&format!(" (did you mean '{suggestion}'?)"));
            }
        }
        StackError::TemplateError {
            name: name.to_string(),
            message,
        }
    })
}

/// Flatten a Tera error chain into one readable line.
#[must_use]
pub fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error;

    let mut messages = vec![error.to_string()];
    let mut current: Option<&dyn Error> = error.source();
    while let Some(err) = current {
        messages.push(err.to_string());
        current = err.source();
    }

    messages
        .into_iter()
        .map(|msg| {
            msg.replace("Failed to render '__tera_one_off'", "")
                .replace("Failed to parse '__tera_one_off'", "syntax error")
                .replace(" while rendering '__tera_one_off'", "")
                .replace("'__tera_one_off'", "template")
                .trim()
                .to_string()
        })
        .filter(|msg| !msg.is_empty())
        .collect::<Vec<_>>()
        .join(": ")
}

fn extract_variable_name(message: &str) -> Option<String> {
    let re = Regex::new(r"Variable `([^`]+)` not found").ok()?;
    re.captures(message).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
}

fn closest_variable(target: &str, context: &TeraContext) -> Option<String> {
    let root = target.split('.').next().unwrap_or(target);
    let serde_json::Value::Object(map) = context.clone().into_json() else {
        return None;
    };
    map.keys()
        .map(|key| (key, levenshtein(root, key)))
        .filter(|(key, distance)| *distance > 0 && *distance <= root.len().max(key.len()) / 2)
        .min_by_key(|(_, distance)| *distance)
        .map(|(key, _)| key.clone())
}
