//! Globals: shared configuration blocks that services opt into.
//!
//! ```yaml
//! globals:
//!   logging: {level: info, format: json}
//! configs:
//!   web: {level: debug}
//! services:
//!   web:
//!     stackctl:
//!       config:
//!         globals: logging
//! ```
//!
//! After [`apply_globals`], `configs.web` is `{level: debug, format: json}`
//! and the `globals` section is gone.

use anyhow::Result;
use serde_json::Value;
use strsim::levenshtein;

use crate::constants::{CONFIGS_KEY, GLOBALS_KEY, SERVICES_KEY, TOOL_KEY};
use crate::core::{ErrorSet, StackError};
use crate::document::{Tree, extract_optional, take_section};
use crate::merge::merge_into;

/// Resolve every service's globals reference into `configs.<service>`.
pub fn apply_globals(tree: &mut Tree) -> Result<()> {
    let globals: Tree = take_section(tree, GLOBALS_KEY)?.unwrap_or_default();

    let mut wanted = Vec::new();
    let mut errors = ErrorSet::default();
    if let Some(Value::Object(services)) = tree.get(SERVICES_KEY) {
        for (name, definition) in services {
            let reference = extract_optional::<String>(definition, &[TOOL_KEY, "config", "globals"]);
            match reference {
                Ok(Some(global)) => wanted.push((name.clone(), global)),
                Ok(None) => {}
                Err(e) => errors.push(anyhow::Error::from(e).context(format!("Service '{name}'"))),
            }
        }
    }

    for (service, global) in wanted {
        let Some(block) = globals.get(&global) else {
            let mut error = anyhow::Error::from(StackError::UndefinedGlobal {
                service: service.clone(),
                global: global.clone(),
            });
            if let Some(close) = closest(&global, &globals) {
                error = error.context(format!("did you mean '{close}'?"));
            }
            errors.push(error);
            continue;
        };

        let configs = tree
            .entry(CONFIGS_KEY)
            .or_insert_with(|| Value::Object(Tree::new()));
        let Value::Object(configs) = configs else {
            errors.push(
                StackError::TypeMismatch {
                    key: CONFIGS_KEY.to_string(),
                    reason: "expected a mapping".to_string(),
                }
                .into(),
            );
            break;
        };

        let mut effective = configs.remove(&service).unwrap_or(Value::Null);
        match merge_into(&mut effective, block) {
            Ok(()) => {
                tracing::debug!("Applied global '{}' to service '{}'", global, service);
                configs.insert(service, effective);
            }
            Err(e) => errors.push(e.into()),
        }
    }

    errors.finish()
}

fn closest<'a>(target: &str, globals: &'a Tree) -> Option<&'a str> {
    globals
        .keys()
        .map(|key| (key, levenshtein(target, key)))
        .filter(|(_, distance)| *distance <= target.len() / 2 + 1)
        .min_by_key(|(_, distance)| *distance)
        .map(|(key, _)| key.as_str())
}
