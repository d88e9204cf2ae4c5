//! JSON-Patch generation for partial artifact updates.

use serde::Serialize;
use serde_json::{Map, Value};

/// One operation of a JSON-Patch document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Replace { path: String, value: Value },
    Remove { path: String },
}

impl PatchOperation {
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Replace { path, .. } | Self::Remove { path } => path,
        }
    }
}

/// Build the patch that clears `remove_props` and sets every entry of
/// `updates`.
///
/// Removals come first, in the given order, then additions in map order. A
/// name listed in both is only updated. Nested paths (`metadata/key`) are
/// removed outright; top-level fields cannot be dropped from the schema, so
/// they are replaced with `null` instead.
pub fn build_patch<S: AsRef<str>>(
    remove_props: &[S],
    updates: &Map<String, Value>,
) -> Vec<PatchOperation> {
    let mut ops = Vec::with_capacity(remove_props.len() + updates.len());
    for prop in remove_props {
        let prop = prop.as_ref();
        if updates.contains_key(prop) {
            continue;
        }
        let path = format!("/{prop}");
        if prop.contains('/') {
            ops.push(PatchOperation::Remove { path });
        } else {
            ops.push(PatchOperation::Replace {
                path,
                value: Value::Null,
            });
        }
    }
    for (key, value) in updates {
        ops.push(PatchOperation::Add {
            path: format!("/{key}"),
            value: value.clone(),
        });
    }
    ops
}
