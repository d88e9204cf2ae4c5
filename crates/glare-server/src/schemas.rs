//! Artifact type definitions served under `/schemas`.

use serde_json::{json, Map, Value};

/// Pseudo type that addresses artifacts of every type at once.
pub const ALL_TYPES: &str = "all";

/// Fields every artifact carries. `(name, glare type, read only)`.
const BASE_FIELDS: &[(&str, &str, bool)] = &[
    ("id", "String", true),
    ("name", "String", false),
    ("version", "String", false),
    ("owner", "String", true),
    ("visibility", "String", false),
    ("status", "String", false),
    ("tags", "StringList", false),
    ("metadata", "StringDict", false),
    ("description", "String", false),
    ("type_name", "String", true),
    ("created_at", "DateTime", true),
    ("updated_at", "DateTime", true),
    ("activated_at", "DateTime", true),
];

#[derive(Debug)]
pub struct TypeDef {
    pub name: &'static str,
    pub version: &'static str,
    pub blobs: &'static [&'static str],
    pub blob_dicts: &'static [&'static str],
    /// Type specific plain fields and their glare type.
    pub fields: &'static [(&'static str, &'static str)],
}

pub const TYPES: &[TypeDef] = &[
    TypeDef {
        name: "images",
        version: "1.0",
        blobs: &["image"],
        blob_dicts: &[],
        fields: &[
            ("disk_format", "String"),
            ("container_format", "String"),
            ("min_ram", "Integer"),
            ("min_disk", "Integer"),
        ],
    },
    TypeDef {
        name: "heat_templates",
        version: "1.0",
        blobs: &["template"],
        blob_dicts: &["nested_templates"],
        fields: &[("default_envs", "StringDict")],
    },
    TypeDef {
        name: "heat_environments",
        version: "1.0",
        blobs: &["environment"],
        blob_dicts: &[],
        fields: &[],
    },
    TypeDef {
        name: "tosca_templates",
        version: "1.0",
        blobs: &["template"],
        blob_dicts: &[],
        fields: &[("template_format", "String")],
    },
    TypeDef {
        name: "murano_packages",
        version: "1.0",
        blobs: &["package"],
        blob_dicts: &[],
        fields: &[
            ("display_name", "String"),
            ("type", "String"),
            ("author", "String"),
        ],
    },
    TypeDef {
        name: "sample_artifact",
        version: "1.0",
        blobs: &["blob"],
        blob_dicts: &["dict_of_blobs"],
        fields: &[
            ("int1", "Integer"),
            ("str1", "String"),
            ("list_of_str", "StringList"),
            ("dict_of_str", "StringDict"),
        ],
    },
    TypeDef {
        name: ALL_TYPES,
        version: "1.0",
        blobs: &[],
        blob_dicts: &[],
        fields: &[],
    },
];

pub fn find(name: &str) -> Option<&'static TypeDef> {
    TYPES.iter().find(|t| t.name == name)
}

impl TypeDef {
    pub fn is_all(&self) -> bool {
        self.name == ALL_TYPES
    }

    pub fn is_blob(&self, field: &str) -> bool {
        self.blobs.contains(&field)
    }

    pub fn is_blob_dict(&self, field: &str) -> bool {
        self.blob_dicts.contains(&field)
    }

    /// Whether `field` may be written through a patch.
    pub fn is_writable(&self, field: &str) -> bool {
        BASE_FIELDS
            .iter()
            .any(|(name, _, read_only)| *name == field && !read_only)
            || self.fields.iter().any(|(name, _)| *name == field)
    }

    pub fn is_known(&self, field: &str) -> bool {
        BASE_FIELDS.iter().any(|(name, _, _)| *name == field)
            || self.fields.iter().any(|(name, _)| *name == field)
            || self.is_blob(field)
            || self.is_blob_dict(field)
    }

    /// Dict valued fields, whose entries can be addressed as `field/key`.
    pub fn is_dict(&self, field: &str) -> bool {
        self.is_blob_dict(field)
            || BASE_FIELDS
                .iter()
                .map(|(n, t, _)| (*n, *t))
                .chain(self.fields.iter().copied())
                .any(|(name, ty)| name == field && ty == "StringDict")
    }

    pub fn schema(&self) -> Value {
        let mut props = Map::new();
        for (name, glare_type, read_only) in BASE_FIELDS {
            props.insert(
                (*name).to_owned(),
                json!({"glareType": glare_type, "readOnly": read_only}),
            );
        }
        for (name, glare_type) in self.fields {
            props.insert(
                (*name).to_owned(),
                json!({"glareType": glare_type, "readOnly": false}),
            );
        }
        for name in self.blobs {
            props.insert(
                (*name).to_owned(),
                json!({"glareType": "Blob", "readOnly": true}),
            );
        }
        for name in self.blob_dicts {
            props.insert(
                (*name).to_owned(),
                json!({"glareType": "BlobDict", "readOnly": true}),
            );
        }
        json!({
            "name": self.name,
            "title": format!("Artifact type {} of version {}", self.name, self.version),
            "version": self.version,
            "type": "object",
            "required": ["name"],
            "properties": props,
        })
    }
}

/// Body of `GET /schemas`.
pub fn all_schemas() -> Value {
    let schemas: Map<String, Value> = TYPES
        .iter()
        .map(|t| (t.name.to_owned(), t.schema()))
        .collect();
    json!({ "schemas": schemas })
}
