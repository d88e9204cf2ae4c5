pub mod completions;
pub mod create;
pub mod delete;
pub mod download;
pub mod lifecycle;
pub mod list;
pub mod location;
pub mod man_pages;
pub mod schema;
pub mod show;
pub mod tag;
pub mod update;
pub mod upload;

use clap::Args;
use glare_client::types::attr_str;
use glare_client::{Artifact, ArtifactController, BlobProperty, ClientConfig, HttpClient};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;
pub const EXIT_SERVICE_ERROR: u8 = 3;
pub const EXIT_INTEGRITY_ERROR: u8 = 4;

/// Where the service lives and how to authenticate. Unset values fall back
/// to the client config file.
#[derive(Debug, Clone, Default, Args)]
pub struct Connection {
    /// Glare API endpoint, e.g. http://localhost:9494.
    #[arg(long, env = "OS_GLARE_URL", global = true)]
    pub glare_url: Option<String>,

    /// Token sent in X-Auth-Token.
    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true, global = true)]
    pub auth_token: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

/// An artifact named on the command line.
#[derive(Debug, Clone, Args)]
pub struct ArtifactRef {
    /// Artifact type, e.g. images or heat_templates.
    #[arg(value_parser = parse_type_name)]
    pub type_name: String,

    /// Artifact name, or its id when --id is given.
    pub name: String,

    /// Version used to resolve the name.
    #[arg(short = 'V', long, default_value = "latest")]
    pub artifact_version: String,

    /// Treat NAME as an artifact id.
    #[arg(short, long, default_value_t = false)]
    pub id: bool,
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn plain_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "active" => Style::new().green().apply_to(status).to_string(),
        "drafted" => Style::new().yellow().apply_to(status).to_string(),
        "deactivated" => Style::new().dim().apply_to(status).to_string(),
        "deleted" => Style::new().red().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

/// Exit code for an error message, keyed on the error's leading words.
pub fn exit_code_for(msg: &str) -> u8 {
    const USAGE: [&str; 3] = ["bad request:", "config error:", "invalid endpoint:"];
    const SERVICE: [&str; 4] = [
        "HTTP ",
        "error communicating with",
        "authentication failed",
        "not found:",
    ];
    if USAGE.iter().any(|p| msg.starts_with(p)) {
        EXIT_USAGE_ERROR
    } else if SERVICE.iter().any(|p| msg.starts_with(p)) {
        EXIT_SERVICE_ERROR
    } else if msg.starts_with("corrupt blob download:") {
        EXIT_INTEGRITY_ERROR
    } else {
        EXIT_FAILURE
    }
}

pub fn make_controller(
    conn: &Connection,
    type_name: Option<&str>,
) -> Result<ArtifactController<HttpClient>, String> {
    let mut config = if let Some(ref url) = conn.glare_url {
        ClientConfig::new(url)
    } else {
        ClientConfig::load_default().map_err(|e| {
            format!("config error: no --glare-url or OS_GLARE_URL given and no usable config file ({e})")
        })?
    };
    if let Some(ref token) = conn.auth_token {
        config = config.with_token(token);
    }
    if let Some(secs) = conn.timeout {
        config = config.with_timeout(secs);
    }
    Ok(ArtifactController::new(HttpClient::new(config), type_name))
}

pub fn resolve_artifact_id(
    ctl: &ArtifactController<HttpClient>,
    artifact: &ArtifactRef,
) -> Result<String, String> {
    if artifact.id {
        return Ok(artifact.name.clone());
    }
    let found = ctl
        .get_by_name(&artifact.name, Some(&artifact.artifact_version), None)
        .map_err(|e| e.to_string())?;
    Ok(attr_str(&found, "id").to_owned())
}

/// Accept the singular and dashed spellings of the well-known types.
pub fn parse_type_name(name: &str) -> Result<String, String> {
    let canonical = match name {
        "" => return Err("type name must not be empty".to_owned()),
        "image" => "images",
        "heat_template" | "heat-template" | "heat-templates" => "heat_templates",
        "heat_environment" | "heat-environment" | "heat-environments" => "heat_environments",
        "tosca_template" | "tosca-template" | "tosca-templates" => "tosca_templates",
        "murano_package" | "murano-package" | "murano-packages" => "murano_packages",
        other => other,
    };
    Ok(canonical.to_owned())
}

pub fn default_blob_property(type_name: &str) -> Option<&'static str> {
    match type_name {
        "images" => Some("image"),
        "heat_templates" | "tosca_templates" => Some("template"),
        "heat_environments" => Some("environment"),
        "murano_packages" => Some("package"),
        _ => None,
    }
}

pub fn blob_property(type_name: &str, given: Option<&str>) -> Result<String, String> {
    given
        .or_else(|| default_blob_property(type_name))
        .map(str::to_owned)
        .ok_or_else(|| {
            format!("bad request: type {type_name} has no default blob property, use --blob-property")
        })
}

fn split_pair<'a>(arg: &'a str, flag: &str) -> Result<(&'a str, &'a str), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(format!("bad request: {flag} expects KEY=VALUE, got '{arg}'")),
    }
}

/// Collect `--property k=v`, `--list k=a,b` and `--dict k=a:1,b:2` values
/// into an attribute map.
pub fn parse_properties(
    props: &[String],
    lists: &[String],
    dicts: &[String],
) -> Result<Map<String, Value>, String> {
    let mut attrs = Map::new();
    for arg in props {
        let (key, value) = split_pair(arg, "--property")?;
        attrs.insert(key.to_owned(), Value::from(value));
    }
    for arg in lists {
        let (key, value) = split_pair(arg, "--list")?;
        let items: Vec<Value> = value
            .split(',')
            .filter(|s| !s.is_empty())
            .map(Value::from)
            .collect();
        attrs.insert(key.to_owned(), Value::Array(items));
    }
    for arg in dicts {
        let (key, value) = split_pair(arg, "--dict")?;
        let mut dict = Map::new();
        for entry in value.split(',').filter(|s| !s.is_empty()) {
            let (k, v) = entry.split_once(':').ok_or_else(|| {
                format!("bad request: --dict entries are KEY:VALUE, got '{entry}'")
            })?;
            dict.insert(k.to_owned(), Value::from(v));
        }
        attrs.insert(key.to_owned(), Value::Object(dict));
    }
    Ok(attrs)
}

/// `1536` → `1.5kB`.
pub fn human_size(size: u64) -> String {
    const SUFFIXES: [&str; 8] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB"];
    let mut value = size as f64;
    let mut index = 0;
    while value >= 1024.0 && index + 1 < SUFFIXES.len() {
        value /= 1024.0;
        index += 1;
    }
    let padded = format!("{value:.1}");
    let trimmed = padded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{}", SUFFIXES[index])
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn print_artifact(artifact: &Artifact, json: bool) -> Result<(), String> {
    if json {
        println!("{}", json_pretty(artifact)?);
        return Ok(());
    }
    println!("{:<20} VALUE", "PROPERTY");
    for (key, value) in artifact {
        let shown = if key == "status" {
            colorize_status(&display_value(value))
        } else {
            display_value(value)
        };
        println!("{key:<20} {shown}");
    }
    Ok(())
}

pub fn print_blob(blob: &BlobProperty, json: bool) -> Result<(), String> {
    if json {
        println!("{}", json_pretty(blob)?);
        return Ok(());
    }
    let or_empty = |v: &Option<String>| v.clone().unwrap_or_default();
    println!("{:<14} VALUE", "PROPERTY");
    println!("{:<14} {}", "status", or_empty(&blob.status));
    println!("{:<14} {}", "external", blob.external);
    println!("{:<14} {}", "url", or_empty(&blob.url));
    println!("{:<14} {}", "content_type", or_empty(&blob.content_type));
    println!(
        "{:<14} {}",
        "size",
        blob.size.map(human_size).unwrap_or_default()
    );
    println!("{:<14} {}", "md5", or_empty(&blob.md5));
    println!("{:<14} {}", "sha1", or_empty(&blob.sha1));
    println!("{:<14} {}", "sha256", or_empty(&blob.sha256));
    Ok(())
}

/// Print the metadata of `property` as the service now reports it.
pub fn show_blob(
    ctl: &ArtifactController<HttpClient>,
    artifact_id: &str,
    property: &str,
    json: bool,
) -> Result<(), String> {
    let artifact = ctl.get(artifact_id, None).map_err(|e| e.to_string())?;
    let blob = BlobProperty::from_artifact(&artifact, property).unwrap_or_default();
    print_blob(&blob, json)
}
