//! CLI subprocess integration tests.
//!
//! These tests invoke the `glare` binary as a subprocess against an
//! in-process `glare-server` and verify exit codes, stdout content, and
//! JSON output stability.

use glare_server::TestServer;
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn glare_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_glare"));
    cmd.env_remove("OS_GLARE_URL")
        .env_remove("AUTH_TOKEN")
        .env_remove("GLARE_LOG");
    cmd
}

fn glare(server: &TestServer) -> Command {
    let mut cmd = glare_bin();
    cmd.env("OS_GLARE_URL", &server.url);
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().unwrap()
}

fn run_ok(cmd: &mut Command) -> Output {
    let output = run(cmd);
    assert!(
        output.status.success(),
        "command failed with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn run_json(cmd: &mut Command) -> Value {
    let output = run_ok(cmd.arg("--json"));
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn create_image(server: &TestServer, name: &str, version: &str) -> String {
    let art = run_json(glare(server).args(["create", "images", name, "-V", version]));
    art["id"].as_str().unwrap().to_owned()
}

// CLI validation: version flag
#[test]
fn cli_version_exits_zero() {
    let output = run(glare_bin().arg("--version"));
    assert!(output.status.success(), "glare --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("glare"), "version output must name the binary: {stdout}");
}

// CLI validation: help flag
#[test]
fn cli_help_lists_commands() {
    let output = run(glare_bin().arg("--help"));
    assert!(output.status.success(), "glare --help must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["list", "upload", "download", "add-tag", "type-schema"] {
        assert!(stdout.contains(command), "help must list '{command}'");
    }
}

#[test]
fn cli_missing_endpoint_is_config_error() {
    let home = tempfile::tempdir().unwrap();
    let output = run(glare_bin().env("HOME", home.path()).arg("type-list"));
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config error"), "stderr: {stderr}");
}

#[test]
fn cli_endpoint_from_config_file() {
    let server = TestServer::start();
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join(".config/glare");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("client.json"),
        serde_json::json!({"endpoint": server.url, "auth_token": null, "timeout_secs": null})
            .to_string(),
    )
    .unwrap();

    let types = run_json(glare_bin().env("HOME", home.path()).arg("type-list"));
    let names: Vec<&str> = types
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"images"));
}

#[test]
fn cli_create_and_show() {
    let server = TestServer::start();
    let art = run_json(glare(&server).args([
        "create",
        "image",
        "cirros",
        "-V",
        "1.0",
        "-p",
        "disk_format=qcow2",
        "-l",
        "tags=base,small",
        "-d",
        "metadata=os:linux",
    ]));
    assert_eq!(art["type_name"], "images");
    assert_eq!(art["disk_format"], "qcow2");
    assert_eq!(art["tags"], serde_json::json!(["base", "small"]));
    assert_eq!(art["metadata"]["os"], "linux");

    let shown = run_json(glare(&server).args(["show", "images", "cirros"]));
    assert_eq!(shown["id"], art["id"]);

    let by_id = run_json(glare(&server).args([
        "show",
        "images",
        art["id"].as_str().unwrap(),
        "--id",
    ]));
    assert_eq!(by_id["name"], "cirros");
}

#[test]
fn cli_show_table_output() {
    let server = TestServer::start();
    create_image(&server, "cirros", "1.0");
    let output = run_ok(glare(&server).args(["show", "images", "cirros"]));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("PROPERTY"));
    assert!(stdout.contains("cirros"));
}

#[test]
fn cli_list_with_limit_and_filters() {
    let server = TestServer::start();
    for i in 0..5 {
        create_image(&server, &format!("art{i}"), "1.0");
    }
    create_image(&server, "other", "2.0");

    let listed = run_json(glare(&server).args(["list", "images", "-l", "3", "-p", "2"]));
    assert_eq!(listed.as_array().unwrap().len(), 3);

    let all = run_json(glare(&server).args(["list", "images"]));
    assert_eq!(all.as_array().unwrap().len(), 6);

    let filtered = run_json(glare(&server).args(["list", "images", "-F", "version=2.0"]));
    let filtered = filtered.as_array().unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["name"], "other");

    let sorted = run_json(glare(&server).args(["list", "images", "-S", "name:desc"]));
    assert_eq!(sorted[0]["name"], "other");
}

#[test]
fn cli_list_rejects_bad_sort() {
    let server = TestServer::start();
    let output = run(glare(&server).args(["list", "images", "-S", "name:sideways"]));
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid sort direction"), "stderr: {stderr}");
}

#[test]
fn cli_update_and_lifecycle() {
    let server = TestServer::start();
    create_image(&server, "art", "1.0");

    let updated = run_json(glare(&server).args([
        "update",
        "images",
        "art",
        "-V",
        "1.0",
        "-p",
        "description=hello",
    ]));
    assert_eq!(updated["description"], "hello");

    let cleared = run_json(glare(&server).args(["update", "images", "art", "-r", "description"]));
    assert!(cleared["description"].is_null());

    let active = run_json(glare(&server).args(["activate", "images", "art"]));
    assert_eq!(active["status"], "active");
    let public = run_json(glare(&server).args(["publish", "images", "art"]));
    assert_eq!(public["visibility"], "public");
    let off = run_json(glare(&server).args(["deactivate", "images", "art"]));
    assert_eq!(off["status"], "deactivated");
    let on = run_json(glare(&server).args(["reactivate", "images", "art"]));
    assert_eq!(on["status"], "active");
}

#[test]
fn cli_publish_draft_is_service_error() {
    let server = TestServer::start();
    create_image(&server, "art", "1.0");
    let output = run(glare(&server).args(["publish", "images", "art"]));
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn cli_tags() {
    let server = TestServer::start();
    create_image(&server, "art", "1.0");
    run_ok(glare(&server).args(["add-tag", "images", "art", "--tag", "red"]));
    let art = run_json(glare(&server).args(["add-tag", "images", "art", "--tag", "blue"]));
    assert_eq!(art["tags"], serde_json::json!(["red", "blue"]));
    let art = run_json(glare(&server).args(["remove-tag", "images", "art", "--tag", "red"]));
    assert_eq!(art["tags"], serde_json::json!(["blue"]));
}

#[test]
fn cli_upload_download_roundtrip() {
    let server = TestServer::start();
    create_image(&server, "art", "1.0");
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("disk.img");
    std::fs::write(&source, b"image bytes").unwrap();

    let blob = run_json(glare(&server).args(["upload", "images", "art", "--file"]).arg(&source));
    assert_eq!(blob["size"], 11);
    assert_eq!(blob["external"], false);

    let target = dir.path().join("copy.img");
    run_ok(
        glare(&server)
            .args(["download", "images", "art", "--file"])
            .arg(&target),
    );
    assert_eq!(std::fs::read(&target).unwrap(), b"image bytes");

    let output = run_ok(glare(&server).args(["download", "images", "art"]));
    assert_eq!(output.stdout, b"image bytes");
}

#[test]
fn cli_upload_from_stdin_into_blob_dict() {
    let server = TestServer::start();
    run_ok(glare(&server).args(["create", "sample_artifact", "s", "-V", "1.0"]));

    let mut child = glare(&server)
        .args([
            "upload",
            "sample_artifact",
            "s",
            "-p",
            "dict_of_blobs/notes",
            "-C",
            "text/plain",
            "--json",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"from stdin").unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let blob: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(blob["content_type"], "text/plain");
    assert_eq!(blob["size"], 10);
}

#[test]
fn cli_blob_property_required_for_unknown_default() {
    let server = TestServer::start();
    run_ok(glare(&server).args(["create", "sample_artifact", "s"]));
    let output = run(glare(&server).args(["download", "sample_artifact", "s"]));
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_external_location_download() {
    let server = TestServer::start();
    let url = server.put_static("obj", b"hello world");
    create_image(&server, "art", "1.0");

    let blob = run_json(glare(&server).args([
        "add-location",
        "images",
        "art",
        "--url",
        &url,
        "--md5",
        "5eb63bbbe01eeed093cb22bb8f5acdc3",
    ]));
    assert_eq!(blob["external"], true);
    assert_eq!(blob["url"], url.as_str());

    let output = run_ok(glare(&server).args(["download", "images", "art"]));
    assert_eq!(output.stdout, b"hello world");

    let art = run_json(glare(&server).args(["remove-location", "images", "art"]));
    assert!(art["image"].is_null());
}

#[test]
fn cli_corrupt_download_leaves_no_file() {
    let server = TestServer::start();
    let url = server.put_static("obj", b"tampered");
    create_image(&server, "art", "1.0");
    run_ok(glare(&server).args([
        "add-location",
        "images",
        "art",
        "--url",
        &url,
        "--md5",
        "00000000000000000000000000000000",
    ]));

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.img");
    let output = run(
        glare(&server)
            .args(["download", "images", "art", "--file"])
            .arg(&target),
    );
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("corrupt blob download"), "stderr: {stderr}");
    assert!(!target.exists());
}

#[test]
fn cli_unknown_name_and_id() {
    let server = TestServer::start();
    let output = run(glare(&server).args(["show", "images", "ghost"]));
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));

    let output = run(glare(&server).args(["show", "images", "ghost", "--id"]));
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn cli_delete() {
    let server = TestServer::start();
    let id = create_image(&server, "art", "1.0");
    let out = run_json(glare(&server).args(["delete", "images", "art"]));
    assert_eq!(out["id"], id.as_str());
    assert_eq!(server.store.artifact_count(), 0);
}

#[test]
fn cli_type_schema() {
    let server = TestServer::start();
    let schema = run_json(glare(&server).args(["type-schema", "heat-template"]));
    assert_eq!(schema["name"], "heat_templates");
    assert_eq!(schema["properties"]["nested_templates"]["glareType"], "BlobDict");
}

#[test]
fn cli_token_enforced() {
    let server = TestServer::with_token(Some("s3cret"));
    let output = run(glare(&server).arg("type-list"));
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("authentication failed"));

    run_ok(glare(&server).env("AUTH_TOKEN", "s3cret").arg("type-list"));
    run_ok(glare(&server).args(["--auth-token", "s3cret", "type-list"]));
}

#[test]
fn cli_unreachable_endpoint_is_service_error() {
    let output = run(glare_bin().args(["--glare-url", "http://127.0.0.1:9", "type-list"]));
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn cli_completions_bash() {
    let output = run_ok(glare_bin().args(["completions", "bash"]));
    assert!(String::from_utf8_lossy(&output.stdout).contains("glare"));
}

#[test]
fn cli_man_pages() {
    let dir = tempfile::tempdir().unwrap();
    run_ok(glare_bin().arg("man-pages").arg(dir.path()));
    assert!(dir.path().join("glare.1").exists());
    assert!(dir.path().join("glare-upload.1").exists());
}
