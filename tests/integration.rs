#![allow(
    clippy::indexing_slicing,
    clippy::missing_assert_message,
    clippy::missing_panics_doc,
    reason = "tests index fixtures and assert without messages"
)]

use std::path::Path;
use std::process::{Command, Output};

fn docnav_cmd(fixture: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_docnav"));
    cmd.current_dir(Path::new("tests/fixtures").join(fixture));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn render_defaults_to_csharp() {
    let out = docnav_cmd("basic").args(["render", "docs/guide.md"]).output().unwrap();
    assert!(out.status.success(), "render failed: {}", stderr(&out));

    let text = stdout(&out);
    assert!(text.contains("dotnet add package"), "missing csharp body:\n{text}");
    assert!(!text.contains("cargo add"), "rust body leaked:\n{text}");
    assert!(text.contains(r#"<li data-platform="rust"></li>"#), "missing tab row:\n{text}");
    assert!(text.contains("## Next steps"));
}

#[test]
fn tag_examples_in_code_blocks_render_verbatim() {
    let out = docnav_cmd("basic")
        .args(["render", "docs/guide.md", "--platform", "rust"])
        .output()
        .unwrap();
    assert!(out.status.success(), "render failed: {}", stderr(&out));
    assert!(stdout(&out).contains("```md\n<LanguageSection language=\"kotlin\">\n```\n"));
}

#[test]
fn render_for_rust_swaps_sections() {
    let out = docnav_cmd("basic")
        .args(["render", "docs/guide.md", "--platform", "rust"])
        .output()
        .unwrap();
    assert!(out.status.success(), "render failed: {}", stderr(&out));

    let text = stdout(&out);
    assert!(text.contains("cargo add example-client"));
    assert!(!text.contains("dotnet add package"));
}

#[test]
fn render_for_unmapped_platform_falls_back_to_csharp() {
    let out = docnav_cmd("basic")
        .args(["render", "docs/guide.md", "--platform", "swift"])
        .output()
        .unwrap();
    assert!(out.status.success(), "render failed: {}", stderr(&out));

    let text = stdout(&out);
    assert!(text.contains("dotnet add package"));
    assert!(!text.contains("cargo add"));
}

#[test]
fn unknown_platform_lists_valid_options() {
    let out = docnav_cmd("basic")
        .args(["render", "docs/guide.md", "--platform", "kotlin"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));

    let err = stderr(&out);
    assert!(
        err.contains("csharp") && err.contains("typescript"),
        "error should list every platform:\n{err}"
    );
}

#[test]
fn missing_file_is_reported() {
    let out = docnav_cmd("basic").args(["render", "docs/absent.md"]).output().unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("absent.md"));
}

#[test]
fn toc_lists_only_tracked_headings() {
    let out = docnav_cmd("basic").args(["toc", "docs/guide.md", "--json"]).output().unwrap();
    assert!(out.status.success(), "toc failed: {}", stderr(&out));

    let entries: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let ids: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["install-with-nuget", "configure", "endpoint"]);
}

#[test]
fn toc_all_keeps_every_heading() {
    let out = docnav_cmd("basic")
        .args(["toc", "docs/guide.md", "--all", "--platform", "rust"])
        .output()
        .unwrap();
    assert!(out.status.success(), "toc failed: {}", stderr(&out));

    let text = stdout(&out);
    assert!(text.contains("Getting started  #getting-started"));
    assert!(text.contains("Install with Cargo  #install-with-cargo"));
    assert!(text.contains("Retries  #retries"));
    assert!(text.contains("Next steps  #next-steps"));
    assert!(!text.contains("NuGet"));
}

#[test]
fn spy_activates_headings_in_scroll_order() {
    let out = docnav_cmd("basic")
        .args(["spy", "docs/guide.md", "--viewport", "100", "--step", "10", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success(), "spy failed: {}", stderr(&out));

    let samples: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let active: Vec<&str> = samples
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["active"].as_str())
        .filter(|a| !a.is_empty())
        .collect();

    let position = |id: &str| active.iter().position(|a| *a == id);
    let Some(configure) = position("configure") else { panic!("configure never active: {active:?}") };
    let Some(endpoint) = position("endpoint") else { panic!("endpoint never active: {active:?}") };
    assert!(configure < endpoint);
    assert!(position("retries").is_none());
    assert!(position("next-steps").is_none());
}

#[test]
fn config_selects_platform() {
    let out = docnav_cmd("configured").args(["render", "docs/guide.md"]).output().unwrap();
    assert!(out.status.success(), "render failed: {}", stderr(&out));

    let text = stdout(&out);
    assert!(text.contains("cargo add example-client"));
    assert!(!text.contains("dotnet add package"));
}

#[test]
fn check_passes_on_valid_sections() {
    let out = docnav_cmd("basic").arg("check").output().unwrap();
    assert!(out.status.success(), "check failed: {}", stdout(&out));
    assert!(stdout(&out).contains("All sections valid in 1 files"));
}

#[test]
fn check_flags_unknown_language() {
    let out = docnav_cmd("invalid").arg("check").output().unwrap();
    assert_eq!(out.status.code(), Some(1));

    let text = stdout(&out);
    assert!(text.contains("language 'kotlin'"), "missing report:\n{text}");
    assert!(text.contains("1 invalid sections in 2 files"));
    assert!(stderr(&out).contains("hint: valid languages are csharp, rust"));
}

#[test]
fn platforms_lists_wire_names() {
    let out = docnav_cmd("basic").arg("platforms").output().unwrap();
    assert!(out.status.success());
    assert_eq!(
        stdout(&out).lines().collect::<Vec<_>>(),
        vec!["csharp", "rust", "cpp", "java", "python", "swift", "typescript"]
    );
}

#[test]
fn info_json_is_valid() {
    let out = docnav_cmd("basic").args(["info", "--json"]).output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(value.is_object());
}
