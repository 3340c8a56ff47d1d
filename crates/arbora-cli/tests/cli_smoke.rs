use assert_cmd::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn repo_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .to_path_buf()
}

fn fixture(rel: &str) -> PathBuf {
    let path = repo_root().join("fixtures").join(rel);
    assert!(path.exists(), "fixture missing: {}", path.display());
    path
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[test]
fn cli_renders_svg_to_stdout() {
    let exe = assert_cmd::cargo_bin!("arbora");
    let output = Command::new(exe)
        .args(["render", fixture("hierarchy/basic.txt").to_string_lossy().as_ref()])
        .output()
        .expect("run arbora");
    assert!(output.status.success());

    let svg = String::from_utf8(output.stdout).expect("utf8 svg");
    let doc = roxmltree::Document::parse(&svg).expect("well-formed svg");
    assert_eq!(doc.root_element().tag_name().name(), "svg");
    assert!(svg.contains("订单支付"));
}

#[test]
fn cli_renders_png_with_default_out_path_for_file_input() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("checkout.txt");
    fs::copy(fixture("flow/checkout.txt"), &input).expect("copy fixture");

    let exe = assert_cmd::cargo_bin!("arbora");
    Command::new(exe)
        .args([
            "render",
            "--kind",
            "flow",
            "--format",
            "png",
            "--zoom",
            "3",
            input.to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let bytes = fs::read(input.with_extension("png")).expect("read png");
    assert!(bytes.starts_with(PNG_SIGNATURE), "output is not a PNG");
    let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
    let reader = decoder.read_info().expect("png header");
    assert!(reader.info().width > 0 && reader.info().height > 0);
}

#[test]
fn cli_layout_reads_stdin_and_config() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = tmp.path().join("config.json");
    fs::write(&config, r#"{"nodeWidth": 240}"#).expect("write config");

    let exe = assert_cmd::cargo_bin!("arbora");
    let output = assert_cmd::Command::new(exe)
        .args(["layout", "--kind", "mind", "--config"])
        .arg(&config)
        .arg("-")
        .write_stdin("root\n  child")
        .output()
        .expect("run arbora");
    assert!(output.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("document json");
    assert_eq!(doc["parserKind"], "mind");
    let nodes = doc["nodes"].as_array().expect("nodes");
    assert_eq!(nodes.len(), 2);
    assert!(nodes.iter().all(|n| n["width"].as_f64() >= Some(240.0)));
}

#[test]
fn cli_writes_named_export_into_working_dir() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let exe = assert_cmd::cargo_bin!("arbora");
    Command::new(exe)
        .current_dir(tmp.path())
        .args(["render", "--kind", "er", "--name", "shop schema"])
        .arg(fixture("er/shop.txt"))
        .assert()
        .success();
    assert!(tmp.path().join("shop-schema.svg").is_file());
}

#[test]
fn cli_rejects_unknown_kind_with_usage() {
    let exe = assert_cmd::cargo_bin!("arbora");
    Command::new(exe)
        .args(["parse", "--kind", "venn"])
        .assert()
        .failure()
        .code(2);
}
