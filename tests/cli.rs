use std::fs;
use std::path::Path;
use std::process::Command;

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_trash-classifier"));
    cmd.env_remove("TRASH_CLASSIFIER_MODEL_DIR")
        .env_remove("TRASH_CLASSIFIER_CUDA")
        .env_remove("TRASH_CLASSIFIER_THREADS")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn write_model_dir(dir: &Path) {
    fs::write(dir.join("model.onnx"), b"not loaded before the runtime check").unwrap();
    fs::write(
        dir.join("config.json"),
        r#"{"id2label": {"0": "biodegradable", "1": "non-biodegradable"}}"#,
    )
    .unwrap();
    fs::write(dir.join("preprocessor_config.json"), r#"{"size": 8}"#).unwrap();
}

#[test]
fn missing_model_dir_exits_non_zero_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = bin()
        .arg("--model-dir")
        .arg(dir.path().join("absent"))
        .arg("aGVsbG8=")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("model directory not found"), "stderr: {stderr}");
}

#[test]
fn missing_image_argument_is_a_usage_error() {
    let output = bin().output().unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn options_fall_back_to_environment() {
    let dir = tempfile::tempdir().unwrap();
    let absent = dir.path().join("from-env");
    let output = bin()
        .env("TRASH_CLASSIFIER_MODEL_DIR", &absent)
        .env("TRASH_CLASSIFIER_CUDA", "true")
        .env("TRASH_CLASSIFIER_THREADS", "3")
        .env("RUST_LOG", "trash_classifier=debug")
        .arg("aGVsbG8=")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&absent.display().to_string()), "stderr: {stderr}");
    assert!(stderr.contains("cuda: true"), "stderr: {stderr}");
    assert!(stderr.contains("intra_threads: Some(3)"), "stderr: {stderr}");
}

#[test]
fn unusable_runtime_library_is_a_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_model_dir(dir.path());
    let output = bin()
        .env("ORT_DYLIB_PATH", dir.path().join("libonnxruntime.so"))
        .arg("--model-dir")
        .arg(dir.path())
        .arg("aGVsbG8=")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load model"), "stderr: {stderr}");
    assert!(stderr.contains("ORT_DYLIB_PATH"), "stderr: {stderr}");
    assert!(!stderr.contains("panicked"), "stderr: {stderr}");
}
