use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use person_relabel::config::{BackendKind, RelabelConfig};
use person_relabel::RelabelError;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "RELABEL_CONFIG",
        "RELABEL_DATASET_ROOT",
        "RELABEL_THRESHOLD",
        "RELABEL_MODEL_PATH",
        "RELABEL_BACKEND",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        dataset_root = "/srv/wake_vision/train_quality"
        threshold = 0.35
        person_class_id = 0

        [detector]
        backend = "tract"
        model_path = "models/yolo11n.onnx"
        input_size = 320
        min_score = 0.2
        iou_threshold = 0.6

        [review]
        max_images = 12
        columns = 4
        thumb_size = 128
        output = "sheet.png"
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("RELABEL_CONFIG", file.path());
    std::env::set_var("RELABEL_THRESHOLD", "0.5");
    std::env::set_var("RELABEL_BACKEND", "stub");

    let cfg = RelabelConfig::load().expect("load config");

    assert_eq!(cfg.dataset_root, PathBuf::from("/srv/wake_vision/train_quality"));
    assert_eq!(cfg.threshold, 0.5);
    assert_eq!(cfg.person_class_id, 0);
    assert_eq!(cfg.detector.backend, BackendKind::Stub);
    assert_eq!(cfg.detector.model_path, PathBuf::from("models/yolo11n.onnx"));
    assert_eq!(cfg.detector.input_size, 320);
    assert_eq!(cfg.detector.min_score, 0.2);
    assert_eq!(cfg.detector.iou_threshold, 0.6);
    assert_eq!(cfg.review.max_images, 12);
    assert_eq!(cfg.review.columns, 4);
    assert_eq!(cfg.review.thumb_size, 128);
    assert_eq!(cfg.review.output, PathBuf::from("sheet.png"));

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RELABEL_DATASET_ROOT", "/tmp/ds");
    let cfg = RelabelConfig::load().expect("load config");

    assert_eq!(cfg.dataset_root, PathBuf::from("/tmp/ds"));
    assert_eq!(cfg.threshold, 0.4);
    assert_eq!(cfg.detector.backend, BackendKind::Tract);
    assert_eq!(cfg.detector.model_path, PathBuf::from("yolo11x.onnx"));
    assert_eq!(cfg.review.max_images, 20);

    clear_env();
}

#[test]
fn rejects_malformed_env_threshold() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RELABEL_THRESHOLD", "forty percent");
    let err = RelabelConfig::load().unwrap_err();
    assert!(matches!(err, RelabelError::Config(_)));

    clear_env();
}

#[test]
fn rejects_unknown_keys_in_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"treshold = 0.3\n").expect("write config");
    std::env::set_var("RELABEL_CONFIG", file.path());

    let err = RelabelConfig::load().unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
