use std::path::Path;
use std::process::Command;

use blow_detector::capture::Capture;
use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_blow_cli"))
}

fn write_clip(path: &Path, freq: f32, amplitude: f32) {
    let samples = (0..6000)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / 16000.0).sin() * amplitude)
        .collect();
    Capture::new(samples, 16000).write_wav(path).unwrap();
}

/// `blow/` and `not_blow/` directories with two clips each
fn corpus_dirs(root: &Path) {
    for (label, freq, amplitude) in [("blow", 2500.0, 0.7), ("not_blow", 180.0, 0.05)] {
        let dir = root.join(label);
        std::fs::create_dir_all(&dir).unwrap();
        write_clip(&dir.join("a.wav"), freq, amplitude);
        write_clip(&dir.join("b.wav"), freq * 1.2, amplitude);
    }
}

#[test]
fn extract_reports_fixed_shape() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("clip.wav");
    write_clip(&wav, 440.0, 0.5);

    let output = cli()
        .args(["extract", "--wav", wav.to_str().unwrap()])
        .output()
        .expect("failed to run blow_cli extract");
    assert!(output.status.success(), "exit {:?}", output.status.code());

    let json: Value = serde_json::from_slice(&output.stdout).expect("extract JSON");
    assert_eq!(json["frames"], 32);
    assert_eq!(json["mels"], 128);
    assert_eq!(json["degraded_frames"], 0);
    assert!(json["std_dev"].as_f64().unwrap() > 0.5);
}

#[test]
fn extract_short_clip_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("short.wav");
    Capture::new(vec![0.1; 500], 16000).write_wav(&wav).unwrap();

    let output = cli()
        .args(["extract", "--wav", wav.to_str().unwrap()])
        .output()
        .expect("failed to run blow_cli extract");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn counts_per_label() {
    let dir = tempfile::tempdir().unwrap();
    corpus_dirs(dir.path());

    let output = cli()
        .args([
            "counts",
            "--blow-dir",
            dir.path().join("blow").to_str().unwrap(),
            "--not-blow-dir",
            dir.path().join("not_blow").to_str().unwrap(),
        ])
        .output()
        .expect("failed to run blow_cli counts");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("counts JSON");
    assert_eq!(json["blow"], 2);
    assert_eq!(json["not_blow"], 2);
    assert_eq!(json["total"], 4);
}

#[test]
fn train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    corpus_dirs(dir.path());
    let store = dir.path().join("models");

    let train = cli()
        .args([
            "--store-dir",
            store.to_str().unwrap(),
            "train",
            "--blow-dir",
            dir.path().join("blow").to_str().unwrap(),
            "--not-blow-dir",
            dir.path().join("not_blow").to_str().unwrap(),
            "--model",
            "cli_model",
            "--epochs",
            "1",
            "--seed",
            "3",
        ])
        .output()
        .expect("failed to run blow_cli train");
    assert!(
        train.status.success(),
        "train failed: {}",
        String::from_utf8_lossy(&train.stderr)
    );
    assert!(store.join("cli_model.json").exists());

    let predict = cli()
        .args([
            "--store-dir",
            store.to_str().unwrap(),
            "predict",
            "--wav",
            dir.path().join("blow/a.wav").to_str().unwrap(),
            "--model",
            "cli_model",
        ])
        .output()
        .expect("failed to run blow_cli predict");
    assert!(predict.status.success());

    let json: Value = serde_json::from_slice(&predict.stdout).expect("prediction JSON");
    let blow = json["blow"].as_f64().unwrap();
    let not_blow = json["not_blow"].as_f64().unwrap();
    assert!((blow + not_blow - 1.0).abs() < 1e-4);
    assert!(json["label"] == "blow" || json["label"] == "not_blow");
}

#[test]
fn predict_missing_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("clip.wav");
    write_clip(&wav, 440.0, 0.5);

    let output = cli()
        .args([
            "--store-dir",
            dir.path().to_str().unwrap(),
            "predict",
            "--wav",
            wav.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run blow_cli predict");
    assert_eq!(output.status.code(), Some(1));
}
