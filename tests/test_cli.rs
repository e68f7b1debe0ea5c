//! End-to-end tests for the train and predict commands

use serde_json::json;
use std::path::Path;
use tabserve::cli::{cmd_info, cmd_predict, cmd_train, load_data};
use tabserve::inference::{ModelStore, PipelineLoader};

fn write_training_csv(path: &Path) {
    let mut csv = String::from("LoanNumber,Age,Income,Region,Approved\n");
    for i in 0..40 {
        let age = if i % 9 == 4 { String::new() } else { (21 + (i * 3) % 40).to_string() };
        let region = match i % 3 {
            0 => "North",
            1 => "South",
            _ => "",
        };
        let approved = if i >= 20 { 1 } else { 0 };
        csv.push_str(&format!("{},{},{},{},{}\n", 1000 + i, age, 1500 * (i + 1), region, approved));
    }
    std::fs::write(path, csv).unwrap();
}

fn write_config(path: &Path, models_dir: &Path) {
    let config = json!({
        "model_version": "1.0.0",
        "models_dir": models_dir,
        "schema": {"numeric": ["Age", "Income"], "categorical": ["Region"], "target": "Approved"},
        "pipeline": {"classifier": {"model_type": "random_forest", "n_estimators": 8, "random_state": 3}}
    });
    std::fs::write(path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
}

#[test]
fn test_train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let models_dir = dir.path().join("models");
    let config = dir.path().join("tabserve.json");
    let data = dir.path().join("loans.csv");
    write_config(&config, &models_dir);
    write_training_csv(&data);

    let artifact = cmd_train(&config, &data, None).unwrap();
    assert!(artifact.exists());
    assert_eq!(artifact, models_dir.join("1.0.0.json"));

    let retagged = cmd_train(&config, &data, Some("1.0.1")).unwrap();
    assert!(retagged.ends_with("1.0.1.json"));
    assert_eq!(ModelStore::new(&models_dir).list_versions().unwrap(), vec!["1.0.0", "1.0.1"]);

    let input = dir.path().join("input.json");
    std::fs::write(
        &input,
        json!({"inputs": [
            {"Age": 30, "Income": 2000, "Region": "North"},
            {"Age": "n/a", "Income": 2000, "Region": "North"},
            {"Age": null, "Income": 58000, "Region": "West"},
        ]})
        .to_string(),
    )
    .unwrap();
    let output = dir.path().join("out.json");

    let batch = cmd_predict(&config, &input, None, Some(&output)).unwrap();
    assert_eq!(batch.version, "1.0.0");
    assert_eq!(batch.n_succeeded(), 2);
    assert_eq!(batch.n_failed(), 1);

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["results"].as_array().unwrap().len(), 3);
    assert_eq!(written["results"][1]["errors"][0]["field"], "Age");

    let pipeline = ModelStore::new(&models_dir).load_fitted_pipeline("1.0.1").unwrap();
    assert_eq!(pipeline.n_training_rows(), 40);
}

#[test]
fn test_predict_unknown_version_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("tabserve.json");
    write_config(&config, &dir.path().join("models"));
    let input = dir.path().join("input.json");
    std::fs::write(&input, "[]").unwrap();

    assert!(cmd_predict(&config, &input, Some("2.0.0"), None).is_err());
}

#[test]
fn test_info_reads_csv() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("loans.csv");
    write_training_csv(&data);

    let df = load_data(&data).unwrap();
    assert_eq!(df.shape(), (40, 5));
    assert!(cmd_info(&data).is_ok());
}
