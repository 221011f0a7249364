//! Integration test: stage batches, persistence and CSV loading

mod common;

use classeval::config::HarnessConfig;
use classeval::data::{CsvSchema, Dataset};
use classeval::evaluation::{EvaluationStage, Evaluated, Scoring};
use classeval::export::{final_model_path, load_model};
use classeval::stages::{finalize_model, run_stage, Stage};
use classeval::training::Classifier;
use common::{pima_like, write_csv};
use tempfile::tempdir;

fn quick_config(model_dir: &std::path::Path) -> HarnessConfig {
    HarnessConfig::default()
        .with_folds(3)
        .with_scorings(vec![Scoring::Accuracy])
        .with_model_dir(model_dir)
}

#[test]
fn test_load_csv_and_split() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pima.csv");
    write_csv(&pima_like(768, 1), &path);

    let data = Dataset::from_csv(&path, &CsvSchema::default()).unwrap();
    assert_eq!(data.n_samples(), 768);
    assert_eq!(data.n_features(), 8);
    assert_eq!(data.label_name(), "class");
    assert_eq!(data.feature_names()[0], "preg");

    let split = data.train_test_split(0.33, 42).unwrap();
    assert_eq!(split.n_test(), 254);
    assert_eq!(split.n_train(), 514);
}

#[test]
fn test_ensemble_stage_ranks_features() {
    let dir = tempdir().unwrap();
    let data = pima_like(150, 2);
    let split = data.train_test_split(0.33, 42).unwrap();
    let results = run_stage(Stage::Ensembles, &data, &split, &quick_config(dir.path())).unwrap();

    assert_eq!(results.len(), 4);
    for result in &results {
        assert!(!result.has_errors(), "{}: {:?}", result.name, result.errors);
        let ranking = result.feature_ranking.as_ref().unwrap().done().unwrap();
        assert_eq!(ranking.len(), 8);
        assert!(ranking.windows(2).all(|w| w[0].importance >= w[1].importance));
        let total: f64 = ranking.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_voting_stage() {
    let dir = tempdir().unwrap();
    let data = pima_like(150, 4);
    let split = data.train_test_split(0.33, 42).unwrap();
    let config = quick_config(dir.path()).with_scorings(vec![Scoring::Accuracy, Scoring::RocAuc]);
    let results = run_stage(Stage::Voting, &data, &split, &config).unwrap();

    assert_eq!(results[0].name, "Voting Classifier 1");
    assert!(matches!(results[0].cv(Scoring::RocAuc), Some(Evaluated::Unsupported { .. })));
    assert!(matches!(results[0].roc_curve, Some(Evaluated::Unsupported { .. })));

    assert_eq!(results[1].name, "Voting Classifier 2");
    assert!(results[1].cv(Scoring::RocAuc).unwrap().is_done());
    assert!(results[1].roc_curve.as_ref().unwrap().is_done());
}

#[test]
fn test_finalize_roundtrip_reproduces_score() {
    let dir = tempdir().unwrap();
    let data = pima_like(300, 8);
    let split = data.train_test_split(0.33, 42).unwrap();

    let results = run_stage(Stage::Finalize, &data, &split, &quick_config(dir.path())).unwrap();
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(!result.has_errors(), "{:?}", result.errors);
        assert_eq!(result.stage, EvaluationStage::Persisted);
        let path = result.persisted_to.as_ref().unwrap();
        assert!(path.exists());

        let (model, metadata) = load_model(path).unwrap();
        assert_eq!(metadata.name, result.name);
        assert_eq!(metadata.feature_names.len(), 8);
        let score = model.score(&split.x_test, &split.y_test).unwrap();
        assert_eq!(Some(score), result.reloaded_score);
        assert_eq!(result.fit_report.as_ref().unwrap().accuracy, score);
    }
    assert!(final_model_path(dir.path(), "Random_Forest").exists());
}

#[test]
fn test_finalize_reports_unwritable_directory() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"x").unwrap();

    let data = pima_like(100, 8);
    let split = data.train_test_split(0.33, 42).unwrap();
    let entries = Stage::Finalize.models().unwrap();
    let result = finalize_model(&entries[0], &data, &split, &blocker);

    assert!(result.has_errors());
    assert!(result.persisted_to.is_none());
    assert_eq!(result.stage, EvaluationStage::Fitted);
}
