//! Integration test: cross-validation, fit/report, ROC and batches

mod common;

use classeval::ensemble::{VotingClassifier, VotingStrategy};
use classeval::evaluation::{
    cross_validate, evaluate_batch, fit_and_report, roc_curve_data, BatchOptions, EvaluationStage, Evaluated,
    ModelEntry, Scoring,
};
use classeval::training::{
    CVStrategy, Capability, CrossValidator, DecisionTree, Estimator, LinearDiscriminantAnalysis, LogisticRegression,
    MultinomialNaiveBayes, RandomForest, MaxFeatures,
};
use common::{pima_like, with_negative_column};

fn ten_fold() -> CrossValidator {
    CrossValidator::new(CVStrategy::KFold { n_splits: 10, shuffle: true }).with_random_state(1)
}

#[test]
fn test_cross_validation_scores_in_range() {
    let data = pima_like(768, 7);
    let result = cross_validate(
        &LogisticRegression::new(),
        data.features(),
        data.labels(),
        &ten_fold(),
        Scoring::Accuracy,
    )
    .unwrap()
    .into_done()
    .unwrap();

    assert_eq!(result.n_folds, 10);
    assert_eq!(result.scores.len(), 10);
    assert!(result.scores.iter().all(|s| (0.0..=1.0).contains(s)));
    assert!(result.std_score >= 0.0);
    // well above the majority-class rate on separable synthetic data
    assert!(result.mean_score > 0.7, "mean accuracy {}", result.mean_score);
}

#[test]
fn test_cross_validation_is_reproducible() {
    let data = pima_like(768, 7);
    let run = || {
        cross_validate(
            &LogisticRegression::new(),
            data.features(),
            data.labels(),
            &ten_fold(),
            Scoring::Accuracy,
        )
        .unwrap()
        .into_done()
        .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.mean_score.to_bits(), b.mean_score.to_bits());
    assert_eq!(a, b);
}

#[test]
fn test_roc_auc_scoring_for_stochastic_models() {
    let data = pima_like(300, 3);
    let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 3, shuffle: true }).with_random_state(1);
    let forest = RandomForest::new(20).with_max_features(MaxFeatures::Fixed(3)).with_random_state(1);
    let a = cross_validate(&forest, data.features(), data.labels(), &cv, Scoring::RocAuc).unwrap();
    let b = cross_validate(&forest, data.features(), data.labels(), &cv, Scoring::RocAuc).unwrap();
    assert_eq!(a, b);
    let auc = a.into_done().unwrap().mean_score;
    assert!(auc > 0.5 && auc <= 1.0);
}

#[test]
fn test_confusion_matrix_repeatable() {
    let data = pima_like(768, 11);
    let split = data.train_test_split(0.33, 42).unwrap();
    assert_eq!(split.n_test(), 254);

    let report = || {
        let mut tree = DecisionTree::new_classifier().with_max_features(3).with_random_state(1);
        fit_and_report(&mut tree, &split.x_train, &split.y_train, &split.x_test, &split.y_test).unwrap()
    };
    let a = report();
    let b = report();
    assert_eq!(a.confusion_matrix, b.confusion_matrix);
    assert_eq!(a.confusion_matrix.row_sums().iter().sum::<usize>(), split.n_test());
    assert_eq!(a.confusion_matrix.total(), split.y_test.len());
    assert!((a.accuracy - a.confusion_matrix.correct() as f64 / split.n_test() as f64).abs() < 1e-12);
}

#[test]
fn test_roc_unsupported_for_hard_voting() {
    let data = pima_like(200, 5);
    let split = data.train_test_split(0.33, 42).unwrap();
    let mut voting = VotingClassifier::new(
        VotingStrategy::Hard,
        vec![
            ("lr".to_string(), Estimator::from(LogisticRegression::new())),
            ("lda".to_string(), Estimator::from(LinearDiscriminantAnalysis::new())),
        ],
    )
    .unwrap();
    fit_and_report(&mut voting, &split.x_train, &split.y_train, &split.x_test, &split.y_test).unwrap();

    match roc_curve_data(&voting, &split.x_test, &split.y_test).unwrap() {
        Evaluated::Unsupported { capability, .. } => assert_eq!(capability, Capability::Probability),
        Evaluated::Done(_) => panic!("hard voting should not produce a ROC curve"),
    }
}

#[test]
fn test_batch_continues_past_failures() {
    let data = with_negative_column(&pima_like(200, 9));
    let split = data.train_test_split(0.33, 42).unwrap();
    let options = BatchOptions {
        scorings: vec![Scoring::Accuracy, Scoring::RocAuc],
        cv: CrossValidator::new(CVStrategy::KFold { n_splits: 4, shuffle: true }).with_random_state(1),
        parallel: false,
    };
    let hard = VotingClassifier::new(
        VotingStrategy::Hard,
        vec![("lr".to_string(), Estimator::from(LogisticRegression::new()))],
    )
    .unwrap();
    let entries = vec![
        ModelEntry::new("Naive Bayes", MultinomialNaiveBayes::default()),
        ModelEntry::new("Hard Vote", hard),
        ModelEntry::new("Logistic Regression", LogisticRegression::new()),
    ];

    let results = evaluate_batch(&entries, &data, &split, &options);
    assert_eq!(results.len(), 3);

    assert!(results[0].has_errors());
    assert_eq!(results[0].stage, EvaluationStage::NotEvaluated);
    assert_eq!(results[0].errors.len(), 3);
    assert!(results[0].errors[2].starts_with("fit_and_report"));
    assert!(results[0].fit_report.is_none());

    assert!(!results[1].has_errors());
    assert!(!results[1].cv(Scoring::RocAuc).unwrap().is_done());
    assert!(results[1].cv(Scoring::Accuracy).unwrap().is_done());
    assert!(matches!(results[1].roc_curve, Some(Evaluated::Unsupported { .. })));
    assert_eq!(results[1].stage, EvaluationStage::Reported);

    assert!(!results[2].has_errors());
    assert!(results[2].roc_curve.as_ref().unwrap().is_done());
    assert!(results[2].feature_ranking.is_none());
}

#[test]
fn test_parallel_batch_matches_sequential() {
    let data = pima_like(200, 13);
    let split = data.train_test_split(0.33, 42).unwrap();
    let entries = vec![
        ModelEntry::new("Logistic Regression", LogisticRegression::new()),
        ModelEntry::new("Decision Tree", DecisionTree::new_classifier().with_random_state(1)),
        ModelEntry::new("LDA", LinearDiscriminantAnalysis::new()),
    ];
    let mut options = BatchOptions {
        scorings: vec![Scoring::Accuracy],
        cv: CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: true }).with_random_state(1),
        parallel: false,
    };
    let sequential = evaluate_batch(&entries, &data, &split, &options);
    options.parallel = true;
    let parallel = evaluate_batch(&entries, &data, &split, &options);

    for (a, b) in sequential.iter().zip(&parallel) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.cross_validation, b.cross_validation);
        assert_eq!(
            a.fit_report.as_ref().unwrap().confusion_matrix,
            b.fit_report.as_ref().unwrap().confusion_matrix
        );
    }
}

#[test]
fn test_failed_scoring_keeps_other_metrics_and_report() {
    // 6 positives in 60 rows: some of the 10 folds hold a single class
    let base = pima_like(60, 21);
    let y = ndarray::Array1::from_shape_fn(60, |i| if i % 10 == 0 { 1.0 } else { 0.0 });
    let data = classeval::data::Dataset::new(base.features().clone(), y, base.feature_names().to_vec()).unwrap();
    let split = data.train_test_split(0.33, 42).unwrap();
    let options = BatchOptions {
        scorings: vec![Scoring::RocAuc, Scoring::Accuracy],
        cv: ten_fold(),
        parallel: false,
    };
    let entries = vec![ModelEntry::new("Logistic Regression", LogisticRegression::new())];

    let result = &evaluate_batch(&entries, &data, &split, &options)[0];

    let cv_errors: Vec<&String> = result.errors.iter().filter(|e| e.starts_with("cross_validate")).collect();
    assert_eq!(cv_errors.len(), 1, "{:?}", result.errors);
    assert!(cv_errors[0].starts_with("cross_validate[roc_auc]"));
    assert!(!result.errors.iter().any(|e| e.starts_with("fit_and_report")));
    assert!(result.cv(Scoring::RocAuc).is_none());
    assert!(result.cv(Scoring::Accuracy).unwrap().is_done());
    assert!(result.fit_report.is_some());
    assert_eq!(result.stage, EvaluationStage::Reported);
}
