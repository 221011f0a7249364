//! Evaluation steps and the batch runner

use std::path::PathBuf;
use std::time::Instant;

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::metrics::{accuracy, f1_score, log_loss, roc_auc, ClassificationReport, ConfusionMatrix, RocCurve, Scoring};
use super::Evaluated;
use crate::data::{Dataset, Split};
use crate::error::{EvalError, Result};
use crate::training::{CVResults, Capability, Classifier, CrossValidator, Estimator};

/// A named, pre-configured classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub model: Estimator,
}

impl ModelEntry {
    pub fn new(name: impl Into<String>, model: impl Into<Estimator>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }
}

/// Furthest point a model's evaluation reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvaluationStage {
    NotEvaluated,
    CrossValidated,
    Fitted,
    Reported,
    Persisted,
}

/// Result of fitting once and predicting the held-out split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub report: ClassificationReport,
    pub n_train: usize,
    pub n_test: usize,
    pub fit_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFeature {
    pub rank: usize,
    pub index: usize,
    pub name: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCv {
    pub scoring: Scoring,
    pub outcome: Evaluated<CVResults>,
}

/// Everything recorded about one model in a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub name: String,
    pub kind: String,
    pub stage: EvaluationStage,
    pub cross_validation: Vec<ScoredCv>,
    pub fit_report: Option<FitReport>,
    pub roc_curve: Option<Evaluated<RocCurve>>,
    pub feature_ranking: Option<Evaluated<Vec<RankedFeature>>>,
    pub persisted_to: Option<PathBuf>,
    /// Accuracy of the model reloaded from `persisted_to`
    pub reloaded_score: Option<f64>,
    /// Failed steps, as `"<step>: <error>"`
    pub errors: Vec<String>,
    pub elapsed_secs: f64,
}

impl ModelEvaluation {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            stage: EvaluationStage::NotEvaluated,
            cross_validation: Vec::new(),
            fit_report: None,
            roc_curve: None,
            feature_ranking: None,
            persisted_to: None,
            reloaded_score: None,
            errors: Vec::new(),
            elapsed_secs: 0.0,
        }
    }

    pub(crate) fn record_error(&mut self, step: &str, err: &EvalError) {
        warn!(model = %self.name, step, error = %err, "evaluation step failed");
        self.errors.push(format!("{}: {}", step, err));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Cross-validation outcome for a scoring, if it was run
    pub fn cv(&self, scoring: Scoring) -> Option<&Evaluated<CVResults>> {
        self.cross_validation
            .iter()
            .find(|s| s.scoring == scoring)
            .map(|s| &s.outcome)
    }
}

/// How a batch is run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub scorings: Vec<Scoring>,
    pub cv: CrossValidator,
    /// Evaluate entries concurrently; output order is unchanged
    pub parallel: bool,
}

fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(EvalError::length_mismatch(x.nrows(), y.len()));
    }
    Ok(())
}

/// Positive-class scores: probabilities when offered, otherwise decision scores
fn positive_scores<M: Classifier + ?Sized>(model: &M, x: &Array2<f64>) -> Result<Array1<f64>> {
    let caps = model.capabilities();
    if caps.probability {
        model.predict_proba(x)
    } else if caps.decision_function {
        model.decision_function(x)
    } else {
        Err(EvalError::unsupported(model.kind(), Capability::Probability))
    }
}

fn score_with<M: Classifier + ?Sized>(model: &M, scoring: Scoring, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
    match scoring {
        Scoring::Accuracy => accuracy(y, &model.predict(x)?),
        Scoring::F1 => f1_score(y, &model.predict(x)?),
        Scoring::NegLogLoss => Ok(-log_loss(y, &model.predict_proba(x)?)?),
        Scoring::RocAuc => roc_auc(y, &positive_scores(model, x)?),
    }
}

/// K-fold cross-validation of one scoring.
///
/// Every fold fits its own clone of `model`, so the caller's instance is
/// never touched. A scoring the model cannot produce yields
/// [`Evaluated::Unsupported`] without fitting anything.
pub fn cross_validate<M: Classifier + Clone>(
    model: &M,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
    scoring: Scoring,
) -> Result<Evaluated<CVResults>> {
    check_xy(x, y)?;
    if let Some(capability) = scoring.missing_capability(&model.capabilities()) {
        return Ok(Evaluated::unsupported(model.kind(), capability, scoring.name()));
    }

    let splits = cv.split(x.nrows(), Some(y))?;
    let mut scores = Vec::with_capacity(splits.len());
    for split in &splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut fold_model = model.clone();
        fold_model.fit(&x_train, &y_train)?;
        let score = score_with(&fold_model, scoring, &x_test, &y_test)?;
        debug!(model = model.kind(), %scoring, fold = split.fold_idx, score, "fold scored");
        scores.push(score);
    }

    Ok(Evaluated::Done(CVResults::from_scores(scores)))
}

/// Confusion matrix and report for an already fitted model
pub fn report_fitted<M: Classifier + ?Sized>(model: &M, x_test: &Array2<f64>, y_test: &Array1<f64>) -> Result<FitReport> {
    check_xy(x_test, y_test)?;
    let y_pred = model.predict(x_test)?;
    let confusion_matrix = ConfusionMatrix::from_predictions(y_test, &y_pred)?;
    let report = ClassificationReport::from_confusion(&confusion_matrix);
    Ok(FitReport {
        accuracy: report.accuracy,
        confusion_matrix,
        report,
        n_train: 0,
        n_test: y_test.len(),
        fit_seconds: 0.0,
    })
}

/// Fit once on the training partition and report on the test partition
pub fn fit_and_report<M: Classifier + ?Sized>(
    model: &mut M,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> Result<FitReport> {
    check_xy(x_train, y_train)?;
    let start = Instant::now();
    model.fit(x_train, y_train)?;
    let fit_seconds = start.elapsed().as_secs_f64();

    let mut report = report_fitted(model, x_test, y_test)?;
    report.n_train = y_train.len();
    report.fit_seconds = fit_seconds;
    Ok(report)
}

/// ROC curve of a fitted model on the test partition
pub fn roc_curve_data<M: Classifier + ?Sized>(
    model: &M,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> Result<Evaluated<RocCurve>> {
    check_xy(x_test, y_test)?;
    if !model.capabilities().has_scores() {
        return Ok(Evaluated::unsupported(model.kind(), Capability::Probability, "the ROC curve"));
    }
    let scores = positive_scores(model, x_test)?;
    Ok(Evaluated::Done(RocCurve::compute(y_test, &scores)?))
}

/// Feature importances of a fitted model, most important first.
/// Equal importances keep their original column order.
pub fn feature_ranking<M: Classifier + ?Sized>(model: &M, feature_names: &[String]) -> Result<Evaluated<Vec<RankedFeature>>> {
    if !model.capabilities().feature_importances {
        return Ok(Evaluated::unsupported(
            model.kind(),
            Capability::FeatureImportances,
            "feature ranking",
        ));
    }
    let importances = model.feature_importances().ok_or(EvalError::ModelNotFitted)?;
    if importances.len() != feature_names.len() {
        return Err(EvalError::ShapeError {
            expected: format!("{} feature names", importances.len()),
            actual: format!("{} feature names", feature_names.len()),
        });
    }

    let mut order: Vec<usize> = (0..importances.len()).collect();
    order.sort_by(|&a, &b| importances[b].total_cmp(&importances[a]));

    Ok(Evaluated::Done(
        order
            .into_iter()
            .enumerate()
            .map(|(rank, index)| RankedFeature {
                rank: rank + 1,
                index,
                name: feature_names[index].clone(),
                importance: importances[index],
            })
            .collect(),
    ))
}

/// Run every step for one entry. A failed scoring is recorded and the
/// remaining scorings still run; steps after a failed fit or report are
/// skipped. ROC and ranking failures are recorded and do not block each other.
pub fn evaluate_model(entry: &ModelEntry, dataset: &Dataset, split: &Split, options: &BatchOptions) -> ModelEvaluation {
    let start = Instant::now();
    let mut eval = ModelEvaluation::new(&entry.name, entry.model.kind());
    info!(model = %entry.name, kind = entry.model.kind(), "evaluating model");

    run_steps(entry, dataset, split, options, &mut eval);

    eval.elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        model = %entry.name,
        stage = ?eval.stage,
        errors = eval.errors.len(),
        elapsed_secs = eval.elapsed_secs,
        "model evaluated"
    );
    eval
}

fn run_steps(entry: &ModelEntry, dataset: &Dataset, split: &Split, options: &BatchOptions, eval: &mut ModelEvaluation) {
    for &scoring in &options.scorings {
        match cross_validate(&entry.model, dataset.features(), dataset.labels(), &options.cv, scoring) {
            Ok(outcome) => {
                match &outcome {
                    Evaluated::Done(r) => {
                        info!(model = %entry.name, %scoring, mean = r.mean_score, std = r.std_score, "cross-validated")
                    }
                    Evaluated::Unsupported { reason, .. } => {
                        warn!(model = %entry.name, %scoring, %reason, "scoring skipped")
                    }
                }
                eval.cross_validation.push(ScoredCv { scoring, outcome });
            }
            // contained to this scoring
            Err(e) => eval.record_error(&format!("cross_validate[{}]", scoring), &e),
        }
    }
    if !eval.cross_validation.is_empty() || options.scorings.is_empty() {
        eval.stage = EvaluationStage::CrossValidated;
    }

    let mut model = entry.model.clone();
    match fit_and_report(&mut model, &split.x_train, &split.y_train, &split.x_test, &split.y_test) {
        Ok(report) => {
            eval.fit_report = Some(report);
            eval.stage = EvaluationStage::Reported;
        }
        Err(e) => {
            eval.record_error("fit_and_report", &e);
            return;
        }
    }

    match roc_curve_data(&model, &split.x_test, &split.y_test) {
        Ok(outcome) => {
            if let Evaluated::Unsupported { reason, .. } = &outcome {
                warn!(model = %entry.name, %reason, "ROC curve skipped");
            }
            eval.roc_curve = Some(outcome);
        }
        Err(e) => eval.record_error("roc_curve", &e),
    }

    if model.capabilities().feature_importances {
        match feature_ranking(&model, dataset.feature_names()) {
            Ok(outcome) => eval.feature_ranking = Some(outcome),
            Err(e) => eval.record_error("feature_ranking", &e),
        }
    }
}

/// Evaluate every entry in order. A failing model is recorded and the batch
/// continues with the next one.
pub fn evaluate_batch(entries: &[ModelEntry], dataset: &Dataset, split: &Split, options: &BatchOptions) -> Vec<ModelEvaluation> {
    info!(
        models = entries.len(),
        scorings = ?options.scorings,
        parallel = options.parallel,
        "starting evaluation batch"
    );
    let start = Instant::now();

    let results: Vec<ModelEvaluation> = if options.parallel {
        entries
            .par_iter()
            .map(|entry| evaluate_model(entry, dataset, split, options))
            .collect()
    } else {
        entries
            .iter()
            .map(|entry| evaluate_model(entry, dataset, split, options))
            .collect()
    };

    let failed = results.iter().filter(|r| r.has_errors()).count();
    info!(
        models = results.len(),
        failed,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "evaluation batch finished"
    );
    results
}
