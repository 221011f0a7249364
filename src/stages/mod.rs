//! The four demonstration batches
//!
//! Each stage is a fixed list of named, pre-configured classifiers run
//! through the evaluation harness. The finalize stage instead fits, saves,
//! reloads and scores.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::HarnessConfig;
use crate::data::{Dataset, Split};
use crate::ensemble::{VotingClassifier, VotingStrategy};
use crate::error::{EvalError, Result};
use crate::evaluation::{evaluate_batch, report_fitted, EvaluationStage, ModelEntry, ModelEvaluation};
use crate::export::{final_model_path, load_model, save_model, ModelMetadata};
use crate::training::{
    AdaBoostClassifier, Classifier, DecisionTree, Estimator, ExtraTrees, GradientBoostingClassifier,
    GradientBoostingConfig, LinearDiscriminantAnalysis, LinearSVC, LogisticRegression, MLPClassifier, MLPConfig,
    MaxFeatures, MultinomialNaiveBayes, RandomForest, RidgeClassifier, SGDClassifier, SGDConfig, SVMConfig,
};

const SEED: u64 = 1;
const N_TREES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 6: single classifiers
    Baseline,
    /// 7: boosting and bagging ensembles
    Ensembles,
    /// 8: hard and soft voting
    Voting,
    /// 9: fit, persist, reload, score
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Baseline, Stage::Ensembles, Stage::Voting, Stage::Finalize];

    pub fn number(&self) -> u8 {
        match self {
            Stage::Baseline => 6,
            Stage::Ensembles => 7,
            Stage::Voting => 8,
            Stage::Finalize => 9,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Baseline => "baseline",
            Stage::Ensembles => "ensembles",
            Stage::Voting => "voting",
            Stage::Finalize => "finalize",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Stage::Baseline => "Baseline classifiers",
            Stage::Ensembles => "Ensemble classifiers",
            Stage::Voting => "Voting ensembles",
            Stage::Finalize => "Finalize, persist and reload",
        }
    }

    /// Model entries this stage evaluates
    pub fn models(&self) -> Result<Vec<ModelEntry>> {
        match self {
            Stage::Baseline => Ok(baseline_models()),
            Stage::Ensembles => Ok(ensemble_models()),
            Stage::Voting => voting_models(),
            Stage::Finalize => Ok(finalize_models()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}

impl FromStr for Stage {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| s == stage.number().to_string() || s == stage.name())
            .ok_or_else(|| EvalError::InvalidInput(format!("unknown stage '{}'", s)))
    }
}

fn logistic_regression() -> LogisticRegression {
    LogisticRegression::new()
}

fn gradient_boosting() -> GradientBoostingClassifier {
    GradientBoostingClassifier::new(GradientBoostingConfig {
        random_state: Some(SEED),
        ..Default::default()
    })
}

fn random_forest() -> RandomForest {
    RandomForest::new(N_TREES)
        .with_max_features(MaxFeatures::Fixed(3))
        .with_random_state(SEED)
}

pub fn baseline_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry::new("Logistic Regression", logistic_regression()),
        ModelEntry::new("Linear Discriminant Analysis", LinearDiscriminantAnalysis::new()),
        ModelEntry::new("Naive Bayes", MultinomialNaiveBayes::default()),
        ModelEntry::new(
            "Decision Tree",
            DecisionTree::new_classifier().with_max_features(3).with_random_state(SEED),
        ),
        ModelEntry::new(
            "Neural Network",
            MLPClassifier::new(MLPConfig {
                random_state: Some(SEED),
                ..Default::default()
            }),
        ),
        ModelEntry::new("Ridge Classifier", RidgeClassifier::default()),
        ModelEntry::new(
            "SGD Classifier",
            SGDClassifier::new(SGDConfig {
                max_iter: 5,
                tol: None,
                random_state: Some(SEED),
                ..Default::default()
            }),
        ),
        ModelEntry::new(
            "Support Vector Machine",
            LinearSVC::new(SVMConfig {
                random_state: Some(SEED),
                ..Default::default()
            }),
        ),
    ]
}

pub fn ensemble_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry::new("Gradient Boosted Machine", gradient_boosting()),
        ModelEntry::new("AdaBoost Classifier", AdaBoostClassifier::default()),
        ModelEntry::new("Random Forest", random_forest()),
        ModelEntry::new(
            "Extra Trees Classifier",
            ExtraTrees::new(N_TREES)
                .with_max_features(MaxFeatures::Fixed(3))
                .with_random_state(SEED),
        ),
    ]
}

pub fn voting_models() -> Result<Vec<ModelEntry>> {
    let hard = VotingClassifier::new(
        VotingStrategy::Hard,
        vec![
            ("lr".to_string(), Estimator::from(logistic_regression())),
            ("gbm".to_string(), Estimator::from(gradient_boosting())),
        ],
    )?;
    let soft = VotingClassifier::new(
        VotingStrategy::Soft,
        vec![
            ("lda".to_string(), Estimator::from(LinearDiscriminantAnalysis::new())),
            ("rf".to_string(), Estimator::from(random_forest())),
        ],
    )?;
    Ok(vec![
        ModelEntry::new("Voting Classifier 1", hard),
        ModelEntry::new("Voting Classifier 2", soft),
    ])
}

pub fn finalize_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry::new("Logistic_Regression", logistic_regression()),
        ModelEntry::new("Random_Forest", random_forest()),
    ]
}

/// Fit on the training split, save, reload and report the reloaded model
pub fn finalize_model(entry: &ModelEntry, dataset: &Dataset, split: &Split, model_dir: &Path) -> ModelEvaluation {
    let start = Instant::now();
    let mut eval = ModelEvaluation::new(&entry.name, entry.model.kind());
    if let Err(e) = run_finalize(entry, dataset, split, model_dir, &mut eval) {
        eval.record_error("finalize", &e);
    }
    eval.elapsed_secs = start.elapsed().as_secs_f64();
    eval
}

fn run_finalize(
    entry: &ModelEntry,
    dataset: &Dataset,
    split: &Split,
    model_dir: &Path,
    eval: &mut ModelEvaluation,
) -> Result<()> {
    let mut model = entry.model.clone();
    model.fit(&split.x_train, &split.y_train)?;
    eval.stage = EvaluationStage::Fitted;
    let in_memory = model.score(&split.x_test, &split.y_test)?;

    std::fs::create_dir_all(model_dir)?;
    let path = final_model_path(model_dir, &entry.name);
    let metadata = ModelMetadata::new(&entry.name)
        .with_features(dataset.feature_names().to_vec())
        .with_target(dataset.label_name())
        .add_metric("accuracy", in_memory);
    save_model(&model, &path, metadata)?;

    let (loaded, _metadata) = load_model(&path)?;
    let reloaded = loaded.score(&split.x_test, &split.y_test)?;
    if reloaded != in_memory {
        return Err(EvalError::ValidationError(format!(
            "reloaded score {} differs from in-memory score {}",
            reloaded, in_memory
        )));
    }

    let mut report = report_fitted(&loaded, &split.x_test, &split.y_test)?;
    report.n_train = split.n_train();
    eval.fit_report = Some(report);
    eval.stage = EvaluationStage::Reported;
    eval.reloaded_score = Some(reloaded);
    eval.persisted_to = Some(path);
    eval.stage = EvaluationStage::Persisted;
    info!(model = %entry.name, score = reloaded, "model persisted and reloaded");
    Ok(())
}

/// Run one stage end to end on an already loaded dataset
pub fn run_stage(stage: Stage, dataset: &Dataset, split: &Split, config: &HarnessConfig) -> Result<Vec<ModelEvaluation>> {
    let entries = stage.models()?;
    info!(%stage, models = entries.len(), "running stage");
    match stage {
        Stage::Finalize => Ok(entries
            .iter()
            .map(|entry| finalize_model(entry, dataset, split, &config.model_dir))
            .collect()),
        _ => Ok(evaluate_batch(&entries, dataset, split, &config.batch_options())),
    }
}
