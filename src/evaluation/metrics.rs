//! Classification metrics: scorings, confusion matrix, per-class report, ROC

use crate::error::{EvalError, Result};
use crate::training::{Capabilities, Capability};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric used to score each cross-validation fold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    Accuracy,
    RocAuc,
    NegLogLoss,
    /// F1 of the positive class
    F1,
}

impl Scoring {
    pub fn name(&self) -> &'static str {
        match self {
            Scoring::Accuracy => "accuracy",
            Scoring::RocAuc => "roc_auc",
            Scoring::NegLogLoss => "neg_log_loss",
            Scoring::F1 => "f1",
        }
    }

    /// Capability the model lacks for this scoring, if any
    pub fn missing_capability(&self, caps: &Capabilities) -> Option<Capability> {
        match self {
            Scoring::Accuracy | Scoring::F1 => None,
            Scoring::RocAuc if caps.has_scores() => None,
            Scoring::RocAuc => Some(Capability::Probability),
            Scoring::NegLogLoss if caps.probability => None,
            Scoring::NegLogLoss => Some(Capability::Probability),
        }
    }

    /// Whether the metric is read as a percentage in reports
    pub fn is_percentage(&self) -> bool {
        matches!(self, Scoring::Accuracy)
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scoring {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accuracy" => Ok(Scoring::Accuracy),
            "roc_auc" | "auc" => Ok(Scoring::RocAuc),
            "neg_log_loss" | "log_loss" => Ok(Scoring::NegLogLoss),
            "f1" => Ok(Scoring::F1),
            other => Err(EvalError::ConfigError(format!(
                "unknown scoring '{}' (expected accuracy, roc_auc, neg_log_loss or f1)",
                other
            ))),
        }
    }
}

fn check_lengths(y_true: &Array1<f64>, other: &Array1<f64>) -> Result<()> {
    if y_true.len() != other.len() {
        return Err(EvalError::length_mismatch(y_true.len(), other.len()));
    }
    if y_true.is_empty() {
        return Err(EvalError::InvalidInput("no samples to score".to_string()));
    }
    Ok(())
}

/// Fraction of exact label matches
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// F1 of the positive class; zero when there are no true positives
pub fn f1_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (*t > 0.5, *p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    if tp == 0 {
        return Ok(0.0);
    }
    Ok(2.0 * tp as f64 / (2 * tp + fp + fn_) as f64)
}

/// Mean binary cross-entropy, probabilities clipped to `[1e-15, 1 - 1e-15]`
pub fn log_loss(y_true: &Array1<f64>, proba: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, proba)?;
    let eps = 1e-15;
    let total: f64 = y_true
        .iter()
        .zip(proba.iter())
        .map(|(&t, &p)| {
            let p = p.clamp(eps, 1.0 - eps);
            if t > 0.5 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    Ok(total / y_true.len() as f64)
}

/// Area under the ROC curve of positive-class scores
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    Ok(RocCurve::compute(y_true, scores)?.auc)
}

/// Trapezoidal area under a piecewise-linear curve
pub fn trapezoid_auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// Receiver operating characteristic for the positive class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Decreasing; the first entry sits above every score so the curve starts at (0, 0)
    pub thresholds: Vec<f64>,
    pub auc: f64,
}

impl RocCurve {
    /// One point per distinct score, thresholds in decreasing order.
    /// Both classes must be present in `y_true`.
    pub fn compute(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, scores)?;
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(EvalError::InvalidInput(format!("non-finite score {}", bad)));
        }
        let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
        let n_neg = y_true.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Err(EvalError::InvalidInput(
                "ROC curve needs both classes in y_true".to_string(),
            ));
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let top = scores[order[0]];
        let mut fpr = vec![0.0];
        let mut tpr = vec![0.0];
        // offset scales with the score so large magnitudes are not absorbed
        let mut thresholds = vec![top + top.abs().max(1.0)];

        let (mut tp, mut fp) = (0usize, 0usize);
        for (k, &i) in order.iter().enumerate() {
            if y_true[i] > 0.5 {
                tp += 1;
            } else {
                fp += 1;
            }
            // emit a point at the last sample of each run of equal scores
            let last_of_run = order.get(k + 1).map_or(true, |&next| scores[next] != scores[i]);
            if last_of_run {
                fpr.push(fp as f64 / n_neg as f64);
                tpr.push(tp as f64 / n_pos as f64);
                thresholds.push(scores[i]);
            }
        }

        let auc = trapezoid_auc(&fpr, &tpr);
        Ok(Self {
            fpr,
            tpr,
            thresholds,
            auc,
        })
    }
}

/// Counts of true class (rows) against predicted class (columns)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Sorted union of labels seen in truth and predictions
    pub classes: Vec<f64>,
    pub matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;
        if let Some(bad) = y_true.iter().chain(y_pred.iter()).find(|v| !v.is_finite()) {
            return Err(EvalError::InvalidInput(format!("non-finite label {}", bad)));
        }

        let mut classes: Vec<f64> = y_true.iter().chain(y_pred.iter()).copied().collect();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();

        let index_of = |v: f64| classes.iter().position(|&c| c == v);
        let mut matrix = vec![vec![0usize; classes.len()]; classes.len()];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if let (Some(i), Some(j)) = (index_of(t), index_of(p)) {
                matrix[i][j] += 1;
            }
        }
        Ok(Self { classes, matrix })
    }

    /// Number of samples whose true class is each class
    pub fn row_sums(&self) -> Vec<usize> {
        self.matrix.iter().map(|row| row.iter().sum()).collect()
    }

    /// Number of predictions of each class
    pub fn column_sums(&self) -> Vec<usize> {
        (0..self.classes.len())
            .map(|j| self.matrix.iter().map(|row| row[j]).sum())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.row_sums().iter().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.classes.len()).map(|i| self.matrix[i][i]).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .matrix
            .iter()
            .flatten()
            .map(|c| c.to_string().len())
            .chain(self.classes.iter().map(|c| c.to_string().len()))
            .max()
            .unwrap_or(1)
            + 2;

        write!(f, "{:>w$}", "", w = width)?;
        for class in &self.classes {
            write!(f, "{:>w$}", class, w = width)?;
        }
        writeln!(f)?;
        for (class, row) in self.classes.iter().zip(self.matrix.iter()) {
            write!(f, "{:>w$}", class, w = width)?;
            for count in row {
                write!(f, "{:>w$}", count, w = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1/support plus accuracy and averages.
/// Undefined ratios (no predictions or no support) count as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let supports = cm.row_sums();
        let predicted = cm.column_sums();
        let total = cm.total();

        let per_class: Vec<ClassMetrics> = cm
            .classes
            .iter()
            .enumerate()
            .map(|(i, &class)| {
                let tp = cm.matrix[i][i];
                let precision = ratio(tp, predicted[i]);
                let recall = ratio(tp, supports[i]);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    class,
                    precision,
                    recall,
                    f1,
                    support: supports[i],
                }
            })
            .collect();

        let n_classes = per_class.len().max(1) as f64;
        let macro_avg = AveragedMetrics {
            precision: per_class.iter().map(|m| m.precision).sum::<f64>() / n_classes,
            recall: per_class.iter().map(|m| m.recall).sum::<f64>() / n_classes,
            f1: per_class.iter().map(|m| m.f1).sum::<f64>() / n_classes,
            support: total,
        };
        let weight_total = total.max(1) as f64;
        let mut weighted_avg = AveragedMetrics {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            support: total,
        };
        for m in &per_class {
            let w = m.support as f64 / weight_total;
            weighted_avg.precision += m.precision * w;
            weighted_avg.recall += m.recall * w;
            weighted_avg.f1 += m.f1 * w;
        }

        Self {
            accuracy: ratio(cm.correct(), total),
            per_class,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14}{:>11}{:>10}{:>10}{:>10}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>14}{:>11.2}{:>10.2}{:>10.2}{:>10}",
                m.class, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14}{:>11}{:>10}{:>10.2}{:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (label, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14}{:>11.2}{:>10.2}{:>10.2}{:>10}",
                label, avg.precision, avg.recall, avg.f1, avg.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scoring_parse_and_requirements() {
        assert_eq!("roc_auc".parse::<Scoring>().unwrap(), Scoring::RocAuc);
        assert_eq!(" Accuracy ".parse::<Scoring>().unwrap(), Scoring::Accuracy);
        assert!("precision".parse::<Scoring>().is_err());

        let decision_only = Capabilities::NONE.with_decision_function();
        assert_eq!(Scoring::RocAuc.missing_capability(&decision_only), None);
        assert_eq!(
            Scoring::NegLogLoss.missing_capability(&decision_only),
            Some(Capability::Probability)
        );
        assert_eq!(
            Scoring::RocAuc.missing_capability(&Capabilities::NONE),
            Some(Capability::Probability)
        );
        assert_eq!(Scoring::F1.missing_capability(&Capabilities::NONE), None);
    }

    #[test]
    fn test_accuracy_and_f1() {
        let y_true = array![0.0, 1.0, 1.0, 0.0, 1.0];
        let y_pred = array![0.0, 1.0, 0.0, 1.0, 1.0];
        assert!((accuracy(&y_true, &y_pred).unwrap() - 0.6).abs() < 1e-12);
        // tp = 2, fp = 1, fn = 1
        assert!((f1_score(&y_true, &y_pred).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(f1_score(&y_true, &array![0.0, 0.0, 0.0, 0.0, 0.0]).unwrap(), 0.0);
        assert!(accuracy(&y_true, &array![1.0]).is_err());
    }

    #[test]
    fn test_log_loss() {
        let y = array![1.0, 0.0];
        let loss = log_loss(&y, &array![0.5, 0.5]).unwrap();
        assert!((loss - std::f64::consts::LN_2).abs() < 1e-12);
        // clipping keeps certainty-but-wrong finite
        assert!(log_loss(&y, &array![0.0, 1.0]).unwrap().is_finite());
    }

    #[test]
    fn test_roc_curve_known_values() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let scores = array![0.1, 0.4, 0.35, 0.8];
        let roc = RocCurve::compute(&y, &scores).unwrap();

        assert_eq!(roc.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(roc.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert_eq!(roc.thresholds[1..].to_vec(), vec![0.8, 0.4, 0.35, 0.1]);
        assert!(roc.thresholds[0] > 0.8);
        assert!((roc.auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_curve_ties_share_a_point() {
        let y = array![0.0, 1.0, 0.0, 1.0];
        let scores = array![0.5, 0.5, 0.2, 0.9];
        let roc = RocCurve::compute(&y, &scores).unwrap();
        assert_eq!(roc.thresholds.len(), 4);
        assert_eq!(*roc.fpr.last().unwrap(), 1.0);
        assert_eq!(*roc.tpr.last().unwrap(), 1.0);
    }

    #[test]
    fn test_roc_curve_first_threshold_above_large_scores() {
        let y = array![0.0, 1.0, 0.0, 1.0];
        let roc = RocCurve::compute(&y, &array![1e17, 2e17, 1.0, 3e17]).unwrap();
        assert!(roc.thresholds[0] > 3e17);
        assert!(roc.thresholds.windows(2).all(|w| w[0] > w[1]));
        assert_eq!((roc.fpr[0], roc.tpr[0]), (0.0, 0.0));

        let roc = RocCurve::compute(&y, &array![-5e16, -4e16, -6e16, -3e16]).unwrap();
        assert!(roc.thresholds[0] > -3e16);
        assert!(roc.thresholds.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_roc_curve_single_class_is_error() {
        let y = array![1.0, 1.0, 1.0];
        assert!(matches!(
            RocCurve::compute(&y, &array![0.1, 0.2, 0.3]),
            Err(EvalError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_confusion_matrix() {
        let y_true = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0, 0.0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred).unwrap();

        assert_eq!(cm.classes, vec![0.0, 1.0]);
        assert_eq!(cm.matrix, vec![vec![1, 1], vec![1, 2]]);
        assert_eq!(cm.row_sums(), vec![2, 3]);
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn test_confusion_matrix_class_only_in_predictions() {
        let y_true = array![0.0, 0.0];
        let y_pred = array![0.0, 1.0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred).unwrap();
        assert_eq!(cm.classes, vec![0.0, 1.0]);
        assert_eq!(cm.row_sums(), vec![2, 0]);
    }

    #[test]
    fn test_classification_report() {
        let y_true = array![0.0, 0.0, 0.0, 1.0, 1.0];
        let y_pred = array![0.0, 0.0, 1.0, 1.0, 0.0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred).unwrap();
        let report = ClassificationReport::from_confusion(&cm);

        let zero = &report.per_class[0];
        assert!((zero.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((zero.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(zero.support, 3);

        let one = &report.per_class[1];
        assert!((one.precision - 0.5).abs() < 1e-12);
        assert!((one.recall - 0.5).abs() < 1e-12);

        assert!((report.accuracy - 0.6).abs() < 1e-12);
        assert!((report.macro_avg.f1 - (2.0 / 3.0 + 0.5) / 2.0).abs() < 1e-12);
        assert!((report.weighted_avg.recall - 0.6).abs() < 1e-12);
        assert_eq!(report.weighted_avg.support, 5);

        let text = report.to_string();
        assert!(text.contains("weighted avg"));
        assert!(text.contains("precision"));
    }
}
