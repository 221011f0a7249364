//! classeval CLI Module
//!
//! Command-line entry point: loads the dataset, runs one stage and renders
//! each model's evaluation.

use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing::warn;

use crate::config::HarnessConfig;
use crate::data::{Dataset, Split};
use crate::evaluation::{Evaluated, ModelEvaluation, Scoring};
use crate::stages::{run_stage, Stage};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_warn(msg: &str) {
    println!("  {} {}", "!".yellow(), msg);
}

fn step_err(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn indented(block: &str) {
    for line in block.lines() {
        println!("    {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "classeval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-validated evaluation of binary classifiers on tabular data")]
#[command(long_about = None)]
pub struct Cli {
    /// Stage to run: 6|baseline, 7|ensembles, 8|voting, 9|finalize
    pub stage: Option<String>,

    /// CSV file, label in the last column
    #[arg(short, long, env = "CLASSEVAL_DATA")]
    pub data: Option<PathBuf>,

    /// The CSV starts with a header row
    #[arg(long)]
    pub header: bool,

    /// Number of cross-validation folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Seed for the fold shuffle
    #[arg(long)]
    pub cv_seed: Option<u64>,

    /// Seed for the train/test split
    #[arg(long)]
    pub split_seed: Option<u64>,

    /// Fraction of rows held out for testing
    #[arg(long)]
    pub test_size: Option<f64>,

    /// Cross-validation scorings (accuracy, roc_auc, neg_log_loss, f1)
    #[arg(long, value_delimiter = ',')]
    pub scoring: Vec<Scoring>,

    /// Directory for finalized models
    #[arg(long, env = "CLASSEVAL_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Evaluate the models of a stage concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Print the evaluations as JSON instead of the report
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Command-line values layered over the defaults
    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::default().with_header(self.header).with_parallel(self.parallel);
        if let Some(path) = &self.data {
            config = config.with_data_path(path);
        }
        if let Some(folds) = self.folds {
            config = config.with_folds(folds);
        }
        if let Some(seed) = self.cv_seed {
            config = config.with_cv_seed(seed);
        }
        if let Some(seed) = self.split_seed {
            config = config.with_split_seed(seed);
        }
        if let Some(test_size) = self.test_size {
            config = config.with_test_size(test_size);
        }
        if !self.scoring.is_empty() {
            config = config.with_scorings(self.scoring.clone());
        }
        if let Some(dir) = &self.model_dir {
            config = config.with_model_dir(dir);
        }
        config
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Run the selected stage. A missing or unknown stage is reported and
/// nothing else happens.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(raw) = cli.stage.as_deref() else {
        warn!("no stage selected");
        print_usage_hint();
        return Ok(());
    };
    let stage: Stage = match raw.parse() {
        Ok(stage) => stage,
        Err(e) => {
            warn!(stage = raw, error = %e, "unknown stage");
            print_usage_hint();
            return Ok(());
        }
    };

    let config = cli.config();
    config.validate()?;

    let (dataset, split) = load(&config, !cli.json)?;
    let results = run_stage(stage, &dataset, &split, &config)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    section(&format!("Stage {}: {}", stage.number(), stage.title()));
    for result in &results {
        print_evaluation(result);
    }
    print_summary(&results, &config.scorings);
    Ok(())
}

fn print_usage_hint() {
    println!();
    println!("  {}", muted("Choose a stage to run:"));
    for stage in Stage::ALL {
        println!("    {}  {}", accent(&stage.number().to_string()), stage.title());
    }
    println!();
}

fn load(config: &HarnessConfig, verbose: bool) -> anyhow::Result<(Dataset, Split)> {
    if verbose {
        section("Data");
        step_run(&format!("Loading {}", config.data_path.display()));
    }
    let dataset = Dataset::from_csv(&config.data_path, &config.csv_schema())?;
    let split = dataset.train_test_split(config.test_size, config.split_seed)?;
    if verbose {
        step_done(&dataset.summary().to_string());
        println!(
            "  {}   {}   {}",
            kv("train", &split.n_train().to_string()),
            kv("test", &split.n_test().to_string()),
            kv("folds", &config.folds.to_string()),
        );
    }
    Ok((dataset, split))
}

fn format_score(scoring: Scoring, mean: f64, std: f64) -> String {
    if scoring.is_percentage() {
        format!("{:.3}% ({:.3}%)", mean * 100.0, std * 100.0)
    } else {
        format!("{:.3} ({:.3})", mean, std)
    }
}

fn print_evaluation(eval: &ModelEvaluation) {
    println!();
    println!("  {} {}", eval.name.white().bold(), dim(&format!("{} · {:.2}s", eval.kind, eval.elapsed_secs)));

    for scored in &eval.cross_validation {
        match &scored.outcome {
            Evaluated::Done(cv) => step_ok(&kv(
                &format!("{}:", scored.scoring),
                &format_score(scored.scoring, cv.mean_score, cv.std_score),
            )),
            Evaluated::Unsupported { reason, .. } => step_warn(&format!("{} skipped: {}", scored.scoring, reason)),
        }
    }

    if let Some(report) = &eval.fit_report {
        step_ok(&kv("Test accuracy:", &format!("{:.3}%", report.accuracy * 100.0)));
        println!("    {}", muted("Confusion matrix"));
        indented(&report.confusion_matrix.to_string());
        println!("    {}", muted("Classification report"));
        indented(&report.report.to_string());
    }

    match &eval.roc_curve {
        Some(Evaluated::Done(roc)) => step_ok(&kv(
            "ROC:",
            &format!("{} points, area {:.3}", roc.fpr.len(), roc.auc),
        )),
        Some(Evaluated::Unsupported { reason, .. }) => step_warn(&format!("ROC skipped: {}", reason)),
        None => {}
    }

    match &eval.feature_ranking {
        Some(Evaluated::Done(ranking)) => {
            println!("    {}", muted("Feature ranking"));
            for feature in ranking {
                println!(
                    "    {:>2}. {:<8} {}",
                    feature.rank,
                    feature.name,
                    dim(&format!("{:.6}", feature.importance))
                );
            }
        }
        Some(Evaluated::Unsupported { reason, .. }) => step_warn(&format!("ranking skipped: {}", reason)),
        None => {}
    }

    if let (Some(path), Some(score)) = (&eval.persisted_to, eval.reloaded_score) {
        step_ok(&kv("Saved:", &path.display().to_string()));
        step_ok(&kv("Reloaded accuracy:", &format!("{:.3}%", score * 100.0)));
    }

    for error in &eval.errors {
        step_err(&error.red().to_string());
    }
}

fn print_summary(results: &[ModelEvaluation], scorings: &[Scoring]) {
    let Some(&primary) = scorings.first() else {
        return;
    };
    let rows: Vec<(&str, f64, f64)> = results
        .iter()
        .filter_map(|r| {
            r.cv(primary)
                .and_then(|o| o.done())
                .map(|cv| (r.name.as_str(), cv.mean_score, cv.std_score))
        })
        .collect();
    if rows.is_empty() {
        return;
    }

    section("Summary");
    println!("  {:<32} {:>20}", muted("Model"), muted(primary.name()));
    println!("  {}", dim(&"─".repeat(54)));
    for (name, mean, std) in &rows {
        println!("  {:<32} {:>20}", name, format_score(primary, *mean, *std));
    }
    println!("  {}", dim(&"─".repeat(54)));

    if let Some((name, mean, _)) = rows.iter().max_by(|a, b| a.1.total_cmp(&b.1)) {
        println!();
        println!("  {} {} {} {:.4}", ok("best"), name.white().bold(), muted(&format!("{}:", primary)), mean);
    }
}
