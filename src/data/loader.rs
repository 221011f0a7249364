//! CSV loading through polars

use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Column layout of the pima-indians-diabetes CSV (no header row, label last)
pub const PIMA_COLUMNS: [&str; 9] = ["preg", "plas", "pres", "skin", "test", "mass", "pedi", "age", "class"];

/// How to read a labelled numeric CSV
#[derive(Debug, Clone)]
pub struct CsvSchema {
    /// First row holds column names
    pub has_header: bool,
    /// Names to use when the file has no header; label column last
    pub column_names: Vec<String>,
    /// Field separator
    pub delimiter: u8,
}

impl Default for CsvSchema {
    fn default() -> Self {
        Self {
            has_header: false,
            column_names: PIMA_COLUMNS.iter().map(|s| s.to_string()).collect(),
            delimiter: b',',
        }
    }
}

impl CsvSchema {
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_column_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.column_names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Read a CSV file into a DataFrame
pub fn load_csv(path: &Path, schema: &CsvSchema) -> Result<DataFrame> {
    let start = Instant::now();
    let file = File::open(path).map_err(|e| {
        EvalError::DataError(format!("cannot open {}: {}", path.display(), e))
    })?;

    let parse_opts = CsvParseOptions::default().with_separator(schema.delimiter);

    let df = CsvReadOptions::default()
        .with_has_header(schema.has_header)
        .with_infer_schema_length(Some(100))
        .with_parse_options(parse_opts)
        .into_reader_with_file_handle(file)
        .finish()?;

    debug!(
        path = %path.display(),
        rows = df.height(),
        cols = df.width(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "loaded csv"
    );
    Ok(df)
}

/// Split a DataFrame into a feature matrix and label vector, taking the label
/// from the last column. Returns the column names as well.
pub fn dataframe_to_arrays(df: &DataFrame) -> Result<(Array2<f64>, Array1<f64>, Vec<String>)> {
    let n_cols = df.width();
    if n_cols < 2 {
        return Err(EvalError::DataError(format!(
            "expected at least one feature and a label column, found {} column(s)",
            n_cols
        )));
    }
    let n_rows = df.height();
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(n_cols);
    for (col, name) in df.get_columns().iter().zip(names.iter()) {
        let series = col.as_materialized_series().cast(&DataType::Float64)?;
        let values = series
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| EvalError::DataError(format!("missing value in column '{}' at row {}", name, row)))
            })
            .collect::<Result<Vec<f64>>>()?;
        columns.push(values);
    }

    let n_features = n_cols - 1;
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, j)| columns[j][i]);
    let y = Array1::from_vec(columns.pop().unwrap_or_default());
    Ok((x, y, names))
}
