//! Data loading utilities

use crate::error::{Result, TrainerError};
use ndarray::{s, Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// CSV loader for numeric tables
pub struct DataLoader {
    /// Rows used for schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 100,
        }
    }

    /// Set the number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            TrainerError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| TrainerError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Load a CSV file straight into a dense `f64` matrix
    pub fn load_array(&self, path: impl AsRef<Path>) -> Result<Array2<f64>> {
        let df = self.load_csv(path)?;
        dataframe_to_array(&df)
    }
}

/// Convert every column to `f64`, rejecting missing or non-numeric cells
pub fn dataframe_to_array(df: &DataFrame) -> Result<Array2<f64>> {
    let (n_rows, n_cols) = df.shape();
    let mut array = Array2::zeros((n_rows, n_cols));

    for (j, column) in df.get_columns().iter().enumerate() {
        let series = column.as_materialized_series();
        let casted = series.cast(&DataType::Float64)?;
        let values = casted.f64()?;

        for (i, value) in values.into_iter().enumerate() {
            array[[i, j]] = value.ok_or_else(|| {
                TrainerError::DataError(format!(
                    "column '{}' row {} is missing or not numeric",
                    series.name(),
                    i
                ))
            })?;
        }
    }

    Ok(array)
}

/// Split a table into features (all but the last column) and target (last column)
pub fn split_features_target(data: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    let n_cols = data.ncols();
    if n_cols < 2 {
        return Err(TrainerError::ShapeError {
            expected: "at least 2 columns (features + target)".to_string(),
            actual: format!("{} columns", n_cols),
        });
    }
    if data.nrows() == 0 {
        return Err(TrainerError::DataError("table has no rows".to_string()));
    }

    let x = data.slice(s![.., ..n_cols - 1]).to_owned();
    let y = data.column(n_cols - 1).to_owned();
    Ok((x, y))
}

/// Save DataFrames to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path).map_err(|e| {
            TrainerError::DataError(format!("cannot create {}: {}", path.display(), e))
        })?;

        CsvWriter::new(&mut file)
            .finish(df)
            .map_err(|e| TrainerError::DataError(e.to_string()))
    }

    /// Save a prediction vector as a single-column CSV
    pub fn save_predictions(predictions: &Array1<f64>, path: impl AsRef<Path>) -> Result<()> {
        let mut df = DataFrame::new(vec![Column::new(
            "prediction".into(),
            predictions.to_vec(),
        )])?;
        Self::save_csv(&mut df, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "a,b,c").unwrap();
        writeln!(file, "1,2,3").unwrap();
        writeln!(file, "4,5.5,6").unwrap();
        writeln!(file, "7,8,9").unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let df = DataLoader::new().load_csv(file.path()).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_load_array_casts_integers() {
        let file = create_test_csv();
        let array = DataLoader::new().load_array(file.path()).unwrap();

        assert_eq!(array.dim(), (3, 3));
        assert_eq!(array[[1, 1]], 5.5);
        assert_eq!(array[[2, 0]], 7.0);
    }

    #[test]
    fn test_non_numeric_rejected() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "a,b").unwrap();
        writeln!(file, "1,x").unwrap();
        writeln!(file, "2,y").unwrap();

        let err = DataLoader::new().load_array(file.path()).unwrap_err();
        assert!(matches!(err, TrainerError::DataError(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = DataLoader::new().load_csv("/nonexistent/train.csv").unwrap_err();
        assert!(matches!(err, TrainerError::DataError(_)));
    }

    #[test]
    fn test_split_features_target() {
        let data = ndarray::array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let (x, y) = split_features_target(&data).unwrap();
        assert_eq!(x, ndarray::array![[1.0, 2.0], [4.0, 5.0]]);
        assert_eq!(y, ndarray::array![3.0, 6.0]);

        assert!(split_features_target(&ndarray::array![[1.0], [2.0]]).is_err());
    }

    #[test]
    fn test_save_predictions() {
        let file = NamedTempFile::new().unwrap();
        DataSaver::save_predictions(&ndarray::array![1.5, 2.5], file.path()).unwrap();

        let loaded = DataLoader::new().load_csv(file.path()).unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.get_column_names()[0].as_str(), "prediction");
    }
}
