//! Run configuration for an analysis.

use crate::dataset::AutoTable;
use crate::error::{AnalysisError, AnalysisResult};
use crate::linear_model::PowerVarianceRegression;
use crate::loader::{self, AUTO_MPG_URL};
use crate::synthetic;
use crate::transform::BoxCox;
use std::path::PathBuf;

/// Where the observation table comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum DataSource {
    Url(String),
    File(PathBuf),
    /// A seeded table shaped like the real data, for offline runs.
    Synthetic { rows: usize, seed: u64 },
}

impl DataSource {
    pub fn load(&self) -> AnalysisResult<AutoTable> {
        let table = match self {
            DataSource::Url(url) => loader::fetch(url)?,
            DataSource::File(path) => loader::load_file(path)?,
            DataSource::Synthetic { rows, seed } => synthetic::generate(*rows, *seed),
        };
        if table.is_empty() {
            return Err(AnalysisError::EmptyDataset);
        }
        Ok(table)
    }
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Url(AUTO_MPG_URL.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct ReportConfig {
    pub source: DataSource,
    /// Seed for the cross-validation shuffle.
    pub seed: u64,
    pub folds: usize,
    pub vif_threshold: f64,
    /// How many observations each ranking lists.
    pub top_k: usize,
    /// Predictors whose slopes may differ by origin in the interaction model.
    pub interaction_predictors: Vec<String>,
    pub box_cox: BoxCox,
    pub variance: PowerVarianceRegression,
}

impl ReportConfig {
    pub fn new() -> Self {
        Self {
            source: DataSource::default(),
            seed: 1,
            folds: 10,
            vif_threshold: 5.0,
            top_k: 5,
            interaction_predictors: vec!["weight".to_string(), "horsepower".to_string()],
            box_cox: BoxCox::new(),
            variance: PowerVarianceRegression::new(),
        }
    }

    pub fn source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }

    pub fn url(self, url: &str) -> Self {
        self.source(DataSource::Url(url.to_string()))
    }

    pub fn file(self, path: impl Into<PathBuf>) -> Self {
        self.source(DataSource::File(path.into()))
    }

    /// Use a synthetic table of `rows` cars, generated from the current seed.
    pub fn synthetic(self, rows: usize) -> Self {
        let seed = self.seed;
        self.source(DataSource::Synthetic { rows, seed })
    }

    /// Also reseeds a synthetic source.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        if let DataSource::Synthetic { seed: s, .. } = &mut self.source {
            *s = seed;
        }
        self
    }

    pub fn folds(mut self, folds: usize) -> Self {
        if folds < 2 {
            panic!("folds must be at least 2, got {}", folds);
        }
        self.folds = folds;
        self
    }

    pub fn vif_threshold(mut self, threshold: f64) -> Self {
        if !(threshold > 1.0) {
            panic!("vif_threshold must exceed 1, got {}", threshold);
        }
        self.vif_threshold = threshold;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn interaction_predictors(mut self, predictors: Vec<String>) -> Self {
        self.interaction_predictors = predictors;
        self
    }

    pub fn box_cox(mut self, box_cox: BoxCox) -> Self {
        self.box_cox = box_cox;
        self
    }

    pub fn variance(mut self, variance: PowerVarianceRegression) -> Self {
        self.variance = variance;
        self
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReportConfig::new();
        assert_eq!(config.source, DataSource::Url(AUTO_MPG_URL.to_string()));
        assert_eq!(config.folds, 10);
        assert_eq!(config.vif_threshold, 5.0);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.interaction_predictors, vec!["weight", "horsepower"]);
    }

    #[test]
    fn test_seed_follows_synthetic_source() {
        let a = ReportConfig::new().synthetic(50).seed(9);
        let b = ReportConfig::new().seed(9).synthetic(50);
        assert_eq!(a.source, DataSource::Synthetic { rows: 50, seed: 9 });
        assert_eq!(a.source, b.source);
    }

    #[test]
    fn test_synthetic_source_loads() {
        let table = DataSource::Synthetic { rows: 40, seed: 2 }.load().unwrap();
        assert_eq!(table.n_rows(), 40);

        let empty = DataSource::Synthetic { rows: 0, seed: 2 }.load();
        assert!(matches!(empty, Err(AnalysisError::EmptyDataset)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = DataSource::File("/nonexistent/auto-mpg.data".into()).load();
        assert!(matches!(result, Err(AnalysisError::Io(_))));
    }

    #[test]
    #[should_panic]
    fn test_invalid_folds_panics() {
        ReportConfig::new().folds(1);
    }
}
