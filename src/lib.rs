//! Fuel-efficiency regression analysis of the Auto MPG dataset.
//!
//! The crate loads the 398-car table, summarizes it, and walks through a
//! sequence of linear models: a full OLS fit with diagnostics, a Box-Cox
//! guided response transform, collinearity reduction (manual VIF elimination
//! and AIC stepwise search), a cross-validated LASSO, and two extensions
//! (origin interactions and a power-of-the-mean variance refit).
//!
//! ```rust,no_run
//! use mpg_regression::{Analysis, ReportConfig};
//!
//! let config = ReportConfig::new().synthetic(398).seed(7);
//! let mut table = config.source.load().unwrap();
//! let report = Analysis::new(config).run(&mut table).unwrap();
//! println!("{}", report);
//! ```

pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

pub mod config;
pub mod dataset;
pub mod design;
pub mod diagnostics;
pub mod error;
pub mod linalg;
pub mod linear_model;
pub mod loader;
pub mod metrics;
pub mod report;
pub mod selection;
pub mod summary;
pub mod synthetic;
pub mod transform;

pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;

pub use config::{DataSource, ReportConfig};
pub use dataset::{AutoTable, Car, Column, Dataset, Origin};
pub use design::{ModelSpec, Term};
pub use error::{AnalysisError, AnalysisResult};
pub use linear_model::{
    Coefficient, Lasso, LassoCv, LassoCvResult, LassoPath, LinearRegression, OlsFit,
    PowerVarianceFit, PowerVarianceRegression,
};
pub use report::{Analysis, Decision, Report};
pub use transform::{BoxCox, BoxCoxProfile, ResponseTransform};
