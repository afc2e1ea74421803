//! Linear models for regression.
//!
//! This module provides implementations of:
//! - `LinearRegression`: ordinary and weighted least squares with full
//!   coefficient inference, returning an immutable `OlsFit`
//! - `Lasso`, `LassoPath`, `LassoCv`: L1-penalized regression by coordinate
//!   descent, along a penalty path, and with a cross-validated penalty
//! - `PowerVarianceRegression`: IRLS for a power-of-the-mean variance
//!
//! # Examples
//!
//! ## Least squares
//! ```rust
//! use mpg_regression::{Dataset, LinearRegression};
//! use ndarray::array;
//!
//! let x = array![[1.0], [2.0], [3.0], [4.0]];
//! let y = array![2.1, 3.9, 6.2, 7.8];
//! let data = Dataset::new(x.clone(), y).unwrap();
//!
//! let fit = LinearRegression::new().fit(&data).unwrap();
//! let predictions = fit.predict(&x).unwrap();
//! println!("{}", fit);
//! ```
//!
//! ## LASSO
//! ```rust
//! use mpg_regression::Lasso;
//! use ndarray::array;
//!
//! let x = array![[1.0, 0.3], [2.0, -0.1], [3.0, 0.2], [4.0, 0.0]];
//! let y = array![2.0, 4.0, 6.0, 8.0];
//!
//! let mut model = Lasso::new().alpha(0.1);
//! model.fit(&x, &y).unwrap();
//! let predictions = model.predict(&x).unwrap();
//! ```

mod irls;
mod lasso;
mod ols;

pub use irls::{PowerVarianceFit, PowerVarianceRegression};
pub use lasso::{Lasso, LassoCv, LassoCvResult, LassoPath, LassoPathFit};
pub use ols::{Coefficient, LinearRegression, OlsFit};
pub(crate) use ols::significance_stars;
