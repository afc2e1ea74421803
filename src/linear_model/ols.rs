use crate::dataset::Dataset;
use crate::design::ModelSpec;
use crate::linalg::Qr;
use crate::{Matrix, Vector};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use std::f64::consts::PI;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

impl Coefficient {
    pub fn is_significant(&self, level: f64) -> bool {
        self.p_value < level
    }
}

/// Ordinary (optionally weighted) least squares.
///
/// Configuration lives on the estimator; [`LinearRegression::fit`] returns a
/// fresh [`OlsFit`] each time and never mutates the estimator.
#[derive(Clone, Debug)]
pub struct LinearRegression {
    fit_intercept: bool,
    weights: Option<Vector>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            fit_intercept: true,
            weights: None,
        }
    }

    pub fn with_intercept(fit_intercept: bool) -> Self {
        Self {
            fit_intercept,
            weights: None,
        }
    }

    /// Per-sample precision weights; all must be positive and finite.
    pub fn weights(mut self, weights: Vector) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn fit(&self, data: &Dataset) -> Result<OlsFit, String> {
        let x = &data.features;
        let y = &data.labels;
        let n = x.nrows();

        if n != y.len() {
            return Err("Number of samples in X and y must match".to_string());
        }
        if n == 0 {
            return Err("X must have at least one sample".to_string());
        }

        let design = self.design_matrix(x);
        let p = design.ncols();
        if n <= p {
            return Err(format!(
                "Need more samples than coefficients, got {} samples and {} coefficients",
                n, p
            ));
        }

        let weights = match &self.weights {
            Some(w) => {
                if w.len() != n {
                    return Err(format!("Got {} weights for {} samples", w.len(), n));
                }
                if w.iter().any(|&v| !(v.is_finite() && v > 0.0)) {
                    return Err("Weights must be positive and finite".to_string());
                }
                w.clone()
            }
            None => Vector::ones(n),
        };

        let sqrt_w = weights.mapv(f64::sqrt);
        let mut weighted_design = design.clone();
        for (mut row, &sw) in weighted_design.axis_iter_mut(ndarray::Axis(0)).zip(sqrt_w.iter()) {
            row *= sw;
        }
        let weighted_y = y * &sqrt_w;

        let qr = Qr::decompose(&weighted_design)?;
        let beta = qr.solve(&weighted_y)?;
        let unscaled_cov = qr.xtx_inverse()?;
        let leverage = qr.leverage();

        let fitted = design.dot(&beta);
        let residuals = y - &fitted;
        let pearson = &residuals * &sqrt_w;
        let rss = pearson.dot(&pearson);

        let df_residual = n - p;
        let sigma2 = rss / df_residual as f64;
        let sigma = sigma2.sqrt();
        let covariance = &unscaled_cov * sigma2;

        let t_dist = StudentsT::new(0.0, 1.0, df_residual as f64).map_err(|e| e.to_string())?;
        let names = self.coefficient_names(data);
        let coefficients = names
            .into_iter()
            .enumerate()
            .map(|(j, name)| {
                let std_error = covariance[(j, j)].sqrt();
                let t_value = beta[j] / std_error;
                let p_value = if t_value.is_finite() {
                    2.0 * t_dist.sf(t_value.abs())
                } else {
                    0.0
                };
                Coefficient {
                    name,
                    estimate: beta[j],
                    std_error,
                    t_value,
                    p_value,
                }
            })
            .collect();

        let (standardized_residuals, cooks_distance): (Vec<f64>, Vec<f64>) = pearson
            .iter()
            .zip(leverage.iter())
            .map(|(&r, &h)| {
                if 1.0 - h < 1e-12 {
                    (f64::NAN, f64::NAN)
                } else {
                    let std_r = r / (sigma * (1.0 - h).sqrt());
                    (std_r, std_r * std_r * h / (p as f64 * (1.0 - h)))
                }
            })
            .unzip();

        let tss = if self.fit_intercept {
            let y_bar = weights.dot(y) / weights.sum();
            y.iter()
                .zip(weights.iter())
                .map(|(&yi, &wi)| wi * (yi - y_bar) * (yi - y_bar))
                .sum::<f64>()
        } else {
            y.iter().zip(weights.iter()).map(|(&yi, &wi)| wi * yi * yi).sum::<f64>()
        };

        let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 1.0 };
        let intercept_df = usize::from(self.fit_intercept);
        let model_df = p - intercept_df;
        let adj_r_squared =
            1.0 - (1.0 - r_squared) * (n - intercept_df) as f64 / df_residual as f64;

        let (f_statistic, f_p_value) = if model_df > 0 {
            let f = ((tss - rss) / model_df as f64) / sigma2;
            let f_dist = FisherSnedecor::new(model_df as f64, df_residual as f64)
                .map_err(|e| e.to_string())?;
            let p_value = if f.is_finite() { f_dist.sf(f.max(0.0)) } else { 0.0 };
            (Some(f), Some(p_value))
        } else {
            (None, None)
        };

        let n_f = n as f64;
        let log_likelihood = 0.5
            * (weights.mapv(f64::ln).sum() - n_f * ((2.0 * PI).ln() + 1.0 - n_f.ln() + rss.ln()));
        let n_estimated = (p + 1) as f64;
        let aic = -2.0 * log_likelihood + 2.0 * n_estimated;
        let bic = -2.0 * log_likelihood + n_f.ln() * n_estimated;

        Ok(OlsFit {
            spec: None,
            coefficients,
            beta,
            covariance,
            fitted,
            residuals,
            pearson_residuals: pearson,
            leverage,
            standardized_residuals: Vector::from(standardized_residuals),
            cooks_distance: Vector::from(cooks_distance),
            weights: self.weights.clone(),
            labels: y.clone(),
            feature_names: data.feature_names.clone(),
            rows: data.rows.clone(),
            fit_intercept: self.fit_intercept,
            sigma,
            df_residual,
            rss,
            r_squared,
            adj_r_squared,
            f_statistic,
            f_p_value,
            log_likelihood,
            aic,
            bic,
        })
    }

    fn design_matrix(&self, x: &Matrix) -> Matrix {
        if !self.fit_intercept {
            return x.clone();
        }
        let mut design = Matrix::ones((x.nrows(), x.ncols() + 1));
        design.slice_mut(ndarray::s![.., 1..]).assign(x);
        design
    }

    fn coefficient_names(&self, data: &Dataset) -> Vec<String> {
        let mut names = Vec::with_capacity(data.n_features() + 1);
        if self.fit_intercept {
            names.push("(Intercept)".to_string());
        }
        names.extend(data.feature_names.iter().cloned());
        names
    }
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable fitted linear model with its inference and diagnostics.
#[derive(Clone, Debug)]
pub struct OlsFit {
    pub spec: Option<ModelSpec>,
    pub coefficients: Vec<Coefficient>,
    pub beta: Vector,
    /// Estimated covariance of `beta`.
    pub covariance: Matrix,
    pub fitted: Vector,
    /// Response minus fitted value, on the response scale.
    pub residuals: Vector,
    /// Residuals scaled by the square root of the weights.
    pub pearson_residuals: Vector,
    pub leverage: Vector,
    pub standardized_residuals: Vector,
    pub cooks_distance: Vector,
    pub weights: Option<Vector>,
    pub labels: Vector,
    pub feature_names: Vec<String>,
    pub rows: Vec<usize>,
    pub fit_intercept: bool,
    pub sigma: f64,
    pub df_residual: usize,
    pub rss: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: Option<f64>,
    pub f_p_value: Option<f64>,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
}

impl OlsFit {
    pub fn n_samples(&self) -> usize {
        self.fitted.len()
    }

    /// Number of estimated coefficients, intercept included.
    pub fn n_coefficients(&self) -> usize {
        self.beta.len()
    }

    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    pub fn formula(&self) -> String {
        match &self.spec {
            Some(spec) => spec.formula(),
            None => format!("y ~ {}", self.feature_names.join(" + ")),
        }
    }

    /// `n log(RSS/n) + 2 edf`, the criterion `step` compares models with.
    pub fn extract_aic(&self) -> f64 {
        let n = self.n_samples() as f64;
        n * (self.rss / n).ln() + 2.0 * self.n_coefficients() as f64
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vector, String> {
        if x.ncols() != self.feature_names.len() {
            return Err(format!(
                "Number of features in X ({}) doesn't match training data ({})",
                x.ncols(),
                self.feature_names.len()
            ));
        }

        if self.fit_intercept {
            let slopes = self.beta.slice(ndarray::s![1..]);
            Ok(x.dot(&slopes) + self.beta[0])
        } else {
            Ok(x.dot(&self.beta))
        }
    }

    pub fn score(&self, x: &Matrix, y: &Vector) -> Result<f64, String> {
        let y_pred = self.predict(x)?;
        crate::metrics::r2_score(y, &y_pred)
    }
}

impl fmt::Display for OlsFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Formula: {}", self.formula())?;
        if self.weights.is_some() {
            writeln!(f, "(weighted least squares)")?;
        }
        writeln!(
            f,
            "{:<26} {:>12} {:>12} {:>9} {:>11}",
            "", "Estimate", "Std. Error", "t value", "Pr(>|t|)"
        )?;
        for c in &self.coefficients {
            writeln!(
                f,
                "{:<26} {:>12.5} {:>12.5} {:>9.3} {:>11.3e} {}",
                c.name,
                c.estimate,
                c.std_error,
                c.t_value,
                c.p_value,
                significance_stars(c.p_value)
            )?;
        }
        writeln!(
            f,
            "Residual standard error: {:.4} on {} degrees of freedom",
            self.sigma, self.df_residual
        )?;
        writeln!(
            f,
            "Multiple R-squared: {:.4},  Adjusted R-squared: {:.4}",
            self.r_squared, self.adj_r_squared
        )?;
        if let (Some(stat), Some(p)) = (self.f_statistic, self.f_p_value) {
            let df1 = self.n_coefficients() - usize::from(self.fit_intercept);
            writeln!(
                f,
                "F-statistic: {:.2} on {} and {} DF,  p-value: {:.3e}",
                stat, df1, self.df_residual, p
            )?;
        }
        write!(
            f,
            "Log-likelihood: {:.3},  AIC: {:.3},  BIC: {:.3}",
            self.log_likelihood, self.aic, self.bic
        )
    }
}

pub(crate) fn significance_stars(p: f64) -> &'static str {
    match p {
        p if p < 0.001 => "***",
        p if p < 0.01 => "**",
        p if p < 0.05 => "*",
        p if p < 0.1 => ".",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line_data() -> Dataset {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![3.1, 4.9, 7.2, 8.8, 11.1, 12.9];
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn test_linear_regression_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let data = Dataset::new(x.clone(), y.clone()).unwrap();

        let fit = LinearRegression::new().fit(&data).unwrap();
        let predictions = fit.predict(&x).unwrap();

        for (pred, actual) in predictions.iter().zip(y.iter()) {
            assert!((pred - actual).abs() < 1e-10);
        }
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_regression_without_intercept() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.1, 5.9, 8.0];
        let data = Dataset::new(x, y).unwrap();

        let fit = LinearRegression::with_intercept(false).fit(&data).unwrap();
        assert_eq!(fit.n_coefficients(), 1);
        assert!((fit.beta[0] - 2.0).abs() < 0.05);
        assert_eq!(fit.coefficients[0].name, "x1");
    }

    #[test]
    fn test_inference_matches_closed_form() {
        let data = line_data();
        let fit = LinearRegression::new().fit(&data).unwrap();

        // Simple regression: se(slope) = sigma / sqrt(Sxx).
        let sxx: f64 = (1..=6).map(|v| (v as f64 - 3.5).powi(2)).sum();
        let slope = fit.coefficient("x1").unwrap();
        assert!((slope.std_error - fit.sigma / sxx.sqrt()).abs() < 1e-10);
        assert!((slope.t_value - slope.estimate / slope.std_error).abs() < 1e-10);
        assert!(slope.p_value < 1e-4);
        assert!(slope.is_significant(0.05));

        // With one slope the overall F equals t squared.
        let f = fit.f_statistic.unwrap();
        assert!((f - slope.t_value.powi(2)).abs() < 1e-6 * f);
        assert!((fit.f_p_value.unwrap() - slope.p_value).abs() < 1e-8);
        assert_eq!(fit.df_residual, 4);
    }

    #[test]
    fn test_leverage_and_residual_identities() {
        let data = line_data();
        let fit = LinearRegression::new().fit(&data).unwrap();

        assert!((fit.leverage.sum() - 2.0).abs() < 1e-10);
        assert!(fit.residuals.sum().abs() < 1e-10);
        assert!((fit.rss - fit.residuals.dot(&fit.residuals)).abs() < 1e-12);

        let h0 = fit.leverage[0];
        let expected = fit.residuals[0] / (fit.sigma * (1.0 - h0).sqrt());
        assert!((fit.standardized_residuals[0] - expected).abs() < 1e-10);
        assert!(fit.cooks_distance.iter().all(|&d| d >= 0.0));
    }

    #[test]
    fn test_log_likelihood_and_aic() {
        let data = line_data();
        let fit = LinearRegression::new().fit(&data).unwrap();

        let n = 6.0;
        let sigma_ml2 = fit.rss / n;
        let expected = -n / 2.0 * ((2.0 * PI * sigma_ml2).ln() + 1.0);
        assert!((fit.log_likelihood - expected).abs() < 1e-10);
        assert!((fit.aic - (-2.0 * expected + 6.0)).abs() < 1e-10);
        assert!((fit.extract_aic() - (n * (fit.rss / n).ln() + 4.0)).abs() < 1e-10);
    }

    #[test]
    fn test_weighted_fit_ignores_downweighted_outlier() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![2.0, 4.0, 6.0, 8.0, 30.0];
        let data = Dataset::new(x, y).unwrap();

        let weights = array![1.0, 1.0, 1.0, 1.0, 1e-9];
        let fit = LinearRegression::new().weights(weights).fit(&data).unwrap();
        assert!((fit.beta[1] - 2.0).abs() < 1e-3);
        assert!(fit.weights.is_some());
    }

    #[test]
    fn test_unit_weights_match_unweighted() {
        let data = line_data();
        let plain = LinearRegression::new().fit(&data).unwrap();
        let weighted = LinearRegression::new()
            .weights(Vector::ones(6))
            .fit(&data)
            .unwrap();
        assert!((plain.beta[1] - weighted.beta[1]).abs() < 1e-12);
        assert!((plain.log_likelihood - weighted.log_likelihood).abs() < 1e-10);
    }

    #[test]
    fn test_invalid_weights() {
        let data = line_data();
        assert!(LinearRegression::new().weights(Vector::ones(3)).fit(&data).is_err());
        let mut w = Vector::ones(6);
        w[2] = 0.0;
        assert!(LinearRegression::new().weights(w).fit(&data).is_err());
    }

    #[test]
    fn test_too_few_samples() {
        let data = Dataset::new(array![[1.0, 2.0], [2.0, 1.0]], array![1.0, 2.0]).unwrap();
        assert!(LinearRegression::new().fit(&data).is_err());
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let fit = LinearRegression::new().fit(&line_data()).unwrap();
        assert!(fit.predict(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_summary_lists_coefficients() {
        let fit = LinearRegression::new().fit(&line_data()).unwrap();
        let text = fit.to_string();
        assert!(text.contains("(Intercept)"));
        assert!(text.contains("Multiple R-squared"));
        assert_eq!(significance_stars(0.0001), "***");
        assert_eq!(significance_stars(0.5), "");
    }
}
