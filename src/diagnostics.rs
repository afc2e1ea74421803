//! Residual and collinearity diagnostics for fitted linear models.
//!
//! Plots are represented by the series they would draw: residual-vs-fitted
//! pairs and normal Q-Q points.

use crate::dataset::Dataset;
use crate::design::{ModelSpec, Term};
use crate::linalg;
use crate::linear_model::{LinearRegression, OlsFit};
use crate::metrics::pearson_correlation;
use crate::{Matrix, Vector};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct RankedObservation {
    /// Row in the observation table.
    pub row: usize,
    pub value: f64,
}

/// Generalized VIF of one model term. For single-column terms `gvif` is the
/// ordinary `1 / (1 - R^2)`.
#[derive(Clone, Debug, PartialEq)]
pub struct TermVif {
    pub term: Term,
    pub gvif: f64,
    pub df: usize,
    /// `gvif^(1 / (2 df))`, comparable across terms of different width.
    pub adjusted: f64,
}

impl TermVif {
    /// On the VIF scale: equals `gvif` when `df == 1`.
    pub fn comparable(&self) -> f64 {
        self.adjusted * self.adjusted
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BreuschPagan {
    pub statistic: f64,
    pub df: usize,
    pub p_value: f64,
}

/// Plotting positions used for normal Q-Q plots.
pub fn ppoints(n: usize) -> Vec<f64> {
    let a = if n <= 10 { 3.0 / 8.0 } else { 0.5 };
    (1..=n)
        .map(|i| (i as f64 - a) / (n as f64 + 1.0 - 2.0 * a))
        .collect()
}

/// `(theoretical quantile, sample quantile)` pairs, sample sorted ascending.
pub fn qq_points(values: &Vector) -> Result<Vec<(f64, f64)>, String> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.len() < 2 {
        return Err("Q-Q plot needs at least two finite values".to_string());
    }
    sorted.sort_by(f64::total_cmp);

    let normal = Normal::new(0.0, 1.0).map_err(|e| e.to_string())?;
    Ok(ppoints(sorted.len())
        .into_iter()
        .map(|p| normal.inverse_cdf(p))
        .zip(sorted)
        .collect())
}

/// Correlation of the Q-Q points; close to 1 for normal residuals.
pub fn qq_correlation(points: &[(f64, f64)]) -> Result<f64, String> {
    let theoretical: Vector = points.iter().map(|p| p.0).collect();
    let sample: Vector = points.iter().map(|p| p.1).collect();
    pearson_correlation(&theoretical, &sample)
}

/// Correlation between |Pearson residual| and fitted value. A clearly
/// positive value is the fan shape of variance growing with the mean.
pub fn abs_residual_fitted_correlation(fit: &OlsFit) -> Result<f64, String> {
    let abs_res = fit.pearson_residuals.mapv(f64::abs);
    pearson_correlation(&abs_res, &fit.fitted)
}

pub fn top_by_magnitude(values: &Vector, rows: &[usize], k: usize) -> Vec<RankedObservation> {
    let mut ranked: Vec<RankedObservation> = values
        .iter()
        .zip(rows.iter())
        .filter(|(v, _)| v.is_finite())
        .map(|(&value, &row)| RankedObservation { row, value })
        .collect();
    ranked.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
    ranked.truncate(k);
    ranked
}

pub fn largest_residuals(fit: &OlsFit, k: usize) -> Vec<RankedObservation> {
    top_by_magnitude(&fit.standardized_residuals, &fit.rows, k)
}

pub fn highest_leverage(fit: &OlsFit, k: usize) -> Vec<RankedObservation> {
    top_by_magnitude(&fit.leverage, &fit.rows, k)
}

/// The usual `2p / n` cut-off for a high hat value.
pub fn leverage_threshold(fit: &OlsFit) -> f64 {
    2.0 * fit.n_coefficients() as f64 / fit.n_samples() as f64
}

/// `1 / (1 - R^2)` of each feature column regressed on all the others,
/// read off the diagonal of the inverse correlation matrix.
pub fn column_vifs(data: &Dataset) -> Result<Vec<(String, f64)>, String> {
    if data.n_features() < 2 {
        return Ok(data.feature_names.iter().map(|n| (n.clone(), 1.0)).collect());
    }

    let inverse = linalg::invert(&linalg::correlation(&data.features)?)?;
    Ok(data
        .feature_names
        .iter()
        .zip(inverse.diag().iter())
        .map(|(name, &vif)| (name.clone(), vif))
        .collect())
}

/// GVIF per term: `det(R_tt) det(R_oo) / det(R)` over the correlation
/// matrix of the design columns.
pub fn term_vifs(data: &Dataset, spec: &ModelSpec) -> Result<Vec<TermVif>, String> {
    if spec.n_columns() != data.n_features() {
        return Err(format!(
            "{} has {} columns but the design has {}",
            spec.formula(),
            spec.n_columns(),
            data.n_features()
        ));
    }

    let ranges = spec.term_ranges();
    if ranges.len() < 2 {
        return Ok(ranges
            .into_iter()
            .map(|(term, range)| TermVif {
                term,
                gvif: 1.0,
                df: range.len(),
                adjusted: 1.0,
            })
            .collect());
    }

    let corr = linalg::correlation(&data.features)?;
    let det_all = linalg::determinant(&corr)?;
    if det_all <= 0.0 {
        return Err("Design columns are perfectly collinear".to_string());
    }

    let p = corr.nrows();
    ranges
        .into_iter()
        .map(|(term, range)| {
            let inside: Vec<usize> = range.clone().collect();
            let outside: Vec<usize> = (0..p).filter(|j| !range.contains(j)).collect();
            let det_in = linalg::determinant(&submatrix(&corr, &inside))?;
            let det_out = linalg::determinant(&submatrix(&corr, &outside))?;
            let gvif = det_in * det_out / det_all;
            let df = inside.len();
            Ok(TermVif {
                term,
                gvif,
                df,
                adjusted: gvif.powf(1.0 / (2.0 * df as f64)),
            })
        })
        .collect()
}

fn submatrix(m: &Matrix, idx: &[usize]) -> Matrix {
    m.select(ndarray::Axis(0), idx).select(ndarray::Axis(1), idx)
}

/// Koenker's studentized Breusch-Pagan test against the model's own
/// regressors.
pub fn breusch_pagan(fit: &OlsFit, data: &Dataset) -> Result<BreuschPagan, String> {
    if data.n_samples() != fit.n_samples() {
        return Err("Fit and design have different sample counts".to_string());
    }
    let squared = fit.pearson_residuals.mapv(|r| r * r);
    let auxiliary = data.with_labels(squared)?;
    let aux_fit = LinearRegression::new().fit(&auxiliary)?;

    let df = data.n_features();
    let statistic = fit.n_samples() as f64 * aux_fit.r_squared;
    let chi2 = ChiSquared::new(df as f64).map_err(|e| e.to_string())?;
    Ok(BreuschPagan {
        statistic,
        df,
        p_value: chi2.sf(statistic),
    })
}

/// Everything the residual plots of one model would show.
#[derive(Clone, Debug)]
pub struct ResidualDiagnostics {
    pub residual_vs_fitted: Vec<(f64, f64)>,
    pub qq: Vec<(f64, f64)>,
    pub qq_correlation: f64,
    pub abs_residual_fitted_correlation: f64,
    pub breusch_pagan: BreuschPagan,
    pub largest_residuals: Vec<RankedObservation>,
    pub highest_leverage: Vec<RankedObservation>,
    pub leverage_threshold: f64,
    pub high_leverage_count: usize,
}

impl ResidualDiagnostics {
    pub fn compute(fit: &OlsFit, data: &Dataset, top_k: usize) -> Result<Self, String> {
        let residual_vs_fitted = fit
            .fitted
            .iter()
            .copied()
            .zip(fit.pearson_residuals.iter().copied())
            .collect();
        let qq = qq_points(&fit.standardized_residuals)?;
        let qq_correlation = qq_correlation(&qq)?;
        let threshold = leverage_threshold(fit);

        Ok(Self {
            residual_vs_fitted,
            qq,
            qq_correlation,
            abs_residual_fitted_correlation: abs_residual_fitted_correlation(fit)?,
            breusch_pagan: breusch_pagan(fit, data)?,
            largest_residuals: largest_residuals(fit, top_k),
            highest_leverage: highest_leverage(fit, top_k),
            leverage_threshold: threshold,
            high_leverage_count: fit.leverage.iter().filter(|&&h| h > threshold).count(),
        })
    }
}

impl fmt::Display for ResidualDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "corr(|residual|, fitted) = {:.4}; Breusch-Pagan BP = {:.3} on {} df, p = {:.3e}",
            self.abs_residual_fitted_correlation,
            self.breusch_pagan.statistic,
            self.breusch_pagan.df,
            self.breusch_pagan.p_value
        )?;
        writeln!(f, "normal Q-Q correlation = {:.4}", self.qq_correlation)?;

        let rows = |obs: &[RankedObservation]| {
            obs.iter()
                .map(|o| format!("{} ({:.3})", o.row + 1, o.value))
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(f, "largest standardized residuals: {}", rows(&self.largest_residuals))?;
        write!(
            f,
            "highest leverage: {}; {} above 2p/n = {:.4}",
            rows(&self.highest_leverage),
            self.high_leverage_count,
            self.leverage_threshold
        )
    }
}

pub fn render_vifs(vifs: &[TermVif]) -> String {
    let mut out = format!("{:<24} {:>10} {:>4} {:>14}\n", "term", "GVIF", "Df", "GVIF^(1/2Df)");
    for v in vifs {
        out.push_str(&format!(
            "{:<24} {:>10.3} {:>4} {:>14.3}\n",
            v.term.label(),
            v.gvif,
            v.df,
            v.adjusted
        ));
    }
    out
}
