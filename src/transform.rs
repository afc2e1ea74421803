//! Box-Cox profile likelihood for choosing a response transformation.

use crate::dataset::Dataset;
use crate::linalg::Qr;
use crate::{Matrix, Vector};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::fmt;

/// Below this |lambda| the transform is evaluated by its series around 0.
const LOG_EPS: f64 = 1.0 / 50.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResponseTransform {
    Identity,
    Log,
    Power(f64),
}

impl ResponseTransform {
    pub fn from_lambda(lambda: f64) -> Self {
        if lambda == 0.0 {
            ResponseTransform::Log
        } else if lambda == 1.0 {
            ResponseTransform::Identity
        } else {
            ResponseTransform::Power(lambda)
        }
    }

    pub fn apply(self, y: f64) -> Option<f64> {
        match self {
            ResponseTransform::Identity => Some(y),
            ResponseTransform::Log if y > 0.0 => Some(y.ln()),
            ResponseTransform::Power(lambda) if y > 0.0 => Some((y.powf(lambda) - 1.0) / lambda),
            _ => None,
        }
    }

    pub fn invert(self, z: f64) -> f64 {
        match self {
            ResponseTransform::Identity => z,
            ResponseTransform::Log => z.exp(),
            ResponseTransform::Power(lambda) => (lambda * z + 1.0).powf(1.0 / lambda),
        }
    }

    /// Name for the transformed column, e.g. `log_mpg`.
    pub fn column_name(self, response: &str) -> String {
        match self {
            ResponseTransform::Identity => response.to_string(),
            ResponseTransform::Log => format!("log_{}", response),
            ResponseTransform::Power(lambda) => format!("{}_pow_{}", response, lambda),
        }
    }
}

impl fmt::Display for ResponseTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseTransform::Identity => write!(f, "identity"),
            ResponseTransform::Log => write!(f, "log"),
            ResponseTransform::Power(lambda) => write!(f, "power {}", lambda),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BoxCox {
    lambdas: Vec<f64>,
    candidates: Vec<f64>,
    confidence: f64,
}

#[derive(Clone, Debug)]
pub struct BoxCoxProfile {
    /// `(lambda, profile log-likelihood)` over the grid.
    pub curve: Vec<(f64, f64)>,
    pub best_lambda: f64,
    pub max_log_likelihood: f64,
    /// Grid points whose likelihood is within the chi-square cut-off.
    pub interval: (f64, f64),
    /// Round value chosen for interpretability.
    pub suggested_lambda: f64,
}

impl BoxCoxProfile {
    pub fn contains(&self, lambda: f64) -> bool {
        self.interval.0 <= lambda && lambda <= self.interval.1
    }

    pub fn transform(&self) -> ResponseTransform {
        ResponseTransform::from_lambda(self.suggested_lambda)
    }
}

impl BoxCox {
    pub fn new() -> Self {
        Self {
            lambdas: (-200..=200).map(|i| i as f64 / 100.0).collect(),
            candidates: vec![-2.0, -1.0, -0.5, 0.0, 0.5, 1.0, 2.0],
            confidence: 0.95,
        }
    }

    pub fn lambdas(mut self, lambdas: Vec<f64>) -> Self {
        if lambdas.len() < 2 {
            panic!("the lambda grid needs at least two points, got {}", lambdas.len());
        }
        self.lambdas = lambdas;
        self
    }

    pub fn candidates(mut self, candidates: Vec<f64>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        if !(confidence > 0.0 && confidence < 1.0) {
            panic!("confidence must be in (0, 1), got {}", confidence);
        }
        self.confidence = confidence;
        self
    }

    /// Profile log-likelihood of the linear model in `data` for each
    /// transformed response `(y^lambda - 1) / lambda`.
    pub fn profile(&self, data: &Dataset) -> Result<BoxCoxProfile, String> {
        let y = &data.labels;
        if y.iter().any(|&v| !(v > 0.0)) {
            return Err("Box-Cox requires a strictly positive response".to_string());
        }

        let n = y.len() as f64;
        let mut design = Matrix::ones((data.n_samples(), data.n_features() + 1));
        design.slice_mut(ndarray::s![.., 1..]).assign(&data.features);
        let qr = Qr::decompose(&design)?;

        let log_y = y.mapv(f64::ln);
        let sum_log_y = log_y.sum();

        let curve: Vec<(f64, f64)> = self
            .lambdas
            .iter()
            .map(|&lambda| {
                let transformed = box_cox(&log_y, lambda);
                let residuals = qr.residuals(&transformed);
                let rss = residuals.dot(&residuals);
                (lambda, -n / 2.0 * rss.ln() + (lambda - 1.0) * sum_log_y)
            })
            .collect();

        let (best_lambda, max_log_likelihood) = curve
            .iter()
            .copied()
            .fold((f64::NAN, f64::NEG_INFINITY), |best, point| {
                if point.1 > best.1 { point } else { best }
            });
        if !max_log_likelihood.is_finite() {
            return Err("Box-Cox likelihood is not finite on the grid".to_string());
        }

        let chi2 = ChiSquared::new(1.0).map_err(|e| e.to_string())?;
        let cutoff = max_log_likelihood - chi2.inverse_cdf(self.confidence) / 2.0;
        let inside: Vec<f64> = curve
            .iter()
            .filter(|(_, ll)| *ll >= cutoff)
            .map(|(lambda, _)| *lambda)
            .collect();
        let interval = (
            inside.iter().copied().fold(f64::INFINITY, f64::min),
            inside.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        );

        let suggested_lambda = self
            .candidates
            .iter()
            .copied()
            .filter(|&c| interval.0 <= c && c <= interval.1)
            .min_by(|a, b| (a - best_lambda).abs().total_cmp(&(b - best_lambda).abs()))
            .unwrap_or(best_lambda);

        Ok(BoxCoxProfile {
            curve,
            best_lambda,
            max_log_likelihood,
            interval,
            suggested_lambda,
        })
    }
}

impl Default for BoxCox {
    fn default() -> Self {
        Self::new()
    }
}

fn box_cox(log_y: &Vector, lambda: f64) -> Vector {
    if lambda.abs() > LOG_EPS {
        log_y.mapv(|ly| ((lambda * ly).exp() - 1.0) / lambda)
    } else {
        log_y.mapv(|ly| {
            let t = lambda * ly;
            ly * (1.0 + t / 2.0 * (1.0 + t / 3.0 * (1.0 + t / 4.0)))
        })
    }
}
