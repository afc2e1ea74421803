use crate::dataset::Dataset;
use crate::linear_model::{LinearRegression, OlsFit};
use crate::Vector;
use log::{debug, warn};

const MIN_MEAN: f64 = 1e-8;

/// Linear mean with variance `sigma^2 * |mu|^(2 * power)`, fitted by
/// iteratively reweighted least squares.
///
/// For each candidate power the weights `|mu|^(-2 * power)` are refreshed
/// from the current fitted values until the coefficients settle; the power
/// with the highest profile log-likelihood wins.
#[derive(Clone, Debug)]
pub struct PowerVarianceRegression {
    powers: Vec<f64>,
    max_iter: usize,
    tolerance: f64,
}

#[derive(Clone, Debug)]
pub struct PowerVarianceFit {
    pub power: f64,
    pub fit: OlsFit,
    pub iterations: usize,
    pub converged: bool,
    /// `(power, profile log-likelihood)` for every candidate tried.
    pub profile: Vec<(f64, f64)>,
}

impl PowerVarianceFit {
    pub fn log_likelihood(&self) -> f64 {
        self.fit.log_likelihood
    }

    /// AIC counting the variance power as an extra parameter.
    pub fn aic(&self) -> f64 {
        self.fit.aic + 2.0
    }
}

impl PowerVarianceRegression {
    pub fn new() -> Self {
        Self {
            powers: (0..=30).map(|i| i as f64 * 0.1).collect(),
            max_iter: 50,
            tolerance: 1e-8,
        }
    }

    pub fn powers(mut self, powers: Vec<f64>) -> Self {
        if powers.is_empty() {
            panic!("at least one variance power is required");
        }
        self.powers = powers;
        self
    }

    /// Fix the variance power instead of searching for it.
    pub fn power(self, power: f64) -> Self {
        self.powers(vec![power])
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn fit(&self, data: &Dataset) -> Result<PowerVarianceFit, String> {
        let start = LinearRegression::new().fit(data)?;

        let mut best: Option<PowerVarianceFit> = None;
        let mut profile = Vec::with_capacity(self.powers.len());

        for &power in &self.powers {
            let (fit, iterations, converged) = self.fit_power(data, &start, power)?;
            debug!(
                "variance power {:.2}: loglik {:.3} after {} iterations",
                power, fit.log_likelihood, iterations
            );
            profile.push((power, fit.log_likelihood));

            let better = best
                .as_ref()
                .is_none_or(|b| fit.log_likelihood > b.fit.log_likelihood);
            if better {
                best = Some(PowerVarianceFit {
                    power,
                    fit,
                    iterations,
                    converged,
                    profile: Vec::new(),
                });
            }
        }

        let mut best = best.ok_or("No variance power was evaluated")?;
        if !best.converged {
            warn!(
                "IRLS did not converge for variance power {:.2} in {} iterations",
                best.power, self.max_iter
            );
        }
        best.profile = profile;
        Ok(best)
    }

    fn fit_power(
        &self,
        data: &Dataset,
        start: &OlsFit,
        power: f64,
    ) -> Result<(OlsFit, usize, bool), String> {
        if power == 0.0 {
            return Ok((start.clone(), 0, true));
        }

        let mut current = start.clone();
        for iteration in 1..=self.max_iter {
            let weights = variance_weights(&current.fitted, power);
            let next = LinearRegression::new().weights(weights).fit(data)?;

            let change = relative_change(&current.beta, &next.beta);
            current = next;
            if change < self.tolerance {
                return Ok((current, iteration, true));
            }
        }

        Ok((current, self.max_iter, false))
    }
}

impl Default for PowerVarianceRegression {
    fn default() -> Self {
        Self::new()
    }
}

fn variance_weights(mu: &Vector, power: f64) -> Vector {
    mu.mapv(|m| m.abs().max(MIN_MEAN).powf(-2.0 * power))
}

fn relative_change(old: &Vector, new: &Vector) -> f64 {
    old.iter()
        .zip(new.iter())
        .map(|(a, b)| (a - b).abs() / (a.abs() + 1e-8))
        .fold(0.0, f64::max)
}
