//! Predictor selection: manual VIF elimination, bidirectional stepwise
//! search on AIC, and nested-model F tests.

use crate::dataset::AutoTable;
use crate::design::{ModelSpec, Term};
use crate::diagnostics::{self, TermVif};
use crate::linear_model::{LinearRegression, OlsFit};
use log::{debug, info};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct VifDrop {
    pub term: Term,
    /// The term's VIF-scale value when it was removed.
    pub vif: f64,
}

#[derive(Clone, Debug)]
pub struct VifElimination {
    pub dropped: Vec<VifDrop>,
    pub spec: ModelSpec,
    pub vifs: Vec<TermVif>,
    pub threshold: f64,
}

/// Repeatedly removes the term with the largest VIF while it is at or above
/// `threshold`, recomputing after every removal. Every kept term ends
/// strictly below the threshold.
pub fn eliminate_by_vif(
    table: &AutoTable,
    spec: &ModelSpec,
    threshold: f64,
) -> Result<VifElimination, String> {
    let rows = table.complete_rows(&spec.variables())?;
    eliminate_by_vif_on_rows(table, spec, &rows, threshold)
}

/// [`eliminate_by_vif`] over the given rows, which must be complete for
/// `spec`.
pub fn eliminate_by_vif_on_rows(
    table: &AutoTable,
    spec: &ModelSpec,
    rows: &[usize],
    threshold: f64,
) -> Result<VifElimination, String> {
    if !(threshold > 1.0) {
        return Err(format!("VIF threshold must exceed 1, got {}", threshold));
    }

    let mut current = spec.clone();
    let mut dropped = Vec::new();

    loop {
        let data = current.build_on_rows(table, rows)?;
        let vifs = diagnostics::term_vifs(&data, &current)?;

        let worst = vifs
            .iter()
            .max_by(|a, b| a.comparable().total_cmp(&b.comparable()))
            .filter(|v| v.comparable() >= threshold)
            .cloned();

        match worst {
            Some(worst) => {
                debug!("dropping {} (VIF {:.2})", worst.term, worst.comparable());
                current = current.without(&worst.term);
                dropped.push(VifDrop {
                    vif: worst.comparable(),
                    term: worst.term,
                });
            }
            None => {
                info!(
                    "VIF elimination kept {} of {} terms",
                    current.terms.len(),
                    spec.terms.len()
                );
                return Ok(VifElimination {
                    dropped,
                    spec: current,
                    vifs,
                    threshold,
                });
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StepAction {
    Start,
    Add(Term),
    Drop(Term),
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepAction::Start => f.write_str("start"),
            StepAction::Add(term) => write!(f, "+ {}", term),
            StepAction::Drop(term) => write!(f, "- {}", term),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub action: StepAction,
    pub aic: f64,
    pub formula: String,
}

#[derive(Clone, Debug)]
pub struct StepwiseResult {
    pub steps: Vec<Step>,
    pub spec: ModelSpec,
    pub fit: OlsFit,
}

impl StepwiseResult {
    pub fn aic(&self) -> f64 {
        self.fit.extract_aic()
    }
}

/// Bidirectional stepwise search between the intercept-only model and
/// `scope`, starting from `scope` itself. Every candidate is fitted on the
/// rows complete for the whole scope so AIC values stay comparable.
pub fn stepwise_aic(table: &AutoTable, scope: &ModelSpec) -> Result<StepwiseResult, String> {
    let rows = table.complete_rows(&scope.variables())?;
    let fit = |spec: &ModelSpec| -> Result<OlsFit, String> {
        let data = spec.build_on_rows(table, &rows)?;
        let mut fit = LinearRegression::new().fit(&data)?;
        fit.spec = Some(spec.clone());
        Ok(fit)
    };

    let mut current = scope.clone();
    let mut current_fit = fit(&current)?;
    let mut steps = vec![Step {
        action: StepAction::Start,
        aic: current_fit.extract_aic(),
        formula: current.formula(),
    }];

    loop {
        let mut best: Option<(StepAction, ModelSpec, OlsFit)> = None;
        let candidates = current
            .terms
            .iter()
            .map(|t| (StepAction::Drop(t.clone()), current.without(t)))
            .chain(
                scope
                    .terms
                    .iter()
                    .filter(|t| !current.contains(t))
                    .map(|t| (StepAction::Add(t.clone()), current.clone().term(t.clone()))),
            );

        for (action, spec) in candidates {
            let candidate = fit(&spec)?;
            debug!("  {:<28} AIC {:.3}", action.to_string(), candidate.extract_aic());
            let improves = best
                .as_ref()
                .is_none_or(|(_, _, b)| candidate.extract_aic() < b.extract_aic());
            if improves {
                best = Some((action, spec, candidate));
            }
        }

        match best {
            Some((action, spec, candidate))
                if candidate.extract_aic() < current_fit.extract_aic() =>
            {
                info!("step {}: AIC {:.3}", action, candidate.extract_aic());
                steps.push(Step {
                    action,
                    aic: candidate.extract_aic(),
                    formula: spec.formula(),
                });
                current = spec;
                current_fit = candidate;
            }
            _ => break,
        }
    }

    Ok(StepwiseResult {
        steps,
        spec: current,
        fit: current_fit,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnovaComparison {
    pub df_reduced: usize,
    pub df_full: usize,
    pub rss_reduced: f64,
    pub rss_full: f64,
    pub f_statistic: f64,
    pub p_value: f64,
}

/// F test of a reduced model nested in a fuller one, both fitted on the
/// same observations.
pub fn anova(reduced: &OlsFit, full: &OlsFit) -> Result<AnovaComparison, String> {
    if reduced.rows != full.rows {
        return Err("Nested models must be fitted on the same rows".to_string());
    }
    if full.df_residual >= reduced.df_residual {
        return Err("The full model must have more coefficients than the reduced one".to_string());
    }

    let df_diff = (reduced.df_residual - full.df_residual) as f64;
    let f_statistic =
        ((reduced.rss - full.rss) / df_diff) / (full.rss / full.df_residual as f64);
    let dist = FisherSnedecor::new(df_diff, full.df_residual as f64).map_err(|e| e.to_string())?;

    Ok(AnovaComparison {
        df_reduced: reduced.df_residual,
        df_full: full.df_residual,
        rss_reduced: reduced.rss,
        rss_full: full.rss,
        f_statistic,
        p_value: dist.sf(f_statistic.max(0.0)),
    })
}
