//! The end-to-end analysis: every stage in order, each decision recorded.

use crate::config::ReportConfig;
use crate::dataset::{AutoTable, Column, Dataset};
use crate::design::{ModelSpec, Term};
use crate::diagnostics::{self, ResidualDiagnostics, TermVif};
use crate::error::AnalysisResult;
use crate::linear_model::{
    LassoCv, LassoCvResult, LinearRegression, OlsFit, PowerVarianceFit, significance_stars,
};
use crate::selection::{self, AnovaComparison, StepwiseResult, VifElimination};
use crate::summary::TableSummary;
use crate::transform::{BoxCoxProfile, ResponseTransform};
use log::info;
use std::fmt;

/// Name of the column holding the adopted reduced model's fitted values, on
/// the original response scale.
pub const FITTED_STEPWISE: &str = "fitted_stepwise";

const RESPONSE: &str = "mpg";

/// A choice made between alternatives, and why.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub stage: &'static str,
    pub choice: String,
    pub rationale: String,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.choice, self.rationale)
    }
}

/// A fitted model together with its residual and collinearity diagnostics.
#[derive(Clone, Debug)]
pub struct ModelStage {
    pub fit: OlsFit,
    pub diagnostics: ResidualDiagnostics,
    pub vifs: Vec<TermVif>,
    /// Plain VIF of every design column, origin dummies included.
    pub column_vifs: Vec<(String, f64)>,
}

impl ModelStage {
    fn compute(
        table: &AutoTable,
        spec: &ModelSpec,
        top_k: usize,
    ) -> Result<(Self, Dataset), String> {
        let data = spec.build(table)?;
        let mut fit = LinearRegression::new().fit(&data)?;
        fit.spec = Some(spec.clone());
        let stage = Self {
            diagnostics: ResidualDiagnostics::compute(&fit, &data, top_k)?,
            vifs: diagnostics::term_vifs(&data, spec)?,
            column_vifs: diagnostics::column_vifs(&data)?,
            fit,
        };
        Ok((stage, data))
    }
}

impl fmt::Display for ModelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.fit)?;
        writeln!(f, "{}", self.diagnostics)?;
        writeln!(f, "{}", diagnostics::render_vifs(&self.vifs))?;
        let columns: Vec<String> = self
            .column_vifs
            .iter()
            .map(|(name, vif)| format!("{} {:.2}", name, vif))
            .collect();
        write!(f, "column VIFs: {}", columns.join(", "))
    }
}

/// Where the adopted reduced model came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    VifElimination,
    Stepwise,
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::VifElimination => f.write_str("VIF elimination"),
            Reduction::Stepwise => f.write_str("stepwise"),
        }
    }
}

/// The collinearity-reduced model carried forward, with the VIFs that
/// verify it.
#[derive(Clone, Debug)]
pub struct ReducedModel {
    pub source: Reduction,
    pub fit: OlsFit,
    pub vifs: Vec<TermVif>,
}

#[derive(Clone, Debug)]
pub struct Report {
    pub summary: TableSummary,
    pub full: ModelStage,
    pub box_cox: BoxCoxProfile,
    pub transform: ResponseTransform,
    pub transformed: ModelStage,
    pub vif_elimination: VifElimination,
    /// The VIF-reduced model, fitted on the rows the stepwise search used.
    pub manual: OlsFit,
    pub stepwise: StepwiseResult,
    pub stepwise_vifs: Vec<TermVif>,
    /// VIF pruning of the stepwise model; nothing is dropped when the
    /// stepwise model already passes.
    pub stepwise_pruning: VifElimination,
    pub reduced: ReducedModel,
    pub lasso: LassoCvResult,
    pub interaction: OlsFit,
    pub interaction_test: AnovaComparison,
    pub variance: PowerVarianceFit,
    pub variance_diagnostics: ResidualDiagnostics,
    pub decisions: Vec<Decision>,
}

impl Report {
    pub fn decision(&self, stage: &str) -> Option<&Decision> {
        self.decisions.iter().find(|d| d.stage == stage)
    }
}

pub struct Analysis {
    config: ReportConfig,
}

impl Analysis {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Runs every stage against `table`, appending the transformed response
    /// and the stepwise fitted values as derived columns.
    pub fn run(&self, table: &mut AutoTable) -> AnalysisResult<Report> {
        let config = &self.config;
        let mut decisions = Vec::new();

        info!("summarizing {} cars", table.n_rows());
        let summary = TableSummary::compute(table)?;

        info!("fitting the full model");
        let full_spec = ModelSpec::all_predictors(RESPONSE);
        let (full, full_data) = ModelStage::compute(table, &full_spec, config.top_k)?;

        info!("profiling the Box-Cox likelihood");
        let box_cox = config.box_cox.profile(&full_data)?;
        let transform = box_cox.transform();
        decisions.push(transform_decision(&box_cox, transform));

        let response = transform.column_name(RESPONSE);
        if transform != ResponseTransform::Identity {
            let values = table
                .column(Column::Mpg)
                .into_iter()
                .map(|v| v.and_then(|y| transform.apply(y)))
                .collect();
            table.append_derived(&response, values)?;
        }

        info!("refitting on {}", response);
        let scope = full_spec.with_response(&response);
        let (transformed, transformed_data) = ModelStage::compute(table, &scope, config.top_k)?;

        info!("reducing collinearity");
        let vif_elimination = selection::eliminate_by_vif(table, &scope, config.vif_threshold)?;
        let stepwise = selection::stepwise_aic(table, &scope)?;

        let rows = &stepwise.fit.rows;
        let fit_on_rows = |spec: &ModelSpec| -> Result<OlsFit, String> {
            let mut fit = LinearRegression::new().fit(&spec.build_on_rows(table, rows)?)?;
            fit.spec = Some(spec.clone());
            Ok(fit)
        };
        let manual = fit_on_rows(&vif_elimination.spec)?;

        let stepwise_data = stepwise.spec.build_on_rows(table, rows)?;
        let stepwise_vifs = diagnostics::term_vifs(&stepwise_data, &stepwise.spec)?;
        let stepwise_pruning = selection::eliminate_by_vif_on_rows(
            table,
            &stepwise.spec,
            rows,
            config.vif_threshold,
        )?;
        let pruned = if stepwise_pruning.dropped.is_empty() {
            stepwise.fit.clone()
        } else {
            info!(
                "stepwise model fails the VIF check; pruned to {}",
                stepwise_pruning.spec.formula()
            );
            fit_on_rows(&stepwise_pruning.spec)?
        };

        let (decision, reduced) =
            choose_reduction(&manual, &vif_elimination, pruned, &stepwise_pruning);
        decisions.push(decision);

        let mut fitted = vec![None; table.n_rows()];
        for (&row, &value) in reduced.fit.rows.iter().zip(reduced.fit.fitted.iter()) {
            fitted[row] = Some(transform.invert(value));
        }
        table.append_derived(FITTED_STEPWISE, fitted)?;

        info!("cross-validating the LASSO path with {} folds", config.folds);
        let lasso = LassoCv::new()
            .n_folds(config.folds)
            .seed(config.seed)
            .fit(&transformed_data)?;
        decisions.push(lasso_decision(&lasso));

        info!("fitting origin interactions");
        let (interaction, main_effects) = self.interaction_models(table, &scope)?;
        let interaction_test = selection::anova(&main_effects, &interaction)?;
        decisions.push(interaction_decision(&interaction, &interaction_test));

        info!("fitting power-of-the-mean variance by IRLS");
        let mut variance = config.variance.fit(&full_data)?;
        variance.fit.spec = Some(full_spec.clone());
        let variance_diagnostics =
            ResidualDiagnostics::compute(&variance.fit, &full_data, config.top_k)?;
        decisions.push(variance_decision(&variance, &full.fit));

        for decision in &decisions {
            info!("{}", decision);
        }

        Ok(Report {
            summary,
            full,
            box_cox,
            transform,
            transformed,
            vif_elimination,
            manual,
            stepwise,
            stepwise_vifs,
            stepwise_pruning,
            reduced,
            lasso,
            interaction,
            interaction_test,
            variance,
            variance_diagnostics,
            decisions,
        })
    }

    /// The interaction model and the main-effects model it extends, fitted
    /// on the same rows.
    fn interaction_models(
        &self,
        table: &AutoTable,
        main: &ModelSpec,
    ) -> Result<(OlsFit, OlsFit), String> {
        let spec = self
            .config
            .interaction_predictors
            .iter()
            .fold(main.clone(), |spec, name| {
                spec.term(Term::OriginInteraction(name.clone()))
            });
        let rows = table.complete_rows(&spec.variables())?;

        let fit = |spec: &ModelSpec| -> Result<OlsFit, String> {
            let mut fit = LinearRegression::new().fit(&spec.build_on_rows(table, &rows)?)?;
            fit.spec = Some(spec.clone());
            Ok(fit)
        };
        Ok((fit(&spec)?, fit(main)?))
    }
}

fn transform_decision(profile: &BoxCoxProfile, transform: ResponseTransform) -> Decision {
    let interval = format!(
        "lambda-hat = {:.2}, interval [{:.2}, {:.2}]",
        profile.best_lambda, profile.interval.0, profile.interval.1
    );
    let rationale = match transform {
        ResponseTransform::Log => format!("{}; 0 lies inside, so take logs", interval),
        ResponseTransform::Identity => format!("{}; 1 lies inside, so keep mpg", interval),
        ResponseTransform::Power(_) => {
            format!("{}; no round power lies inside, using lambda-hat", interval)
        }
    };
    Decision {
        stage: "transform",
        choice: transform.to_string(),
        rationale,
    }
}

/// Adopts the lower-AIC model among the two that pass the VIF check: the
/// VIF-eliminated full model and the (pruned) stepwise model.
fn choose_reduction(
    manual: &OlsFit,
    elimination: &VifElimination,
    stepwise: OlsFit,
    pruning: &VifElimination,
) -> (Decision, ReducedModel) {
    let (manual_aic, stepwise_aic) = (manual.extract_aic(), stepwise.extract_aic());

    let verification = if pruning.dropped.is_empty() {
        format!("stepwise model passes VIF < {}", pruning.threshold)
    } else {
        let drops: Vec<String> = pruning
            .dropped
            .iter()
            .map(|d| format!("{} ({:.2})", d.term, d.vif))
            .collect();
        format!(
            "stepwise model pruned of {} to reach VIF < {}",
            drops.join(", "),
            pruning.threshold
        )
    };
    let rationale = format!(
        "{}; AIC {:.2} for {} against {:.2} for {} on the same {} rows",
        verification,
        stepwise_aic,
        stepwise.formula(),
        manual_aic,
        manual.formula(),
        manual.n_samples()
    );

    let reduced = if stepwise_aic <= manual_aic {
        ReducedModel {
            source: Reduction::Stepwise,
            fit: stepwise,
            vifs: pruning.vifs.clone(),
        }
    } else {
        ReducedModel {
            source: Reduction::VifElimination,
            fit: manual.clone(),
            vifs: elimination.vifs.clone(),
        }
    };
    let decision = Decision {
        stage: "reduction",
        choice: reduced.source.to_string(),
        rationale,
    };
    (decision, reduced)
}

fn lasso_decision(lasso: &LassoCvResult) -> Decision {
    Decision {
        stage: "lasso",
        choice: format!("alpha = {:.5}", lasso.alpha_min()),
        rationale: format!(
            "minimum CV error {:.5}; the 1-SE alpha {:.5} would keep {} of {} features",
            lasso.cv_mean[lasso.best_index],
            lasso.alpha_1se(),
            lasso.path.n_nonzero(lasso.one_se_index),
            lasso.feature_names().len()
        ),
    }
}

fn interaction_decision(interaction: &OlsFit, test: &AnovaComparison) -> Decision {
    let significant: Vec<&str> = interaction
        .coefficients
        .iter()
        .filter(|c| c.name.contains(':') && c.is_significant(0.05))
        .map(|c| c.name.as_str())
        .collect();
    let choice = if test.p_value < 0.05 {
        "keep interactions"
    } else {
        "main effects suffice"
    };
    Decision {
        stage: "interaction",
        choice: choice.to_string(),
        rationale: format!(
            "F = {:.3}, p = {:.3e}; significant slopes: {}",
            test.f_statistic,
            test.p_value,
            if significant.is_empty() {
                "none".to_string()
            } else {
                significant.join(", ")
            }
        ),
    }
}

fn variance_decision(variance: &PowerVarianceFit, ols: &OlsFit) -> Decision {
    Decision {
        stage: "variance",
        choice: format!("power = {:.1}", variance.power),
        rationale: format!(
            "AIC {:.2} against {:.2} for constant variance",
            variance.aic(),
            ols.aic
        ),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Data ==\n{}\n", self.summary)?;
        writeln!(f, "== Full model ==\n{}\n", self.full)?;

        writeln!(
            f,
            "== Box-Cox ==\nlambda-hat {:.2}, 95% interval [{:.2}, {:.2}], suggested {}\n",
            self.box_cox.best_lambda,
            self.box_cox.interval.0,
            self.box_cox.interval.1,
            self.box_cox.suggested_lambda
        )?;
        writeln!(f, "== Transformed model ==\n{}\n", self.transformed)?;

        writeln!(f, "== VIF elimination ==")?;
        for drop in &self.vif_elimination.dropped {
            writeln!(f, "dropped {} (VIF {:.2})", drop.term, drop.vif)?;
        }
        writeln!(f, "{}", diagnostics::render_vifs(&self.vif_elimination.vifs))?;
        writeln!(f, "{}\n", self.manual)?;

        writeln!(f, "== Stepwise AIC ==")?;
        for step in &self.stepwise.steps {
            writeln!(
                f,
                "{:<20} AIC {:>10.3}  {}",
                step.action.to_string(),
                step.aic,
                step.formula
            )?;
        }
        writeln!(f, "{}", self.stepwise.fit)?;
        writeln!(f, "{}", diagnostics::render_vifs(&self.stepwise_vifs))?;
        for drop in &self.stepwise_pruning.dropped {
            writeln!(f, "pruned {} (VIF {:.2})", drop.term, drop.vif)?;
        }

        writeln!(f, "\n== Reduced model ({}) ==", self.reduced.source)?;
        writeln!(f, "{}", self.reduced.fit)?;
        writeln!(f, "{}", diagnostics::render_vifs(&self.reduced.vifs))?;

        writeln!(f, "== LASSO ==")?;
        writeln!(
            f,
            "alpha_min {:.5}, alpha_1se {:.5}, R-squared {:.4}",
            self.lasso.alpha_min(),
            self.lasso.alpha_1se(),
            self.lasso.r_squared
        )?;
        writeln!(f, "{:<26} {:>12.5}", "(Intercept)", self.lasso.intercept)?;
        for (name, b) in self.lasso.feature_names().iter().zip(self.lasso.coefficients.iter()) {
            writeln!(f, "{:<26} {:>12.5}", name, b)?;
        }
        writeln!(f, "zeroed: {}\n", self.lasso.zeroed_features().join(", "))?;

        writeln!(f, "== Origin interactions ==\n{}", self.interaction)?;
        writeln!(
            f,
            "vs main effects: F = {:.3} on {} and {} DF, p = {:.3e} {}\n",
            self.interaction_test.f_statistic,
            self.interaction_test.df_reduced - self.interaction_test.df_full,
            self.interaction_test.df_full,
            self.interaction_test.p_value,
            significance_stars(self.interaction_test.p_value)
        )?;

        writeln!(
            f,
            "== Power variance (IRLS) ==\npower {:.1} after {} iterations{}",
            self.variance.power,
            self.variance.iterations,
            if self.variance.converged { "" } else { " (not converged)" }
        )?;
        writeln!(f, "{}", self.variance.fit)?;
        writeln!(f, "{}\n", self.variance_diagnostics)?;

        writeln!(f, "== Decisions ==")?;
        for decision in &self.decisions {
            writeln!(f, "{}", decision)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear_model::PowerVarianceRegression;
    use crate::transform::BoxCox;

    fn run_synthetic(seed: u64) -> (AutoTable, Report) {
        let config = ReportConfig::new()
            .synthetic(398)
            .seed(seed)
            .folds(5)
            .box_cox(BoxCox::new().confidence(0.999));
        let mut table = config.source.load().unwrap();
        let report = Analysis::new(config).run(&mut table).unwrap();
        (table, report)
    }

    #[test]
    fn test_end_to_end_on_synthetic_data() {
        let (table, report) = run_synthetic(7);

        assert_eq!(report.full.fit.n_coefficients(), 9);
        assert_eq!(report.transform, ResponseTransform::Log);
        assert!(
            report.transformed.diagnostics.abs_residual_fitted_correlation.abs()
                < report.full.diagnostics.abs_residual_fitted_correlation.abs()
        );

        for name in ["displacement", "weight", "cylinders"] {
            let vif = report
                .full
                .vifs
                .iter()
                .find(|v| v.term == Term::numeric(name))
                .unwrap();
            assert!(vif.gvif > 5.0, "{} VIF {}", name, vif.gvif);
        }
        assert!(
            report
                .vif_elimination
                .vifs
                .iter()
                .all(|v| v.comparable() < report.vif_elimination.threshold)
        );

        assert!(table.has_variable("log_mpg"));
        assert!(table.has_variable(FITTED_STEPWISE));
        assert_eq!(table.n_rows(), 398);
    }

    #[test]
    fn test_every_stage_records_a_decision() {
        let (_, report) = run_synthetic(11);
        for stage in ["transform", "reduction", "lasso", "interaction", "variance"] {
            assert!(report.decision(stage).is_some(), "missing {}", stage);
        }

        let rendered = report.to_string();
        assert!(rendered.contains("== Stepwise AIC =="));
        assert!(rendered.contains("== Reduced model"));
        assert!(rendered.contains("originEuropean:weight"));
    }

    #[test]
    fn test_stepwise_fitted_values_are_on_mpg_scale() {
        let (table, report) = run_synthetic(3);
        let fitted = table.variable(FITTED_STEPWISE).unwrap();

        let present = fitted.iter().filter(|v| v.is_some()).count();
        assert_eq!(present, report.reduced.fit.n_samples());
        for &row in &report.reduced.fit.rows {
            let mpg = table.value("mpg", row).unwrap();
            let hat = fitted[row].unwrap();
            assert!(hat > 0.0 && (hat / mpg).ln().abs() < 1.0);
        }
    }

    #[test]
    fn test_running_twice_on_one_table_fails() {
        let config = ReportConfig::new().synthetic(120).seed(5).folds(3);
        let mut table = config.source.load().unwrap();
        let analysis = Analysis::new(config);
        analysis.run(&mut table).unwrap();
        assert!(analysis.run(&mut table).is_err());
    }

    #[test]
    fn test_reduction_decision_prefers_lower_aic() {
        let (_, report) = run_synthetic(9);
        let decision = report.decision("reduction").unwrap();

        assert_eq!(decision.choice, report.reduced.source.to_string());
        assert!(report.reduced.fit.extract_aic() <= report.manual.extract_aic());
        assert_eq!(report.reduced.fit.rows, report.manual.rows);
    }

    #[test]
    fn test_adopted_reduced_model_passes_vif_check() {
        for seed in [1, 3, 7, 11, 21] {
            let (table, report) = run_synthetic(seed);
            let threshold = report.vif_elimination.threshold;
            let reduced = &report.reduced;
            let spec = reduced.fit.spec.as_ref().unwrap();

            assert!(
                reduced.vifs.iter().all(|v| v.comparable() < threshold),
                "seed {}: {:?}",
                seed,
                reduced.vifs
            );

            let data = spec.build_on_rows(&table, &reduced.fit.rows).unwrap();
            let recomputed = diagnostics::term_vifs(&data, spec).unwrap();
            assert!(recomputed.iter().all(|v| v.comparable() < threshold));
            assert_eq!(recomputed.len(), spec.terms.len());

            let rationale = &report.decision("reduction").unwrap().rationale;
            assert!(rationale.contains("VIF <"), "{}", rationale);
            if report.stepwise_vifs.iter().any(|v| v.comparable() >= threshold) {
                assert!(!report.stepwise_pruning.dropped.is_empty());
                assert!(rationale.contains("pruned"));
            }
        }
    }

    #[test]
    fn test_custom_interactions_and_variance_grid() {
        let config = ReportConfig::new()
            .synthetic(250)
            .seed(4)
            .folds(3)
            .interaction_predictors(vec!["weight".to_string()])
            .variance(PowerVarianceRegression::new().powers(vec![0.0, 0.5, 1.0]));
        let mut table = config.source.load().unwrap();
        let report = Analysis::new(config).run(&mut table).unwrap();

        assert!(report.interaction.coefficient("originJapanese:weight").is_some());
        assert!(report.interaction.coefficient("originJapanese:horsepower").is_none());
        assert_eq!(report.interaction_test.df_reduced - report.interaction_test.df_full, 2);

        assert_eq!(report.variance.profile.len(), 3);
        assert!([0.0, 0.5, 1.0].contains(&report.variance.power));
    }

    #[test]
    #[ignore = "requires network access"]
    fn test_real_data_properties() {
        let config = ReportConfig::new();
        let mut table = config.source.load().unwrap();
        let report = Analysis::new(config).run(&mut table).unwrap();

        assert!(report.box_cox.best_lambda.abs() < 0.2);
        assert_eq!(report.transform, ResponseTransform::Log);
        assert!(report.lasso.zeroed_features().contains(&"displacement"));
        assert!(report.lasso.r_squared >= report.stepwise.fit.r_squared);
        assert!(
            report.transformed.diagnostics.abs_residual_fitted_correlation.abs()
                < report.full.diagnostics.abs_residual_fitted_correlation.abs()
        );
    }
}
