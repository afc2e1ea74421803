//! Runs the whole analysis on a synthetic table, no network needed.
//!
//! `RUST_LOG=info cargo run --example offline_report`

use mpg_regression::{Analysis, ReportConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ReportConfig::new().synthetic(398).seed(2024).folds(5);
    let mut table = config.source.load()?;
    let report = Analysis::new(config).run(&mut table)?;

    println!("=== Decisions ===");
    for decision in &report.decisions {
        println!("{}", decision);
    }

    println!("\n=== Stepwise model ===");
    println!("{}", report.stepwise.fit);

    println!("\n=== Reduced model ({}) ===", report.reduced.source);
    println!("{}", report.reduced.fit);

    println!(
        "\ncorr(|residual|, fitted): {:.3} on mpg, {:.3} on {}",
        report.full.diagnostics.abs_residual_fitted_correlation,
        report.transformed.diagnostics.abs_residual_fitted_correlation,
        report.transform.column_name("mpg")
    );
    println!(
        "LASSO R²: {:.4} (stepwise {:.4})",
        report.lasso.r_squared, report.stepwise.fit.r_squared
    );

    Ok(())
}
