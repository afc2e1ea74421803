//! Fuel-efficiency regression report for the Auto MPG dataset.

use clap::Parser;
use mpg_regression::loader::AUTO_MPG_URL;
use mpg_regression::{Analysis, ReportConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mpg-report")]
#[command(about = "Regression analysis of the Auto MPG dataset", long_about = None)]
struct Cli {
    /// Dataset URL
    #[arg(long, default_value = AUTO_MPG_URL, conflicts_with_all = ["file", "synthetic"])]
    url: String,

    /// Read a local copy instead of fetching
    #[arg(long, conflicts_with = "synthetic")]
    file: Option<PathBuf>,

    /// Generate a seeded synthetic table with this many cars
    #[arg(long, conflicts_with = "file")]
    synthetic: Option<usize>,

    /// Seed for cross-validation folds and synthetic data
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Number of cross-validation folds
    #[arg(long, default_value_t = 10)]
    folds: usize,

    /// VIF above which a predictor is removed
    #[arg(long, default_value_t = 5.0)]
    vif_threshold: f64,

    /// Observations listed in each ranking
    #[arg(long, default_value_t = 5)]
    top: usize,
}

impl Cli {
    fn config(&self) -> Result<ReportConfig, String> {
        if self.folds < 2 {
            return Err(format!("--folds must be at least 2, got {}", self.folds));
        }
        if !(self.vif_threshold > 1.0) {
            return Err(format!("--vif-threshold must exceed 1, got {}", self.vif_threshold));
        }

        let config = ReportConfig::new()
            .seed(self.seed)
            .folds(self.folds)
            .vif_threshold(self.vif_threshold)
            .top_k(self.top);

        let config = match (&self.file, self.synthetic) {
            (Some(path), _) => config.file(path.clone()),
            (None, Some(rows)) => config.synthetic(rows),
            (None, None) => config.url(&self.url),
        };
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = cli.config()?;
    let mut table = config.source.load()?;
    let report = Analysis::new(config).run(&mut table)?;
    println!("{}", report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpg_regression::DataSource;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("mpg-report").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_fetch_the_uci_file() {
        let config = parse(&[]).unwrap().config().unwrap();
        assert_eq!(config.source, DataSource::Url(AUTO_MPG_URL.to_string()));
        assert_eq!(config.folds, 10);
    }

    #[test]
    fn test_sources_are_mutually_exclusive() {
        assert!(parse(&["--url", "http://example.org/a", "--file", "auto.data"]).is_err());
        assert!(parse(&["--url", "http://example.org/a", "--synthetic", "100"]).is_err());
        assert!(parse(&["--file", "auto.data", "--synthetic", "100"]).is_err());
    }

    #[test]
    fn test_each_source_maps_onto_the_config() {
        let file = parse(&["--file", "auto.data"]).unwrap().config().unwrap();
        assert_eq!(file.source, DataSource::File("auto.data".into()));

        let synthetic = parse(&["--synthetic", "120", "--seed", "4"])
            .unwrap()
            .config()
            .unwrap();
        assert_eq!(synthetic.source, DataSource::Synthetic { rows: 120, seed: 4 });

        let url = parse(&["--url", "http://example.org/a"]).unwrap().config().unwrap();
        assert_eq!(url.source, DataSource::Url("http://example.org/a".to_string()));
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(parse(&["--folds", "1"]).unwrap().config().is_err());
        assert!(parse(&["--vif-threshold", "0.5"]).unwrap().config().is_err());
    }
}
