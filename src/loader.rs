//! Reads the whitespace-delimited Auto MPG file.
//!
//! Each line carries eight numeric fields followed by the quoted car name,
//! with no header. Horsepower uses `?` for missing values.

use crate::dataset::{AutoTable, Car, Origin};
use crate::error::{AnalysisError, AnalysisResult};
use log::{info, warn};
use std::path::Path;

pub const AUTO_MPG_URL: &str =
    "https://archive.ics.uci.edu/ml/machine-learning-databases/auto-mpg/auto-mpg.data";

const NUMERIC_FIELDS: usize = 8;

pub fn fetch(url: &str) -> AnalysisResult<AutoTable> {
    info!("fetching dataset from {}", url);
    let body = reqwest::blocking::get(url)?.error_for_status()?.text()?;
    parse_auto_mpg(&body)
}

pub fn load_file(path: impl AsRef<Path>) -> AnalysisResult<AutoTable> {
    let path = path.as_ref();
    info!("reading dataset from {}", path.display());
    let body = std::fs::read_to_string(path)?;
    parse_auto_mpg(&body)
}

pub fn parse_auto_mpg(text: &str) -> AnalysisResult<AutoTable> {
    let mut cars = Vec::new();
    let mut missing_horsepower = 0;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        // The name may contain spaces, so only a lower bound is checked.
        if fields.len() < NUMERIC_FIELDS + 1 {
            return Err(AnalysisError::Schema {
                line: line_no,
                expected: NUMERIC_FIELDS + 1,
                found: fields.len(),
            });
        }

        let horsepower = fields[3].parse::<f64>().ok();
        if horsepower.is_none() {
            missing_horsepower += 1;
        }

        let origin_code = fields[7];
        let origin = origin_code
            .parse::<u8>()
            .ok()
            .and_then(Origin::from_code)
            .ok_or_else(|| AnalysisError::UnknownOrigin {
                line: line_no,
                code: origin_code.to_string(),
            })?;

        cars.push(Car {
            mpg: number(fields[0], line_no, "mpg")?,
            cylinders: integer(fields[1], line_no, "cylinders")?,
            displacement: number(fields[2], line_no, "displacement")?,
            horsepower,
            weight: number(fields[4], line_no, "weight")?,
            acceleration: number(fields[5], line_no, "acceleration")?,
            model_year: integer(fields[6], line_no, "model_year")?,
            origin,
        });
    }

    if cars.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }

    if missing_horsepower > 0 {
        warn!(
            "{} of {} rows have no horsepower; models using it will skip them",
            missing_horsepower,
            cars.len()
        );
    }
    info!("loaded {} cars", cars.len());

    Ok(AutoTable::new(cars))
}

fn number(token: &str, line: usize, column: &'static str) -> AnalysisResult<f64> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AnalysisError::Parse {
            line,
            column,
            token: token.to_string(),
        })
}

// Integer columns are written as "8." in some copies of the file.
fn integer(token: &str, line: usize, column: &'static str) -> AnalysisResult<u8> {
    let value = number(token, line, column)?;
    if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
        return Err(AnalysisError::Parse {
            line,
            column,
            token: token.to_string(),
        });
    }
    Ok(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    const SAMPLE: &str = "\
18.0   8   307.0      130.0      3504.      12.0   70  1\t\"chevrolet chevelle malibu\"
15.0   8   350.0      165.0      3693.      11.5   70  1\t\"buick skylark 320\"
25.0   4   98.00      ?          2046.      19.0   71  1\t\"ford pinto\"
26.0   4   97.00      46.00      1835.      20.5   70  2\t\"volkswagen 1131 deluxe sedan\"
24.0   4   113.0      95.00      2372.      15.0   70  3\t\"toyota corona mark ii\"
";

    #[test]
    fn test_parse_sample() {
        let table = parse_auto_mpg(SAMPLE).unwrap();
        assert_eq!(table.n_rows(), 5);

        let first = &table.cars()[0];
        assert_eq!(first.mpg, 18.0);
        assert_eq!(first.cylinders, 8);
        assert_eq!(first.weight, 3504.0);
        assert_eq!(first.model_year, 70);
        assert_eq!(first.origin, Origin::American);
        assert_eq!(table.origin(3), Origin::European);
        assert_eq!(table.origin(4), Origin::Japanese);
    }

    #[test]
    fn test_missing_horsepower_is_coerced() {
        let table = parse_auto_mpg(SAMPLE).unwrap();
        let hp = table.column(Column::Horsepower);
        assert_eq!(hp[2], None);
        assert_eq!(hp.iter().filter(|v| v.is_some()).count(), 4);
    }

    #[test]
    fn test_short_line_is_schema_error() {
        let err = parse_auto_mpg("18.0 8 307.0 130.0 3504. 12.0 70\n").unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Schema { line: 1, expected: 9, found: 7 }
        ));
    }

    #[test]
    fn test_bad_numeric_token() {
        let err = parse_auto_mpg("18.0 8 x 130.0 3504. 12.0 70 1 \"car\"\n").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { column: "displacement", .. }));
    }

    #[test]
    fn test_unknown_origin() {
        let err = parse_auto_mpg("18.0 8 307 130.0 3504. 12.0 70 4 \"car\"\n").unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownOrigin { line: 1, .. }));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            parse_auto_mpg("\n\n").unwrap_err(),
            AnalysisError::EmptyDataset
        ));
    }

    #[test]
    #[ignore = "requires network access"]
    fn test_fetch_full_dataset() {
        let table = fetch(AUTO_MPG_URL).unwrap();
        assert_eq!(table.n_rows(), 398);
        assert_eq!(Column::ALL.len(), 8);
        assert!(table.cars().iter().all(|car| (1..=3).contains(&car.origin.code())));
    }
}
