//! Exploratory statistics over the observation table.

use crate::dataset::{AutoTable, Column, Origin};
use crate::metrics::pearson_correlation;
use crate::{Matrix, Vector};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub missing: usize,
    pub mean: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl ColumnSummary {
    /// Summarizes the present values of one column. Returns `None` when
    /// every value is missing.
    pub fn from_values(name: &str, values: &[Option<f64>]) -> Option<Self> {
        let mut present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return None;
        }
        present.sort_by(f64::total_cmp);

        let count = present.len();
        Some(Self {
            name: name.to_string(),
            count,
            missing: values.len() - count,
            mean: present.iter().sum::<f64>() / count as f64,
            min: present[0],
            q1: quantile(&present, 0.25),
            median: quantile(&present, 0.5),
            q3: quantile(&present, 0.75),
            max: present[count - 1],
        })
    }
}

/// Linear-interpolation quantile of sorted data (Hyndman-Fan type 7).
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Per-column summaries of the numeric columns, origin excluded.
pub fn describe(table: &AutoTable) -> Vec<ColumnSummary> {
    Column::ALL
        .into_iter()
        .filter(|&c| c != Column::Origin)
        .filter_map(|c| ColumnSummary::from_values(c.name(), &table.column(c)))
        .collect()
}

pub fn origin_counts(table: &AutoTable) -> Vec<(Origin, usize)> {
    Origin::ALL
        .into_iter()
        .map(|origin| {
            let count = table.cars().iter().filter(|c| c.origin == origin).count();
            (origin, count)
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Matrix,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[(i, j)])
    }
}

/// Pearson correlations over pairwise-complete rows. Origin enters by its
/// numeric code.
pub fn correlation_matrix(
    table: &AutoTable,
    columns: &[Column],
) -> Result<CorrelationMatrix, String> {
    let data: Vec<Vec<Option<f64>>> = columns.iter().map(|&c| table.column(c)).collect();
    let k = columns.len();
    let mut values = Matrix::eye(k);

    for i in 0..k {
        for j in (i + 1)..k {
            let (a, b): (Vec<f64>, Vec<f64>) = data[i]
                .iter()
                .zip(data[j].iter())
                .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
                .unzip();
            let r = pearson_correlation(&Vector::from(a), &Vector::from(b))?;
            values[(i, j)] = r;
            values[(j, i)] = r;
        }
    }

    Ok(CorrelationMatrix {
        names: columns.iter().map(|c| c.name().to_string()).collect(),
        values,
    })
}

/// Everything the exploratory stage reports.
#[derive(Clone, Debug)]
pub struct TableSummary {
    pub n_rows: usize,
    pub columns: Vec<ColumnSummary>,
    pub origins: Vec<(Origin, usize)>,
    pub correlations: CorrelationMatrix,
}

impl TableSummary {
    pub fn compute(table: &AutoTable) -> Result<Self, String> {
        if table.is_empty() {
            return Err("Cannot summarize an empty table".to_string());
        }
        Ok(Self {
            n_rows: table.n_rows(),
            columns: describe(table),
            origins: origin_counts(table),
            correlations: correlation_matrix(table, &Column::ALL)?,
        })
    }
}

impl fmt::Display for TableSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} observations", self.n_rows)?;
        writeln!(
            f,
            "{:<14} {:>5} {:>4} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "column", "n", "NA", "mean", "min", "Q1", "median", "Q3", "max"
        )?;
        for c in &self.columns {
            writeln!(
                f,
                "{:<14} {:>5} {:>4} {:>10.3} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
                c.name, c.count, c.missing, c.mean, c.min, c.q1, c.median, c.q3, c.max
            )?;
        }

        let origins: Vec<String> = self
            .origins
            .iter()
            .map(|(origin, n)| format!("{} {}", origin, n))
            .collect();
        writeln!(f, "origin: {}", origins.join(", "))?;

        write!(f, "\n{:<14}", "")?;
        for name in &self.correlations.names {
            write!(f, " {:>7}", abbreviate(name))?;
        }
        for (i, name) in self.correlations.names.iter().enumerate() {
            write!(f, "\n{:<14}", name)?;
            for j in 0..self.correlations.names.len() {
                write!(f, " {:>7.3}", self.correlations.values[(i, j)])?;
            }
        }
        Ok(())
    }
}

fn abbreviate(name: &str) -> &str {
    &name[..name.len().min(7)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Car;
    use crate::synthetic;

    fn car(mpg: f64, horsepower: Option<f64>, weight: f64, origin: Origin) -> Car {
        Car {
            mpg,
            cylinders: 4,
            displacement: 100.0,
            horsepower,
            weight,
            acceleration: 15.0,
            model_year: 75,
            origin,
        }
    }

    #[test]
    fn test_quantile_type_7() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 0.5), 2.5);
        assert!((quantile(&sorted, 0.25) - 1.75).abs() < 1e-12);
        assert_eq!(quantile(&sorted, 1.0), 4.0);
    }

    #[test]
    fn test_column_summary_counts_missing() {
        let values = [Some(3.0), None, Some(1.0), Some(2.0)];
        let summary = ColumnSummary::from_values("x", &values).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.mean, 2.0);
        assert_eq!(summary.median, 2.0);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 3.0);

        assert!(ColumnSummary::from_values("x", &[None, None]).is_none());
    }

    #[test]
    fn test_origin_counts() {
        let table = AutoTable::new(vec![
            car(20.0, Some(90.0), 2500.0, Origin::American),
            car(30.0, Some(70.0), 2000.0, Origin::Japanese),
            car(25.0, None, 2200.0, Origin::American),
        ]);
        assert_eq!(
            origin_counts(&table),
            vec![
                (Origin::American, 2),
                (Origin::European, 0),
                (Origin::Japanese, 1)
            ]
        );
    }

    #[test]
    fn test_correlation_uses_pairwise_complete_rows() {
        let table = AutoTable::new(vec![
            car(30.0, Some(60.0), 2000.0, Origin::Japanese),
            car(25.0, Some(80.0), 2500.0, Origin::European),
            car(20.0, None, 3000.0, Origin::American),
            car(15.0, Some(120.0), 3500.0, Origin::American),
        ]);
        let corr = correlation_matrix(
            &table,
            &[Column::Mpg, Column::Horsepower, Column::Weight],
        )
        .unwrap();

        assert!((corr.get("mpg", "weight").unwrap() + 1.0).abs() < 1e-12);
        assert!(corr.get("mpg", "horsepower").unwrap() < -0.9);
        assert_eq!(corr.get("weight", "weight"), Some(1.0));
        assert_eq!(corr.get("mpg", "weight"), corr.get("weight", "mpg"));
    }

    #[test]
    fn test_summary_of_synthetic_table() {
        let table = synthetic::generate(200, 4);
        let summary = TableSummary::compute(&table).unwrap();

        assert_eq!(summary.columns.len(), 7);
        assert_eq!(summary.origins.iter().map(|(_, n)| n).sum::<usize>(), 200);
        assert_eq!(summary.correlations.names.len(), 8);
        assert!(summary.correlations.get("mpg", "weight").unwrap() < -0.5);

        let rendered = summary.to_string();
        assert!(rendered.contains("horsepower"));
        assert!(rendered.contains("American"));
    }

    #[test]
    fn test_empty_table_is_rejected() {
        assert!(TableSummary::compute(&AutoTable::default()).is_err());
    }
}
