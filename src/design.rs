//! Model formulas and their expansion into numeric design data.
//!
//! A [`ModelSpec`] is a response plus a list of [`Term`]s, written the way
//! an R formula would be (`log_mpg ~ weight + model_year + origin`). Origin
//! is treatment-coded against `American`.

use crate::dataset::{AutoTable, Dataset, Origin};
use crate::{Matrix, Vector};
use log::warn;
use std::fmt;
use std::ops::Range;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    Numeric(String),
    Origin,
    /// Origin dummies multiplied by a numeric variable.
    OriginInteraction(String),
}

impl Term {
    pub fn numeric(name: &str) -> Self {
        Term::Numeric(name.to_string())
    }

    pub fn label(&self) -> String {
        match self {
            Term::Numeric(name) => name.clone(),
            Term::Origin => "origin".to_string(),
            Term::OriginInteraction(name) => format!("origin:{}", name),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        match self {
            Term::Numeric(name) => vec![name.clone()],
            Term::Origin => non_reference_levels()
                .map(|level| format!("origin{}", level.label()))
                .collect(),
            Term::OriginInteraction(name) => non_reference_levels()
                .map(|level| format!("origin{}:{}", level.label(), name))
                .collect(),
        }
    }

    pub fn n_columns(&self) -> usize {
        match self {
            Term::Numeric(_) => 1,
            Term::Origin | Term::OriginInteraction(_) => Origin::ALL.len() - 1,
        }
    }

    fn variable(&self) -> String {
        match self {
            Term::Numeric(name) | Term::OriginInteraction(name) => name.clone(),
            Term::Origin => "origin".to_string(),
        }
    }

    fn fill(&self, table: &AutoTable, row: usize, out: &mut [f64]) {
        let value = |name: &str| table.value(name, row).unwrap_or(f64::NAN);
        match self {
            Term::Numeric(name) => out[0] = value(name),
            Term::Origin => {
                let origin = table.origin(row);
                for (slot, level) in out.iter_mut().zip(non_reference_levels()) {
                    *slot = if origin == level { 1.0 } else { 0.0 };
                }
            }
            Term::OriginInteraction(name) => {
                let origin = table.origin(row);
                let x = value(name);
                for (slot, level) in out.iter_mut().zip(non_reference_levels()) {
                    *slot = if origin == level { x } else { 0.0 };
                }
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn non_reference_levels() -> impl Iterator<Item = Origin> {
    Origin::ALL.into_iter().skip(1)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    pub response: String,
    pub terms: Vec<Term>,
}

impl ModelSpec {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            terms: Vec::new(),
        }
    }

    /// `response ~ cylinders + displacement + horsepower + weight +
    /// acceleration + model_year + origin`.
    pub fn all_predictors(response: &str) -> Self {
        crate::dataset::Column::PREDICTORS
            .iter()
            .fold(Self::new(response), |spec, column| {
                spec.term(Term::numeric(column.name()))
            })
            .term(Term::Origin)
    }

    pub fn term(mut self, term: Term) -> Self {
        if !self.terms.contains(&term) {
            self.terms.push(term);
        }
        self
    }

    pub fn with_response(&self, response: &str) -> Self {
        Self {
            response: response.to_string(),
            terms: self.terms.clone(),
        }
    }

    pub fn without(&self, term: &Term) -> Self {
        Self {
            response: self.response.clone(),
            terms: self.terms.iter().filter(|t| *t != term).cloned().collect(),
        }
    }

    pub fn contains(&self, term: &Term) -> bool {
        self.terms.contains(term)
    }

    pub fn n_columns(&self) -> usize {
        self.terms.iter().map(Term::n_columns).sum()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.terms.iter().flat_map(Term::column_names).collect()
    }

    /// Feature-column range of each term, in term order.
    pub fn term_ranges(&self) -> Vec<(Term, Range<usize>)> {
        let mut start = 0;
        self.terms
            .iter()
            .map(|term| {
                let range = start..start + term.n_columns();
                start = range.end;
                (term.clone(), range)
            })
            .collect()
    }

    /// Every table variable the formula reads, response first.
    pub fn variables(&self) -> Vec<String> {
        let mut vars = vec![self.response.clone()];
        for term in &self.terms {
            let var = term.variable();
            if !vars.contains(&var) {
                vars.push(var);
            }
        }
        vars
    }

    pub fn formula(&self) -> String {
        if self.terms.is_empty() {
            return format!("{} ~ 1", self.response);
        }
        let rhs: Vec<String> = self.terms.iter().map(Term::label).collect();
        format!("{} ~ {}", self.response, rhs.join(" + "))
    }

    /// Builds the design over every row complete for this formula.
    pub fn build(&self, table: &AutoTable) -> Result<Dataset, String> {
        let rows = table.complete_rows(&self.variables())?;
        let dropped = table.n_rows() - rows.len();
        if dropped > 0 {
            warn!("{}: {} incomplete rows excluded", self.formula(), dropped);
        }
        self.build_on_rows(table, &rows)
    }

    /// Builds the design over the given rows, which must be complete for
    /// this formula.
    pub fn build_on_rows(&self, table: &AutoTable, rows: &[usize]) -> Result<Dataset, String> {
        for var in self.variables() {
            if !table.has_variable(&var) {
                return Err(format!("Unknown variable '{}'", var));
            }
        }
        if rows.is_empty() {
            return Err(format!("{}: no complete rows", self.formula()));
        }

        let p = self.n_columns();
        let mut features = Matrix::zeros((rows.len(), p));
        let mut labels = Vector::zeros(rows.len());
        let ranges = self.term_ranges();

        for (i, &row) in rows.iter().enumerate() {
            labels[i] = table
                .value(&self.response, row)
                .ok_or_else(|| format!("Row {} has no {}", row, self.response))?;

            let mut buffer = vec![0.0; p];
            for (term, range) in &ranges {
                term.fill(table, row, &mut buffer[range.clone()]);
            }
            if buffer.iter().any(|v| !v.is_finite()) {
                return Err(format!("Row {} has missing predictor values", row));
            }
            features.row_mut(i).assign(&Vector::from(buffer));
        }

        Dataset::with_names(features, labels, self.column_names(), rows.to_vec())
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formula())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Car;

    fn table() -> AutoTable {
        let cars = vec![
            (18.0, Some(130.0), 3504.0, Origin::American),
            (26.0, Some(46.0), 1835.0, Origin::European),
            (24.0, Some(95.0), 2372.0, Origin::Japanese),
            (25.0, None, 2046.0, Origin::American),
        ];
        AutoTable::new(
            cars.into_iter()
                .map(|(mpg, horsepower, weight, origin)| Car {
                    mpg,
                    cylinders: 4,
                    displacement: 100.0,
                    horsepower,
                    weight,
                    acceleration: 15.0,
                    model_year: 70,
                    origin,
                })
                .collect(),
        )
    }

    #[test]
    fn test_full_formula() {
        let spec = ModelSpec::all_predictors("mpg");
        assert_eq!(
            spec.formula(),
            "mpg ~ cylinders + displacement + horsepower + weight + acceleration + model_year + origin"
        );
        assert_eq!(spec.n_columns(), 8);
        assert_eq!(spec.variables().len(), 8);
    }

    #[test]
    fn test_origin_dummy_coding() {
        let spec = ModelSpec::new("mpg").term(Term::numeric("weight")).term(Term::Origin);
        let data = spec.build(&table()).unwrap();

        assert_eq!(
            data.feature_names,
            vec!["weight", "originEuropean", "originJapanese"]
        );
        assert_eq!(data.n_samples(), 4);
        assert_eq!(data.features.row(0).to_vec(), vec![3504.0, 0.0, 0.0]);
        assert_eq!(data.features.row(1).to_vec(), vec![1835.0, 1.0, 0.0]);
        assert_eq!(data.features.row(2).to_vec(), vec![2372.0, 0.0, 1.0]);
    }

    #[test]
    fn test_interaction_columns() {
        let spec = ModelSpec::new("mpg")
            .term(Term::numeric("weight"))
            .term(Term::Origin)
            .term(Term::OriginInteraction("weight".into()));
        let data = spec.build(&table()).unwrap();

        assert_eq!(data.feature_index("originEuropean:weight"), Some(3));
        assert_eq!(data.features[(1, 3)], 1835.0);
        assert_eq!(data.features[(1, 4)], 0.0);
        assert_eq!(data.features[(2, 4)], 2372.0);
        assert_eq!(spec.term_ranges()[2].1, 3..5);
    }

    #[test]
    fn test_incomplete_rows_are_excluded() {
        let spec = ModelSpec::new("mpg").term(Term::numeric("horsepower"));
        let data = spec.build(&table()).unwrap();
        assert_eq!(data.rows, vec![0, 1, 2]);
    }

    #[test]
    fn test_unknown_variable() {
        let spec = ModelSpec::new("mpg").term(Term::numeric("torque"));
        assert!(spec.build(&table()).is_err());
    }

    #[test]
    fn test_without_and_duplicate_terms() {
        let spec = ModelSpec::new("mpg")
            .term(Term::numeric("weight"))
            .term(Term::numeric("weight"))
            .term(Term::Origin);
        assert_eq!(spec.terms.len(), 2);

        let reduced = spec.without(&Term::Origin);
        assert_eq!(reduced.formula(), "mpg ~ weight");
        assert_eq!(reduced.without(&Term::numeric("weight")).formula(), "mpg ~ 1");
    }
}
