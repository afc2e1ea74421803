use crate::{Matrix, Vector};
use ndarray::Axis;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    American,
    European,
    Japanese,
}

impl Origin {
    pub const ALL: [Origin; 3] = [Origin::American, Origin::European, Origin::Japanese];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Origin::American),
            2 => Some(Origin::European),
            3 => Some(Origin::Japanese),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Origin::American => 1,
            Origin::European => 2,
            Origin::Japanese => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Origin::American => "American",
            Origin::European => "European",
            Origin::Japanese => "Japanese",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The eight retained columns, in source order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    Mpg,
    Cylinders,
    Displacement,
    Horsepower,
    Weight,
    Acceleration,
    ModelYear,
    Origin,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Mpg,
        Column::Cylinders,
        Column::Displacement,
        Column::Horsepower,
        Column::Weight,
        Column::Acceleration,
        Column::ModelYear,
        Column::Origin,
    ];

    /// Continuous and discrete predictors usable as `Term::Numeric`.
    pub const PREDICTORS: [Column; 6] = [
        Column::Cylinders,
        Column::Displacement,
        Column::Horsepower,
        Column::Weight,
        Column::Acceleration,
        Column::ModelYear,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Mpg => "mpg",
            Column::Cylinders => "cylinders",
            Column::Displacement => "displacement",
            Column::Horsepower => "horsepower",
            Column::Weight => "weight",
            Column::Acceleration => "acceleration",
            Column::ModelYear => "model_year",
            Column::Origin => "origin",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// One automobile. The car name is dropped at load time.
#[derive(Clone, Debug, PartialEq)]
pub struct Car {
    pub mpg: f64,
    pub cylinders: u8,
    pub displacement: f64,
    pub horsepower: Option<f64>,
    pub weight: f64,
    pub acceleration: f64,
    pub model_year: u8,
    pub origin: Origin,
}

impl Car {
    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::Mpg => Some(self.mpg),
            Column::Cylinders => Some(self.cylinders as f64),
            Column::Displacement => Some(self.displacement),
            Column::Horsepower => self.horsepower,
            Column::Weight => Some(self.weight),
            Column::Acceleration => Some(self.acceleration),
            Column::ModelYear => Some(self.model_year as f64),
            Column::Origin => Some(self.origin.code() as f64),
        }
    }
}

/// The observation table: loaded once, enriched with derived columns as the
/// analysis proceeds, never shrunk.
#[derive(Clone, Debug, Default)]
pub struct AutoTable {
    cars: Vec<Car>,
    derived: BTreeMap<String, Vec<Option<f64>>>,
}

impl AutoTable {
    pub fn new(cars: Vec<Car>) -> Self {
        Self {
            cars,
            derived: BTreeMap::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn origin(&self, row: usize) -> Origin {
        self.cars[row].origin
    }

    pub fn column(&self, column: Column) -> Vec<Option<f64>> {
        self.cars.iter().map(|car| car.value(column)).collect()
    }

    /// Looks a variable up by name among the base and derived columns.
    pub fn variable(&self, name: &str) -> Option<Vec<Option<f64>>> {
        match Column::from_name(name) {
            Some(column) => Some(self.column(column)),
            None => self.derived.get(name).cloned(),
        }
    }

    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        match Column::from_name(name) {
            Some(column) => self.cars.get(row).and_then(|car| car.value(column)),
            None => self.derived.get(name).and_then(|values| values[row]),
        }
    }

    pub fn has_variable(&self, name: &str) -> bool {
        Column::from_name(name).is_some() || self.derived.contains_key(name)
    }

    pub fn derived_names(&self) -> impl Iterator<Item = &str> {
        self.derived.keys().map(String::as_str)
    }

    pub fn append_derived(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<(), String> {
        if values.len() != self.n_rows() {
            return Err(format!(
                "Derived column '{}' has {} values but the table has {} rows",
                name,
                values.len(),
                self.n_rows()
            ));
        }

        if self.has_variable(name) {
            return Err(format!("Column '{}' already exists", name));
        }

        self.derived.insert(name.to_string(), values);
        Ok(())
    }

    /// Row indices where every named variable is present and finite.
    pub fn complete_rows(&self, names: &[String]) -> Result<Vec<usize>, String> {
        for name in names {
            if !self.has_variable(name) {
                return Err(format!("Unknown variable '{}'", name));
            }
        }

        Ok((0..self.n_rows())
            .filter(|&row| {
                names
                    .iter()
                    .all(|name| self.value(name, row).is_some_and(f64::is_finite))
            })
            .collect())
    }
}

/// Numeric design data for one model: features without an intercept column.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub features: Matrix,
    pub labels: Vector,
    pub feature_names: Vec<String>,
    /// Source row in the `AutoTable` for each sample.
    pub rows: Vec<usize>,
}

impl Dataset {
    pub fn new(features: Matrix, labels: Vector) -> Result<Self, String> {
        let names = (0..features.ncols()).map(|j| format!("x{}", j + 1)).collect();
        let rows = (0..labels.len()).collect();
        Self::with_names(features, labels, names, rows)
    }

    pub fn with_names(
        features: Matrix,
        labels: Vector,
        feature_names: Vec<String>,
        rows: Vec<usize>,
    ) -> Result<Self, String> {
        if features.nrows() != labels.len() {
            return Err("Numbers of samples in features and targets must match".to_string());
        }

        if feature_names.len() != features.ncols() {
            return Err(format!(
                "Got {} feature names for {} feature columns",
                feature_names.len(),
                features.ncols()
            ));
        }

        if rows.len() != labels.len() {
            return Err("Row index must have one entry per sample".to_string());
        }

        Ok(Self {
            features,
            labels,
            feature_names,
            rows,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Keeps the given samples, in order.
    pub fn select_samples(&self, samples: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), samples),
            labels: self.labels.select(Axis(0), samples),
            feature_names: self.feature_names.clone(),
            rows: samples.iter().map(|&i| self.rows[i]).collect(),
        }
    }

    /// Keeps the given feature columns, in order.
    pub fn select_features(&self, columns: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(1), columns),
            labels: self.labels.clone(),
            feature_names: columns.iter().map(|&j| self.feature_names[j].clone()).collect(),
            rows: self.rows.clone(),
        }
    }

    pub fn with_labels(&self, labels: Vector) -> Result<Self, String> {
        if labels.len() != self.n_samples() {
            return Err("Numbers of samples in features and targets must match".to_string());
        }
        Ok(Self {
            features: self.features.clone(),
            labels,
            feature_names: self.feature_names.clone(),
            rows: self.rows.clone(),
        })
    }

    /// Shuffled k-fold partition: `(train, test)` sample indices per fold.
    pub fn kfold(&self, k: usize, seed: u64) -> Result<Vec<(Vec<usize>, Vec<usize>)>, String> {
        let n = self.n_samples();
        if k < 2 || k > n {
            return Err(format!("k must be between 2 and n_samples={}, got {}", n, k));
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        let folds = (0..k)
            .map(|fold| {
                let test: Vec<usize> = order.iter().copied().skip(fold).step_by(k).collect();
                let mut train: Vec<usize> = order
                    .iter()
                    .enumerate()
                    .filter(|(pos, _)| pos % k != fold)
                    .map(|(_, &i)| i)
                    .collect();
                train.sort_unstable();
                (train, test)
            })
            .collect();

        Ok(folds)
    }
}
