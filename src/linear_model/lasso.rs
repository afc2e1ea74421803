use crate::dataset::Dataset;
use crate::{Matrix, Vector};
use log::{debug, warn};

#[derive(Clone, Debug)]
pub struct Lasso {
    pub coefficients: Option<Vector>,
    pub intercept: Option<f64>,
    pub n_iter: Option<usize>,
    alpha: f64,
    fit_intercept: bool,
    normalize: bool,
    max_iter: usize,
    tolerance: f64,
}

impl Lasso {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            n_iter: None,
            alpha: 1.0,
            fit_intercept: true,
            normalize: true,
            max_iter: 10_000,
            tolerance: 1e-7,
        }
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        if alpha < 0.0 {
            panic!("alpha must be non-negative, got {}", alpha);
        }
        self.alpha = alpha;
        self
    }

    pub fn fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Standardize columns before the descent; coefficients are always
    /// reported on the original scale.
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn fit(&mut self, x: &Matrix, y: &Vector) -> Result<(), String> {
        validate(x, y)?;

        let problem = Prepared::new(x, y, self.fit_intercept, self.normalize);
        let mut beta = Vector::zeros(x.ncols());
        let n_iter = coordinate_descent(
            &problem.x,
            &problem.y,
            self.alpha,
            &mut beta,
            self.max_iter,
            self.tolerance,
        );

        let (coeffs, intercept) = problem.unscale(&beta);
        self.coefficients = Some(coeffs);
        self.intercept = Some(intercept);
        self.n_iter = Some(n_iter);
        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vector, String> {
        let coeffs = self
            .coefficients
            .as_ref()
            .ok_or("Model not fitted. Call fit() first.")?;
        let intercept = self.intercept.unwrap_or(0.0);

        if x.ncols() != coeffs.len() {
            return Err(format!(
                "Number of features in X ({}) doesn't match training data ({})",
                x.ncols(),
                coeffs.len()
            ));
        }

        Ok(x.dot(coeffs) + intercept)
    }

    pub fn score(&self, x: &Matrix, y: &Vector) -> Result<f64, String> {
        let y_pred = self.predict(x)?;
        crate::metrics::r2_score(y, &y_pred)
    }
}

impl Default for Lasso {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(x: &Matrix, y: &Vector) -> Result<(), String> {
    if x.nrows() != y.len() {
        return Err("Number of samples in X and y must match".to_string());
    }
    if x.nrows() == 0 {
        return Err("X must have at least one sample".to_string());
    }
    Ok(())
}

/// Centered (and optionally scaled) copy of a regression problem.
struct Prepared {
    x: Matrix,
    y: Vector,
    x_means: Vector,
    x_scales: Vector,
    y_mean: f64,
}

impl Prepared {
    fn new(x: &Matrix, y: &Vector, fit_intercept: bool, normalize: bool) -> Self {
        let p = x.ncols();
        let (x_means, y_mean) = if fit_intercept {
            (
                x.mean_axis(ndarray::Axis(0)).unwrap_or_else(|| Vector::zeros(p)),
                y.mean().unwrap_or(0.0),
            )
        } else {
            (Vector::zeros(p), 0.0)
        };

        let mut xc = x - &x_means.view().insert_axis(ndarray::Axis(0));
        let x_scales = if normalize {
            let n = x.nrows() as f64;
            let scales: Vector = xc
                .columns()
                .into_iter()
                .map(|col| {
                    let s = (col.dot(&col) / n).sqrt();
                    if s > 1e-10 { s } else { 1.0 }
                })
                .collect();
            for (mut col, &s) in xc.columns_mut().into_iter().zip(scales.iter()) {
                col /= s;
            }
            scales
        } else {
            Vector::ones(p)
        };

        Self {
            x: xc,
            y: y - y_mean,
            x_means,
            x_scales,
            y_mean,
        }
    }

    fn unscale(&self, beta: &Vector) -> (Vector, f64) {
        let coeffs = beta / &self.x_scales;
        let intercept = self.y_mean - coeffs.dot(&self.x_means);
        (coeffs, intercept)
    }

    /// Smallest penalty at which every coefficient is zero.
    fn alpha_max(&self) -> f64 {
        let n = self.x.nrows() as f64;
        self.x
            .columns()
            .into_iter()
            .map(|col| (col.dot(&self.y) / n).abs())
            .fold(0.0, f64::max)
    }
}

/// Cyclic coordinate descent for `(1/2n)||y - X b||^2 + alpha ||b||_1`,
/// warm-started from `beta`. Returns the number of sweeps.
fn coordinate_descent(
    x: &Matrix,
    y: &Vector,
    alpha: f64,
    beta: &mut Vector,
    max_iter: usize,
    tolerance: f64,
) -> usize {
    let n = x.nrows() as f64;
    let col_sq: Vector = x.columns().into_iter().map(|c| c.dot(&c) / n).collect();
    let mut residual = y - &x.dot(&*beta);

    for sweep in 1..=max_iter {
        let mut max_change: f64 = 0.0;

        for j in 0..x.ncols() {
            if col_sq[j] < 1e-12 {
                continue;
            }

            let old = beta[j];
            let rho = x.column(j).dot(&residual) / n + col_sq[j] * old;
            let new = soft_threshold(rho, alpha) / col_sq[j];

            if new != old {
                residual.scaled_add(old - new, &x.column(j));
                beta[j] = new;
                max_change = max_change.max((new - old).abs() * col_sq[j].sqrt());
            }
        }

        if max_change < tolerance {
            return sweep;
        }
    }

    warn!(
        "coordinate descent did not converge in {} sweeps (alpha={:.3e})",
        max_iter, alpha
    );
    max_iter
}

fn soft_threshold(z: f64, gamma: f64) -> f64 {
    if z > gamma {
        z - gamma
    } else if z < -gamma {
        z + gamma
    } else {
        0.0
    }
}

/// Coefficients along a decreasing sequence of penalties.
#[derive(Clone, Debug)]
pub struct LassoPathFit {
    pub alphas: Vec<f64>,
    /// One row per alpha, on the original feature scale.
    pub coefficients: Matrix,
    pub intercepts: Vec<f64>,
    pub feature_names: Vec<String>,
}

impl LassoPathFit {
    pub fn predict(&self, index: usize, x: &Matrix) -> Vector {
        x.dot(&self.coefficients.row(index)) + self.intercepts[index]
    }

    pub fn n_nonzero(&self, index: usize) -> usize {
        self.coefficients.row(index).iter().filter(|&&b| b != 0.0).count()
    }
}

/// Geometric penalty path from `alpha_max` down to `alpha_max * min_ratio`.
#[derive(Clone, Debug)]
pub struct LassoPath {
    n_alphas: usize,
    min_ratio: f64,
    max_iter: usize,
    tolerance: f64,
}

impl LassoPath {
    pub fn new() -> Self {
        Self {
            n_alphas: 100,
            min_ratio: 1e-4,
            max_iter: 10_000,
            tolerance: 1e-7,
        }
    }

    pub fn n_alphas(mut self, n_alphas: usize) -> Self {
        if n_alphas < 2 {
            panic!("n_alphas must be at least 2, got {}", n_alphas);
        }
        self.n_alphas = n_alphas;
        self
    }

    pub fn min_ratio(mut self, min_ratio: f64) -> Self {
        if !(min_ratio > 0.0 && min_ratio < 1.0) {
            panic!("min_ratio must be in (0, 1), got {}", min_ratio);
        }
        self.min_ratio = min_ratio;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn alphas_for(&self, data: &Dataset) -> Result<Vec<f64>, String> {
        validate(&data.features, &data.labels)?;
        let problem = Prepared::new(&data.features, &data.labels, true, true);
        let alpha_max = problem.alpha_max();
        if alpha_max <= 0.0 {
            return Err("Response is constant or uncorrelated with every feature".to_string());
        }

        let step = self.min_ratio.ln() / (self.n_alphas - 1) as f64;
        Ok((0..self.n_alphas)
            .map(|i| alpha_max * (step * i as f64).exp())
            .collect())
    }

    pub fn fit(&self, data: &Dataset) -> Result<LassoPathFit, String> {
        let alphas = self.alphas_for(data)?;
        self.fit_alphas(data, &alphas)
    }

    /// Fits each alpha in order, warm-starting from the previous solution.
    pub fn fit_alphas(&self, data: &Dataset, alphas: &[f64]) -> Result<LassoPathFit, String> {
        validate(&data.features, &data.labels)?;
        if alphas.iter().any(|&a| a < 0.0) {
            return Err("Penalties must be non-negative".to_string());
        }

        let problem = Prepared::new(&data.features, &data.labels, true, true);
        let p = data.n_features();
        let mut beta = Vector::zeros(p);
        let mut coefficients = Matrix::zeros((alphas.len(), p));
        let mut intercepts = Vec::with_capacity(alphas.len());

        for (i, &alpha) in alphas.iter().enumerate() {
            coordinate_descent(
                &problem.x,
                &problem.y,
                alpha,
                &mut beta,
                self.max_iter,
                self.tolerance,
            );
            let (coeffs, intercept) = problem.unscale(&beta);
            coefficients.row_mut(i).assign(&coeffs);
            intercepts.push(intercept);
        }

        Ok(LassoPathFit {
            alphas: alphas.to_vec(),
            coefficients,
            intercepts,
            feature_names: data.feature_names.clone(),
        })
    }
}

impl Default for LassoPath {
    fn default() -> Self {
        Self::new()
    }
}

/// k-fold cross-validated choice of the LASSO penalty.
#[derive(Clone, Debug)]
pub struct LassoCv {
    path: LassoPath,
    n_folds: usize,
    seed: u64,
}

#[derive(Clone, Debug)]
pub struct LassoCvResult {
    pub path: LassoPathFit,
    /// Mean held-out squared error per alpha.
    pub cv_mean: Vec<f64>,
    pub cv_std_error: Vec<f64>,
    pub best_index: usize,
    pub one_se_index: usize,
    pub coefficients: Vector,
    pub intercept: f64,
    pub fitted: Vector,
    pub r_squared: f64,
}

impl LassoCvResult {
    pub fn alpha_min(&self) -> f64 {
        self.path.alphas[self.best_index]
    }

    pub fn alpha_1se(&self) -> f64 {
        self.path.alphas[self.one_se_index]
    }

    pub fn feature_names(&self) -> &[String] {
        &self.path.feature_names
    }

    /// Features whose coefficient is exactly zero at the selected alpha.
    pub fn zeroed_features(&self) -> Vec<&str> {
        self.path
            .feature_names
            .iter()
            .zip(self.coefficients.iter())
            .filter(|(_, b)| **b == 0.0)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.path
            .feature_names
            .iter()
            .position(|n| n == name)
            .map(|j| self.coefficients[j])
    }
}

impl LassoCv {
    pub fn new() -> Self {
        Self {
            path: LassoPath::new(),
            n_folds: 10,
            seed: 1,
        }
    }

    pub fn path(mut self, path: LassoPath) -> Self {
        self.path = path;
        self
    }

    pub fn n_folds(mut self, n_folds: usize) -> Self {
        if n_folds < 2 {
            panic!("n_folds must be at least 2, got {}", n_folds);
        }
        self.n_folds = n_folds;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&self, data: &Dataset) -> Result<LassoCvResult, String> {
        let alphas = self.path.alphas_for(data)?;
        let folds = data.kfold(self.n_folds, self.seed)?;

        let mut fold_errors = Matrix::zeros((folds.len(), alphas.len()));
        for (k, (train, test)) in folds.iter().enumerate() {
            let train_data = data.select_samples(train);
            let test_data = data.select_samples(test);
            let fold_path = self.path.fit_alphas(&train_data, &alphas)?;

            for i in 0..alphas.len() {
                let predictions = fold_path.predict(i, &test_data.features);
                fold_errors[(k, i)] =
                    crate::metrics::mean_squared_error(&test_data.labels, &predictions)?;
            }
            debug!("lasso cv fold {}/{} done", k + 1, folds.len());
        }

        let n_folds = folds.len() as f64;
        let cv_mean: Vec<f64> = fold_errors
            .columns()
            .into_iter()
            .map(|col| col.sum() / n_folds)
            .collect();
        let cv_std_error: Vec<f64> = fold_errors
            .columns()
            .into_iter()
            .zip(cv_mean.iter())
            .map(|(col, &mean)| {
                let var =
                    col.iter().map(|e| (e - mean) * (e - mean)).sum::<f64>() / (n_folds - 1.0);
                (var / n_folds).sqrt()
            })
            .collect();

        let best_index = cv_mean
            .iter()
            .enumerate()
            .fold(0, |best, (i, &m)| if m < cv_mean[best] { i } else { best });
        let threshold = cv_mean[best_index] + cv_std_error[best_index];
        // Alphas decrease along the path, so the first index under the
        // threshold is the largest qualifying penalty.
        let one_se_index = cv_mean
            .iter()
            .position(|&m| m <= threshold)
            .unwrap_or(best_index);

        let path = self.path.fit_alphas(data, &alphas)?;
        let coefficients = path.coefficients.row(best_index).to_owned();
        let intercept = path.intercepts[best_index];
        let fitted = path.predict(best_index, &data.features);
        let r_squared = crate::metrics::r2_score(&data.labels, &fitted)?;

        Ok(LassoCvResult {
            path,
            cv_mean,
            cv_std_error,
            best_index,
            one_se_index,
            coefficients,
            intercept,
            fitted,
            r_squared,
        })
    }
}

impl Default for LassoCv {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sparse_data() -> Dataset {
        // y = 3*x1 - 2*x2 with two irrelevant columns.
        let x = array![
            [1.0, 2.0, 0.5, -0.3],
            [2.0, 3.0, -0.2, 0.8],
            [3.0, 1.0, 1.1, -0.5],
            [4.0, 4.0, 0.3, 0.2],
            [5.0, 2.0, -0.8, 0.7],
            [6.0, 5.0, 0.9, -0.1],
            [7.0, 3.0, -0.4, 0.6],
            [8.0, 6.0, 0.7, -0.9],
            [9.0, 4.0, -0.1, 0.4],
            [10.0, 7.0, 0.2, -0.2],
            [11.0, 2.5, -0.6, 0.1],
            [12.0, 5.5, 0.4, -0.7]
        ];
        let y = x.column(0).mapv(|v| 3.0 * v) - x.column(1).mapv(|v| 2.0 * v)
            + array![0.1, -0.1, 0.05, 0.0, -0.05, 0.1, -0.1, 0.0, 0.05, -0.05, 0.1, 0.0];
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn test_lasso_small_alpha_matches_least_squares() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut model = Lasso::new().alpha(1e-8);
        model.fit(&x, &y).unwrap();

        let coeffs = model.coefficients.as_ref().unwrap();
        assert!((coeffs[0] - 2.0).abs() < 1e-4);
        assert!(model.intercept.unwrap().abs() < 1e-3);
        assert!(model.score(&x, &y).unwrap() > 0.9999);
    }

    #[test]
    fn test_lasso_unscaled_without_intercept() {
        let x = array![[1.0, 0.5], [2.0, -1.0], [3.0, 2.0], [4.0, 0.0], [5.0, 1.5]];
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(1).mapv(|v| -1.5 * v);

        let mut model = Lasso::new()
            .alpha(1e-9)
            .fit_intercept(false)
            .normalize(false)
            .tolerance(1e-12);
        model.fit(&x, &y).unwrap();

        let coeffs = model.coefficients.as_ref().unwrap();
        assert!((coeffs[0] - 2.0).abs() < 1e-6);
        assert!((coeffs[1] + 1.5).abs() < 1e-6);
        assert_eq!(model.intercept, Some(0.0));
        assert!(model.n_iter.unwrap() < 10_000);
    }

    #[test]
    fn test_lasso_high_regularization_zeroes_everything() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut model = Lasso::new().alpha(100.0);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.coefficients.as_ref().unwrap()[0], 0.0);
        assert!((model.intercept.unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_lasso_sparsity() {
        let data = sparse_data();
        let mut model = Lasso::new().alpha(0.3);
        model.fit(&data.features, &data.labels).unwrap();

        let coeffs = model.coefficients.as_ref().unwrap();
        assert!(coeffs[0] > 1.0);
        assert!(coeffs[1] < -0.5);
        assert_eq!(coeffs[2], 0.0);
        assert_eq!(coeffs[3], 0.0);
    }

    #[test]
    fn test_lasso_predict_without_fit() {
        let model = Lasso::new();
        assert!(model.predict(&array![[1.0], [2.0]]).is_err());
    }

    #[test]
    fn test_lasso_invalid_alpha() {
        std::panic::catch_unwind(|| {
            Lasso::new().alpha(-1.0);
        })
        .expect_err("Should panic on negative alpha");
    }

    #[test]
    fn test_lasso_dimension_mismatch() {
        let mut model = Lasso::new();
        assert!(model.fit(&array![[1.0], [2.0]], &array![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_path_starts_empty_and_fills_in() {
        let data = sparse_data();
        let path = LassoPath::new().n_alphas(30).fit(&data).unwrap();

        assert_eq!(path.alphas.len(), 30);
        assert!(path.alphas.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(path.n_nonzero(0), 0);
        assert!(path.n_nonzero(29) >= 2);

        let ratio = path.alphas[29] / path.alphas[0];
        assert!((ratio - 1e-4).abs() < 1e-10);
    }

    #[test]
    fn test_path_end_approaches_least_squares() {
        let data = sparse_data();
        let path = LassoPath::new().min_ratio(1e-6).fit(&data).unwrap();
        let ols = crate::linear_model::LinearRegression::new().fit(&data).unwrap();

        let last = path.alphas.len() - 1;
        for j in 0..4 {
            assert!((path.coefficients[(last, j)] - ols.beta[j + 1]).abs() < 1e-2);
        }
    }

    #[test]
    fn test_cv_selects_a_penalty_on_the_path() {
        let data = sparse_data();
        let result = LassoCv::new()
            .n_folds(4)
            .seed(3)
            .path(LassoPath::new().n_alphas(40))
            .fit(&data)
            .unwrap();

        assert_eq!(result.cv_mean.len(), 40);
        assert!(result.one_se_index <= result.best_index);
        assert!(result.alpha_1se() >= result.alpha_min());
        assert!(result.r_squared > 0.95 && result.r_squared <= 1.0);
        assert!(result.coefficient("x1").unwrap() > 2.0);
        assert!(result.coefficient("x9").is_none());

        let min_mean = result.cv_mean.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(result.cv_mean[result.best_index], min_mean);
    }

    #[test]
    fn test_cv_is_reproducible() {
        let data = sparse_data();
        let cv = LassoCv::new().n_folds(3).seed(11).path(LassoPath::new().n_alphas(20));
        let a = cv.fit(&data).unwrap();
        let b = cv.fit(&data).unwrap();
        assert_eq!(a.best_index, b.best_index);
        assert_eq!(a.cv_mean, b.cv_mean);
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
    }
}
