//! Dense linear algebra helpers for the small systems regression needs.

use crate::{Matrix, Vector};

const SINGULAR_TOL: f64 = 1e-10;

/// Thin QR factorization `X = Q R` with `Q` (n × p) orthonormal and `R`
/// (p × p) upper triangular.
#[derive(Clone, Debug)]
pub struct Qr {
    pub q: Matrix,
    pub r: Matrix,
}

impl Qr {
    /// Modified Gram-Schmidt with one re-orthogonalization pass.
    pub fn decompose(x: &Matrix) -> Result<Self, String> {
        let (n, p) = x.dim();
        if p == 0 {
            return Err("Design matrix has no columns".to_string());
        }
        if n < p {
            return Err(format!(
                "Need at least as many samples as columns, got {} samples and {} columns",
                n, p
            ));
        }

        let mut q = x.clone();
        let mut r = Matrix::zeros((p, p));

        for j in 0..p {
            let original_norm = x.column(j).dot(&x.column(j)).sqrt();

            for _ in 0..2 {
                for i in 0..j {
                    let qi = q.column(i).to_owned();
                    let rij = qi.dot(&q.column(j));
                    r[(i, j)] += rij;
                    q.column_mut(j).scaled_add(-rij, &qi);
                }
            }

            let norm = q.column(j).dot(&q.column(j)).sqrt();
            if norm <= SINGULAR_TOL * original_norm.max(1.0) {
                return Err(format!("Design matrix is rank deficient at column {}", j));
            }

            r[(j, j)] = norm;
            q.column_mut(j).mapv_inplace(|v| v / norm);
        }

        Ok(Self { q, r })
    }

    /// Least-squares solution of `X b = y`.
    pub fn solve(&self, y: &Vector) -> Result<Vector, String> {
        if y.len() != self.q.nrows() {
            return Err("Number of samples in X and y must match".to_string());
        }
        let qty = self.q.t().dot(y);
        back_substitute(&self.r, &qty)
    }

    /// `y - Q Q' y`, the least-squares residuals of `y`.
    pub fn residuals(&self, y: &Vector) -> Vector {
        let qty = self.q.t().dot(y);
        y - &self.q.dot(&qty)
    }

    /// `(X'X)^-1 = R^-1 R^-T`.
    pub fn xtx_inverse(&self) -> Result<Matrix, String> {
        let r_inv = upper_triangular_inverse(&self.r)?;
        Ok(r_inv.dot(&r_inv.t()))
    }

    /// Diagonal of the hat matrix `Q Q'`.
    pub fn leverage(&self) -> Vector {
        self.q.map_axis(ndarray::Axis(1), |row| row.dot(&row))
    }
}

pub fn back_substitute(r: &Matrix, b: &Vector) -> Result<Vector, String> {
    let n = r.nrows();
    let mut x = Vector::zeros(n);
    for i in (0..n).rev() {
        if r[(i, i)].abs() < SINGULAR_TOL {
            return Err("Matrix is singular or nearly singular".to_string());
        }
        let mut acc = b[i];
        for j in (i + 1)..n {
            acc -= r[(i, j)] * x[j];
        }
        x[i] = acc / r[(i, i)];
    }
    Ok(x)
}

pub fn upper_triangular_inverse(r: &Matrix) -> Result<Matrix, String> {
    let n = r.nrows();
    let mut inv = Matrix::zeros((n, n));
    for col in 0..n {
        let mut e = Vector::zeros(n);
        e[col] = 1.0;
        let x = back_substitute(r, &e)?;
        inv.column_mut(col).assign(&x);
    }
    Ok(inv)
}

/// Gauss-Jordan inverse with partial pivoting.
pub fn invert(a: &Matrix) -> Result<Matrix, String> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err("Only square matrices can be inverted".to_string());
    }

    let mut aug = Matrix::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[(i, j)] = a[(i, j)];
        }
        aug[(i, n + i)] = 1.0;
    }

    for i in 0..n {
        let max_row = pivot_row(&aug, i);
        if aug[(max_row, i)].abs() < SINGULAR_TOL {
            return Err("Matrix is singular or nearly singular".to_string());
        }
        swap_rows(&mut aug, i, max_row);

        let pivot = aug[(i, i)];
        for j in 0..2 * n {
            aug[(i, j)] /= pivot;
        }

        for k in 0..n {
            if k == i {
                continue;
            }
            let factor = aug[(k, i)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..2 * n {
                aug[(k, j)] -= factor * aug[(i, j)];
            }
        }
    }

    Ok(aug.slice(ndarray::s![.., n..]).to_owned())
}

/// Determinant by Gaussian elimination; zero for singular input.
pub fn determinant(a: &Matrix) -> Result<f64, String> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err("Determinant requires a square matrix".to_string());
    }
    if n == 0 {
        return Ok(1.0);
    }

    let mut m = a.clone();
    let mut det = 1.0;
    for i in 0..n {
        let max_row = pivot_row(&m, i);
        if m[(max_row, i)].abs() < SINGULAR_TOL {
            return Ok(0.0);
        }
        if max_row != i {
            swap_rows(&mut m, i, max_row);
            det = -det;
        }
        det *= m[(i, i)];
        for k in (i + 1)..n {
            let factor = m[(k, i)] / m[(i, i)];
            for j in i..n {
                m[(k, j)] -= factor * m[(i, j)];
            }
        }
    }
    Ok(det)
}

fn pivot_row(m: &Matrix, col: usize) -> usize {
    let mut max_row = col;
    for k in (col + 1)..m.nrows() {
        if m[(k, col)].abs() > m[(max_row, col)].abs() {
            max_row = k;
        }
    }
    max_row
}

fn swap_rows(m: &mut Matrix, a: usize, b: usize) {
    if a == b {
        return;
    }
    for j in 0..m.ncols() {
        m.swap((a, j), (b, j));
    }
}

/// Correlation matrix of the columns of `x`.
pub fn correlation(x: &Matrix) -> Result<Matrix, String> {
    let p = x.ncols();
    let means = x
        .mean_axis(ndarray::Axis(0))
        .ok_or("Cannot correlate an empty matrix")?;
    let centered = x - &means.insert_axis(ndarray::Axis(0));
    let cross = centered.t().dot(&centered);

    let mut corr = Matrix::zeros((p, p));
    for i in 0..p {
        for j in 0..p {
            let denom = (cross[(i, i)] * cross[(j, j)]).sqrt();
            if denom < SINGULAR_TOL {
                let constant = if cross[(i, i)] < SINGULAR_TOL { i } else { j };
                return Err(format!("Column {} is constant", constant));
            }
            corr[(i, j)] = cross[(i, j)] / denom;
        }
    }
    Ok(corr)
}
