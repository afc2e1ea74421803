use crate::Vector;

pub fn mean_squared_error(y_true: &Vector, y_pred: &Vector) -> Result<f64, String> {
    if y_true.len() != y_pred.len() {
        return Err("y_true and y_pred must have the same length".to_string());
    }

    let diff = y_true - y_pred;
    diff.mapv(|x| x * x)
        .mean()
        .ok_or_else(|| "Cannot score an empty sample".to_string())
}

pub fn r2_score(y_true: &Vector, y_pred: &Vector) -> Result<f64, String> {
    if y_true.len() != y_pred.len() {
        return Err("y_true and y_pred must have the same length".to_string());
    }

    let y_mean = y_true
        .mean()
        .ok_or_else(|| "Cannot score an empty sample".to_string())?;
    let ss_res = (y_true - y_pred).mapv(|x| x * x).sum();
    let ss_tot = y_true.mapv(|x| (x - y_mean) * (x - y_mean)).sum();

    if ss_tot == 0.0 {
        return Ok(1.0); // Perfect prediction when variance is zero
    }

    Ok(1.0 - ss_res / ss_tot)
}

pub fn pearson_correlation(a: &Vector, b: &Vector) -> Result<f64, String> {
    if a.len() != b.len() {
        return Err("Both series must have the same length".to_string());
    }
    if a.len() < 2 {
        return Err("Correlation needs at least two observations".to_string());
    }

    let n = a.len() as f64;
    let mean_a = a.sum() / n;
    let mean_b = b.sum() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a) * (x - mean_a);
        var_b += (y - mean_b) * (y - mean_b);
    }

    if var_a == 0.0 || var_b == 0.0 {
        return Err("Correlation is undefined for a constant series".to_string());
    }

    Ok(cov / (var_a * var_b).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mean_squared_error() {
        let y_true = array![1.0, 2.0, 3.0];
        let y_pred = array![1.0, 2.0, 5.0];

        let mse = mean_squared_error(&y_true, &y_pred).unwrap();
        assert!((mse - 4.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_r2_score() {
        let y_true = array![1.0, 2.0, 3.0, 4.0];
        let y_pred = array![1.0, 2.0, 3.0, 4.0];

        let r2 = r2_score(&y_true, &y_pred).unwrap();
        assert!((r2 - 1.0).abs() < 1e-10);

        let mean_only = array![2.5, 2.5, 2.5, 2.5];
        assert!(r2_score(&y_true, &mean_only).unwrap().abs() < 1e-10);
    }

    #[test]
    fn test_pearson_correlation() {
        let a = array![1.0, 2.0, 3.0, 4.0];
        let b = array![2.0, 4.0, 6.0, 8.0];
        let c = array![8.0, 6.0, 4.0, 2.0];

        assert!((pearson_correlation(&a, &b).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson_correlation(&a, &c).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson_correlation(&a, &array![1.0, 1.0, 1.0, 1.0]).is_err());
        assert!(pearson_correlation(&a, &array![1.0]).is_err());
    }
}
