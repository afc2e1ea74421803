use mpg_regression::{Dataset, Lasso, LassoCv, LassoPath, LinearRegression};
use ndarray::array;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Least Squares vs LASSO ===\n");

    // y = 3*x1 + 2*x2 + noise; x3 and x4 are irrelevant
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
        [10.0, 7.0, 0.2, -0.2]
    ];
    let y = array![7.1, 11.9, 12.8, 19.7, 18.9, 27.8, 26.7, 35.9, 34.8, 43.1];
    let data = Dataset::new(x.clone(), y.clone())?;

    let ols = LinearRegression::new().fit(&data)?;
    println!("{}\n", ols);

    println!("{:<14} {:>10} {:>10} {:>10} {:>10} {:>10}", "alpha", "R²", "x1", "x2", "x3", "x4");
    println!("{}", "-".repeat(69));
    for alpha in [0.01, 0.1, 0.3, 1.0, 3.0] {
        let mut model = Lasso::new().alpha(alpha);
        model.fit(&x, &y)?;
        let b = model.coefficients.as_ref().ok_or("model not fitted")?;
        println!(
            "{:<14} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            alpha,
            model.score(&x, &y)?,
            b[0],
            b[1],
            b[2],
            b[3]
        );
    }

    let cv = LassoCv::new()
        .path(LassoPath::new().n_alphas(50))
        .n_folds(5)
        .seed(3)
        .fit(&data)?;
    println!(
        "\nCross-validated: alpha_min = {:.4}, alpha_1se = {:.4}, R² = {:.4}",
        cv.alpha_min(),
        cv.alpha_1se(),
        cv.r_squared
    );
    println!("Zeroed features: {:?}", cv.zeroed_features());

    Ok(())
}
