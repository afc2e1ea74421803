//! Seeded tables shaped like the Auto MPG data, for offline runs and tests.
//!
//! Engine size drives cylinders, displacement, horsepower and weight, so
//! those columns are strongly collinear; fuel efficiency is log-linear in
//! weight, horsepower and model year with multiplicative noise.

use crate::dataset::{AutoTable, Car, Origin};
use crate::Matrix;
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::StandardNormal;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MISSING_HORSEPOWER_RATE: f64 = 0.015;

pub fn generate(n: usize, seed: u64) -> AutoTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise: Matrix = Matrix::random_using((n, 5), StandardNormal, &mut rng);

    let cars = noise
        .rows()
        .into_iter()
        .map(|z| {
            let origin = draw_origin(&mut rng);
            let cylinders = draw_cylinders(origin, &mut rng);
            let c = cylinders as f64;

            let displacement = round_to((4.5 * c * c + 10.0 * c) * (0.12 * z[0]).exp(), 1);
            let horsepower = ((0.35 * displacement + 45.0) * (0.10 * z[1]).exp()).round();
            let weight = ((1200.0 + 8.0 * displacement) * (0.08 * z[2]).exp()).round();
            let acceleration = round_to(22.0 - 0.04 * horsepower + 1.5 * z[3], 1);
            let model_year: u8 = rng.gen_range(70..=82);

            let log_mpg = 4.08 - 0.0003 * weight - 0.001 * horsepower
                + 0.03 * (model_year as f64 - 76.0)
                + if origin == Origin::American { 0.0 } else { 0.04 }
                + 0.11 * z[4];

            Car {
                mpg: round_to(log_mpg.exp(), 1),
                cylinders,
                displacement,
                horsepower: (!rng.gen_bool(MISSING_HORSEPOWER_RATE)).then_some(horsepower),
                weight,
                acceleration,
                model_year,
                origin,
            }
        })
        .collect();

    AutoTable::new(cars)
}

fn draw_origin(rng: &mut StdRng) -> Origin {
    let u: f64 = rng.gen_range(0.0..1.0);
    if u < 0.625 {
        Origin::American
    } else if u < 0.8 {
        Origin::European
    } else {
        Origin::Japanese
    }
}

fn draw_cylinders(origin: Origin, rng: &mut StdRng) -> u8 {
    let u: f64 = rng.gen_range(0.0..1.0);
    match origin {
        Origin::American if u < 0.35 => 4,
        Origin::American if u < 0.62 => 6,
        Origin::American => 8,
        Origin::European if u < 0.9 => 4,
        Origin::European if u < 0.95 => 5,
        Origin::European => 6,
        Origin::Japanese if u < 0.9 => 4,
        Origin::Japanese if u < 0.95 => 3,
        Origin::Japanese => 6,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
