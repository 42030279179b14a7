//! Standard-normal shock matrices
//!
//! Shocks are laid out `(horizon, n_paths)`: row `j` drives step `j + 1`
//! of every path, column `p` is one path.

use crate::error::{SdeError, SdeResult};
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Source of i.i.d. standard-normal draws.
///
/// Implemented for every [`rand::Rng`], so a seeded `StdRng` gives
/// reproducible shock matrices.
pub trait ShockSource {
    fn standard_normals(&mut self, rows: usize, cols: usize) -> Array2<f64>;
}

impl<R: Rng + ?Sized> ShockSource for R {
    fn standard_normals(&mut self, rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_simple_fn((rows, cols), || {
            Distribution::<f64>::sample(&StandardNormal, &mut *self)
        })
    }
}

/// Correlated shocks `rho * aux + sqrt(1 - rho²) * indep`.
///
/// Element-wise Cholesky factor of a 2x2 correlation matrix: if `aux` and
/// `indep` are independent standard normals, the result is standard normal
/// with correlation `rho` to `aux`.
pub fn correlate(rho: f64, aux: &Array2<f64>, indep: &Array2<f64>) -> SdeResult<Array2<f64>> {
    validate_rho(rho)?;
    if aux.dim() != indep.dim() {
        return Err(SdeError::ShapeMismatch {
            what: "independent shock matrix",
            expected: aux.dim(),
            actual: indep.dim(),
        });
    }
    let complement = (1.0 - rho * rho).sqrt();
    Ok(aux * rho + indep * complement)
}

pub(crate) fn validate_rho(rho: f64) -> SdeResult<()> {
    if !(-1.0..=1.0).contains(&rho) {
        return Err(SdeError::invalid_parameter(
            "rho",
            rho,
            "correlation must lie in [-1, 1]",
        ));
    }
    Ok(())
}

/// Pearson correlation of two equally long samples.
///
/// Returns NaN when the samples differ in length, are empty, or either has
/// zero variance.
pub fn sample_correlation<'a, A, B>(a: A, b: B) -> f64
where
    A: IntoIterator<Item = &'a f64>,
    B: IntoIterator<Item = &'a f64>,
{
    let a: Vec<f64> = a.into_iter().copied().collect();
    let b: Vec<f64> = b.into_iter().copied().collect();
    if a.len() != b.len() || a.is_empty() {
        return f64::NAN;
    }
    let pairs: Vec<(f64, f64)> = a.into_iter().zip(b).collect();
    let n = pairs.len() as f64;

    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a > 0.0 && var_b > 0.0 {
        cov / (var_a.sqrt() * var_b.sqrt())
    } else {
        f64::NAN
    }
}
