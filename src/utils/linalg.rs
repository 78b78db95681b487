//! Small dense linear algebra: Cholesky decomposition and solves.
//!
//! The normal-equation systems of the model-free problem are at most a few
//! parameters square, so a hand-rolled Cholesky is both sufficient and free
//! of heavyweight backend dependencies.

use crate::error::{MfError, Result};
use ndarray::{Array1, Array2};

/// Cholesky decomposition of a positive definite matrix: `A = L L^T`.
pub fn cholesky_decomposition(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.shape()[0];
    if a.shape()[1] != n {
        return Err(MfError::DimensionMismatch(format!(
            "Matrix must be square, got shape {:?}",
            a.shape()
        )));
    }

    let mut l: Array2<f64> = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            if j == i {
                for k in 0..j {
                    sum += l[[j, k]].powi(2);
                }
                let val = a[[j, j]] - sum;
                if val <= 0.0 {
                    return Err(MfError::SingularMatrix);
                }
                l[[j, j]] = val.sqrt();
            } else {
                for k in 0..j {
                    sum += l[[i, k]] * l[[j, k]];
                }
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Solve `A x = b` for symmetric positive definite `A` via Cholesky:
/// forward substitution with `L`, back substitution with `L^T`.
pub fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.shape()[0];
    if b.len() != n {
        return Err(MfError::DimensionMismatch(format!(
            "Matrix is {}x{} but right-hand side has length {}",
            n,
            n,
            b.len()
        )));
    }
    let l = cholesky_decomposition(a)?;

    // L y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }

    // L^T x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_cholesky_reconstruction() {
        let a = arr2(&[[4.0, 2.0, 0.0], [2.0, 5.0, 1.0], [0.0, 1.0, 3.0]]);
        let l = cholesky_decomposition(&a).unwrap();
        let reconstructed = l.dot(&l.t());
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(a[[i, j]], reconstructed[[i, j]], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_solve() {
        let a = arr2(&[[4.0, 2.0], [2.0, 5.0]]);
        let x_true = arr1(&[1.5, -0.5]);
        let b = a.dot(&x_true);
        let x = solve_spd(&a, &b).unwrap();
        for i in 0..2 {
            assert_relative_eq!(x[i], x_true[i], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_indefinite_rejected() {
        let a = arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        let err = solve_spd(&a, &arr1(&[1.0, 1.0])).unwrap_err();
        assert!(matches!(err, MfError::SingularMatrix));
    }
}
