//! Ball matrix helpers for the continuation driver.
//!
//! `nalgebra` stores the matrices; products and inverses are computed here
//! so that every operation goes through the outward-rounded ball arithmetic.

use nalgebra::DMatrix;
use num_traits::Zero;

use crate::ball::ComplexBall;
use crate::error::{Error, Result};

pub fn identity(n: usize, prec: u32) -> DMatrix<ComplexBall> {
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            ComplexBall::one_at(prec)
        } else {
            ComplexBall::zero_at(prec)
        }
    })
}

pub fn mat_mul(a: &DMatrix<ComplexBall>, b: &DMatrix<ComplexBall>) -> Result<DMatrix<ComplexBall>> {
    if a.ncols() != b.nrows() {
        return Err(Error::invalid_input(format!(
            "cannot multiply a {}x{} matrix by a {}x{} matrix",
            a.nrows(),
            a.ncols(),
            b.nrows(),
            b.ncols()
        )));
    }
    let prec = max_prec(a).max(max_prec(b));
    Ok(DMatrix::from_fn(a.nrows(), b.ncols(), |i, j| {
        let mut acc = ComplexBall::zero_at(prec);
        for k in 0..a.ncols() {
            acc += &a[(i, k)] * &b[(k, j)];
        }
        acc
    }))
}

/// Gauss–Jordan elimination with partial pivoting on the largest lower bound.
pub fn inverse(m: &DMatrix<ComplexBall>) -> Result<DMatrix<ComplexBall>> {
    let n = m.nrows();
    if m.ncols() != n {
        return Err(Error::invalid_input("cannot invert a non-square matrix"));
    }
    let prec = max_prec(m);
    let mut a = m.clone();
    let mut inv = identity(n, prec);
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[(i, col)]
                    .abs_lower()
                    .partial_cmp(&a[(j, col)].abs_lower())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[(pivot, col)].contains_zero() {
            return Err(Error::precision(
                "cannot certify that the transition matrix is invertible",
            ));
        }
        a.swap_rows(col, pivot);
        inv.swap_rows(col, pivot);
        let p = a[(col, col)].inv();
        for j in 0..n {
            a[(col, j)] = &a[(col, j)] * &p;
            inv[(col, j)] = &inv[(col, j)] * &p;
        }
        for i in 0..n {
            if i == col {
                continue;
            }
            let f = a[(i, col)].clone();
            if f.is_zero() {
                continue;
            }
            for j in 0..n {
                let t = &f * &a[(col, j)];
                a[(i, j)] -= t;
                let t = &f * &inv[(col, j)];
                inv[(i, j)] -= t;
            }
        }
    }
    Ok(inv)
}

pub fn max_prec(m: &DMatrix<ComplexBall>) -> u32 {
    m.iter().map(|c| c.prec()).max().unwrap_or(64)
}

/// Brings every entry to the same working precision.
pub fn with_prec(m: &DMatrix<ComplexBall>, prec: u32) -> DMatrix<ComplexBall> {
    m.map(|c| c.set_prec(prec))
}

/// Largest radius among the entries.
pub fn max_rad(m: &DMatrix<ComplexBall>) -> crate::ball::Mag {
    m.iter()
        .map(|c| c.rad())
        .fold(crate::ball::Mag::ZERO, |acc, r| acc.max(r))
}

#[cfg(test)]
pub(crate) fn assert_err_contains<T: std::fmt::Debug>(res: Result<T>, needle: &str) {
    match res {
        Ok(v) => panic!("expected an error containing {needle:?}, got {v:?}"),
        Err(e) => {
            let msg = e.to_string();
            assert!(msg.contains(needle), "error {msg:?} does not contain {needle:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(x: f64) -> ComplexBall {
        ComplexBall::from_f64(x, 0.0, 128)
    }

    #[test]
    fn inverse_of_a_rotation() {
        let m = DMatrix::from_row_slice(2, 2, &[ball(0.0), ball(-2.0), ball(0.5), ball(0.0)]);
        let inv = inverse(&m).unwrap();
        let prod = mat_mul(&m, &inv).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(prod[(i, j)].contains(&ball(expected)));
                assert!(prod[(i, j)].rad().to_f64() < 1e-30);
            }
        }
    }

    #[test]
    fn singular_matrices_are_retryable_failures() {
        let m = DMatrix::from_row_slice(2, 2, &[ball(1.0), ball(2.0), ball(2.0), ball(4.0)]);
        let err = inverse(&m).unwrap_err();
        assert!(err.is_retryable());
        assert_err_contains(inverse(&m), "invertible");
    }

    #[test]
    fn dimension_mismatch() {
        let a = identity(2, 64);
        let b = identity(3, 64);
        assert_err_contains(mat_mul(&a, &b), "cannot multiply");
    }
}
