use crate::error::{NetworkError, Result};
use crate::immittance::Immittance;
use crate::math::{is_inf, is_zero, INF};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

/// Branch current `y·(v_m − v_n)` flowing from `m` to `n`.
pub fn calculate_current(y: Complex64, v_m: Complex64, v_n: Complex64) -> Complex64 {
    y * (v_m - v_n)
}

/// Series combination of two admittances.
///
/// An infinite admittance is a short and yields the other operand; two zero
/// admittances stay open.
pub fn equivalent_y_series(y1: Complex64, y2: Complex64) -> Complex64 {
    if is_inf(y1) {
        y2
    } else if is_inf(y2) {
        y1
    } else if is_zero(y1) || is_zero(y2) {
        Complex64::default()
    } else {
        y1 * y2 / (y1 + y2)
    }
}

/// Converts a delta `(y_mn, y_np, y_mp)` to the equivalent star
/// `(y_m, y_n, y_p)`.
///
/// Zero delta branches are resolved with the limit of the closed form as
/// the branch admittance goes to zero:
///
/// * all three zero: all arms zero.
/// * two zero: the remaining branch `y` becomes arms of `2y` at its end
///   nodes and an open arm at the third node.
/// * one zero: the arm at the node shared by the two remaining branches is
///   infinite and the other arms equal the branch adjacent to them.
pub fn delta2star(
    y_mn: Complex64,
    y_np: Complex64,
    y_mp: Complex64,
) -> (Complex64, Complex64, Complex64) {
    let zero = Complex64::default();
    match (is_zero(y_mn), is_zero(y_np), is_zero(y_mp)) {
        (true, true, true) => (zero, zero, zero),

        (false, true, true) => (2.0 * y_mn, 2.0 * y_mn, zero),
        (true, false, true) => (zero, 2.0 * y_np, 2.0 * y_np),
        (true, true, false) => (2.0 * y_mp, zero, 2.0 * y_mp),

        (true, false, false) => (y_mp, y_np, INF),
        (false, true, false) => (INF, y_mn, y_mp),
        (false, false, true) => (y_mn, INF, y_np),

        (false, false, false) => {
            let s = y_np * y_mp + y_mn * y_np + y_mn * y_mp;
            (s / y_np, s / y_mp, s / y_mn)
        }
    }
}

/// Converts a star `(y_m, y_n, y_p)` to the equivalent delta
/// `(y_mn, y_np, y_mp)`.
///
/// A zero arm sum gives an all-zero delta. Infinite arms are taken to grow
/// at the same rate: a branch between two infinite arms is infinite, a
/// branch between an infinite and a finite arm is the finite arm divided by
/// the number of infinite arms, and a branch between two finite arms
/// vanishes.
pub fn star2delta(
    y_m: Complex64,
    y_n: Complex64,
    y_p: Complex64,
) -> (Complex64, Complex64, Complex64) {
    let arms = [y_m, y_n, y_p];
    let n_inf = arms.iter().filter(|&&y| is_inf(y)).count();

    let branch = |i: usize, j: usize| -> Complex64 {
        let (a, b) = (arms[i], arms[j]);
        if n_inf == 0 {
            let sum = y_m + y_n + y_p;
            if is_zero(sum) {
                Complex64::default()
            } else {
                a * b / sum
            }
        } else {
            match (is_inf(a), is_inf(b)) {
                (true, true) => INF,
                (true, false) => b / n_inf as f64,
                (false, true) => a / n_inf as f64,
                (false, false) => Complex64::default(),
            }
        }
    };

    (branch(0, 1), branch(1, 2), branch(0, 2))
}

/// Voltage of the internal node of a star with arms `y` to nodes at `v`.
///
/// Infinite arms tie the node to the average of their voltages; a zero
/// arm sum leaves the node at zero.
pub fn calculate_central_v_star(v: [Complex64; 3], y: [Complex64; 3]) -> Complex64 {
    let tied: Vec<Complex64> = (0..3).filter(|&i| is_inf(y[i])).map(|i| v[i]).collect();
    if !tied.is_empty() {
        return tied.iter().sum::<Complex64>() / tied.len() as f64;
    }

    let sum: Complex64 = y.iter().sum();
    if is_zero(sum) {
        return Complex64::default();
    }
    (0..3).map(|i| v[i] * y[i]).sum::<Complex64>() / sum
}

/// Nodal admittance matrix `Aᵗ·Yprim·A` of an element's own branches over
/// its terminals. Branch ends at ground are dropped.
pub fn nodal_admittance_matrix(
    branches: &[Immittance],
    terminals: &[usize],
) -> Result<DMatrix<Complex64>> {
    let n = terminals.len();
    let column = |bus: usize| -> Result<Option<usize>> {
        if bus == 0 {
            return Ok(None);
        }
        terminals
            .iter()
            .position(|&t| t == bus)
            .map(Some)
            .ok_or(NetworkError::UnknownBus(bus))
    };

    let mut a = DMatrix::<Complex64>::zeros(branches.len(), n);
    for (row, br) in branches.iter().enumerate() {
        if let Some(c) = column(br.bus_m())? {
            a[(row, c)] = Complex64::new(1.0, 0.0);
        }
        if let Some(c) = column(br.bus_n())? {
            a[(row, c)] = Complex64::new(-1.0, 0.0);
        }
    }
    let y_prim = DMatrix::from_diagonal(&DVector::from_iterator(
        branches.len(),
        branches.iter().map(|br| br.y_pu()),
    ));

    Ok(a.transpose() * y_prim * a)
}
