use crate::debug::{format_incidence, format_mat};
use crate::element::Element;
use crate::error::{NetworkError, Result};
use crate::immittance::Immittance;
use crate::math::is_zero;
use crate::sequence::Sequence;
use crate::simplify::SimplifiedElement;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

/// Branches of one sequence network in simplified-element order.
///
/// The zero sequence uses the endpoint-merged branch list; the positive and
/// negative sequences flatten the simplified elements. Zero branches are
/// never included.
pub fn network_branches(
    simplified: &[SimplifiedElement],
    elements: &[Element],
    seq0_merged: &[Immittance],
    seq: Sequence,
) -> Vec<Immittance> {
    match seq {
        Sequence::Zero => seq0_merged.to_vec(),
        Sequence::Positive | Sequence::Negative => simplified
            .iter()
            .flat_map(|s| s.admittance_representation(elements, seq))
            .filter(|br| !br.is_zero())
            .copied()
            .collect(),
    }
}

pub fn calculate_number_of_branches(
    simplified: &[SimplifiedElement],
    elements: &[Element],
    seq0_merged: &[Immittance],
    seq: Sequence,
) -> usize {
    network_branches(simplified, elements, seq0_merged, seq).len()
}

/// Builds the diagonal primitive admittance matrix of `branches` and its
/// inverse, the primitive impedance matrix.
pub fn build_primitive_matrices(
    branches: &[Immittance],
    seq: Sequence,
) -> Result<(DMatrix<Complex64>, DMatrix<Complex64>)> {
    let y = DVector::from_iterator(branches.len(), branches.iter().map(|br| br.y_pu()));
    if let Some(row) = y.iter().position(|&y| is_zero(y) || !y.is_finite()) {
        return Err(NetworkError::SingularPrimitive { sequence: seq, row });
    }
    let z = y.map(|y| y.inv());

    let y_prim = DMatrix::from_diagonal(&y);
    let z_prim = DMatrix::from_diagonal(&z);
    log::trace!("{} Yprim:\n{}", seq, format_mat(&y_prim, false));
    Ok((y_prim, z_prim))
}

/// Branch-to-bus incidence of `branches`: +1 at the from bus, -1 at the to
/// bus. Returns the full matrix over buses `0..=n_buses` and the bus
/// incidence with the ground column removed.
pub fn build_incidence_matrices(
    branches: &[Immittance],
    n_buses: usize,
) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    let mut full = DMatrix::zeros(branches.len(), n_buses + 1);
    for (k, br) in branches.iter().enumerate() {
        let (m, n) = br.endpoints();
        for bus in [m, n] {
            if bus > n_buses {
                return Err(NetworkError::UnknownBus(bus));
            }
        }
        full[(k, m)] = 1.0;
        full[(k, n)] = -1.0;
    }
    let bus = full.columns(1, n_buses).into_owned();
    log::trace!("incidence:\n{}", format_incidence(&full));
    Ok((full, bus))
}

/// `Ybus = Aᵗ · Yprim · A`.
pub fn make_ybus(a_bus: &DMatrix<f64>, y_prim: &DMatrix<Complex64>) -> Result<DMatrix<Complex64>> {
    if !y_prim.is_square() || a_bus.nrows() != y_prim.nrows() {
        return Err(NetworkError::Dimension(format!(
            "incidence {:?} against primitive {:?}",
            a_bus.shape(),
            y_prim.shape()
        )));
    }
    let a = a_bus.map(|v| Complex64::new(v, 0.0));
    Ok(a.transpose() * y_prim * a)
}

/// Inverts `y_bus` through its LU factors. A pivot below `tol` times the
/// largest entry is treated as singular.
pub fn make_zbus(y_bus: &DMatrix<Complex64>, seq: Sequence, tol: f64) -> Result<DMatrix<Complex64>> {
    let singular = || NetworkError::SingularBusAdmittance { sequence: seq };
    if !y_bus.is_square() {
        return Err(singular());
    }
    let scale = y_bus.iter().map(|v| v.norm()).fold(0.0, f64::max);
    if !y_bus.is_empty() && scale == 0.0 {
        return Err(singular());
    }

    let lu = y_bus.clone().lu();
    if lu.u().diagonal().iter().any(|p| p.norm() <= tol * scale) {
        return Err(singular());
    }
    lu.try_inverse().ok_or_else(singular)
}

/// Builds the bus admittance matrix and the bus impedance matrix.
pub fn assemble_bus_matrices(
    a_bus: &DMatrix<f64>,
    y_prim: &DMatrix<Complex64>,
    seq: Sequence,
    tol: f64,
) -> Result<(DMatrix<Complex64>, DMatrix<Complex64>)> {
    let y_bus = make_ybus(a_bus, y_prim)?;
    log::debug!("{} Ybus:\n{}", seq, format_mat(&y_bus, false));
    let z_bus = make_zbus(&y_bus, seq, tol)?;
    Ok((y_bus, z_bus))
}
