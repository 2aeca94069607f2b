use crate::{
    cmplx, BaseRegistry, Connection, Element, LineParams, MachineParams, Network, ShuntParams,
    Transformer2WParamsBuilder, Winding,
};
use anyhow::Result;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;


/// `m · x` as a plain vector.
pub(crate) fn mat_vec(m: &DMatrix<Complex64>, x: &[Complex64]) -> Vec<Complex64> {
    (m * DVector::from_column_slice(x)).iter().copied().collect()
}

pub(crate) fn is_symmetric(m: &DMatrix<Complex64>, tol: f64) -> bool {
    m.is_square() && (m - m.transpose()).iter().all(|d| d.norm() <= tol)
}

/// Line with `z1 = z2 = z_ohm` and `z0 = 3 · z_ohm`.
pub(crate) fn line(bases: &mut BaseRegistry, m: usize, n: usize, z_ohm: Complex64) -> Result<Element> {
    Ok(Element::transmission_line(
        bases,
        &LineParams {
            z_ohm_per_km: [3.0 * z_ohm, z_ohm, z_ohm],
            length_km: 1.0,
            bus_m: m,
            bus_n: n,
        },
    )?)
}

/// Solidly grounded generator, `z0 = 0.05j`, `z1 = z2 = 0.2j` on its nameplate.
pub(crate) fn generator(bases: &mut BaseRegistry, bus: usize, v_kv: f64) -> Result<Element> {
    Ok(Element::synchronous_generator(
        bases,
        &MachineParams {
            z_pu: [cmplx!(0.0, 0.05), cmplx!(0.0, 0.2), cmplx!(0.0, 0.2)],
            bus,
            v_nom_kv: v_kv,
            s_nom_mva: 100.0,
            winding: Winding::solid(Connection::Yg),
        },
    )?)
}

pub(crate) fn shunt(bases: &mut BaseRegistry, bus: usize, y_siemens: Complex64) -> Result<Element> {
    Ok(Element::shunt(
        bases,
        &ShuntParams {
            y_siemens: [y_siemens; 3],
            bus,
        },
    )?)
}

/// 100 kV / 100 MVA transformer with `z = 0.1j`.
pub(crate) fn transformer(
    bases: &mut BaseRegistry,
    m: usize,
    n: usize,
    primary: Connection,
    secondary: Connection,
) -> Result<Element> {
    let params = Transformer2WParamsBuilder::default()
        .z_pu(cmplx!(0.0, 0.1))
        .bus_m(m)
        .bus_n(n)
        .v_nom_pri_kv(100.0)
        .v_nom_sec_kv(100.0)
        .s_nom_mva(100.0)
        .primary(Winding::solid(primary))
        .secondary(Winding::solid(secondary))
        .build()?;
    Ok(Element::transformer_2w(bases, &params)?)
}

/// Generator at bus 1, transformer 1-2, line 2-3 and a grounded shunt at
/// bus 3, all on a 100 kV / 100 MVA base.
pub(crate) fn radial_network(primary: Connection, secondary: Connection) -> Result<Network> {
    let mut net = Network::new(3, 100e6, 1, 100e3)?;
    let bases = net.bases_mut();
    let elements = vec![
        generator(bases, 1, 100.0)?,
        transformer(bases, 1, 2, primary, secondary)?,
        line(bases, 2, 3, cmplx!(0.0, 5.0))?,
        shunt(bases, 3, cmplx!(1e-3, 0.0))?,
    ];
    net.add_elements(elements)?;
    Ok(net)
}
