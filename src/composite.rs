use crate::element::Element;
use crate::error::{NetworkError, Result};
use crate::immittance::Immittance;
use crate::sequence::Sequence;
use crate::simplify::{merge_by_endpoints, structural_key, StructuralKey};
use num_complex::Complex64;

/// Equivalent of two or more elements connected in parallel.
///
/// Positive and negative sequence branches are summed position by
/// position. Zero-sequence branches are merged by endpoints, since members
/// with different winding connections can have different zero-sequence
/// layouts.
#[derive(Debug, Clone)]
pub struct CompositeElement {
    members: Vec<usize>,
    key: StructuralKey,
    branches: [Vec<Immittance>; 3],
}

impl CompositeElement {
    /// Builds the composite of `elements[i]` for each `i` in `members`.
    pub fn new(elements: &[Element], members: Vec<usize>) -> Result<Self> {
        let first = members
            .first()
            .map(|&i| &elements[i])
            .ok_or_else(|| {
                NetworkError::Dimension("a composite element needs at least one member".to_string())
            })?;
        let key = structural_key(first);

        for &i in &members[1..] {
            if structural_key(&elements[i]) != key {
                return Err(NetworkError::MismatchedTerminals {
                    first: first.name(),
                    second: elements[i].name(),
                });
            }
        }

        let sum_positions = |seq: Sequence| -> Vec<Immittance> {
            let mut sum = first.admittance_representation(seq).to_vec();
            for &i in &members[1..] {
                for (acc, br) in sum
                    .iter_mut()
                    .zip(elements[i].admittance_representation(seq))
                {
                    *acc = acc.with_y_pu(acc.y_pu() + br.y_pu());
                }
            }
            sum
        };
        let seq0 = merge_by_endpoints(
            members
                .iter()
                .flat_map(|&i| elements[i].admittance_representation(Sequence::Zero)),
        );

        Ok(Self {
            branches: [
                seq0,
                sum_positions(Sequence::Positive),
                sum_positions(Sequence::Negative),
            ],
            members,
            key,
        })
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn terminals(&self) -> &[usize] {
        self.key.terminals()
    }

    pub fn admittance_representation(&self, seq: Sequence) -> &[Immittance] {
        &self.branches[seq.index()]
    }

    /// Sum of the members' pre-fault terminal currents. Members must have
    /// computed their own currents first.
    pub fn terminal_currents_pre_fault(&self, elements: &[Element]) -> Result<Vec<Complex64>> {
        let mut total = vec![Complex64::default(); self.terminals().len()];
        for &i in &self.members {
            for (acc, i) in total.iter_mut().zip(elements[i].terminal_currents_pre_fault()?) {
                *acc += i;
            }
        }
        Ok(total)
    }

    /// Sum of the members' post-fault `[seq0, seq1, seq2]` terminal currents.
    pub fn terminal_currents_post_fault(
        &self,
        elements: &[Element],
    ) -> Result<Vec<[Complex64; 3]>> {
        let mut total = vec![[Complex64::default(); 3]; self.terminals().len()];
        for &i in &self.members {
            for (acc, i) in total.iter_mut().zip(elements[i].terminal_currents_post_fault()?) {
                for s in 0..3 {
                    acc[s] += i[s];
                }
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;
    use crate::element::{LineParams, Transformer2WParamsBuilder};
    use crate::pubase::BaseRegistry;
    use crate::winding::{Connection, Winding};
    use anyhow::Result;
    use approx::assert_abs_diff_eq;

    fn line(bases: &mut BaseRegistry, z: Complex64) -> Result<Element> {
        Ok(Element::transmission_line(
            bases,
            &LineParams {
                z_ohm_per_km: [3.0 * z, z, z],
                length_km: 1.0,
                bus_m: 1,
                bus_n: 2,
            },
        )?)
    }

    fn transformer(bases: &mut BaseRegistry, sec: Connection) -> Result<Element> {
        let params = Transformer2WParamsBuilder::default()
            .z_pu(cmplx!(0.0, 0.1))
            .bus_m(1usize)
            .bus_n(2usize)
            .v_nom_pri_kv(100.0)
            .v_nom_sec_kv(100.0)
            .s_nom_mva(100.0)
            .primary(Winding::solid(Connection::Yg))
            .secondary(Winding::solid(sec))
            .build()?;
        Ok(Element::transformer_2w(bases, &params)?)
    }

    #[test]
    fn test_sum_positions() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let elements = vec![
            line(&mut bases, cmplx!(0.0, 10.0))?,
            line(&mut bases, cmplx!(0.0, 20.0))?,
        ];
        let c = CompositeElement::new(&elements, vec![0, 1])?;
        // 100 ohm base: y = -10j + -5j
        let y1 = c.admittance_representation(Sequence::Positive)[0].y_pu();
        assert_abs_diff_eq!(y1, cmplx!(0.0, -15.0), epsilon = 1e-12);
        assert_eq!(c.terminals(), &[1, 2]);
        Ok(())
    }

    #[test]
    fn test_mismatched_members() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let elements = vec![
            line(&mut bases, cmplx!(0.0, 10.0))?,
            Element::transmission_line(
                &mut bases,
                &LineParams {
                    z_ohm_per_km: [cmplx!(0.0, 1.0); 3],
                    length_km: 1.0,
                    bus_m: 2,
                    bus_n: 3,
                },
            )?,
        ];
        assert!(matches!(
            CompositeElement::new(&elements, vec![0, 1]),
            Err(NetworkError::MismatchedTerminals { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_zero_sequence_by_endpoints() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let elements = vec![
            transformer(&mut bases, Connection::Yg)?,
            transformer(&mut bases, Connection::D)?,
        ];
        let c = CompositeElement::new(&elements, vec![0, 1])?;
        let seq0 = c.admittance_representation(Sequence::Zero);
        let endpoints: Vec<(usize, usize)> = seq0.iter().map(|b| b.endpoints()).collect();
        assert_eq!(endpoints, vec![(1, 2), (1, 0)]);

        let seq1 = c.admittance_representation(Sequence::Positive);
        assert_abs_diff_eq!(seq1[0].y_pu(), cmplx!(0.0, -20.0), epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_currents_sum_members() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let mut elements = vec![
            line(&mut bases, cmplx!(0.0, 10.0))?,
            line(&mut bases, cmplx!(0.0, 20.0))?,
        ];
        for e in elements.iter_mut() {
            e.define_voltages_pre_fault(&[cmplx!(1.0), cmplx!(0.9)])?;
            e.compute_internal_currents_pre_fault()?;
        }
        let c = CompositeElement::new(&elements, vec![0, 1])?;
        let i = c.terminal_currents_pre_fault(&elements)?;
        let y = c.admittance_representation(Sequence::Positive)[0].y_pu();
        assert_abs_diff_eq!(i[0], y * 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(i[1], -y * 0.1, epsilon = 1e-12);

        assert!(c.terminal_currents_post_fault(&elements).is_err());
        Ok(())
    }
}
