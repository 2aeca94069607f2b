use crate::composite::CompositeElement;
use crate::element::Element;
use crate::error::{NetworkError, Result};
use crate::immittance::Immittance;
use crate::sequence::Sequence;
use std::collections::HashMap;

/// Parallel-merge key of an element: its ordered terminal buses and the
/// endpoint layout of its positive-sequence branches.
///
/// Two elements only share a key when they connect the same buses through
/// the same terminals in the same branch shape, so a three-winding
/// transformer never groups with a line touching two of its buses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructuralKey {
    terminals: Vec<usize>,
    layout: Vec<(usize, usize)>,
}

impl StructuralKey {
    pub fn terminals(&self) -> &[usize] {
        &self.terminals
    }
}

pub fn structural_key(element: &Element) -> StructuralKey {
    StructuralKey {
        terminals: element.terminals().to_vec(),
        layout: element
            .admittance_representation(Sequence::Positive)
            .iter()
            .map(|br| br.endpoints())
            .collect(),
    }
}

/// Bus-membership vector of an element over buses `0..=n_buses`. The
/// ground entry is always clear.
pub fn build_incidence_fingerprint(element: &Element, n_buses: usize) -> Result<Vec<u8>> {
    let mut fingerprint = vec![0u8; n_buses + 1];
    for &bus in element.terminals() {
        if bus > n_buses {
            return Err(NetworkError::UnknownBus(bus));
        }
        fingerprint[bus] = 1;
    }
    Ok(fingerprint)
}

/// An element of the simplified network: a single element by index, or a
/// merged group of parallel elements.
#[derive(Debug, Clone)]
pub enum SimplifiedElement {
    Single(usize),
    Composite(CompositeElement),
}

impl SimplifiedElement {
    pub fn admittance_representation<'a>(
        &'a self,
        elements: &'a [Element],
        seq: Sequence,
    ) -> &'a [Immittance] {
        match self {
            SimplifiedElement::Single(i) => elements[*i].admittance_representation(seq),
            SimplifiedElement::Composite(c) => c.admittance_representation(seq),
        }
    }

    /// Indexes of the member elements represented.
    pub fn members(&self) -> &[usize] {
        match self {
            SimplifiedElement::Single(i) => std::slice::from_ref(i),
            SimplifiedElement::Composite(c) => c.members(),
        }
    }
}

/// Groups elements sharing a structural key. Groups keep the order in
/// which their first member appears; singletons pass through unchanged.
pub fn simplify_elements(elements: &[Element]) -> Result<Vec<SimplifiedElement>> {
    let mut order: Vec<Vec<usize>> = Vec::new();
    let mut groups: HashMap<StructuralKey, usize> = HashMap::new();

    for (i, element) in elements.iter().enumerate() {
        let key = structural_key(element);
        match groups.get(&key) {
            Some(&g) => order[g].push(i),
            None => {
                groups.insert(key, order.len());
                order.push(vec![i]);
            }
        }
    }

    let simplified = order
        .into_iter()
        .map(|members| {
            if members.len() == 1 {
                Ok(SimplifiedElement::Single(members[0]))
            } else {
                log::debug!(
                    "merging {} parallel elements: {}",
                    members.len(),
                    elements[members[0]].name()
                );
                Ok(SimplifiedElement::Composite(CompositeElement::new(
                    elements, members,
                )?))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    log::debug!(
        "{} elements simplified to {}",
        elements.len(),
        simplified.len()
    );
    Ok(simplified)
}

/// Merges zero-sequence branches by unordered endpoint pair, summing
/// admittances. Zero branches are dropped. Merged branches keep the
/// orientation and position of the first branch seen.
pub fn merge_by_endpoints<'a, I>(branches: I) -> Vec<Immittance>
where
    I: IntoIterator<Item = &'a Immittance>,
{
    let mut merged: Vec<Immittance> = Vec::new();
    let mut index: HashMap<(usize, usize), usize> = HashMap::new();

    for br in branches.into_iter().filter(|br| !br.is_zero()) {
        match index.get(&br.unordered_endpoints()) {
            Some(&k) => {
                let y = merged[k].y_pu() + br.y_pu();
                merged[k] = merged[k].with_y_pu(y);
            }
            None => {
                index.insert(br.unordered_endpoints(), merged.len());
                merged.push(*br);
            }
        }
    }
    merged
}

/// Zero-sequence branches of the simplified network, merged by endpoints.
///
/// Zero-sequence connectivity can differ from the positive sequence (delta
/// windings block it, grounded windings add paths to ground), so this is
/// done across all simplified elements rather than per group.
pub fn simplify_zero_seq_admittances(
    simplified: &[SimplifiedElement],
    elements: &[Element],
) -> Vec<Immittance> {
    let merged = merge_by_endpoints(
        simplified
            .iter()
            .flat_map(|s| s.admittance_representation(elements, Sequence::Zero)),
    );
    log::debug!("{} zero-sequence branches after merge", merged.len());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;
    use crate::element::{LineParams, Transformer3WParamsBuilder};
    use crate::pubase::BaseRegistry;
    use crate::winding::{Connection, Winding};
    use anyhow::Result;
    use approx::assert_abs_diff_eq;

    fn line(bases: &mut BaseRegistry, m: usize, n: usize) -> Result<Element> {
        let z = cmplx!(0.1, 0.4);
        Ok(Element::transmission_line(
            bases,
            &LineParams {
                z_ohm_per_km: [3.0 * z, z, z],
                length_km: 20.0,
                bus_m: m,
                bus_n: n,
            },
        )?)
    }

    #[test]
    fn test_fingerprint() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let l = line(&mut bases, 3, 1)?;
        assert_eq!(build_incidence_fingerprint(&l, 3)?, vec![0, 1, 0, 1]);
        assert!(matches!(
            build_incidence_fingerprint(&l, 2),
            Err(NetworkError::UnknownBus(3))
        ));
        Ok(())
    }

    #[test]
    fn test_parallel_lines_merge() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let elements = vec![
            line(&mut bases, 1, 2)?,
            line(&mut bases, 2, 3)?,
            line(&mut bases, 1, 2)?,
        ];
        let simplified = simplify_elements(&elements)?;
        assert_eq!(simplified.len(), 2);
        assert_eq!(simplified[0].members(), &[0, 2]);
        assert_eq!(simplified[1].members(), &[1]);

        let y = elements[0].admittance_representation(Sequence::Positive)[0].y_pu();
        let merged = simplified[0].admittance_representation(&elements, Sequence::Positive);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].y_pu(), 2.0 * y);
        Ok(())
    }

    #[test]
    fn test_reversed_line_not_merged() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let elements = vec![line(&mut bases, 1, 2)?, line(&mut bases, 2, 1)?];
        let simplified = simplify_elements(&elements)?;
        assert_eq!(simplified.len(), 2);

        // same buses, so the zero-sequence merge still joins them
        let seq0 = simplify_zero_seq_admittances(&simplified, &elements);
        assert_eq!(seq0.len(), 1);
        assert_eq!(seq0[0].endpoints(), (1, 2));
        Ok(())
    }

    #[test]
    fn test_three_winding_never_groups_with_line() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let params = Transformer3WParamsBuilder::default()
            .z_ps_pu(cmplx!(0.0, 0.1))
            .z_pt_pu(cmplx!(0.0, 0.2))
            .z_st_pu(cmplx!(0.0, 0.15))
            .bus_m(1usize)
            .bus_n(2usize)
            .bus_p(3usize)
            .v_nom_pri_kv(100.0)
            .v_nom_sec_kv(100.0)
            .v_nom_ter_kv(100.0)
            .s_nom_mva(100.0)
            .primary(Winding::solid(Connection::Yg))
            .secondary(Winding::solid(Connection::D))
            .tertiary(Winding::solid(Connection::Y))
            .build()?;
        let elements = vec![
            Element::transformer_3w(&mut bases, &params)?,
            line(&mut bases, 1, 2)?,
        ];
        let simplified = simplify_elements(&elements)?;
        assert_eq!(simplified.len(), 2);
        Ok(())
    }

    #[test]
    fn test_zero_seq_merge_drops_zero_branches() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let base = bases.base(1)?;
        let branches = [
            Immittance::new(cmplx!(0.0, -2.0), &base, 1, 0),
            Immittance::zero(&base, 1, 2),
            Immittance::new(cmplx!(0.0, -3.0), &base, 0, 1),
            Immittance::new(cmplx!(0.0, -1.0), &base, 2, 1),
        ];
        let merged = merge_by_endpoints(&branches);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].endpoints(), (1, 0));
        assert_abs_diff_eq!(merged[0].y_pu(), cmplx!(0.0, -5.0), epsilon = 1e-12);
        assert_eq!(merged[1].endpoints(), (2, 1));
        Ok(())
    }
}
