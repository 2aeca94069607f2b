use crate::debug::{format_mat, format_polar_vec, format_rect_vec};
use crate::element::Element;
use crate::error::{NetworkError, Result};
use crate::immittance::Immittance;
use crate::pubase::{BaseRegistry, Rebase};
use crate::scopt::ScOpt;
use crate::sequence::Sequence;
use crate::simplify::{simplify_elements, simplify_zero_seq_admittances, SimplifiedElement};
use crate::variable::ElectricalVariable;
use crate::ybus::{
    build_incidence_matrices, build_primitive_matrices, calculate_number_of_branches,
    make_ybus, make_zbus, network_branches,
};
use nalgebra::DMatrix;
use num_complex::Complex64;
use std::collections::VecDeque;

/// Network node. Bus 0 is ground.
#[derive(Debug, Clone)]
pub struct Bus {
    id: usize,
    v: ElectricalVariable,
}

impl Bus {
    pub fn new(id: usize, bases: &mut BaseRegistry) -> Result<Self> {
        let base = bases.base(id)?;
        Ok(Self {
            id,
            v: ElectricalVariable::voltage(&base),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn voltage(&self) -> &ElectricalVariable {
        &self.v
    }
}

impl Rebase for Bus {
    fn change_base(&mut self, bases: &BaseRegistry) -> Result<()> {
        self.v.change_base(bases)
    }
}

/// Matrices of one sequence network. Each stage is cleared whenever an
/// earlier stage is recomputed.
#[derive(Debug, Clone, Default)]
struct SequenceMatrices {
    branches: Option<Vec<Immittance>>,
    y_prim: Option<DMatrix<Complex64>>,
    z_prim: Option<DMatrix<Complex64>>,
    incidence: Option<DMatrix<f64>>,
    bus_incidence: Option<DMatrix<f64>>,
    y_bus: Option<DMatrix<Complex64>>,
    z_bus: Option<DMatrix<Complex64>>,
}

/// A short-circuit study: buses, elements and the sequence network
/// matrices assembled from them.
///
/// Matrices are built per sequence in four stages:
///
/// ```text
/// simplify_elements → find_primitives_matrices
///     → find_incidences_matrices → calculate_buses_matrices
/// ```
///
/// Calling a stage before the one it depends on is an error. Adding
/// elements or reassigning bases clears every stage.
#[derive(Debug, Clone)]
pub struct Network {
    opt: ScOpt,
    n_buses: usize,
    reference_bus: usize,

    bases: BaseRegistry,
    buses: Vec<Bus>,
    elements: Vec<Element>,

    // simplified elements and merged zero-sequence branches
    simplified: Option<(Vec<SimplifiedElement>, Vec<Immittance>)>,
    matrices: [SequenceMatrices; 3],
}

impl Network {
    /// Network of buses `1..=n_buses` with `s_base` (VA) and the voltage base
    /// `v_base_reference` (V) at `reference_bus`.
    pub fn new(
        n_buses: usize,
        s_base: f64,
        reference_bus: usize,
        v_base_reference: f64,
    ) -> Result<Self> {
        let opt = ScOpt {
            s_base,
            ..ScOpt::default()
        };
        Self::with_options(n_buses, reference_bus, v_base_reference, opt)
    }

    pub fn with_options(
        n_buses: usize,
        reference_bus: usize,
        v_base_reference: f64,
        opt: ScOpt,
    ) -> Result<Self> {
        if reference_bus == 0 || reference_bus > n_buses {
            return Err(NetworkError::UnknownBus(reference_bus));
        }
        let mut bases = BaseRegistry::with_default(opt.v_base, opt.s_base)?;
        bases.get_or_create(reference_bus, v_base_reference, opt.s_base)?;

        let buses = (0..=n_buses)
            .map(|id| Bus::new(id, &mut bases))
            .collect::<Result<Vec<Bus>>>()?;

        log::debug!(
            "network of {} buses, reference bus {} at {} V",
            n_buses,
            reference_bus,
            v_base_reference
        );
        Ok(Self {
            opt,
            n_buses,
            reference_bus,
            bases,
            buses,
            elements: Vec::new(),
            simplified: None,
            matrices: Default::default(),
        })
    }

    pub fn options(&self) -> &ScOpt {
        &self.opt
    }

    pub fn n_buses(&self) -> usize {
        self.n_buses
    }

    pub fn reference_bus(&self) -> usize {
        self.reference_bus
    }

    pub fn bases(&self) -> &BaseRegistry {
        &self.bases
    }

    /// Registry to construct elements against. Existing bases are changed
    /// with [`Network::update_base`] or [`Network::assign_bases`].
    pub fn bases_mut(&mut self) -> &mut BaseRegistry {
        &mut self.bases
    }

    /// Buses `0..=n_buses`, ground first.
    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn bus(&self, id: usize) -> Result<&Bus> {
        self.buses.get(id).ok_or(NetworkError::UnknownBus(id))
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn add_elements(&mut self, elements: Vec<Element>) -> Result<()> {
        for element in &elements {
            if let Some(&bus) = element.terminals().iter().find(|&&t| t > self.n_buses) {
                return Err(NetworkError::UnknownBus(bus));
            }
        }
        log::debug!("adding {} elements", elements.len());
        self.elements.extend(elements);
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.simplified = None;
        self.matrices = Default::default();
    }

    fn stage_order(seq: Sequence, stage: &'static str, missing: &'static str) -> NetworkError {
        NetworkError::StageOrder {
            sequence: seq,
            stage,
            missing,
        }
    }

    /// Groups parallel elements and collects the branches of the `seq`
    /// network.
    pub fn simplify_elements(&mut self, seq: Sequence) -> Result<()> {
        let (simplified, seq0) = match self.simplified.take() {
            Some(s) => s,
            None => {
                let simplified = simplify_elements(&self.elements)?;
                let seq0 = simplify_zero_seq_admittances(&simplified, &self.elements);
                (simplified, seq0)
            }
        };
        let branches = network_branches(&simplified, &self.elements, &seq0, seq);
        self.simplified = Some((simplified, seq0));
        log::debug!("{}: {} branches", seq, branches.len());

        self.matrices[seq.index()] = SequenceMatrices {
            branches: Some(branches),
            ..Default::default()
        };
        Ok(())
    }

    pub fn find_primitives_matrices(&mut self, seq: Sequence) -> Result<()> {
        let m = &mut self.matrices[seq.index()];
        let branches = m.branches.as_ref().ok_or_else(|| {
            Self::stage_order(seq, "find_primitives_matrices", "simplify_elements")
        })?;
        let (y_prim, z_prim) = build_primitive_matrices(branches, seq)?;
        m.y_prim = Some(y_prim);
        m.z_prim = Some(z_prim);
        m.incidence = None;
        m.bus_incidence = None;
        m.y_bus = None;
        m.z_bus = None;
        Ok(())
    }

    pub fn find_incidences_matrices(&mut self, seq: Sequence) -> Result<()> {
        let n_buses = self.n_buses;
        let m = &mut self.matrices[seq.index()];
        if m.y_prim.is_none() {
            return Err(Self::stage_order(
                seq,
                "find_incidences_matrices",
                "find_primitives_matrices",
            ));
        }
        let branches = m.branches.as_ref().ok_or_else(|| {
            Self::stage_order(seq, "find_incidences_matrices", "simplify_elements")
        })?;
        let (incidence, bus_incidence) = build_incidence_matrices(branches, n_buses)?;
        m.incidence = Some(incidence);
        m.bus_incidence = Some(bus_incidence);
        m.y_bus = None;
        m.z_bus = None;
        Ok(())
    }

    /// Builds Ybus and Zbus. Ybus is kept even when it turns out to be
    /// singular.
    pub fn calculate_buses_matrices(&mut self, seq: Sequence) -> Result<()> {
        let tol = self.opt.singular_tol;
        let m = &mut self.matrices[seq.index()];
        let (a_bus, y_prim) = match (&m.bus_incidence, &m.y_prim) {
            (Some(a), Some(y)) => (a, y),
            _ => {
                return Err(Self::stage_order(
                    seq,
                    "calculate_buses_matrices",
                    "find_incidences_matrices",
                ))
            }
        };
        let y_bus = make_ybus(a_bus, y_prim)?;
        log::debug!("{} Ybus:\n{}", seq, format_mat(&y_bus, false));
        m.z_bus = None;
        let z_bus = make_zbus(&y_bus, seq, tol);
        m.y_bus = Some(y_bus);
        m.z_bus = Some(z_bus?);
        Ok(())
    }

    /// Runs every stage for `seq`.
    pub fn assemble(&mut self, seq: Sequence) -> Result<()> {
        self.simplify_elements(seq)?;
        self.find_primitives_matrices(seq)?;
        self.find_incidences_matrices(seq)?;
        self.calculate_buses_matrices(seq)
    }

    pub fn assemble_all(&mut self) -> Result<()> {
        for seq in Sequence::ALL {
            self.assemble(seq)?;
        }
        Ok(())
    }

    pub fn simplified_elements(&self) -> Option<&[SimplifiedElement]> {
        self.simplified.as_ref().map(|(s, _)| s.as_slice())
    }

    /// Zero-sequence branches merged by endpoints.
    pub fn simplified_seq0_admittances(&self) -> Option<&[Immittance]> {
        self.simplified.as_ref().map(|(_, s0)| s0.as_slice())
    }

    pub fn number_of_branches(&self, seq: Sequence) -> Result<usize> {
        match &self.simplified {
            Some((s, s0)) => Ok(calculate_number_of_branches(s, &self.elements, s0, seq)),
            None => Err(Self::stage_order(seq, "number_of_branches", "simplify_elements")),
        }
    }

    pub fn branches(&self, seq: Sequence) -> Option<&[Immittance]> {
        self.matrices[seq.index()].branches.as_deref()
    }

    pub fn y_prim(&self, seq: Sequence) -> Option<&DMatrix<Complex64>> {
        self.matrices[seq.index()].y_prim.as_ref()
    }

    pub fn z_prim(&self, seq: Sequence) -> Option<&DMatrix<Complex64>> {
        self.matrices[seq.index()].z_prim.as_ref()
    }

    /// Branch incidence over buses `0..=n_buses`.
    pub fn incidence(&self, seq: Sequence) -> Option<&DMatrix<f64>> {
        self.matrices[seq.index()].incidence.as_ref()
    }

    /// Branch incidence over buses `1..=n_buses`.
    pub fn bus_incidence(&self, seq: Sequence) -> Option<&DMatrix<f64>> {
        self.matrices[seq.index()].bus_incidence.as_ref()
    }

    pub fn y_bus(&self, seq: Sequence) -> Option<&DMatrix<Complex64>> {
        self.matrices[seq.index()].y_bus.as_ref()
    }

    pub fn z_bus(&self, seq: Sequence) -> Option<&DMatrix<Complex64>> {
        self.matrices[seq.index()].z_bus.as_ref()
    }

    fn check_bus_count(&self, actual: usize) -> Result<()> {
        if actual != self.n_buses {
            return Err(NetworkError::Dimension(format!(
                "{} bus values for {} buses",
                actual, self.n_buses
            )));
        }
        Ok(())
    }

    /// Sets the pre-fault voltage of buses `1..=n_buses` and of every
    /// element terminal.
    pub fn define_bus_voltages_pre_fault(&mut self, v: &[Complex64]) -> Result<()> {
        self.check_bus_count(v.len())?;
        log::debug!("pre-fault bus voltages: {}", format_polar_vec(v));
        for (bus, &value) in self.buses[1..].iter_mut().zip(v) {
            bus.v.define_pre_fault_pu(value);
        }
        for element in self.elements.iter_mut() {
            let vt: Vec<Complex64> = element.terminals().iter().map(|&t| v[t - 1]).collect();
            element.define_voltages_pre_fault(&vt)?;
        }
        Ok(())
    }

    /// Sets the post-fault `[seq0, seq1, seq2]` voltage of buses
    /// `1..=n_buses` and of every element terminal.
    pub fn define_bus_voltages_post_fault(&mut self, v: &[[Complex64; 3]]) -> Result<()> {
        self.check_bus_count(v.len())?;
        if log::log_enabled!(log::Level::Debug) {
            for (s, seq) in Sequence::ALL.iter().enumerate() {
                let vs: Vec<Complex64> = v.iter().map(|vb| vb[s]).collect();
                log::debug!("post-fault {} bus voltages: {}", seq, format_polar_vec(&vs));
            }
        }
        for (bus, &[v0, v1, v2]) in self.buses[1..].iter_mut().zip(v) {
            bus.v.define_post_fault_pu(v0, v1, v2);
        }
        for element in self.elements.iter_mut() {
            let vt: Vec<[Complex64; 3]> = element.terminals().iter().map(|&t| v[t - 1]).collect();
            element.define_voltages_post_fault(&vt)?;
        }
        Ok(())
    }

    pub fn compute_internal_currents_pre_fault(&mut self) -> Result<()> {
        for element in self.elements.iter_mut() {
            element.compute_internal_currents_pre_fault()?;
            log::trace!(
                "{} terminal currents: {}",
                element.name(),
                format_rect_vec(&element.terminal_currents_pre_fault()?)
            );
        }
        Ok(())
    }

    pub fn compute_internal_currents_post_fault(&mut self) -> Result<()> {
        for element in self.elements.iter_mut() {
            element.compute_internal_currents_post_fault()?;
        }
        Ok(())
    }

    /// Sets the pre-fault EMF of the active element at `index` from the
    /// current it injects into its bus.
    pub fn calculate_internal_voltage(&mut self, index: usize, current_pu: Complex64) -> Result<()> {
        let n = self.elements.len();
        self.elements
            .get_mut(index)
            .ok_or_else(|| NetworkError::Dimension(format!("element {} of {}", index, n)))?
            .calculate_internal_voltage(current_pu)
    }

    /// Changes the voltage and power base of `bus` and rescales every bus
    /// and element so physical quantities stay the same.
    pub fn update_base(&mut self, bus: usize, v_base: f64, s_base: f64) -> Result<()> {
        if bus == 0 || bus > self.n_buses {
            return Err(NetworkError::UnknownBus(bus));
        }
        log::debug!("bus {} base: {} V, {} VA", bus, v_base, s_base);
        self.bases.update_base(bus, v_base, s_base)?;
        self.notify_rebase()
    }

    fn notify_rebase(&mut self) -> Result<()> {
        for bus in self.buses.iter_mut() {
            bus.change_base(&self.bases)?;
        }
        for element in self.elements.iter_mut() {
            element.change_base(&self.bases)?;
        }
        self.reset();
        Ok(())
    }

    /// Propagates voltage bases outward from the reference bus through the
    /// winding ratios of transformers, then rebases every bus and element.
    ///
    /// Each element is traversed once. A bus reached again through a loop
    /// keeps its first base; a mismatch beyond `ratio_tol` is logged.
    pub fn assign_bases(&mut self) -> Result<()> {
        let v_ref = self.bases.get(self.reference_bus)?.v_base();
        let s_base = self.opt.s_base;

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.n_buses + 1];
        for (e, element) in self.elements.iter().enumerate() {
            for &t in element.terminals() {
                adjacency[t].push(e);
            }
        }

        let mut v_base: Vec<Option<f64>> = vec![None; self.n_buses + 1];
        v_base[self.reference_bus] = Some(v_ref);
        let mut visited = vec![false; self.elements.len()];
        let mut queue = VecDeque::from([self.reference_bus]);

        while let Some(bus) = queue.pop_front() {
            let v = v_base[bus].unwrap_or(v_ref);
            for &e in &adjacency[bus] {
                if visited[e] {
                    continue;
                }
                visited[e] = true;

                let element = &self.elements[e];
                let terminals = element.terminals();
                let from = terminals.iter().position(|&t| t == bus).unwrap_or(0);
                for (j, &other) in terminals.iter().enumerate() {
                    if other == bus {
                        continue;
                    }
                    let ratio = if element.is_transformer() {
                        let wv = element.winding_voltages();
                        wv[j] / wv[from]
                    } else {
                        1.0
                    };
                    let candidate = v * ratio;
                    match v_base[other] {
                        Some(existing) => {
                            if ((existing - candidate) / existing).abs() > self.opt.ratio_tol {
                                log::warn!(
                                    "bus {}: base {} V through {} disagrees with {} V",
                                    other,
                                    candidate,
                                    element.name(),
                                    existing
                                );
                            }
                        }
                        None => {
                            v_base[other] = Some(candidate);
                            queue.push_back(other);
                        }
                    }
                }
            }
        }

        for (bus, v) in v_base.iter().enumerate().skip(1) {
            let v = v.ok_or(NetworkError::Disconnected(bus))?;
            log::debug!("bus {} base: {} V", bus, v);
            self.bases.update_base(bus, v, s_base)?;
        }
        self.notify_rebase()
    }
}
