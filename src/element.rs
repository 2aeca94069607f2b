use crate::error::{NetworkError, Result};
use crate::immittance::Immittance;
use crate::math::{admittance, is_inf};
use crate::pubase::{BaseRegistry, PuBase, Rebase};
use crate::relations::{
    calculate_central_v_star, calculate_current, delta2star, equivalent_y_series, star2delta,
};
use crate::sequence::Sequence;
use crate::variable::{Component, ElectricalVariable};
use crate::winding::{self, Node, Winding, WindingRole};
use derive_builder::Builder;
use num_complex::Complex64;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    TransmissionLine,
    TransmissionLinePi,
    Transformer2W,
    Transformer3W,
    GroundingTransformer,
    Shunt,
    SynchronousGenerator,
    SynchronousMotor,
    NetworkEquivalent,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementKind::TransmissionLine => "line",
            ElementKind::TransmissionLinePi => "pi line",
            ElementKind::Transformer2W => "2-winding transformer",
            ElementKind::Transformer3W => "3-winding transformer",
            ElementKind::GroundingTransformer => "grounding transformer",
            ElementKind::Shunt => "shunt",
            ElementKind::SynchronousGenerator => "generator",
            ElementKind::SynchronousMotor => "motor",
            ElementKind::NetworkEquivalent => "network equivalent",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Zero-sequence topology depends on winding connections.
    pub has_zero_seq_topology_rule: bool,
    /// Carries an internal EMF behind its positive-sequence branch.
    pub is_active_source: bool,
}

/// Line from per-kilometre series impedances in ohm.
#[derive(Debug, Clone, PartialEq)]
pub struct LineParams {
    pub z_ohm_per_km: [Complex64; 3],
    pub length_km: f64,
    pub bus_m: usize,
    pub bus_n: usize,
}

/// Line with half of its shunt admittance lumped at each end.
#[derive(Debug, Clone, PartialEq)]
pub struct PiLineParams {
    pub z_ohm_per_km: [Complex64; 3],
    pub y_shunt_siemens_per_km: [Complex64; 3],
    pub length_km: f64,
    pub bus_m: usize,
    pub bus_n: usize,
}

#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into))]
pub struct Transformer2WParams {
    /// Series impedance in pu of the primary nameplate base.
    pub z_pu: Complex64,
    pub bus_m: usize,
    pub bus_n: usize,
    pub v_nom_pri_kv: f64,
    pub v_nom_sec_kv: f64,
    pub s_nom_mva: f64,
    pub primary: Winding,
    pub secondary: Winding,
    /// Primary to secondary phase shift in degrees.
    #[builder(default)]
    pub phase_shift_deg: f64,
    #[builder(default = "1.0")]
    pub tap_primary: f64,
    #[builder(default = "1.0")]
    pub tap_secondary: f64,
}

#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into))]
pub struct Transformer3WParams {
    /// Primary-secondary leakage impedance (pu).
    pub z_ps_pu: Complex64,
    /// Primary-tertiary leakage impedance (pu).
    pub z_pt_pu: Complex64,
    /// Secondary-tertiary leakage impedance (pu).
    pub z_st_pu: Complex64,
    pub bus_m: usize,
    pub bus_n: usize,
    pub bus_p: usize,
    pub v_nom_pri_kv: f64,
    pub v_nom_sec_kv: f64,
    pub v_nom_ter_kv: f64,
    pub s_nom_mva: f64,
    pub primary: Winding,
    pub secondary: Winding,
    pub tertiary: Winding,
    #[builder(default)]
    pub phase_shift_pri_sec_deg: f64,
    #[builder(default)]
    pub phase_shift_pri_ter_deg: f64,
    #[builder(default = "[1.0; 3]")]
    pub taps: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundingTransformerParams {
    pub z_pu: Complex64,
    pub zn_pu: Complex64,
    pub bus: usize,
    pub v_nom_kv: f64,
    pub s_nom_mva: f64,
}

/// Admittance to ground per sequence, in siemens.
#[derive(Debug, Clone, PartialEq)]
pub struct ShuntParams {
    pub y_siemens: [Complex64; 3],
    pub bus: usize,
}

/// Synchronous machine impedances per sequence, in pu of the nameplate.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineParams {
    pub z_pu: [Complex64; 3],
    pub bus: usize,
    pub v_nom_kv: f64,
    pub s_nom_mva: f64,
    pub winding: Winding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkEquivalentParams {
    pub z_pu: [Complex64; 3],
    pub bus: usize,
    pub v_nom_kv: f64,
    pub s_nom_mva: f64,
}

impl NetworkEquivalentParams {
    /// Thevenin impedances from the three-phase and single-phase
    /// short-circuit powers (MVA):
    ///
    /// ```text
    /// z1 = z2 = 1 / conj(s3)
    /// z0 = 3 / conj(s1) − 2 / conj(s3)
    /// ```
    pub fn from_sc_capacity(
        s_sc3_mva: Complex64,
        s_sc1_mva: Complex64,
        bus: usize,
        v_nom_kv: f64,
        s_nom_mva: f64,
    ) -> Self {
        let s3 = (s_sc3_mva / s_nom_mva).conj();
        let s1 = (s_sc1_mva / s_nom_mva).conj();
        let z1 = s3.inv();
        let z0 = 3.0 / s1 - 2.0 / s3;
        Self {
            z_pu: [z0, z1, z1],
            bus,
            v_nom_kv,
            s_nom_mva,
        }
    }
}

/// Impedance base of a nameplate rating in kV and MVA.
fn nameplate_z_base(v_kv: f64, s_mva: f64) -> f64 {
    (v_kv * 1e3).powi(2) / (s_mva * 1e6)
}

/// Per-unit factor converting a nameplate admittance to the bus base.
fn to_bus_base(base: &PuBase, v_kv: f64, s_mva: f64) -> f64 {
    base.z_base() / nameplate_z_base(v_kv, s_mva)
}

/// A physical network device with one, two or three terminals.
///
/// Branches are stored positionally: position `k` of every sequence list
/// refers to the same physical branch, and zero branches are kept so the
/// positions stay aligned. All branch admittances are expressed on the
/// base of the first terminal's bus.
#[derive(Debug, Clone)]
pub struct Element {
    kind: ElementKind,
    terminals: Vec<usize>,
    capabilities: Capabilities,

    winding_voltages: Vec<f64>,
    phase_shifts_deg: Vec<f64>,

    branches: [Vec<Immittance>; 3],

    v_terminal: Vec<ElectricalVariable>,
    i_terminal: Vec<ElectricalVariable>,
    i_branch: Vec<ElectricalVariable>,
    emf: Option<ElectricalVariable>,
}

impl Element {
    fn build(
        bases: &mut BaseRegistry,
        kind: ElementKind,
        terminals: Vec<usize>,
        capabilities: Capabilities,
        branches: [Vec<Immittance>; 3],
    ) -> Result<Self> {
        let mut v_terminal = Vec::with_capacity(terminals.len());
        let mut i_terminal = Vec::with_capacity(terminals.len());
        for &bus in &terminals {
            let base = bases.base(bus)?;
            v_terminal.push(ElectricalVariable::voltage(&base));
            i_terminal.push(ElectricalVariable::current(&base));
        }
        let base = bases.base(terminals[0])?;
        let i_branch = branches[Sequence::Positive.index()]
            .iter()
            .map(|_| ElectricalVariable::current(&base))
            .collect();
        let emf = if capabilities.is_active_source {
            Some(ElectricalVariable::voltage(&base))
        } else {
            None
        };

        let element = Self {
            kind,
            terminals,
            capabilities,
            winding_voltages: Vec::new(),
            phase_shifts_deg: Vec::new(),
            branches,
            v_terminal,
            i_terminal,
            i_branch,
            emf,
        };
        log::trace!("{} created", element.name());
        Ok(element)
    }

    fn check_terminals(terminals: &[usize]) -> Result<()> {
        if terminals.is_empty() || terminals.len() > 3 {
            return Err(NetworkError::InvalidTerminals {
                terminals: terminals.to_vec(),
                reason: "an element has one to three terminals",
            });
        }
        if terminals.contains(&0) {
            return Err(NetworkError::InvalidTerminals {
                terminals: terminals.to_vec(),
                reason: "bus 0 is the ground reference",
            });
        }
        for (i, t) in terminals.iter().enumerate() {
            if terminals[..i].contains(t) {
                return Err(NetworkError::InvalidTerminals {
                    terminals: terminals.to_vec(),
                    reason: "terminals must be distinct buses",
                });
            }
        }
        Ok(())
    }

    pub fn transmission_line(bases: &mut BaseRegistry, params: &LineParams) -> Result<Self> {
        let terminals = vec![params.bus_m, params.bus_n];
        Self::check_terminals(&terminals)?;
        let base = bases.base(params.bus_m)?;

        let branches = Sequence::ALL.map(|seq| {
            let z_ohm = params.z_ohm_per_km[seq.index()] * params.length_km;
            let z_pu = z_ohm / base.z_base();
            vec![Immittance::from_impedance(z_pu, &base, params.bus_m, params.bus_n)]
        });
        Self::build(
            bases,
            ElementKind::TransmissionLine,
            terminals,
            Capabilities::default(),
            branches,
        )
    }

    /// Pi-model line. Positions are `[m-n series, m shunt, n shunt]`.
    pub fn transmission_line_pi(bases: &mut BaseRegistry, params: &PiLineParams) -> Result<Self> {
        let terminals = vec![params.bus_m, params.bus_n];
        Self::check_terminals(&terminals)?;
        let base = bases.base(params.bus_m)?;

        let branches = Sequence::ALL.map(|seq| {
            let z_pu = params.z_ohm_per_km[seq.index()] * params.length_km / base.z_base();
            let y_half =
                params.y_shunt_siemens_per_km[seq.index()] * params.length_km * base.z_base() / 2.0;
            vec![
                Immittance::from_impedance(z_pu, &base, params.bus_m, params.bus_n),
                Immittance::new(y_half, &base, params.bus_m, 0),
                Immittance::new(y_half, &base, params.bus_n, 0),
            ]
        });
        Self::build(
            bases,
            ElementKind::TransmissionLinePi,
            terminals,
            Capabilities::default(),
            branches,
        )
    }

    pub fn transformer_2w(bases: &mut BaseRegistry, params: &Transformer2WParams) -> Result<Self> {
        let terminals = vec![params.bus_m, params.bus_n];
        Self::check_terminals(&terminals)?;
        let base = bases.base(params.bus_m)?;
        let v_pri_kv = params.v_nom_pri_kv * params.tap_primary;
        let k = to_bus_base(&base, v_pri_kv, params.s_nom_mva);
        let (m, n) = (params.bus_m, params.bus_n);

        let y = admittance(params.z_pu);
        let series = Immittance::new(y * k, &base, m, n);

        let template = winding::template_2w(params.primary.role(), params.secondary.role());
        let windings = [params.primary, params.secondary];
        let seq0 = winding::zero_seq_branches(template, &windings, &[2.0 * y, 2.0 * y])
            .into_iter()
            .map(|br| match br.ends {
                Some((a, b)) => Immittance::new(
                    br.y * k,
                    &base,
                    node_bus(&terminals, a),
                    node_bus(&terminals, b),
                ),
                None => Immittance::zero(&base, m, n),
            })
            .collect();

        let capabilities = Capabilities {
            has_zero_seq_topology_rule: true,
            is_active_source: false,
        };
        let mut element = Self::build(
            bases,
            ElementKind::Transformer2W,
            terminals,
            capabilities,
            [seq0, vec![series], vec![series]],
        )?;
        element.winding_voltages = vec![
            v_pri_kv * 1e3,
            params.v_nom_sec_kv * params.tap_secondary * 1e3,
        ];
        element.phase_shifts_deg = vec![0.0, params.phase_shift_deg];
        Ok(element)
    }

    /// Three-winding transformer. Positions are `[m-n, n-p, m-p]`.
    pub fn transformer_3w(bases: &mut BaseRegistry, params: &Transformer3WParams) -> Result<Self> {
        let terminals = vec![params.bus_m, params.bus_n, params.bus_p];
        Self::check_terminals(&terminals)?;
        let base = bases.base(params.bus_m)?;
        let v_kv = [params.v_nom_pri_kv, params.v_nom_sec_kv, params.v_nom_ter_kv];
        let v_pri_kv = v_kv[0] * params.taps[0];
        let k = to_bus_base(&base, v_pri_kv, params.s_nom_mva);

        let arms = star_arms(params.z_ps_pu, params.z_pt_pu, params.z_st_pu);
        let (y_mn, y_np, y_mp) = star2delta(arms[0], arms[1], arms[2]);
        let seq1: Vec<Immittance> = winding::POSITIONS_3W
            .iter()
            .zip([y_mn, y_np, y_mp])
            .map(|(&(i, j), y)| Immittance::new(y * k, &base, terminals[i], terminals[j]))
            .collect();

        let roles = [params.primary.role(), params.secondary.role(), params.tertiary.role()];
        let template = winding::template_3w(roles[0], roles[1], roles[2]);
        let windings = [params.primary, params.secondary, params.tertiary];
        let seq0 = winding::zero_seq_branches(template, &windings, &arms)
            .into_iter()
            .zip(winding::POSITIONS_3W)
            .map(|(br, (i, j))| match br.ends {
                Some((a, b)) => Immittance::new(
                    br.y * k,
                    &base,
                    node_bus(&terminals, a),
                    node_bus(&terminals, b),
                ),
                None => Immittance::zero(&base, terminals[i], terminals[j]),
            })
            .collect();

        let capabilities = Capabilities {
            has_zero_seq_topology_rule: true,
            is_active_source: false,
        };
        let mut element = Self::build(
            bases,
            ElementKind::Transformer3W,
            terminals,
            capabilities,
            [seq0, seq1.clone(), seq1],
        )?;
        element.winding_voltages = v_kv
            .iter()
            .zip(params.taps)
            .map(|(v, tap)| v * tap * 1e3)
            .collect();
        element.phase_shifts_deg = vec![
            0.0,
            params.phase_shift_pri_sec_deg,
            params.phase_shift_pri_ter_deg,
        ];
        Ok(element)
    }

    /// Zig-zag or wye-delta grounding bank: a zero-sequence path to ground
    /// through `z + 3·zn`, open in the other sequences.
    pub fn grounding_transformer(
        bases: &mut BaseRegistry,
        params: &GroundingTransformerParams,
    ) -> Result<Self> {
        let terminals = vec![params.bus];
        Self::check_terminals(&terminals)?;
        let base = bases.base(params.bus)?;
        let k = to_bus_base(&base, params.v_nom_kv, params.s_nom_mva);

        let y0 = admittance(params.z_pu + 3.0 * params.zn_pu) * k;
        let branches = [
            vec![Immittance::new(y0, &base, params.bus, 0)],
            vec![Immittance::zero(&base, params.bus, 0)],
            vec![Immittance::zero(&base, params.bus, 0)],
        ];
        let capabilities = Capabilities {
            has_zero_seq_topology_rule: true,
            is_active_source: false,
        };
        Self::build(
            bases,
            ElementKind::GroundingTransformer,
            terminals,
            capabilities,
            branches,
        )
    }

    pub fn shunt(bases: &mut BaseRegistry, params: &ShuntParams) -> Result<Self> {
        let terminals = vec![params.bus];
        Self::check_terminals(&terminals)?;
        let base = bases.base(params.bus)?;

        let branches = Sequence::ALL.map(|seq| {
            let y_pu = params.y_siemens[seq.index()] * base.z_base();
            vec![Immittance::new(y_pu, &base, params.bus, 0)]
        });
        Self::build(
            bases,
            ElementKind::Shunt,
            terminals,
            Capabilities::default(),
            branches,
        )
    }

    pub fn synchronous_generator(bases: &mut BaseRegistry, params: &MachineParams) -> Result<Self> {
        Self::machine(bases, ElementKind::SynchronousGenerator, params)
    }

    pub fn synchronous_motor(bases: &mut BaseRegistry, params: &MachineParams) -> Result<Self> {
        Self::machine(bases, ElementKind::SynchronousMotor, params)
    }

    fn machine(bases: &mut BaseRegistry, kind: ElementKind, params: &MachineParams) -> Result<Self> {
        let terminals = vec![params.bus];
        Self::check_terminals(&terminals)?;
        let base = bases.base(params.bus)?;
        let k = to_bus_base(&base, params.v_nom_kv, params.s_nom_mva);
        let bus = params.bus;

        let y0 = match params.winding.role() {
            WindingRole::Grounded => {
                equivalent_y_series(admittance(params.z_pu[0]), params.winding.neutral_path())
            }
            WindingRole::Ungrounded | WindingRole::Delta => Complex64::default(),
        };
        let branches = [
            vec![Immittance::new(y0 * k, &base, bus, 0)],
            vec![Immittance::new(admittance(params.z_pu[1]) * k, &base, bus, 0)],
            vec![Immittance::new(admittance(params.z_pu[2]) * k, &base, bus, 0)],
        ];
        let capabilities = Capabilities {
            has_zero_seq_topology_rule: true,
            is_active_source: true,
        };
        Self::build(bases, kind, terminals, capabilities, branches)
    }

    pub fn network_equivalent(
        bases: &mut BaseRegistry,
        params: &NetworkEquivalentParams,
    ) -> Result<Self> {
        let terminals = vec![params.bus];
        Self::check_terminals(&terminals)?;
        let base = bases.base(params.bus)?;
        let k = to_bus_base(&base, params.v_nom_kv, params.s_nom_mva);

        let branches = Sequence::ALL.map(|seq| {
            let y = admittance(params.z_pu[seq.index()]) * k;
            vec![Immittance::new(y, &base, params.bus, 0)]
        });
        let capabilities = Capabilities {
            has_zero_seq_topology_rule: false,
            is_active_source: true,
        };
        Self::build(
            bases,
            ElementKind::NetworkEquivalent,
            terminals,
            capabilities,
            branches,
        )
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn name(&self) -> String {
        let buses: Vec<String> = self.terminals.iter().map(|t| t.to_string()).collect();
        format!("{} {}", self.kind, buses.join("-"))
    }

    pub fn terminals(&self) -> &[usize] {
        &self.terminals
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Rated winding voltages (V, taps applied) of transformers; empty for
    /// other elements.
    pub fn winding_voltages(&self) -> &[f64] {
        &self.winding_voltages
    }

    pub fn phase_shifts_deg(&self) -> &[f64] {
        &self.phase_shifts_deg
    }

    pub fn is_transformer(&self) -> bool {
        !self.winding_voltages.is_empty()
    }

    /// Positional branches of one sequence network, zero branches included.
    pub fn admittance_representation(&self, seq: Sequence) -> &[Immittance] {
        &self.branches[seq.index()]
    }

    pub fn voltage(&self, terminal: usize) -> Option<&ElectricalVariable> {
        self.v_terminal.get(terminal)
    }

    pub fn current(&self, terminal: usize) -> Option<&ElectricalVariable> {
        self.i_terminal.get(terminal)
    }

    pub fn branch_current(&self, position: usize) -> Option<&ElectricalVariable> {
        self.i_branch.get(position)
    }

    pub fn emf(&self) -> Option<&ElectricalVariable> {
        self.emf.as_ref()
    }

    fn check_count(&self, actual: usize) -> Result<()> {
        if actual != self.terminals.len() {
            return Err(NetworkError::TerminalCount {
                element: self.name(),
                expected: self.terminals.len(),
                actual,
            });
        }
        Ok(())
    }

    /// Sets the pre-fault voltage of every terminal, in terminal order.
    pub fn define_voltages_pre_fault(&mut self, v: &[Complex64]) -> Result<()> {
        self.check_count(v.len())?;
        for (var, &value) in self.v_terminal.iter_mut().zip(v) {
            var.define_pre_fault_pu(value);
        }
        Ok(())
    }

    /// Sets the post-fault `[seq0, seq1, seq2]` voltages of every terminal.
    pub fn define_voltages_post_fault(&mut self, v: &[[Complex64; 3]]) -> Result<()> {
        self.check_count(v.len())?;
        for (var, &[v0, v1, v2]) in self.v_terminal.iter_mut().zip(v) {
            var.define_post_fault_pu(v0, v1, v2);
        }
        Ok(())
    }

    /// Back-calculates the internal EMF of an active element from its
    /// pre-fault terminal voltage and the current it injects into the bus:
    ///
    /// ```text
    /// E = I / y1 + V
    /// ```
    ///
    /// The EMF is frozen and drives the positive sequence after the fault.
    /// Passive elements are left untouched.
    pub fn calculate_internal_voltage(&mut self, impressed_current_pu: Complex64) -> Result<()> {
        if self.emf.is_none() {
            return Ok(());
        }
        let y1 = self.branches[Sequence::Positive.index()][0].y_pu();
        let v = self.v_terminal[0].pre()?.seq1().pu().rec();
        let e = impressed_current_pu / y1 + v;
        if let Some(emf) = self.emf.as_mut() {
            emf.define_pre_fault_pu(e);
            emf.define_post_fault_pu(Complex64::default(), e, Complex64::default());
        }
        Ok(())
    }

    /// Voltage at `bus` (zero for ground) from per-terminal values.
    fn bus_voltage(&self, v: &[Complex64], bus: usize) -> Complex64 {
        self.terminals
            .iter()
            .position(|&t| t == bus)
            .map(|i| v[i])
            .unwrap_or_default()
    }

    /// Source voltage behind branch `position` in sequence `seq`.
    fn source_voltage(&self, seq: Sequence, position: usize, frame_post: bool) -> Result<Complex64> {
        match (&self.emf, seq, position) {
            (Some(emf), Sequence::Positive, 0) => {
                let view = if frame_post { emf.post() } else { emf.pre() };
                match view {
                    Ok(view) => Ok(view.seq1().pu().rec()),
                    // EMF not calculated yet, source shorted
                    Err(NetworkError::UndefinedValue(_)) => Ok(Complex64::default()),
                    Err(err) => Err(err),
                }
            }
            _ => Ok(Complex64::default()),
        }
    }

    /// Branch and terminal currents of one sequence network.
    fn sequence_currents(
        &self,
        seq: Sequence,
        v: &[Complex64],
        frame_post: bool,
    ) -> Result<(Vec<Complex64>, Vec<Complex64>)> {
        let branches = &self.branches[seq.index()];

        let mut i_branch = Vec::with_capacity(branches.len());
        for (k, br) in branches.iter().enumerate() {
            let v_from = self.bus_voltage(v, br.bus_m());
            let v_to = self.bus_voltage(v, br.bus_n());
            let e = self.source_voltage(seq, k, frame_post)?;
            let i = if br.is_zero() {
                Complex64::default()
            } else {
                calculate_current(br.y_pu(), v_from, v_to + e)
            };
            i_branch.push(i);
        }

        if let Some(i_terminal) = self.star_point_currents(branches, v) {
            return Ok((i_branch, i_terminal));
        }

        let i_terminal = self
            .terminals
            .iter()
            .map(|&bus| {
                branches
                    .iter()
                    .zip(&i_branch)
                    .map(|(br, &i)| {
                        if br.bus_m() == bus {
                            i
                        } else if br.bus_n() == bus {
                            -i
                        } else {
                            Complex64::default()
                        }
                    })
                    .sum()
            })
            .collect();
        Ok((i_branch, i_terminal))
    }

    /// Terminal currents of a three-terminal delta through its equivalent
    /// star. `None` unless the branches are exactly `[m-n, n-p, m-p]` and
    /// the star arms are finite.
    fn star_point_currents(
        &self,
        branches: &[Immittance],
        v: &[Complex64],
    ) -> Option<Vec<Complex64>> {
        if self.terminals.len() != 3 || branches.len() != 3 || self.emf.is_some() {
            return None;
        }
        let t = &self.terminals;
        let delta = [(t[0], t[1]), (t[1], t[2]), (t[0], t[2])];
        if branches.iter().zip(delta).any(|(br, ends)| br.endpoints() != ends) {
            return None;
        }
        let (y_m, y_n, y_p) =
            delta2star(branches[0].y_pu(), branches[1].y_pu(), branches[2].y_pu());
        let arms = [y_m, y_n, y_p];
        if arms.iter().any(|&y| is_inf(y)) {
            return None;
        }
        let node_v = [v[0], v[1], v[2]];
        let v_c = calculate_central_v_star(node_v, arms);
        Some(
            (0..3)
                .map(|t| calculate_current(arms[t], node_v[t], v_c))
                .collect(),
        )
    }

    /// Positive-sequence currents from the pre-fault terminal voltages.
    pub fn compute_internal_currents_pre_fault(&mut self) -> Result<()> {
        let v: Vec<Complex64> = self
            .v_terminal
            .iter()
            .map(|var| -> Result<Complex64> { Ok(var.pre()?.seq1().pu().rec()) })
            .collect::<Result<_>>()?;
        let (i_branch, i_terminal) = self.sequence_currents(Sequence::Positive, &v, false)?;

        for (var, i) in self.i_branch.iter_mut().zip(i_branch) {
            var.define_pre_fault_pu(i);
        }
        for (var, i) in self.i_terminal.iter_mut().zip(i_terminal) {
            var.define_pre_fault_pu(i);
        }
        Ok(())
    }

    /// Currents of all three sequence networks from the post-fault terminal
    /// voltages.
    pub fn compute_internal_currents_post_fault(&mut self) -> Result<()> {
        let mut branch_seq = vec![[Complex64::default(); 3]; self.i_branch.len()];
        let mut terminal_seq = vec![[Complex64::default(); 3]; self.terminals.len()];

        for seq in Sequence::ALL {
            let v: Vec<Complex64> = self
                .v_terminal
                .iter()
                .map(|var| -> Result<Complex64> {
                    Ok(var.post()?.component(Component::Seq(seq)).pu().rec())
                })
                .collect::<Result<_>>()?;
            let (i_branch, i_terminal) = self.sequence_currents(seq, &v, true)?;
            for (k, i) in i_branch.into_iter().enumerate() {
                branch_seq[k][seq.index()] = i;
            }
            for (t, i) in i_terminal.into_iter().enumerate() {
                terminal_seq[t][seq.index()] = i;
            }
        }

        for (var, [i0, i1, i2]) in self.i_branch.iter_mut().zip(branch_seq) {
            var.define_post_fault_pu(i0, i1, i2);
        }
        for (var, [i0, i1, i2]) in self.i_terminal.iter_mut().zip(terminal_seq) {
            var.define_post_fault_pu(i0, i1, i2);
        }
        Ok(())
    }

    /// Pre-fault terminal currents (pu), in terminal order.
    pub fn terminal_currents_pre_fault(&self) -> Result<Vec<Complex64>> {
        self.i_terminal
            .iter()
            .map(|var| -> Result<Complex64> { Ok(var.pre()?.seq1().pu().rec()) })
            .collect()
    }

    /// Post-fault `[seq0, seq1, seq2]` terminal currents (pu).
    pub fn terminal_currents_post_fault(&self) -> Result<Vec<[Complex64; 3]>> {
        self.i_terminal
            .iter()
            .map(|var| -> Result<[Complex64; 3]> {
                let view = var.post()?;
                Ok([
                    view.seq0().pu().rec(),
                    view.seq1().pu().rec(),
                    view.seq2().pu().rec(),
                ])
            })
            .collect()
    }
}

impl Rebase for Element {
    fn change_base(&mut self, bases: &BaseRegistry) -> Result<()> {
        for list in self.branches.iter_mut() {
            for br in list.iter_mut() {
                br.change_base(bases)?;
            }
        }
        for var in self
            .v_terminal
            .iter_mut()
            .chain(self.i_terminal.iter_mut())
            .chain(self.i_branch.iter_mut())
            .chain(self.emf.iter_mut())
        {
            var.change_base(bases)?;
        }
        Ok(())
    }
}

fn node_bus(terminals: &[usize], node: Node) -> usize {
    match node {
        Node::Terminal(i) => terminals[i],
        Node::Ground => 0,
    }
}

/// Star arms `[y_m, y_n, y_p]` of a three-winding transformer from its
/// pairwise leakage impedances.
pub fn star_arms(z_ps: Complex64, z_pt: Complex64, z_st: Complex64) -> [Complex64; 3] {
    [
        admittance(0.5 * (z_ps + z_pt - z_st)),
        admittance(0.5 * (z_ps - z_pt + z_st)),
        admittance(0.5 * (-z_ps + z_pt + z_st)),
    ]
}
