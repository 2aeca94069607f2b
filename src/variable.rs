use crate::error::{NetworkError, Result};
use crate::math::{is_zero, rot_a, rot_a2};
use crate::pubase::{BaseRegistry, PuBase, Rebase};
use crate::sequence::Sequence;
use num_complex::Complex64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Voltage,
    Current,
}

impl VariableKind {
    fn base_value(self, base: &PuBase) -> f64 {
        match self {
            VariableKind::Voltage => base.v_base(),
            VariableKind::Current => base.i_base(),
        }
    }
}

/// Time frame of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    PreFault,
    PostFault,
}

/// Phase or sequence component of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    A,
    B,
    C,
    Seq(Sequence),
}

/// Unit domain of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    PerUnit,
    Physical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    Rectangular,
    Magnitude,
    Angle,
}

/// Result of [`ElectricalVariable::request_value`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    Rectangular(Complex64),
    Magnitude(f64),
    Angle(f64),
}

/// Per-unit voltage or current at one terminal, holding a pre-fault value
/// and the three post-fault sequence values.
///
/// Values are stored against the base of `bus` as it was when they were
/// defined; [`Rebase::change_base`] rescales them when that base moves.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectricalVariable {
    kind: VariableKind,
    bus: usize,
    value_base: f64,
    pre_fault_pu: Option<Complex64>,
    post_fault_pu: Option<[Complex64; 3]>,
}

impl ElectricalVariable {
    pub fn new(kind: VariableKind, base: &PuBase) -> Self {
        Self {
            kind,
            bus: base.bus(),
            value_base: kind.base_value(base),
            pre_fault_pu: None,
            post_fault_pu: None,
        }
    }

    pub fn voltage(base: &PuBase) -> Self {
        Self::new(VariableKind::Voltage, base)
    }

    pub fn current(base: &PuBase) -> Self {
        Self::new(VariableKind::Current, base)
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn bus(&self) -> usize {
        self.bus
    }

    /// Base value (V or A) the stored per-unit values refer to.
    pub fn value_base(&self) -> f64 {
        self.value_base
    }

    pub fn define_pre_fault_pu(&mut self, value: Complex64) {
        self.pre_fault_pu = Some(value);
    }

    pub fn define_post_fault_pu(&mut self, seq0: Complex64, seq1: Complex64, seq2: Complex64) {
        self.post_fault_pu = Some([seq0, seq1, seq2]);
    }

    pub fn define_pre_fault_si(&mut self, value: Complex64) {
        self.pre_fault_pu = Some(value / self.value_base);
    }

    pub fn define_post_fault_si(&mut self, seq0: Complex64, seq1: Complex64, seq2: Complex64) {
        let b = self.value_base;
        self.post_fault_pu = Some([seq0 / b, seq1 / b, seq2 / b]);
    }

    pub fn pre_fault_pu(&self) -> Option<Complex64> {
        self.pre_fault_pu
    }

    pub fn post_fault_pu(&self) -> Option<[Complex64; 3]> {
        self.post_fault_pu
    }

    /// Pre-fault frame. The pre-fault state is balanced, so only the
    /// positive sequence is populated.
    pub fn pre(&self) -> Result<FrameView<'_>> {
        let v = self
            .pre_fault_pu
            .ok_or(NetworkError::UndefinedValue("pre-fault"))?;
        Ok(FrameView {
            var: self,
            seq: [Complex64::default(), v, Complex64::default()],
        })
    }

    pub fn post(&self) -> Result<FrameView<'_>> {
        let seq = self
            .post_fault_pu
            .ok_or(NetworkError::UndefinedValue("post-fault"))?;
        Ok(FrameView { var: self, seq })
    }

    /// Runs the four projection stages in order.
    pub fn request_value(
        &self,
        frame: Frame,
        component: Component,
        domain: Domain,
        notation: Notation,
    ) -> Result<Quantity> {
        let frame = match frame {
            Frame::PreFault => self.pre()?,
            Frame::PostFault => self.post()?,
        };
        let value = match domain {
            Domain::PerUnit => frame.component(component).pu(),
            Domain::Physical => frame.component(component).si(),
        };
        Ok(match notation {
            Notation::Rectangular => Quantity::Rectangular(value.rec()),
            Notation::Magnitude => Quantity::Magnitude(value.mag()),
            Notation::Angle => Quantity::Angle(value.ang()),
        })
    }
}

impl Rebase for ElectricalVariable {
    fn change_base(&mut self, bases: &BaseRegistry) -> Result<()> {
        let new_base = self.kind.base_value(bases.get(self.bus)?);
        let ratio = self.value_base / new_base;
        if let Some(v) = self.pre_fault_pu.as_mut() {
            *v *= ratio;
        }
        if let Some(seq) = self.post_fault_pu.as_mut() {
            seq.iter_mut().for_each(|v| *v *= ratio);
        }
        self.value_base = new_base;
        Ok(())
    }
}

/// First projection stage: the selected time frame as `[seq0, seq1, seq2]`.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    var: &'a ElectricalVariable,
    seq: [Complex64; 3],
}

impl<'a> FrameView<'a> {
    pub fn component(self, component: Component) -> ComponentView<'a> {
        let [v0, v1, v2] = self.seq;
        let value_pu = match component {
            Component::A => v0 + v1 + v2,
            Component::B => v0 + v1 * rot_a2() + v2 * rot_a(),
            Component::C => v0 + v1 * rot_a() + v2 * rot_a2(),
            Component::Seq(s) => self.seq[s.index()],
        };
        ComponentView {
            var: self.var,
            value_pu,
        }
    }

    pub fn a(self) -> ComponentView<'a> {
        self.component(Component::A)
    }
    pub fn b(self) -> ComponentView<'a> {
        self.component(Component::B)
    }
    pub fn c(self) -> ComponentView<'a> {
        self.component(Component::C)
    }
    pub fn seq0(self) -> ComponentView<'a> {
        self.component(Component::Seq(Sequence::Zero))
    }
    pub fn seq1(self) -> ComponentView<'a> {
        self.component(Component::Seq(Sequence::Positive))
    }
    pub fn seq2(self) -> ComponentView<'a> {
        self.component(Component::Seq(Sequence::Negative))
    }
}

/// Second projection stage: one phase or sequence value in per-unit.
#[derive(Debug, Clone, Copy)]
pub struct ComponentView<'a> {
    var: &'a ElectricalVariable,
    value_pu: Complex64,
}

impl<'a> ComponentView<'a> {
    pub fn pu(self) -> Value {
        Value(self.value_pu)
    }

    pub fn si(self) -> Value {
        Value(self.value_pu * self.var.value_base)
    }
}

/// Final projection stage: a value in the selected unit domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Value(Complex64);

impl Value {
    pub fn rec(self) -> Complex64 {
        self.0
    }

    pub fn mag(self) -> f64 {
        self.0.norm()
    }

    /// Angle in radians; zero for a zero value.
    pub fn ang(self) -> f64 {
        if is_zero(self.0) {
            0.0
        } else {
            self.0.arg()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;
    use anyhow::Result;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn voltage(bases: &mut BaseRegistry) -> Result<ElectricalVariable> {
        let base = bases.get_or_create(1, 13.8e3, 100e6)?;
        Ok(ElectricalVariable::voltage(&base))
    }

    #[test]
    fn test_undefined_frame() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let v = voltage(&mut bases)?;
        assert!(matches!(v.pre(), Err(NetworkError::UndefinedValue(_))));
        assert!(v
            .request_value(Frame::PostFault, Component::A, Domain::PerUnit, Notation::Rectangular)
            .is_err());
        Ok(())
    }

    #[test]
    fn test_pre_fault_phases() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let mut v = voltage(&mut bases)?;
        v.define_pre_fault_pu(cmplx!(1.0));

        assert_abs_diff_eq!(v.pre()?.a().pu().rec(), cmplx!(1.0), epsilon = 1e-12);
        assert_relative_eq!(v.pre()?.b().pu().ang(), (-120f64).to_radians(), epsilon = 1e-12);
        assert_relative_eq!(v.pre()?.c().pu().ang(), 120f64.to_radians(), epsilon = 1e-12);
        assert_abs_diff_eq!(v.pre()?.seq0().pu().rec(), cmplx!(), epsilon = 1e-12);
        assert_relative_eq!(v.pre()?.a().si().mag(), 13.8e3, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_post_fault_fortescue() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let mut v = voltage(&mut bases)?;
        // single line to ground fault on phase a: v0 + v1 + v2 = 0
        v.define_post_fault_pu(cmplx!(-0.25), cmplx!(0.6), cmplx!(-0.35));

        assert_abs_diff_eq!(v.post()?.a().pu().mag(), 0.0, epsilon = 1e-12);
        assert_eq!(v.post()?.a().pu().ang(), 0.0);

        let b = v.post()?.b().pu().rec();
        let c = v.post()?.c().pu().rec();
        assert_abs_diff_eq!(b.norm(), c.norm(), epsilon = 1e-12);
        assert_abs_diff_eq!(v.post()?.seq2().pu().rec(), cmplx!(-0.35), epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_request_value() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let mut v = voltage(&mut bases)?;
        v.define_pre_fault_si(cmplx!(0.0, 6.9e3));

        let q = v.request_value(
            Frame::PreFault,
            Component::Seq(Sequence::Positive),
            Domain::PerUnit,
            Notation::Magnitude,
        )?;
        match q {
            Quantity::Magnitude(m) => assert_relative_eq!(m, 0.5, epsilon = 1e-12),
            other => panic!("unexpected {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_change_base_preserves_physical_value() -> Result<()> {
        let mut bases = BaseRegistry::new();
        let mut v = voltage(&mut bases)?;
        let mut i = ElectricalVariable::current(bases.get(1)?);
        v.define_pre_fault_pu(cmplx!(1.02, -0.1));
        i.define_post_fault_pu(cmplx!(0.1), cmplx!(2.0, -3.0), cmplx!(0.4));
        let v_si = v.pre()?.a().si().rec();
        let i_si = i.post()?.b().si().rec();

        bases.update_base(1, 13.2e3, 50e6)?;
        v.change_base(&bases)?;
        i.change_base(&bases)?;
        assert_abs_diff_eq!(v.pre()?.a().si().rec(), v_si, epsilon = 1e-6);
        assert_abs_diff_eq!(i.post()?.b().si().rec(), i_si, epsilon = 1e-6);

        bases.update_base(1, 13.8e3, 100e6)?;
        v.change_base(&bases)?;
        i.change_base(&bases)?;
        assert_abs_diff_eq!(v.pre()?.a().pu().rec(), cmplx!(1.02, -0.1), epsilon = 1e-12);
        assert_abs_diff_eq!(i.post()?.seq1().pu().rec(), cmplx!(2.0, -3.0), epsilon = 1e-12);
        Ok(())
    }
}
