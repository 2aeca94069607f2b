use crate::error::{NetworkError, Result};
use std::collections::BTreeMap;

/// Per-unit base held by one bus.
///
/// The impedance and current bases are always derived from the voltage
/// and power bases:
///
/// ```text
/// z_base = v_base² / s_base
/// i_base = v_base / (√3 · z_base)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PuBase {
    bus: usize,
    v_base: f64,
    s_base: f64,
    z_base: f64,
    i_base: f64,
}

impl PuBase {
    pub fn new(bus: usize, v_base: f64, s_base: f64) -> Result<Self> {
        let mut base = Self {
            bus,
            v_base: 0.0,
            s_base: 0.0,
            z_base: 0.0,
            i_base: 0.0,
        };
        base.update_base(v_base, s_base)?;
        Ok(base)
    }

    /// Replaces the voltage and power bases and recomputes derived quantities.
    pub fn update_base(&mut self, v_base: f64, s_base: f64) -> Result<()> {
        let valid = |x: f64| x.is_finite() && x > 0.0;
        if !valid(v_base) || !valid(s_base) {
            return Err(NetworkError::InvalidBase {
                bus: self.bus,
                v_base,
                s_base,
            });
        }
        self.v_base = v_base;
        self.s_base = s_base;
        self.z_base = v_base * v_base / s_base;
        self.i_base = v_base / (3f64.sqrt() * self.z_base);
        Ok(())
    }

    pub fn bus(&self) -> usize {
        self.bus
    }
    pub fn v_base(&self) -> f64 {
        self.v_base
    }
    pub fn s_base(&self) -> f64 {
        self.s_base
    }
    pub fn z_base(&self) -> f64 {
        self.z_base
    }
    pub fn i_base(&self) -> f64 {
        self.i_base
    }
}

/// Per-bus bases of one network study.
///
/// Every quantity attached to a bus is expressed against the single base
/// registered here for that bus id. The registry belongs to a `Network`, so
/// two studies never share bases through equal bus ids.
#[derive(Debug, Clone)]
pub struct BaseRegistry {
    bases: BTreeMap<usize, PuBase>,
    default_v_base: f64,
    default_s_base: f64,
}

impl BaseRegistry {
    /// Registry with the default 100 kV / 100 MVA base.
    pub fn new() -> Self {
        Self {
            bases: BTreeMap::new(),
            default_v_base: 100e3,
            default_s_base: 100e6,
        }
    }

    /// Registry giving new buses `v_base` (V) and `s_base` (VA).
    pub fn with_default(v_base: f64, s_base: f64) -> Result<Self> {
        PuBase::new(0, v_base, s_base)?;
        Ok(Self {
            bases: BTreeMap::new(),
            default_v_base: v_base,
            default_s_base: s_base,
        })
    }

    pub fn default_v_base(&self) -> f64 {
        self.default_v_base
    }

    pub fn default_s_base(&self) -> f64 {
        self.default_s_base
    }

    /// Base of `bus`, created from the registry default on first use.
    pub fn base(&mut self, bus: usize) -> Result<PuBase> {
        self.get_or_create(bus, self.default_v_base, self.default_s_base)
    }

    /// Returns the base of `bus`, creating it from `v_base` and `s_base`
    /// on first use. Later calls ignore the supplied values.
    pub fn get_or_create(&mut self, bus: usize, v_base: f64, s_base: f64) -> Result<PuBase> {
        if let Some(base) = self.bases.get(&bus) {
            return Ok(*base);
        }
        let base = PuBase::new(bus, v_base, s_base)?;
        log::trace!(
            "bus {} base created: {} V, {} VA",
            bus,
            base.v_base(),
            base.s_base()
        );
        self.bases.insert(bus, base);
        Ok(base)
    }

    pub fn get(&self, bus: usize) -> Result<&PuBase> {
        self.bases.get(&bus).ok_or(NetworkError::UnknownBus(bus))
    }

    /// Rebases one bus. Observers must be notified with [`Rebase::change_base`]
    /// afterwards; outside the crate this goes through `Network::update_base`.
    pub(crate) fn update_base(&mut self, bus: usize, v_base: f64, s_base: f64) -> Result<()> {
        self.bases
            .get_mut(&bus)
            .ok_or(NetworkError::UnknownBus(bus))?
            .update_base(v_base, s_base)
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}

impl Default for BaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Implemented by everything that stores per-unit values against a bus base.
pub trait Rebase {
    /// Rescales stored per-unit values to the bases currently held by
    /// `bases`, preserving the physical quantities.
    fn change_base(&mut self, bases: &BaseRegistry) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use approx::assert_relative_eq;

    #[test]
    fn test_derived_quantities() -> Result<()> {
        let base = PuBase::new(1, 13.8e3, 100e6)?;
        assert_relative_eq!(base.z_base(), 1.9044, epsilon = 1e-12);
        assert_relative_eq!(
            base.i_base(),
            100e6 / (3f64.sqrt() * 13.8e3),
            max_relative = 1e-12
        );
        Ok(())
    }

    #[test]
    fn test_zero_power_base() {
        assert!(matches!(
            PuBase::new(3, 13.8e3, 0.0),
            Err(NetworkError::InvalidBase { bus: 3, .. })
        ));
    }

    #[test]
    fn test_get_or_create_shares_base() -> Result<()> {
        let mut reg = BaseRegistry::new();
        let first = reg.get_or_create(2, 138e3, 100e6)?;
        let second = reg.get_or_create(2, 13.8e3, 50e6)?;
        assert_eq!(first, second);
        assert_eq!(reg.len(), 1);

        reg.update_base(2, 69e3, 100e6)?;
        assert_relative_eq!(reg.get(2)?.v_base(), 69e3);
        Ok(())
    }

    #[test]
    fn test_default_base() -> Result<()> {
        let mut reg = BaseRegistry::with_default(13.8e3, 10e6)?;
        let base = reg.base(7)?;
        assert_relative_eq!(base.v_base(), 13.8e3);
        assert_relative_eq!(base.s_base(), 10e6);
        assert!(BaseRegistry::with_default(13.8e3, -1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_registries_are_independent() -> Result<()> {
        let mut a = BaseRegistry::new();
        let mut b = BaseRegistry::new();
        a.get_or_create(1, 138e3, 100e6)?;
        b.get_or_create(1, 13.8e3, 100e6)?;
        assert_relative_eq!(a.get(1)?.v_base(), 138e3);
        assert_relative_eq!(b.get(1)?.v_base(), 13.8e3);
        Ok(())
    }
}
