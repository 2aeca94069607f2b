use crate::error::Result;
use crate::math::{admittance, is_zero};
use crate::pubase::{BaseRegistry, PuBase, Rebase};
use num_complex::Complex64;

/// Per-unit branch admittance between `bus_m` and `bus_n`.
///
/// `bus_n == 0` is ground. `y_pu` is expressed against `z_base`, which is
/// the impedance base of `base_bus` at the time of the last rebase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Immittance {
    y_pu: Complex64,
    z_base: f64,
    base_bus: usize,
    bus_m: usize,
    bus_n: usize,
}

impl Immittance {
    pub fn new(y_pu: Complex64, base: &PuBase, bus_m: usize, bus_n: usize) -> Self {
        Self {
            y_pu,
            z_base: base.z_base(),
            base_bus: base.bus(),
            bus_m,
            bus_n,
        }
    }

    /// Branch from a per-unit impedance. A zero impedance gives an infinite
    /// admittance.
    pub fn from_impedance(z_pu: Complex64, base: &PuBase, bus_m: usize, bus_n: usize) -> Self {
        Self::new(admittance(z_pu), base, bus_m, bus_n)
    }

    /// Placeholder for a branch position with no path.
    pub fn zero(base: &PuBase, bus_m: usize, bus_n: usize) -> Self {
        Self::new(Complex64::default(), base, bus_m, bus_n)
    }

    pub fn y_pu(&self) -> Complex64 {
        self.y_pu
    }

    pub fn z_base(&self) -> f64 {
        self.z_base
    }

    pub fn base_bus(&self) -> usize {
        self.base_bus
    }

    pub fn bus_m(&self) -> usize {
        self.bus_m
    }

    pub fn bus_n(&self) -> usize {
        self.bus_n
    }

    pub fn endpoints(&self) -> (usize, usize) {
        (self.bus_m, self.bus_n)
    }

    /// Endpoints with the smaller id first.
    pub fn unordered_endpoints(&self) -> (usize, usize) {
        if self.bus_m <= self.bus_n {
            (self.bus_m, self.bus_n)
        } else {
            (self.bus_n, self.bus_m)
        }
    }

    pub fn connects_ground(&self) -> bool {
        self.bus_m == 0 || self.bus_n == 0
    }

    /// Exact zero test. Zero branches never enter network matrices.
    pub fn is_zero(&self) -> bool {
        is_zero(self.y_pu)
    }

    /// Physical admittance in siemens.
    pub fn y_si(&self) -> Complex64 {
        self.y_pu / self.z_base
    }

    /// Same branch with `y_pu` replaced, keeping base and endpoints.
    pub fn with_y_pu(&self, y_pu: Complex64) -> Self {
        Self { y_pu, ..*self }
    }
}

impl Rebase for Immittance {
    fn change_base(&mut self, bases: &BaseRegistry) -> Result<()> {
        let z_new = bases.get(self.base_bus)?.z_base();
        self.y_pu *= z_new / self.z_base;
        self.z_base = z_new;
        Ok(())
    }
}
