/// Options for a sequence network study.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScOpt {
    /// Voltage base (V) given to buses before `assign_bases`. Default value is 100 kV.
    pub v_base: f64,

    /// Power base (VA) given to buses before `assign_bases`. Default value is 100 MVA.
    pub s_base: f64,

    /// Relative pivot threshold below which a bus admittance matrix is
    /// treated as singular. Default value is 1e-12.
    pub singular_tol: f64,

    /// Relative mismatch tolerated between turns-ratio products around a
    /// loop before a warning is logged. Default value is 1e-6.
    pub ratio_tol: f64,
}

impl Default for ScOpt {
    fn default() -> Self {
        Self {
            v_base: 100e3,
            s_base: 100e6,
            singular_tol: 1e-12,
            ratio_tol: 1e-6,
        }
    }
}
