use num_complex::Complex64;

/// Infinite admittance, used for solid grounding and coincident star nodes.
pub const INF: Complex64 = Complex64 {
    re: f64::INFINITY,
    im: 0.0,
};

#[macro_export]
macro_rules! cmplx {
    () => {
        num_complex::Complex64::new(0.0, 0.0)
    };
    ($arg1:expr) => {
        num_complex::Complex64::new($arg1, 0.0)
    };
    ($arg1:expr, $arg2:expr) => {
        num_complex::Complex64::new($arg1, $arg2)
    };
}

/// Complex number from a magnitude and an angle in degrees.
pub fn cpolar(r: f64, theta_deg: f64) -> Complex64 {
    Complex64::from_polar(r, theta_deg.to_radians())
}

/// Fortescue rotation operator `a = 1∠120°`.
pub fn rot_a() -> Complex64 {
    cpolar(1.0, 120.0)
}

/// Fortescue rotation operator `a² = 1∠−120°`.
pub fn rot_a2() -> Complex64 {
    cpolar(1.0, -120.0)
}

/// Admittance of an impedance, infinite for a zero impedance.
pub fn admittance(z: Complex64) -> Complex64 {
    if is_zero(z) {
        INF
    } else {
        z.inv()
    }
}

#[inline]
pub fn is_inf(y: Complex64) -> bool {
    y.re.is_infinite() || y.im.is_infinite()
}

#[inline]
pub fn is_zero(y: Complex64) -> bool {
    y.re == 0.0 && y.im == 0.0
}
