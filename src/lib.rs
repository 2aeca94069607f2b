mod composite;
mod element;
mod error;
mod immittance;
mod math;
mod network;
mod pubase;
mod relations;
mod scopt;
mod sequence;
mod simplify;
mod variable;
mod winding;
mod ybus;

pub mod debug;

#[cfg(test)]
mod tests;

pub use composite::*;
pub use element::*;
pub use error::*;
pub use immittance::*;
pub use math::*;
pub use network::*;
pub use pubase::*;
pub use relations::*;
pub use scopt::*;
pub use sequence::*;
pub use simplify::*;
pub use variable::*;
pub use winding::*;
pub use ybus::*;
