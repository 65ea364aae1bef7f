//! Domain models for the material ledger

mod batch;
mod material;
mod movement;
mod production;

pub use batch::*;
pub use material::*;
pub use movement::*;
pub use production::*;
