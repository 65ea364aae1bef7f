//! Business logic services for the material ledger

pub mod batch;
pub mod locking;
pub mod material;
pub mod movement;
pub mod production;

pub use batch::BatchService;
pub use material::MaterialService;
pub use movement::MovementService;
pub use production::ProductionService;
