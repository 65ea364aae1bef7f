//! HTTP request handlers

pub mod batch;
pub mod health;
pub mod material;
pub mod movement;
pub mod production;

pub use batch::*;
pub use health::*;
pub use material::*;
pub use movement::*;
pub use production::*;
