//! Step definitions for transfer task BDD scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
