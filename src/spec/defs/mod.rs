pub mod alu;
pub mod effect;
