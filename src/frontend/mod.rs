pub mod assemble;
pub mod assets;
pub mod command;
pub mod run;
pub mod suite;
