pub mod debug;
pub mod execute;
