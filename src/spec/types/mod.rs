pub mod hw;
pub mod inst;
pub mod layout;
pub mod operand;
