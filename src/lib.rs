pub mod spec;

pub mod assembler;

pub mod vm;

pub mod frontend;
