pub mod container;
pub mod probe;
