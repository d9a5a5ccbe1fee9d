pub mod core;
pub mod selection;
pub mod sort;
