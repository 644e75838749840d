pub mod coordinates;
pub mod partition;
