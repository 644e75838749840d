pub mod idw;
#[cfg(feature = "kriging")]
pub mod kriging;
pub mod rbf;
pub mod strategy;
