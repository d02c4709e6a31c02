pub mod cache;
pub mod intensities;
pub mod key;
