pub mod risk;
pub mod scoring;
