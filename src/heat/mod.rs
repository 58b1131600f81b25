pub mod aggregate;
pub mod annotate;
pub mod error;
pub mod feature;
pub mod grid;
pub mod report;
pub mod sampler;
