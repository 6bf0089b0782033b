//! Operand preparation and scalar baselines.
//!
//! - `aligned`: 64-byte aligned buffers for prepared matrices
//! - `prepare`: quantization and the rearranged B layout
//! - `reference`: scalar multiply and quantize used as ground truth
//! - `transpose`: for B supplied column-major

pub mod aligned;
pub mod prepare;
pub mod reference;
pub mod transpose;
