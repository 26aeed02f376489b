#![deny(unsafe_code)]
//! Core types for the city-engine procedural map generator.
//!
//! Provides the geometry primitives (`Vec2`, polygon operations, RDP
//! simplification), the tensor-field model (`Tensor`, basis fields,
//! `TensorField` with noise modulation), the RK4/Euler integrators, the
//! grid-accelerated proximity index, the seedable `Xorshift64` PRNG, the
//! nested `MapParams` parameter object, and the `MapError` error type.

pub mod basis_field;
pub mod error;
pub mod grid_index;
pub mod integrator;
pub mod params;
pub mod polygon;
pub mod prng;
pub mod simplify;
pub mod tensor;
pub mod tensor_field;
pub mod vector;

pub use basis_field::{BasisField, GridField, RadialField};
pub use error::MapError;
pub use grid_index::GridIndex;
pub use integrator::{EulerIntegrator, FieldIntegrator, Rk4Integrator};
pub use params::{MapParams, StreamlineParams};
pub use prng::Xorshift64;
pub use tensor::Tensor;
pub use tensor_field::TensorField;
pub use vector::Vec2;
