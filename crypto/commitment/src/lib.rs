// Copyright (c) 2018-2025 The Botho Foundation

//! Commitment primitives for the Botho extension block.
//!
//! Values in the extension block are hidden inside Pedersen commitments
//! `v*H + r*G` over the Ristretto group. This crate provides:
//!
//! - [`Commitment`] and [`BlindingFactor`] with the homomorphic sums used by
//!   kernel balance checks
//! - Schnorr [`Signature`]s proving that a kernel excess carries no value
//!   component
//! - [`RangeProofRef`] and the [`RangeProofVerifier`] seam
//! - [`ViewKey`] / [`OutputOpening`] for deriving and recovering the opening
//!   of an output from an ECDH shared secret

#![deny(missing_docs)]

mod blinding;
mod error;
mod opening;
mod pedersen;
mod range_proof;
mod signature;

pub mod domain_separators;

pub use blinding::BlindingFactor;
pub use error::Error;
pub use opening::{EphemeralKey, OutputOpening, SharedSecret, ViewKey, ViewPublic};
pub use pedersen::{blinding_generator, value_generator, Commitment};
pub use range_proof::{BoundReferenceVerifier, RangeProofRef, RangeProofVerifier};
pub use signature::Signature;
