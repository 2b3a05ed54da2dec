// Copyright (c) 2018-2025 The Botho Foundation

//! Errors which can occur when decoding or checking commitment primitives.

use displaydoc::Display;
use serde::{Deserialize, Serialize};

/// An error from the commitment primitives
#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Error {
    /// Invalid curve point
    InvalidCurvePoint,

    /// Non-canonical scalar encoding
    InvalidScalar,

    /// The signature was not able to be validated
    InvalidSignature,

    /// The range proof reference does not bind the commitment
    InvalidRangeProof,

    /// The opening does not match the commitment
    OpeningMismatch,
}

impl std::error::Error for Error {}
