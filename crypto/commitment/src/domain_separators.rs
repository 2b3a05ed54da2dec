// Copyright (c) 2018-2025 The Botho Foundation

//! Domain separation tags for every hash used by the extension block.

/// Hashed to a Ristretto point to produce the value generator `H`.
pub const VALUE_GENERATOR_DOMAIN_TAG: &[u8] = b"bth_extension_value_generator";

/// Schnorr challenge for kernel signatures.
pub const KERNEL_SIGNATURE_DOMAIN_TAG: &[u8] = b"bth_extension_kernel_signature";

/// Kernel message hash (the bytes a kernel signature signs).
pub const KERNEL_MESSAGE_DOMAIN_TAG: &[u8] = b"bth_extension_kernel_message";

/// Blinding factor derived from an output shared secret.
pub const OUTPUT_BLINDING_DOMAIN_TAG: &[u8] = b"bth_extension_output_blinding";

/// Value mask derived from an output shared secret.
pub const OUTPUT_VALUE_MASK_DOMAIN_TAG: &[u8] = b"bth_extension_output_value_mask";

/// Range-proof reference binding.
pub const RANGE_PROOF_REF_DOMAIN_TAG: &[u8] = b"bth_extension_range_proof_ref";

/// Digest of a range proof as referenced from an output.
pub const RANGE_PROOF_DIGEST_DOMAIN_TAG: &[u8] = b"bth_extension_range_proof_digest";

/// Kernel identifier (message plus signature).
pub const KERNEL_HASH_DOMAIN_TAG: &[u8] = b"bth_extension_kernel_hash";

/// Digest over the full ledger state.
pub const STATE_DIGEST_DOMAIN_TAG: &[u8] = b"bth_extension_state_digest";
