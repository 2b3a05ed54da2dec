// Copyright (c) 2018-2025 The Botho Foundation

use bth_crypto_commitment::{BlindingFactor, Commitment, Signature};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

fn bench_commitment_sum(c: &mut Criterion) {
    let mut rng = ChaCha20Rng::seed_from_u64(0);
    let inputs: Vec<Commitment> = (0..16)
        .map(|v| Commitment::new(v, &BlindingFactor::random(&mut rng)))
        .collect();
    let outputs: Vec<Commitment> = (0..16)
        .map(|v| Commitment::new(v, &BlindingFactor::random(&mut rng)))
        .collect();

    c.bench_function("commitment_sum_16x16", |b| {
        b.iter(|| Commitment::sum(black_box(&inputs), black_box(&outputs)))
    });
}

fn bench_signature_verify(c: &mut Criterion) {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let key = BlindingFactor::random(&mut rng);
    let excess = Commitment::blinded(&key);
    let message = [7u8; 32];
    let sig = Signature::sign(&key, &message, &mut rng);

    c.bench_function("kernel_signature_verify", |b| {
        b.iter(|| sig.verify(black_box(&excess), black_box(&message)))
    });
}

criterion_group!(benches, bench_commitment_sum, bench_signature_verify);
criterion_main!(benches);
