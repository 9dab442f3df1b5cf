use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use physalia_align::{global_align, Band, GlobalAlignParams, ScoringMatrix, SeqSource};

fn random_dna(len: usize) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    // Deterministic pseudo-random for reproducibility
    let mut seq = Vec::with_capacity(len);
    let mut state: u64 = 42;
    for _ in 0..len {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        seq.push(bases[((state >> 33) % 4) as usize]);
    }
    seq
}

fn mutate_dna(seq: &[u8], rate: f64) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    let mut out = seq.to_vec();
    let mut state: u64 = 137;
    for b in out.iter_mut() {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let r = (state >> 33) as f64 / (u32::MAX as f64);
        if r < rate {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            *b = bases[((state >> 33) % 4) as usize];
        }
    }
    out
}

fn bench_global(c: &mut Criterion) {
    let matrix = ScoringMatrix::dna_default();
    let params = GlobalAlignParams::uniform(5, 2);

    let mut group = c.benchmark_group("global");
    for &len in &[100, 1000] {
        let s1 = random_dna(len);
        let s2 = mutate_dna(&s1, 0.1);
        group.bench_with_input(BenchmarkId::new("full", len), &len, |b, _| {
            b.iter(|| {
                global_align(
                    &SeqSource::Literal(black_box(&s1)),
                    black_box(&s2),
                    &matrix,
                    &params,
                )
            })
        });
    }
    group.finish();
}

fn bench_banded(c: &mut Criterion) {
    let matrix = ScoringMatrix::dna_default();

    let mut group = c.benchmark_group("banded");
    for &width in &[16usize, 64] {
        let s1 = random_dna(1000);
        let s2 = mutate_dna(&s1, 0.1);
        let params = GlobalAlignParams::uniform(5, 2).with_band(Band { offset: 0, width });
        group.bench_with_input(BenchmarkId::new("width", width), &width, |b, _| {
            b.iter(|| {
                global_align(
                    &SeqSource::Literal(black_box(&s1)),
                    black_box(&s2),
                    &matrix,
                    &params,
                )
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_global, bench_banded);
criterion_main!(benches);
