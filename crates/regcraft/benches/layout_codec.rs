use criterion::{Criterion, criterion_group, criterion_main};
use regcraft::{
    bitmap::{BitSource, BitSourceMap},
    bits::Width,
    descriptor::{RegisterMap, RegisterRecord},
    layout::{decode, encode},
    store::RegisterStore,
    transform::TranslationRegistry,
};

fn gen_descriptor(register_count: u32) -> RegisterMap {
    let records: Vec<RegisterRecord> = (0..register_count)
        .map(|r| RegisterRecord::new(format!("{r:#x}"), "RW", vec![]))
        .collect();

    RegisterMap::compile(&records, Width::W16, &TranslationRegistry::new()).unwrap()
}

/// `word_count` words, each with a 4-bit constant header, 10 register bits and 2 CRC bits.
fn gen_bitmap(word_count: u32, register_count: u32) -> BitSourceMap {
    let mut map = BitSourceMap::new(Width::W16);
    let mut next = 0u32;

    for address in 0..word_count {
        let mut sources = vec![
            BitSource::Constant(true),
            BitSource::Constant(false),
            BitSource::Constant(address % 2 == 0),
            BitSource::Constant(false),
        ];
        for _ in 0..10 {
            sources.push(BitSource::RegisterBit {
                register: (next / 16) % register_count,
                bit: next % 16,
            });
            next += 1;
        }
        sources.extend([BitSource::Ignored, BitSource::Ignored]);

        map.insert(address, sources).unwrap();
    }

    map
}

fn gen_registers(register_count: u32) -> RegisterStore {
    // Deterministic but non-trivial pattern
    RegisterStore::from_pairs(
        Width::W16,
        (0..register_count).map(|r| (r, u64::from(r) * 0x3D1 % 0x10000)),
    )
    .unwrap()
}

fn bench_layout_codec(c: &mut Criterion) {
    let register_count = 40;
    let descriptor = gen_descriptor(register_count);
    let registers = gen_registers(register_count);

    for &word_count in &[8u32, 32, 64] {
        let bitmap = gen_bitmap(word_count, register_count);
        let image = encode(&registers, &descriptor, &bitmap).unwrap().image;

        c.bench_function(&format!("encode_{}_words", word_count), |b| {
            b.iter(|| {
                let _ = encode(&registers, &descriptor, &bitmap).unwrap();
            })
        });

        c.bench_function(&format!("decode_{}_words", word_count), |b| {
            b.iter(|| {
                let _ = decode(&image, &bitmap, Width::W16).unwrap();
            })
        });
    }
}

criterion_group!(benches, bench_layout_codec);
criterion_main!(benches);
