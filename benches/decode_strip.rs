use criterion::{Criterion, black_box, criterion_group, criterion_main};
use softstrip::config::{DecoderConfig, WireOrder};
use softstrip::detector::{AlgorithmicRowExtractor, HeaderExtractor, RowExtractor, SyncHeaderParser};
use softstrip::tools::synth::{StripContent, StripLayout, render_strip};
use softstrip::{Pipeline, StripImage};

fn strip(bytes: usize, nibbles: usize) -> StripImage {
    let data: Vec<u8> = (0..bytes).map(|i| (i * 31 % 251) as u8).collect();
    let layout = StripLayout {
        nibbles,
        ..StripLayout::default()
    };
    render_strip(
        &StripContent::single_file("bench.bin", &data),
        &layout,
        WireOrder::MsbFirst,
    )
    .expect("render strip")
}

fn bench_decode_small(c: &mut Criterion) {
    let strips = [strip(16, 4)];
    let pipeline = Pipeline::new(DecoderConfig::default()).expect("pipeline");
    c.bench_function("decode_strip_16b", |b| {
        b.iter(|| pipeline.decode_file(black_box(&strips)))
    });
}

fn bench_decode_large(c: &mut Criterion) {
    let strips = [strip(512, 12)];
    let pipeline = Pipeline::new(DecoderConfig::default()).expect("pipeline");
    c.bench_function("decode_strip_512b", |b| {
        b.iter(|| pipeline.decode_file(black_box(&strips)))
    });
}

fn bench_multi_strip(c: &mut Criterion) {
    let strips: Vec<StripImage> = (0..4).map(|_| strip(128, 8)).collect();
    for parallel_strips in [false, true] {
        let config = DecoderConfig {
            parallel_strips,
            ..DecoderConfig::default()
        };
        let pipeline = Pipeline::new(config).expect("pipeline");
        let name = if parallel_strips {
            "decode_4_strips_parallel"
        } else {
            "decode_4_strips_sequential"
        };
        c.bench_function(name, |b| b.iter(|| pipeline.decode_file(black_box(&strips))));
    }
}

fn bench_row_extraction(c: &mut Criterion) {
    let strip = strip(512, 12);
    let mut matrix = strip.matrix().expect("matrix");
    let mut header = SyncHeaderParser::new();
    header.remove_horizontal_header(&mut matrix).expect("header");
    let bits_per_row = header.bits_per_row().expect("bits per row");
    c.bench_function("extract_rows_512b", |b| {
        b.iter(|| AlgorithmicRowExtractor.extract_rows(black_box(&matrix), bits_per_row))
    });
}

criterion_group!(
    benches,
    bench_decode_small,
    bench_decode_large,
    bench_multi_strip,
    bench_row_extraction
);
criterion_main!(benches);
