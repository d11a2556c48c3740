use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mboxforum::import::{ImportOptions, Importer};
use mboxforum::parser::format::BodyFormatter;
use mboxforum::parser::mbox::MboxReader;
use mboxforum::parser::unpack::Unpacker;
use mboxforum::store::MemoryRepository;

fn bench_unpack_and_format(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("bioc.mbox");

    let mut records: Vec<Vec<u8>> = Vec::new();
    MboxReader::new(&fixture_path)
        .unwrap()
        .for_each_record(
            &mut |raw| {
                records.push(raw.to_vec());
                true
            },
            None,
        )
        .unwrap();

    let unpacker = Unpacker::default();
    let formatter = BodyFormatter::default();
    c.bench_function("unpack_format_fixture", |b| {
        b.iter(|| {
            records
                .iter()
                .filter_map(|raw| unpacker.unpack(raw).ok())
                .map(|msg| formatter.format(&msg.body).len())
                .sum::<usize>()
        })
    });
}

fn bench_dry_run_import(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("bioc.mbox");
    let options = ImportOptions::default().with_dry_run(true);

    c.bench_function("dry_run_import_fixture", |b| {
        b.iter(|| {
            let mut repo = MemoryRepository::new();
            Importer::new(&options)
                .run(&fixture_path, &mut repo, None)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_unpack_and_format, bench_dry_run_import);
criterion_main!(benches);
