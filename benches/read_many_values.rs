use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ion_cursor::{BinaryCursor, IonCursor, StreamEvent};

// IVM, an LST defining "a" as $10, then `count` copies of {a: 42}.
fn binary_stream(count: usize) -> Vec<u8> {
    let mut bytes = vec![0xE0, 0x01, 0x00, 0xEA];
    bytes.extend_from_slice(&[0xE7, 0x81, 0x83, 0xD4, 0x87, 0xB2, 0x81, 0x61]);
    for _ in 0..count {
        bytes.extend_from_slice(&[0xD3, 0x8A, 0x21, 0x2A]);
    }
    bytes
}

fn read_all_values(bytes: &[u8]) -> usize {
    let mut cursor = BinaryCursor::new(std::io::Cursor::new(bytes.to_vec()));
    let mut count = 0;
    loop {
        match cursor.next_value().unwrap() {
            StreamEvent::StartScalar => {
                count += 1;
                black_box(cursor.read_i64().unwrap());
            }
            StreamEvent::StartContainer => {
                cursor.step_into_container().unwrap();
            }
            StreamEvent::EndContainer => {
                cursor.step_out_of_container().unwrap();
            }
            StreamEvent::NeedsData => return count,
            other => panic!("unexpected event: {other}"),
        }
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let data = binary_stream(10_000);
    c.bench_function("read 10k structs", |b| {
        b.iter(|| {
            let count = read_all_values(black_box(&data));
            assert_eq!(count, 10_000);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
