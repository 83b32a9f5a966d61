use criterion::{black_box, criterion_group, criterion_main, Criterion};
use eeprom_id::checksum::crc8;
use eeprom_id::io_stream::{EepromReader, EepromWriter};
use eeprom_id::{decode, ApiVersion, ComponentType, EepromRecord, IdHeader};
use std::io::Cursor;

fn full_record() -> EepromRecord {
    let mut record = EepromRecord::new(IdHeader {
        api_version:         ApiVersion::V3,
        pcb_revision:        3,
        pcb_sub_revision:    1,
        opttree_revision:    1,
        component:           ComponentType::Pcm,
        base_article_number: 66,
        kit_number:          0,
        kit_options:         "3022210I".to_string(),
        bom_revision:        "A0".to_string(),
    });
    for i in 0..4u16 {
        record.add_mac_block(i, &format!("00:11:22:33:44:{i:02x}")).unwrap();
    }
    for i in 0..16 {
        record.add_key_value_block(&format!("key{i}"), &"v".repeat(32)).unwrap();
    }
    record
}

fn bench_checksum(c: &mut Criterion) {
    let data = vec![0xA5u8; 4096];
    c.bench_function("crc8_4k", |b| b.iter(|| crc8(black_box(&data))));
}

fn bench_codec(c: &mut Criterion) {
    let record = full_record();
    let image = record.encode().unwrap();

    c.bench_function("encode_v3_20_blocks", |b| b.iter(|| black_box(&record).encode().unwrap()));
    c.bench_function("decode_v3_20_blocks", |b| b.iter(|| decode(black_box(&image)).unwrap()));
}

fn bench_two_phase_io(c: &mut Criterion) {
    let record = full_record();

    c.bench_function("write_read_cursor", |b| {
        b.iter(|| {
            let mut device = Cursor::new(vec![0xFFu8; 4096]);
            EepromWriter::new(&mut device).write_record(black_box(&record)).unwrap();
            EepromReader::new(&mut device).read_record().unwrap()
        })
    });
}

criterion_group!(benches, bench_checksum, bench_codec, bench_two_phase_io);
criterion_main!(benches);
