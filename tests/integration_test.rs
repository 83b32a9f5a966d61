use eeprom_id::io_stream::{self, EepromReader, EepromWriter};
use eeprom_id::revision::{parse_revision, render_sub_revision};
use eeprom_id::{
    decode, report, ApiVersion, BlockPayload, ChecksumRegion, ComponentType, EepromError,
    EepromRecord, IdHeader, KeyValueBlock, ProductArgs, ProductConfig,
};
use std::fs::{File, OpenOptions};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const PCM_066_V2: &str = "02031100420033303232323130490000000000000000004130000000000000af";

fn pcm_066(api_version: ApiVersion) -> EepromRecord {
    EepromRecord::new(IdHeader {
        api_version,
        pcb_revision:        3,
        pcb_sub_revision:    1,
        opttree_revision:    1,
        component:           ComponentType::Pcm,
        base_article_number: 66,
        kit_number:          0,
        kit_options:         "3022210I".to_string(),
        bom_revision:        "A0".to_string(),
    })
}

#[test]
fn test_revision_scenario() {
    assert_eq!(parse_revision("3a").unwrap(), (3, 1));
    assert_eq!(render_sub_revision(1).unwrap(), "a");
}

#[test]
fn test_v2_header_scenario() {
    let image = pcm_066(ApiVersion::V2).encode().unwrap();
    assert_eq!(hex::encode(&image), PCM_066_V2);

    let record = decode(&image).unwrap();
    assert_eq!(record, pcm_066(ApiVersion::V2));
    assert_eq!(record.full_name(0).unwrap(), "PCM-066-3022210I.A0");
}

#[test]
fn test_v3_mac_scenario() {
    let mut record = pcm_066(ApiVersion::V3);
    record.add_mac_block(0, "aa:bb:cc:dd:ee:ff").unwrap();
    let image = record.encode().unwrap();
    assert_eq!(image.len(), 40 + 12);
    assert_eq!(hex::encode(&image[32..40]), "0c000100000000fd");
    assert_eq!(hex::encode(&image[40..]), "000c00fc00aabbccddeeff2e");

    let back = decode(&image).unwrap();
    assert_eq!(back.block_count(), 1);
    match back.blocks()[0].payload() {
        BlockPayload::Mac(mac) => {
            assert_eq!(mac.interface, 0);
            assert_eq!(mac.mac, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        }
        other => panic!("unexpected block {other:?}"),
    }
}

#[test]
fn test_corruption_is_detected() {
    let image = hex::decode(PCM_066_V2).unwrap();
    for i in 0..image.len() {
        let mut bad = image.clone();
        bad[i] ^= 0x01;
        let err = decode(&bad).unwrap_err();
        assert!(
            matches!(err, EepromError::ChecksumMismatch { region: ChecksumRegion::Header, .. }),
            "byte {i}: {err}"
        );
        assert!(err.is_corrupt_data());
    }
}

#[test]
fn test_long_key_is_rejected_before_encoding() {
    let key = "k".repeat(300);
    assert!(matches!(
        KeyValueBlock::new(&key, "v"),
        Err(EepromError::FieldTooLong { field: "key", len: 300, max: 255 })
    ));

    let mut record = pcm_066(ApiVersion::V3);
    assert!(record.add_key_value_block(&key, "v").is_err());
    assert_eq!(record.block_count(), 0);
}

#[test]
fn test_file_round_trip_with_blocks() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let mut record = pcm_066(ApiVersion::V3);
    record.add_mac_block(0, "aa:bb:cc:dd:ee:ff").unwrap();
    record.add_key_value_block("foo", "hello").unwrap();

    {
        let file = File::create(&path).unwrap();
        io_stream::write_record(file, &record, Some(256)).unwrap();
    }

    let back = io_stream::read_record(File::open(&path).unwrap(), 0).unwrap();
    assert_eq!(back, record);
    assert_eq!(back.key_value("foo").unwrap().value, "hello");
    assert_eq!(back.mac_block(0).unwrap().mac_string(), "aa:bb:cc:dd:ee:ff");
    assert_eq!(
        io_stream::detect_base_name(File::open(&path).unwrap()).unwrap(),
        "PCM-066"
    );
}

#[test]
fn test_add_block_to_existing_image() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    {
        let file = File::create(&path).unwrap();
        EepromWriter::new(file).write_record(&pcm_066(ApiVersion::V3)).unwrap();
    }

    let mut record = EepromReader::new(File::open(&path).unwrap()).read_record().unwrap();
    record.add_mac_block(1, "00:11:22:33:44:55").unwrap();
    assert!(matches!(
        record.add_mac_block(1, "00:11:22:33:44:66"),
        Err(EepromError::DuplicateBlock(_))
    ));
    {
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        EepromWriter::new(file).write_record(&record).unwrap();
    }

    let back = io_stream::read_record(File::open(&path).unwrap(), 0).unwrap();
    assert_eq!(back.block_count(), 1);
    assert_eq!(back.data_header().unwrap().payload_length, 12);
}

#[test]
fn test_trailing_garbage_is_ignored() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let mut record = pcm_066(ApiVersion::V3);
    record.add_key_value_block("serial", "0042").unwrap();
    {
        let mut file = File::create(&path).unwrap();
        file.write_all(&record.encode().unwrap()).unwrap();
        file.write_all(&[0xFF; 64]).unwrap();
    }
    assert_eq!(io_stream::read_record(File::open(&path).unwrap(), 0).unwrap(), record);
}

#[test]
fn test_product_table_drives_creation() {
    let dir = TempDir::new().unwrap();
    let table = dir.path().join("PCM-066.json");
    std::fs::write(
        &table,
        r#"{
            "product": { "api": 2, "optiontree_rev": 1, "max_image_size": 32 },
            "kit": { "0": "A", "1": "B", "2": "C", "3": "D",
                     "4": "E", "5": "F", "6": "G", "7": "Temperature" },
            "options": { "Temperature": { "I": "industrial" } }
        }"#,
    )
    .unwrap();
    let config = ProductConfig::load(&table).unwrap();

    let args = ProductArgs {
        som: Some("PCM-066".to_string()),
        kit: "3022210I".to_string(),
        pcb: "3a".to_string(),
        bom: "A0".to_string(),
        ..ProductArgs::default()
    };
    let record = args.build(&config).unwrap();

    let image = dir.path().join(args.file_name(&record));
    let written = io_stream::write_record(
        File::create(&image).unwrap(),
        &record,
        config.product.max_image_size,
    )
    .unwrap();
    assert_eq!(written, 32);
    assert_eq!(hex::encode(std::fs::read(&image).unwrap()), PCM_066_V2);

    let text = report::render(&record, Some(&config)).unwrap();
    assert!(text.contains("Temperature      :  industrial"));
}

#[test]
fn test_image_too_large_for_device() {
    let mut record = pcm_066(ApiVersion::V3);
    record.add_key_value_block("note", &"x".repeat(100)).unwrap();
    let temp_file = NamedTempFile::new().unwrap();
    let err = io_stream::write_record(temp_file.reopen().unwrap(), &record, Some(64)).unwrap_err();
    assert!(matches!(err, EepromError::ImageTooLarge { size: 151, max: 64 }));
    assert_eq!(std::fs::metadata(temp_file.path()).unwrap().len(), 0);
}
