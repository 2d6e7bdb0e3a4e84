//! End-to-end tests over the sample source file
//!
//! Builds a database from `tests/data/sample.txt`, writes it to disk and
//! exercises lookups, boundary addresses and corruption handling through the
//! public API.

use ipregion::validation::validate_bytes;
use ipregion::{Database, DatabaseBuilder, GeoError};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_source() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/sample.txt")
}

fn build_sample(dir: &TempDir) -> PathBuf {
    let mut builder = DatabaseBuilder::new().with_created_at(1_700_000_000);
    assert_eq!(builder.load_source(sample_source()).unwrap(), 8);
    let path = dir.path().join("ip2region.xdb");
    builder.write_to(&path).unwrap();
    path
}

#[test]
fn test_well_known_resolvers() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(build_sample(&dir)).unwrap();

    let info = db.lookup("8.8.8.8").unwrap();
    assert_eq!(info.country, "United States");
    assert_eq!(info.isp, "Level3");
    assert_eq!(info.province, "");

    let info = db.lookup("114.114.114.114").unwrap();
    assert_eq!(info.country, "China");
    assert_eq!(info.area, "");
    assert_eq!(info.province, "Jiangsu");
    assert_eq!(info.city, "Nanjing");
    assert_eq!(info.isp, "");

    let info = db.lookup("8.8.4.4").unwrap();
    assert_eq!(info.province, "New Jersey");

    let info = db.lookup("223.5.5.5").unwrap();
    assert_eq!(info.city, "Hangzhou");
    assert_eq!(info.isp, "Alibaba");
}

#[test]
fn test_input_forms_agree() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(build_sample(&dir)).unwrap();

    let by_str = db.record("119.29.29.29").unwrap();
    let by_int = db.record(0x771D_1D1Du32).unwrap();
    let by_addr = db.record(Ipv4Addr::new(119, 29, 29, 29)).unwrap();
    assert_eq!(by_str, by_int);
    assert_eq!(by_int, by_addr);
    assert_eq!(by_str.isp, "Tencent");

    // Leading zeros are accepted; the query string is echoed back as given.
    let info = db.lookup("119.029.029.029").unwrap();
    assert_eq!(info.ip, "119.029.029.029");
    assert_eq!(info.city, "Beijing");
}

#[test]
fn test_unassigned_and_boundaries() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(build_sample(&dir)).unwrap();

    assert!(db.lookup("9.9.9.9").unwrap().is_empty());
    assert!(db.find(0).is_empty());
    assert_eq!(db.find(0).ip, "0.0.0.0");

    let top = db.find(u32::MAX);
    assert_eq!(top.ip, "255.255.255.255");
    assert_eq!(top.isp, "Reserved");

    // Range edges belong to their range, neighbours do not.
    assert_eq!(db.lookup("1.0.1.0").unwrap().city, "Fuzhou");
    assert_eq!(db.lookup("1.0.3.255").unwrap().city, "Fuzhou");
    assert!(db.lookup("1.0.4.0").unwrap().is_empty());
    assert_eq!(db.lookup("1.0.0.255").unwrap().country, "Australia");
}

#[test]
fn test_invalid_addresses_rejected() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(build_sample(&dir)).unwrap();

    for bad in ["", "8.8.8", "8.8.8.8.8", "256.1.1.1", " 8.8.8.8", "+8.8.8.8", "8..8.8", "::1", "0x8.8.8.8", "1234.1.1.1"] {
        assert!(
            matches!(db.lookup(bad), Err(GeoError::InvalidAddress(_))),
            "{:?} should be rejected",
            bad
        );
    }
}

#[test]
fn test_truncated_file_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = build_sample(&dir);
    let bytes = std::fs::read(&path).unwrap();

    for len in [0, 255, 256, 1024, bytes.len() - 1] {
        let truncated = dir.path().join(format!("truncated-{}.xdb", len));
        std::fs::write(&truncated, &bytes[..len]).unwrap();
        assert!(
            matches!(
                Database::open_buffered(&truncated),
                Err(GeoError::CorruptDatabase(_))
            ),
            "length {} should be rejected",
            len
        );
    }
}

#[test]
fn test_built_file_validates_clean() {
    let dir = TempDir::new().unwrap();
    let bytes = std::fs::read(build_sample(&dir)).unwrap();
    let report = validate_bytes(&bytes);
    assert!(report.is_valid(), "{:?}", report.errors);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    // Eight distinct regions plus the filler record.
    assert_eq!(report.stats.distinct_records, 9);
    assert_eq!(report.stats.created_at, 1_700_000_000);
}

#[test]
fn test_rebuild_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let first = std::fs::read(build_sample(&dir)).unwrap();
    let second = std::fs::read(build_sample(&dir)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_overlapping_source_rejected() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("overlap.txt");
    std::fs::write(
        &source,
        "8.8.8.0|8.8.8.255|United States|0|0|0|Level3\n8.8.8.128|8.8.9.0|Elsewhere|0|0|0|0\n",
    )
    .unwrap();

    let mut builder = DatabaseBuilder::new();
    builder.load_source(&source).unwrap();
    let err = builder.build().unwrap_err();
    assert!(matches!(err, GeoError::InvalidSource(_)));
    assert!(err.to_string().contains("overlaps"), "{}", err);
}

#[test]
fn test_exclusive_bucket_ends_load_and_agree() {
    let dir = TempDir::new().unwrap();
    let bytes = std::fs::read(build_sample(&dir)).unwrap();

    // Some producers store each bucket end one entry past its last segment.
    let mut exclusive = bytes.clone();
    for bucket in 0..(1usize << 16) {
        let at = 256 + bucket * 8 + 4;
        let end = u32::from_le_bytes(exclusive[at..at + 4].try_into().unwrap());
        exclusive[at..at + 4].copy_from_slice(&(end + 14).to_le_bytes());
    }

    let inclusive = Database::from_bytes(bytes).unwrap();
    let exclusive = Database::from_bytes(exclusive).unwrap();
    for ip in [
        "0.0.0.0",
        "8.8.8.8",
        "8.8.4.4",
        "114.114.114.114",
        "223.5.5.5",
        "224.0.0.1",
        "255.255.255.255",
    ] {
        assert_eq!(inclusive.lookup(ip).unwrap(), exclusive.lookup(ip).unwrap(), "{}", ip);
    }
}
