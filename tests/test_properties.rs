//! Property tests for address parsing and lookups

use ipregion::{format_ipv4, parse_ipv4, Database, DatabaseBuilder};
use proptest::prelude::*;
use std::sync::OnceLock;

/// Non-overlapping ranges spread over the address space, one region each
fn sample_database() -> &'static Database {
    static DB: OnceLock<Database> = OnceLock::new();
    DB.get_or_init(|| {
        let mut builder = DatabaseBuilder::new().with_created_at(0);
        // 64 ranges of varying width, some crossing /16 boundaries.
        for i in 0..64u32 {
            let start = i << 26 | ((i * 7919) << 8 & 0x03FF_FFFF);
            let width = (1u32 << (8 + i % 17)) - 1;
            let end = start.saturating_add(width).min(start | 0x03FF_FFFF);
            builder
                .add_range(start, end, &format!("C{}|0|P{}|0|ISP{}", i, i % 5, i % 3))
                .unwrap();
        }
        Database::from_bytes(builder.build().unwrap()).unwrap()
    })
}

proptest! {
    #[test]
    fn prop_format_parse_roundtrip(ip in any::<u32>()) {
        prop_assert_eq!(parse_ipv4(&format_ipv4(ip)).unwrap(), ip);
    }

    #[test]
    fn prop_leading_zeros_normalize(octets in any::<[u8; 4]>(), pad in 0usize..3) {
        let padded: Vec<String> = octets
            .iter()
            .map(|o| format!("{:0width$}", o, width = 1 + pad))
            .collect();
        let ip = parse_ipv4(&padded.join(".")).unwrap();
        prop_assert_eq!(ip, u32::from_be_bytes(octets));
    }

    #[test]
    fn prop_garbage_never_panics(s in "\\PC{0,20}") {
        let _ = parse_ipv4(&s);
        let _ = sample_database().lookup(&s);
    }

    #[test]
    fn prop_segment_is_constant(ip in any::<u32>(), offset in any::<u32>()) {
        let db = sample_database();
        let hit = db.search(ip).unwrap();
        let span = hit.end_ip - hit.start_ip;
        let other = hit.start_ip + if span == u32::MAX { offset } else { offset % (span + 1) };
        prop_assert_eq!(db.record(ip).unwrap(), db.record(other).unwrap());
    }

    #[test]
    fn prop_find_is_total_and_idempotent(ip in any::<u32>()) {
        let db = sample_database();
        let first = db.find(ip);
        let second = db.find(ip);
        prop_assert_eq!(&first.ip, &format_ipv4(ip));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_search_contains_address(ip in any::<u32>()) {
        let hit = sample_database().search(ip).unwrap();
        prop_assert!(hit.start_ip <= ip && ip <= hit.end_ip);
        // Segments never straddle a /16 bucket.
        prop_assert_eq!(hit.start_ip >> 16, hit.end_ip >> 16);
    }
}
