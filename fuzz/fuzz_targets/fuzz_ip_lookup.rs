#![no_main]
use ipregion::{format_ipv4, parse_ipv4, Database, DatabaseBuilder};
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;

fn database() -> Option<&'static Database> {
    static DB: OnceLock<Option<Database>> = OnceLock::new();
    DB.get_or_init(|| {
        let mut builder = DatabaseBuilder::new().with_created_at(0);
        builder.add_line("1.2.3.0|1.2.3.255|A|0|0|0|0").ok()?;
        builder.add_line("10.0.0.0|10.255.255.255|B|0|0|0|0").ok()?;
        builder.add_line("192.168.0.0|192.168.255.255|C|0|0|0|0").ok()?;
        Database::from_bytes(builder.build().ok()?).ok()
    })
    .as_ref()
}

fuzz_target!(|data: &[u8]| {
    let Some(db) = database() else {
        return;
    };

    if let Ok(s) = std::str::from_utf8(data) {
        // Parsing and lookups must agree: a string lookup succeeds exactly
        // when the string parses.
        match parse_ipv4(s) {
            Ok(ip) => {
                let info = db.lookup(s).expect("parsed address must look up");
                assert_eq!(info, {
                    let mut by_int = db.find(ip);
                    by_int.ip = s.to_string();
                    by_int
                });
                assert_eq!(parse_ipv4(&format_ipv4(ip)).ok(), Some(ip));
            }
            Err(_) => assert!(db.lookup(s).is_err()),
        }
    }

    if data.len() >= 4 {
        let ip = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let _ = db.find(ip);
    }
});
