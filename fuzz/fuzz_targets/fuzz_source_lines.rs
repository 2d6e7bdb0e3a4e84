#![no_main]
use ipregion::{Database, DatabaseBuilder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut builder = DatabaseBuilder::new().with_created_at(0);
    for line in text.lines().take(64) {
        let _ = builder.add_line(line);
    }

    // Whatever the builder accepts must load and cover every address.
    if let Ok(image) = builder.build() {
        let db = Database::from_bytes(image).expect("built image must load");
        assert!(db.scan().is_complete());
        let _ = db.find(0);
        let _ = db.find(u32::MAX);
    }
});
