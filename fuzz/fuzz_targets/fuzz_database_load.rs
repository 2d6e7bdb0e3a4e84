#![no_main]
use ipregion::validation::validate_bytes;
use ipregion::Database;
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;

// A valid image to mutate, so the fuzzer gets past the size check.
fn seed_image() -> &'static [u8] {
    static IMAGE: OnceLock<Vec<u8>> = OnceLock::new();
    IMAGE.get_or_init(|| {
        let mut builder = ipregion::DatabaseBuilder::new().with_created_at(0);
        let _ = builder.add_line("8.8.8.0|8.8.8.255|United States|0|0|0|Level3");
        let _ = builder.add_line("114.114.114.0|114.114.114.255|China|0|Jiangsu|Nanjing|0");
        builder.build().unwrap_or_default()
    })
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic.
    let _ = Database::from_bytes(data.to_vec());

    // Splice the input over the seed image at an input-chosen offset.
    if data.len() >= 4 {
        let mut image = seed_image().to_vec();
        if image.is_empty() {
            return;
        }
        let offset = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize % image.len();
        let patch = &data[4..];
        let end = (offset + patch.len()).min(image.len());
        image[offset..end].copy_from_slice(&patch[..end - offset]);

        // Whatever the loader accepts, the validator must have parsed too.
        let report = validate_bytes(&image);
        if let Ok(db) = Database::from_bytes(image) {
            assert_eq!(report.stats.segment_count, db.segment_count());
            for ip in [0u32, 0x0808_0808, 0x7272_7272, u32::MAX] {
                let _ = db.find(ip);
                let _ = db.record(ip);
            }
        }
    }
});
