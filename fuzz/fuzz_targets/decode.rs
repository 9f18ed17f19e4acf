#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Beliebige Bytes dürfen nie paniken oder unbegrenzt allozieren,
    // nur sauber mit einem Fehler zurückkommen.
    let types = ryko::TypeRegistry::new();
    let config = ryko::DecoderConfig { max_length: Some(1 << 20) };
    let _ = ryko::decode_with_config(data, &types, &config);
});
