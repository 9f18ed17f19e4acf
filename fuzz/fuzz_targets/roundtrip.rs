#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let types = ryko::TypeRegistry::new();
    if let Ok(value) = ryko::decode(data, &types) {
        let bytes = ryko::encode(&value, &types).expect("re-encode of a decoded graph");
        let again = ryko::decode(&bytes, &types).expect("decode of a re-encoded stream");
        assert!(ryko::graph_eq(&value, &again));
    }
});
