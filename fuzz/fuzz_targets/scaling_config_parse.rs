#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    use ropekit_common::{ModelRopeConfig, RopeScalingConfig};

    let Ok(text) = std::str::from_utf8(data) else { return };

    // Parsing and validation must never panic, only return Err.
    if let Ok(raw) = RopeScalingConfig::from_json_str(text)
        && let Ok(scaling) = raw.validate()
    {
        // A validated variant always reports the tag it was parsed from.
        assert_eq!(Some(scaling.rope_type()), raw.rope_type().ok());
    }

    if let Ok(model) = ModelRopeConfig::from_json_str(text)
        && let Ok(spec) = model.to_spec(true)
    {
        let _ = spec.resolve();
    }
});
