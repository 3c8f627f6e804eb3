#![no_main]

use libfuzzer_sys::fuzz_target;
use queryflow_core::compile;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if text.len() > 10_000 {
            return;
        }
        // Any plan that compiles renders back to text compiling to the same plan
        if let Ok(plan) = compile(text) {
            let rendered = plan.to_string();
            assert_eq!(compile(&rendered).ok(), Some(plan), "{}", rendered);
        }
    }
});
