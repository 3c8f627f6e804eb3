#![no_main]

use libfuzzer_sys::fuzz_target;
use queryflow_core::query::{tokenize, TokenKind};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Limit statement length to prevent timeout
        if text.len() > 10_000 {
            return;
        }

        // Never panics; a successful scan always ends in a single Eof
        if let Ok(tokens) = tokenize(text) {
            assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
            assert_eq!(
                tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(),
                1
            );
        }
    }
});
