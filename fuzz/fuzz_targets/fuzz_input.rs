// SPDX-License-Identifier: PMPL-1.0
#![no_main]

use instapost::post::{clean_caption, parse_hashtags, MAX_HASHTAGS};
use instapost::webhook::classify_response;
use libfuzzer_sys::fuzz_target;

// Model output and webhook bodies are untrusted text
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let tags = parse_hashtags(text, MAX_HASHTAGS);
    assert!(tags.len() <= MAX_HASHTAGS);

    let _ = clean_caption(text);

    let status = 200 + (data.len() % 400) as u16;
    let _ = classify_response(status, text);
});
