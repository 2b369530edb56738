#![no_main]

use libfuzzer_sys::fuzz_target;

use linkpreview::scanner::{HeadState, ScanBuffer};

fuzz_target!(|data: &[u8]| {
    // Feed the input in uneven chunks; the scanner must never panic and must
    // always end up complete once finished.
    let mut buffer = ScanBuffer::new(64 * 1024);
    for chunk in data.chunks(7) {
        if buffer.append(chunk) == HeadState::Complete {
            break;
        }
    }
    buffer.finish();
    assert!(buffer.is_complete());
});
