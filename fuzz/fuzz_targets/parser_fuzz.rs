//! Compiler fuzz target: arbitrary text through scan, build, validation and
//! every backend. Nothing may panic; malformed input must come back as a
//! ParseError or a list of diagnostics.
//! Build with: cargo fuzz run parser_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(spec) = packspec::parse(s) {
        let config = packspec::Config::default();
        let _ = packspec::generate(&spec, &packspec::Backend::ALL, &config);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parser_fuzz");
}
