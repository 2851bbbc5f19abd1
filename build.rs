//! Build script for the VNA SPI firmware
//!
//! Handles:
//! - Linker scripts for the embedded binary (cortex-m-rt, defmt)
//!
//! `memory.x` comes from embassy-stm32's `memory-x` feature.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let embedded = std::env::var_os("CARGO_FEATURE_EMBEDDED").is_some();
    let target = std::env::var("TARGET").unwrap_or_default();

    // Host test builds link normally
    if embedded && target.starts_with("thumb") {
        println!("cargo:rustc-link-arg-bins=--nmagic");
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
}
