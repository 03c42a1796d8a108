//! Build script for storinspect
//!
//! This script generates the build-time configuration constants from
//! the enabled cargo features.

use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    generate_config();
}

/// Highest enabled architecture wins, matching `arch::default_arch()`
fn default_arch() -> &'static str {
    if env::var_os("CARGO_FEATURE_ARCH_ZARCH").is_some() {
        "z/Arch"
    } else if env::var_os("CARGO_FEATURE_ARCH_ESA390").is_some() {
        "ESA/390"
    } else if env::var_os("CARGO_FEATURE_ARCH_S370").is_some() {
        "S/370"
    } else {
        panic!("at least one of arch_s370, arch_esa390 or arch_zarch must be enabled");
    }
}

fn generate_config() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("config.rs");

    let debug = env::var_os("CARGO_FEATURE_DEBUG").is_some();
    let verbose = env::var_os("CARGO_FEATURE_VERBOSE").is_some();

    let mut config = String::new();
    config.push_str("// Auto-generated configuration file\n\n");

    config.push_str(&format!(
        "/// Name of the architecture selected when none is given\n\
         pub const DEFAULT_ARCH: &str = \"{}\";\n",
        default_arch()
    ));

    // Feature flags
    config.push_str("\n// Feature configuration\n");
    config.push_str(&format!("pub const DEBUG: bool = {};\n", debug));
    config.push_str(&format!("pub const VERBOSE: bool = {};\n", verbose));

    fs::write(&dest_path, config).unwrap();
}
