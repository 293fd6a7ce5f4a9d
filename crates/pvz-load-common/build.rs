//! ---
//! pvz_section: "01-core-functionality"
//! pvz_subsection: "build"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Build script capturing version metadata."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder().all_build().all_cargo().emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
