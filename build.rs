use anyhow::*;
use fs_extra::copy_items;
use fs_extra::dir::CopyOptions;
use std::env;
use std::path::PathBuf;

// Stages the furniture models next to the build output and tells the binary
// where they are, so `cubicle-view` finds them from any working directory.
fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=assets");

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let assets_src = manifest_dir.join("assets");

    let staged = if assets_src.exists() {
        let mut copy_options = CopyOptions::new();
        copy_options.overwrite = true;
        copy_items(&[&assets_src], &out_dir, &copy_options)?;
        out_dir.join("assets")
    } else {
        println!("cargo:warning=no assets/ directory; furniture will fail to load");
        assets_src
    };
    println!("cargo:rustc-env=CUBICLE_VIEW_ASSETS={}", staged.display());

    Ok(())
}
