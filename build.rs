use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Only the macOS build links the system frameworks; other targets compile
    // the platform stubs.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("macos") {
        return;
    }

    // SkyLight lives under PrivateFrameworks and is used for window-aware
    // process activation.
    println!("cargo:rustc-link-search=framework=/System/Library/PrivateFrameworks");
    for framework in ["ApplicationServices", "CoreGraphics", "CoreFoundation", "AppKit"] {
        println!("cargo:rustc-link-lib=framework={framework}");
    }
    println!("cargo:rustc-link-lib=framework=SkyLight");

    println!("cargo:rustc-env=MACOSX_DEPLOYMENT_TARGET=12.0");
}
