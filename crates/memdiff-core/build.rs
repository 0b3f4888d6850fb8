//! Build script for memdiff-core
//!
//! Checks the toolchain before compilation:
//! - Rust 1.70.0+ (scoped worker threads, `Option::is_some_and`)
//! - 64-bit little-endian target (pointer reads assume 8-byte LE words)

fn main()
{
    match (rustc_version::version(), rustc_version::Version::parse("1.70.0")) {
        (Ok(found), Ok(min)) if found < min => {
            panic!("memdiff-core requires Rust {min} or newer, found {found}");
        }
        (Ok(_), Ok(_)) => {}
        _ => println!("cargo:warning=could not verify Rust version"),
    }

    let endian = std::env::var("CARGO_CFG_TARGET_ENDIAN").unwrap_or_default();
    if endian == "big" {
        println!("cargo:warning=memdiff-core decodes snapshots as little-endian; big-endian hosts are untested");
    }
}
