//! Opening data nested several layers deep.
//!
//! This example builds a small disk image holding a compressed, encrypted
//! payload at an offset, then reads the payload back through the chain
//!
//! ```text
//! OS → DATA_RANGE → ENCRYPTED_STREAM → COMPRESSED_STREAM
//! ```
//!
//! and shows how the resolver shares and releases the layers.
//!
//! Run with: `cargo run --example layered_open`

use stackvfs::*;
use std::io::Write;

const PAYLOAD_OFFSET: u64 = 4096;
const KEY: &[u8] = b"case-0042";

// =============================================================================
// Building the image
// =============================================================================

fn build_image(payload: &[u8]) -> tempfile::NamedTempFile {
    let mut sealed = zstd::stream::encode_all(payload, 0).unwrap();
    apply_sha256_ctr(KEY, b"", 0, &mut sealed);

    let mut image = tempfile::NamedTempFile::new().unwrap();
    image.write_all(&[0u8; PAYLOAD_OFFSET as usize]).unwrap();
    image.write_all(&sealed).unwrap();
    image.write_all(&[0u8; 512]).unwrap();
    image.flush().unwrap();
    image
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Layered Open Example ===\n");

    let payload = b"Nested evidence: reached through four layers.\n".repeat(20);
    let image = build_image(&payload);
    let sealed_size = std::fs::metadata(image.path())?.len() - PAYLOAD_OFFSET - 512;

    // ===========================================
    // Step 1: Describe the chain
    // ===========================================
    println!("--- Step 1: Path specification chain ---\n");

    let os = PathSpec::os(image.path().to_string_lossy());
    let range = PathSpec::new(
        TypeIndicator::DATA_RANGE,
        Some(os),
        [("range_offset", PAYLOAD_OFFSET), ("range_size", sealed_size)],
    )?;
    let encrypted = PathSpec::new(
        TypeIndicator::ENCRYPTED_STREAM,
        Some(range.clone()),
        [("encryption_method", SHA256_CTR)],
    )?;
    let compressed = PathSpec::new(
        TypeIndicator::COMPRESSED_STREAM,
        Some(encrypted.clone()),
        [("compression_method", ZSTD)],
    )?;

    println!("{compressed}\n");
    println!("depth: {}\n", compressed.depth());

    // ===========================================
    // Step 2: Supply the key and open
    // ===========================================
    println!("--- Step 2: Open through the resolver ---\n");

    let resolver = Resolver::with_builtin();
    resolver.key_chain().set_credential(&encrypted, "key", KEY);

    let mut file = resolver.open_file_object(&compressed)?;
    let recovered = file.read_to_end()?;
    println!("read {} bytes, matches payload: {}", recovered.len(), recovered == payload);
    println!("first line: {}", String::from_utf8_lossy(&recovered[..46]).trim_end());
    println!();

    // ===========================================
    // Step 3: Shared layers
    // ===========================================
    println!("--- Step 3: Shared layers ---\n");

    let window = resolver.open_file_object(&range)?;
    let context = resolver.context();
    println!("cached file objects: {}", context.cached_file_objects());
    println!(
        "DATA_RANGE handles: {:?}",
        context.file_object_references(&range)
    );

    window.close();
    file.close();
    println!("after close, cached file objects: {}", context.cached_file_objects());
    println!();

    // ===========================================
    // Step 4: Serialized form
    // ===========================================
    println!("--- Step 4: JSON round trip ---\n");

    let json = compressed.to_json()?;
    println!("{json}\n");
    let rebuilt = resolver.factory().new_path_spec_from_json(&json)?;
    println!("rebuilt equals original: {}", rebuilt == compressed);

    // ===========================================
    // Step 5: Errors name the failing layer
    // ===========================================
    println!("\n--- Step 5: Errors ---\n");

    resolver.key_chain().clear();
    match resolver.open_file_object(&compressed) {
        Ok(_) => println!("unexpectedly opened without a key"),
        Err(e) => println!("without a key: {e}"),
    }

    let raw = PathSpec::new(
        TypeIndicator::RAW,
        Some(PathSpec::os(image.path().to_string_lossy())),
        Attributes::new(),
    )?;
    match resolver.open_file_system(&raw) {
        Ok(_) => println!("unexpectedly opened a RAW file system"),
        Err(e) => println!("RAW file system: {e}"),
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
