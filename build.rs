fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::env::var("OUT_DIR")?;
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .file_descriptor_set_path(std::path::Path::new(&out_dir).join("chord_descriptor.bin"))
        .compile(&["proto/chord.proto"], &["proto"])?;
    Ok(())
}
