/// Builds the gRPC client and server code for `proto/tasker.proto` using
/// `tonic-prost-build`.
///
/// A file descriptor set is written next to the generated code so the server
/// can expose it through gRPC reflection. The well-known types
/// (`FieldMask`, `Empty`) resolve to `prost-types`.
///
/// Generated code is accessible via:
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("tasker.v1");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let descriptor_path = out_dir.join("tasker_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure().compile_with_config(
        config,
        &["proto/tasker.proto"],
        &["proto"],
    )?;
    Ok(())
}
