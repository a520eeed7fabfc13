use std::fs;
use std::path::Path;

const MOD: &[u8] = b"
pub use self::cast_channel::*;

mod cast_channel;
";

fn main() {
    println!("cargo:rerun-if-changed=proto/cast_channel.proto");
    println!("cargo:rerun-if-changed=build.rs");

    fs::create_dir_all("src/proto").expect("Failed to create src/proto");

    protobuf_codegen_pure::Codegen::new()
        .out_dir("src/proto")
        .inputs(&["proto/cast_channel.proto"])
        .include("proto")
        .run()
        .expect("protoc");

    let dest_path = Path::new(".").join("src/proto/mod.rs");
    fs::write(&dest_path, MOD).expect("Failed to write proto/mod.rs");
}
