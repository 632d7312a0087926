use std::env;
use std::fs;
use std::path::Path;

use wiregen_compiler::{generate, Config, Formatter, Schema};

fn main() {
    let schema_path = "schema/geometry.json";
    println!("cargo:rerun-if-changed={}", schema_path);

    let text = fs::read_to_string(schema_path).expect("Failed to read the geometry schema");
    let schema = Schema::from_json(&text).expect("Failed to parse the geometry schema");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let include_base = out_dir.replace('\\', "/");
    let config = Config::new(format!("{}/demo/geometry/wire", include_base), include_base);

    let output = generate(&schema, &config, &Formatter::Disabled).expect("Failed to generate bindings");
    for file in output.values() {
        let path = Path::new(&file.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create the output directory");
        }
        fs::write(path, &file.contents).expect("Failed to write generated bindings");
    }
}
