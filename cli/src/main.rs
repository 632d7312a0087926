use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wiregen_compiler::config::DEFAULT_INCLUDE_STEM;
use wiregen_compiler::{compute_layouts, generate, Config, Formatter, GenError, Mode, Output, Schema};

#[derive(Parser)]
#[command(name = "wiregen")]
#[command(about = "Generate Rust bindings from a resolved IDL declaration tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the header, source and test-base files for one library
    Generate {
        /// Declaration tree in JSON form
        #[arg(long)]
        json: PathBuf,

        /// Path prefix of every output file, e.g. `out/demo/geometry/wire`
        #[arg(long)]
        output_base: String,

        /// Root that include paths are expressed under
        #[arg(long)]
        include_base: String,

        /// Appended to a library's directory to form its include path
        #[arg(long, default_value = DEFAULT_INCLUDE_STEM)]
        include_stem: String,

        /// Filter every file through this program (stdin to stdout)
        #[arg(long)]
        formatter_path: Option<PathBuf>,

        /// Extra arguments for the formatter
        #[arg(long = "formatter-arg", allow_hyphen_values = true)]
        formatter_args: Vec<String>,

        /// Only emit constants, enums, bits, structs, tables, unions and protocol markers
        #[arg(long)]
        domain_objects_only: bool,
    },

    /// Print the computed wire layout of every struct as JSON
    Layout {
        /// Declaration tree in JSON form
        #[arg(long)]
        json: PathBuf,
    },
}

fn load_schema(path: &Path) -> Result<Schema, GenError> {
    let text = fs::read_to_string(path)?;
    Schema::from_json(&text)
}

fn write_output(output: &Output) -> Result<(), GenError> {
    for file in output.values() {
        let path = Path::new(&file.name);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &file.contents)?;
        info!(file = %file.name, bytes = file.contents.len(), "Wrote");
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), GenError> {
    match cli.command {
        Commands::Generate {
            json,
            output_base,
            include_base,
            include_stem,
            formatter_path,
            formatter_args,
            domain_objects_only,
        } => {
            let schema = load_schema(&json)?;
            let mode = if domain_objects_only { Mode::DomainObjectsOnly } else { Mode::Monolithic };
            let config = Config::new(output_base, include_base).with_include_stem(include_stem).with_mode(mode);
            let formatter = match formatter_path {
                Some(program) => Formatter::external(program).with_args(formatter_args),
                None => Formatter::Disabled,
            };

            let output = generate(&schema, &config, &formatter)?;
            write_output(&output)?;
            println!("Generated {} files for {}", output.len(), schema.name);
            Ok(())
        }

        Commands::Layout { json } => {
            let schema = load_schema(&json)?;
            let layouts = compute_layouts(&schema)?;
            println!("{}", serde_json::to_string_pretty(&layouts)?);
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        let code = if err.is_toolchain_error() { 2 } else { 1 };
        std::process::exit(code);
    }
}
