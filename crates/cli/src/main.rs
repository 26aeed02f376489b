#![deny(unsafe_code)]
//! CLI binary for the city-engine map generator.
//!
//! Subcommands:
//! - `generate` — run the full pipeline from a parameter JSON, write SVG
//!   and/or geometry JSON
//! - `params` — print the default parameter document

mod error;

use city_engine_core::MapParams;
use city_engine_map::{svg, MapGeometry, MapPipeline};
use clap::{Parser, Subcommand};
use error::CliError;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "city-engine", about = "Procedural city map generator")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a map and write it to disk.
    Generate {
        /// Parameter JSON document; defaults apply when omitted.
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Override the PRNG seed from the parameter document.
        #[arg(long)]
        seed: Option<u64>,

        /// SVG output path.
        #[arg(short, long, default_value = "map.svg")]
        output: PathBuf,

        /// Also write every output surface as geometry JSON.
        #[arg(short, long)]
        geometry: Option<PathBuf>,
    },
    /// Print the default parameter document.
    Params,
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Params => {
            let defaults = MapParams::default();
            println!("{}", serde_json::to_string_pretty(&defaults)?);
        }
        Command::Generate {
            params,
            seed,
            output,
            geometry,
        } => {
            let mut map_params = match params {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .map_err(|e| CliError::ParamsUnreadable(format!("{}: {e}", path.display())))?;
                    MapParams::from_json_str(&text)?
                }
                None => MapParams::default(),
            };
            if let Some(seed) = seed {
                map_params.seed = seed;
            }

            let mut pipeline = MapPipeline::new(map_params)?;
            pipeline.generate();

            svg::write(&pipeline, &output)?;
            if let Some(geometry_path) = &geometry {
                let geometry_doc = MapGeometry::from_pipeline(&pipeline);
                let json = serde_json::to_string_pretty(&geometry_doc)?;
                std::fs::write(geometry_path, json)
                    .map_err(|e| CliError::WriteFailed(format!("{}: {e}", geometry_path.display())))?;
            }

            if cli.json {
                let info = serde_json::json!({
                    "seed": pipeline.params().seed,
                    "mainRoads": pipeline.main_roads().len(),
                    "majorRoads": pipeline.major_roads().len(),
                    "minorRoads": pipeline.minor_roads().len(),
                    "parks": pipeline.parks().len(),
                    "lots": pipeline.lots().len(),
                    "buildings": pipeline.building_models().len(),
                    "output": output.display().to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                eprintln!(
                    "generated {} main, {} major, {} minor roads, {} lots (seed {}) -> {}",
                    pipeline.main_roads().len(),
                    pipeline.major_roads().len(),
                    pipeline.minor_roads().len(),
                    pipeline.lots().len(),
                    pipeline.params().seed,
                    output.display()
                );
            }
        }
    }

    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}
