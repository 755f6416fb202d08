pub mod annotate;
pub mod config;
pub mod data;
pub mod render;
pub mod resolve;
pub mod scene;
pub mod server;
pub mod tables;
pub mod timeline;
pub mod topo;
pub mod types;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render scene imagery to the output directory
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Scene to render (1, 2 or 3); all three when omitted
        #[arg(short, long)]
        scene: Option<u8>,
    },
    /// Serve the resolved data and playback API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn load_tables(app_config: &config::AppConfig) -> anyhow::Result<tables::LookupTables> {
    match &app_config.input.tables {
        Some(path) => tables::LookupTables::load_from_file(path),
        None => Ok(tables::LookupTables::builtin()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { config, scene: scene_no } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let tables = load_tables(&app_config)?;

            // 1. Load both data sources; either failure is fatal.
            let index = data::load_records(&app_config)?;
            let topology_text = data::fetch_topology(&app_config).await?;
            let features = data::parse_features(&app_config, &topology_text)?;

            // 2. Render the requested scenes.
            let scenes: Vec<scene::Scene> = match scene_no {
                Some(n) => vec![scene::Scene::from_number(*n)
                    .ok_or_else(|| anyhow::anyhow!("No such scene: {} (expected 1, 2 or 3)", n))?],
                None => vec![
                    scene::Scene::Overview,
                    scene::Scene::Timeline,
                    scene::Scene::Scatter,
                ],
            };
            for s in scenes {
                render::render_scene(&app_config, s, &features, &index, &tables)?;
            }
            println!("Rendering complete!");
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let tables = load_tables(&app_config)?;

            println!("Loading data for API...");
            let index = data::load_records(&app_config)?;
            let topology_text = data::fetch_topology(&app_config).await?;
            let features = data::parse_features(&app_config, &topology_text)?;

            server::start_server(app_config, features, index, tables).await?;
        }
    }

    Ok(())
}
