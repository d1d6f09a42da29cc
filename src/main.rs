extern crate log;
pub mod arcgis;
pub mod config;
pub mod export;
pub mod geometry;
pub mod kmz;
pub mod server;
use crate::arcgis::client::ArcGisClient;
use crate::config::profiles::{load_profiles, ServiceProfiles, DEFAULT_SERVICES_FILE};
use crate::export::ExportRequest;
use crate::server::AppState;
use anyhow::anyhow;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Export cadastral parcels and intersecting thematic layers from ArcGIS feature services as KMZ.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the services file with the service profiles.
    #[arg(short, long, env = "ARCGIS_SERVICES_FILE")]
    services_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Export lot/plans to a KMZ file.
    Export {
        /// Name of the service profile to use.
        #[arg(short, long)]
        profile: String,
        /// Path of the KMZ file to write.
        #[arg(short, long, default_value = "export.kmz")]
        output: PathBuf,
        /// Lot/plans to export, e.g. 2RP53435.
        #[arg(required = true)]
        lotplans: Vec<String>,
    },
    /// List the configured service profiles.
    Profiles,
}

fn export_to_file(
    profiles: &ServiceProfiles,
    profile: String,
    lotplans: Vec<String>,
    output: &Path,
) -> anyhow::Result<()> {
    let request = ExportRequest {
        service_profile: Some(profile),
        lotplans,
    };
    let plan = request.validate(profiles)?;
    let kmz = plan.run(&ArcGisClient::default())?;
    std::fs::write(output, &kmz).or(Err(anyhow!("Could not write KMZ to {:?}", output)))?;
    log::info!("Wrote {} bytes to {:?}", kmz.len(), output);
    Ok(())
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    let profiles = load_profiles(
        args.services_file.as_deref(),
        Path::new(DEFAULT_SERVICES_FILE),
    );

    match args.command {
        Command::Serve { host, port } => {
            if profiles.is_empty() {
                log::warn!("Serving without any service profiles");
            }
            let state = AppState::new(profiles, ArcGisClient::default());
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(state, &host, port))
        }
        Command::Export {
            profile,
            output,
            lotplans,
        } => export_to_file(&profiles, profile, lotplans, &output),
        Command::Profiles => {
            for (name, profile) in &profiles.profiles {
                println!("{}\t{} layers", name, profile.thematic_layers().len());
            }
            Ok(())
        }
    }
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
