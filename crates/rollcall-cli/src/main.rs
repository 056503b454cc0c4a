use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[zbus::proxy(
    interface = "org.rollcall.Rollcall1",
    default_service = "org.rollcall.Rollcall1",
    default_path = "/org/rollcall/Rollcall1"
)]
trait Rollcall {
    async fn enroll(
        &self,
        identity: &str,
        detections_json: &str,
        image: Vec<u8>,
    ) -> zbus::Result<String>;

    async fn mark_attendance(
        &self,
        identity: &str,
        detections_json: &str,
        image: Vec<u8>,
    ) -> zbus::Result<String>;

    async fn verify(
        &self,
        identity: &str,
        detections_json: &str,
        image: Vec<u8>,
        threshold: f64,
    ) -> zbus::Result<String>;

    async fn list_records(&self, identity: &str) -> zbus::Result<String>;

    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a face capture for an identity
    Enroll {
        /// Identity to enroll
        #[arg(short, long)]
        identity: String,
        /// Encoded snapshot image file
        #[arg(long)]
        image: PathBuf,
        /// Detector output for the frame (JSON array of detections)
        #[arg(long)]
        detections: PathBuf,
    },
    /// Mark today's attendance from a capture
    Mark {
        #[arg(short, long)]
        identity: String,
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        detections: PathBuf,
    },
    /// Score a capture against an enrollment without marking attendance
    Verify {
        #[arg(short, long)]
        identity: String,
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        detections: PathBuf,
        /// Acceptance cutoff; 0 uses the daemon's login threshold
        #[arg(long, default_value_t = 0.0)]
        threshold: f64,
    },
    /// List attendance records
    List {
        /// Restrict to one identity
        identity: Option<String>,
    },
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = zbus::Connection::session()
        .await
        .context("connecting to session bus — is rollcalld running?")?;
    let proxy = RollcallProxy::new(&conn).await?;

    match cli.command {
        Commands::Enroll { identity, image, detections } => {
            let (detections_json, image) = read_capture(&image, &detections)?;
            let reply = proxy.enroll(&identity, &detections_json, image).await?;
            println!("{reply}");
        }
        Commands::Mark { identity, image, detections } => {
            let (detections_json, image) = read_capture(&image, &detections)?;
            let reply = proxy.mark_attendance(&identity, &detections_json, image).await?;
            println!("{reply}");
        }
        Commands::Verify { identity, image, detections, threshold } => {
            let (detections_json, image) = read_capture(&image, &detections)?;
            let reply = proxy.verify(&identity, &detections_json, image, threshold).await?;
            println!("{reply}");
        }
        Commands::List { identity } => {
            let reply = proxy.list_records(identity.as_deref().unwrap_or("")).await?;
            println!("{reply}");
        }
        Commands::Status => {
            let reply = proxy.status().await?;
            println!("{reply}");
        }
    }

    Ok(())
}

fn read_capture(image: &Path, detections: &Path) -> Result<(String, Vec<u8>)> {
    let detections_json = std::fs::read_to_string(detections)
        .with_context(|| format!("reading {}", detections.display()))?;
    let image = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    Ok((detections_json, image))
}
