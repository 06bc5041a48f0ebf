//! Copies a local uploads tree into an S3 bucket, keeping relative paths as keys.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use walkdir::WalkDir;

use booking_gallery::{config::S3Config, storage::s3::S3Storage};

#[derive(Parser)]
#[command(name = "migrate-uploads")]
#[command(about = "Upload the contents of the local uploads directory to S3")]
struct Cli {
    /// Local uploads directory
    #[arg(long, default_value = "public/uploads")]
    uploads_dir: PathBuf,

    /// Destination bucket
    #[arg(long, env = "S3_BUCKET")]
    bucket: Option<String>,

    /// Bucket region
    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    region: String,

    /// Only list what would be uploaded
    #[arg(long)]
    dry_run: bool,
}

/// The object key for `path`: its path under `root`, joined with `/`.
fn object_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;

    if parts.is_empty() { None } else { Some(parts.join("/")) }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let cli = Cli::parse();

    let bucket = cli
        .bucket
        .filter(|b| !b.is_empty())
        .context("S3_BUCKET (or --bucket) is required")?;

    if !cli.uploads_dir.is_dir() {
        anyhow::bail!("No uploads directory found at {}", cli.uploads_dir.display());
    }

    tracing::info!("🔎 Scanning uploads in {}", cli.uploads_dir.display());
    let mut files = Vec::new();
    for entry in WalkDir::new(&cli.uploads_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", cli.uploads_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        match object_key(&cli.uploads_dir, entry.path()) {
            Some(key) => files.push((entry.into_path(), key)),
            None => tracing::warn!("⚠️ Skipping {}: not representable as a key", entry.path().display()),
        }
    }
    tracing::info!("Found {} files.", files.len());

    let storage = if cli.dry_run {
        None
    } else {
        Some(
            S3Storage::connect(S3Config {
                bucket: bucket.clone(),
                region: cli.region.clone(),
                public_url: None,
            })
            .await,
        )
    };

    let mut uploaded = 0usize;
    for (path, key) in &files {
        let Some(storage) = &storage else {
            tracing::info!("[DRY] {}", key);
            uploaded += 1;
            continue;
        };

        tracing::info!("[UP ] {}", key);
        match storage.put_file(path, key).await {
            Ok(()) => uploaded += 1,
            Err(e) => tracing::error!("❌ Failed to upload {}: {}", key, e),
        }
    }

    println!(
        "Uploaded {}/{} files to {}{}",
        uploaded,
        files.len(),
        bucket,
        if cli.dry_run { " (dry-run)" } else { "" }
    );

    Ok(())
}
