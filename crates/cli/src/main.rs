use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use folio_core::slug::slugify;
use folio_ingest::IngestReport;
use folio_server::{Server, ServerOptions, DEFAULT_MAX_UPLOAD_BYTES};
use folio_storage_ephemeral::EphemeralStore;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_ROOT: &str = "./projects";
const DEFAULT_UPLOADS: &str = "./uploads_temp";

#[derive(Parser, Debug)]
#[command(name = "folio", version, about = "Portfolio project upload and file server")]
struct Cli {
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Extract an archive into the projects root without a running server.
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long)]
    addr: Option<String>,
    /// Directory holding extracted projects.
    #[arg(long)]
    root: Option<String>,
    /// Spool directory for incoming archives.
    #[arg(long)]
    uploads: Option<String>,
    /// Start with the two sample projects.
    #[arg(long, default_value_t = false)]
    seed_demo: bool,
    #[arg(long)]
    max_upload_bytes: Option<usize>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Project title; the target directory is derived from it.
    #[arg(long)]
    name: String,
    #[arg(long)]
    archive: PathBuf,
    #[arg(long)]
    root: Option<String>,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let cfg = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Serve(args) => serve(args, &cfg).await?,
        Commands::Extract(args) => extract_cmd(args, &cfg)?,
    }
    Ok(())
}

async fn serve(args: ServeArgs, cfg: &AppConfig) -> Result<()> {
    let section = cfg.serve.clone().unwrap_or_default();
    let addr = args
        .addr
        .or(section.addr)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let options = ServerOptions {
        projects_root: expand_path(
            &args
                .root
                .or(section.root)
                .unwrap_or_else(|| DEFAULT_ROOT.to_string()),
        ),
        uploads_dir: expand_path(
            &args
                .uploads
                .or(section.uploads)
                .unwrap_or_else(|| DEFAULT_UPLOADS.to_string()),
        ),
        max_upload_bytes: args
            .max_upload_bytes
            .or(section.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
    };
    let seed_demo = args.seed_demo || section.seed_demo.unwrap_or(false);
    let store = if seed_demo {
        EphemeralStore::with_demo_projects()
    } else {
        EphemeralStore::new()
    };
    info!(%addr, seed_demo, "starting server");
    let server = Server::new_with_options(store, options);
    server
        .run_http(&addr)
        .await
        .map_err(|e| eyre!("server error: {}", e))
}

fn extract_cmd(args: ExtractArgs, cfg: &AppConfig) -> Result<()> {
    let name = args.name.trim();
    if name.is_empty() {
        return Err(eyre!("--name must not be empty"));
    }
    let root = expand_path(
        &args
            .root
            .or_else(|| cfg.serve.as_ref().and_then(|s| s.root.clone()))
            .unwrap_or_else(|| DEFAULT_ROOT.to_string()),
    );
    let slug = slugify(name);
    let destination = root.join(&slug);

    // Ingestion consumes its input; work on a copy so the caller keeps theirs.
    let staged = std::env::temp_dir().join(format!(
        "folio-extract-{}.zip",
        uuid::Uuid::new_v4().simple()
    ));
    fs::copy(&args.archive, &staged)
        .map_err(|e| eyre!("cannot read {}: {}", args.archive.display(), e))?;
    let report = folio_ingest::ingest(&staged, &destination)
        .map_err(|e| eyre!("extraction failed: {}", e))?;

    info!(slug = %slug, files = report.files, "archive extracted");
    let summary = ExtractSummary {
        slug: &slug,
        report: &report,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// What `folio extract` prints.
#[derive(Serialize)]
struct ExtractSummary<'a> {
    slug: &'a str,
    #[serde(flatten)]
    report: &'a IngestReport,
}

// -----------------
// Config handling

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ServeSection {
    addr: Option<String>,
    root: Option<String>,
    uploads: Option<String>,
    seed_demo: Option<bool>,
    max_upload_bytes: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct AppConfig {
    #[serde(default)]
    serve: Option<ServeSection>,
}

/// Optional config file layered under `FOLIO_SERVE__ADDR`-style variables.
fn load_config(path: Option<&str>) -> Result<AppConfig> {
    let mut builder = config::Config::builder().add_source(
        config::Environment::with_prefix("FOLIO")
            .prefix_separator("_")
            .separator("__"),
    );

    if let Some(raw) = path {
        let expanded = expand_path(raw);
        if !expanded.exists() {
            tracing::warn!(
                path = expanded.display().to_string(),
                "config file not found; continuing with defaults and env overrides"
            );
        }
        builder = builder.add_source(config::File::from(expanded).required(false));
    }

    let cfg = builder
        .build()
        .map_err(|e| eyre!("config load error: {}", e))?;
    cfg.try_deserialize()
        .map_err(|e| eyre!("config parse error: {}", e))
}

fn expand_path(input: &str) -> PathBuf {
    if input == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from(input));
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return home_dir()
            .map(|mut base| {
                base.push(rest);
                base
            })
            .unwrap_or_else(|| PathBuf::from(rest));
    }
    PathBuf::from(input)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("USERPROFILE").map(PathBuf::from))
}
