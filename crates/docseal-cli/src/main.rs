//! docseal: encrypted document store CLI
//!
//! Commands:
//!   store <file>             - validate, encrypt and store a file
//!   retrieve <id>            - decrypt a file and verify its checksum
//!   delete <id>              - remove a file (blob first, pointer last)
//!   list                     - list an owner's files, newest first
//!   stats                    - storage totals per category
//!   backup                   - write a password-protected backup
//!   restore <path>           - restore a backup into the store
//!   cleanup                  - sweep blobs no pointer refers to
//!   keygen                   - generate an RSA signing key pair
//!   config show              - display current configuration
//!   health                   - check the storage backend

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use docseal_core::config::DocsealConfig;
use docseal_core::{ListOptions, NewFile, StorageCategory};
use docseal_crypto::{generate_key_pair, public_key_from_pem, DocumentKeyPair};
use docseal_engine::{kdf_params, FileStore, JsonCatalog, ValidationPolicy};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "docseal",
    version,
    about = "Encrypted document storage",
    long_about = "docseal: store documents encrypted at rest, verify them on every read, back them up"
)]
struct Cli {
    /// Path to docseal.toml configuration file
    #[arg(long, short = 'c', env = "DOCSEAL_CONFIG", default_value = "./docseal.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to [log].level
    #[arg(long, env = "DOCSEAL_LOG")]
    log: Option<String>,

    /// Log format; defaults to [log].format
    #[arg(long, env = "DOCSEAL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt and store a local file
    ///
    /// The master key is read from DOCSEAL_MASTER_KEY or prompted for.
    Store {
        /// Local file to store
        file: PathBuf,
        /// Owner id
        #[arg(long, short = 'u', env = "DOCSEAL_OWNER")]
        owner: String,
        /// Name recorded in the metadata (default: the file name)
        #[arg(long)]
        name: Option<String>,
        /// MIME type (default: guessed from the extension)
        #[arg(long)]
        mime: Option<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Decrypt a stored file
    Retrieve {
        /// File id
        id: String,
        #[arg(long, short = 'u', env = "DOCSEAL_OWNER")]
        owner: String,
        /// Destination (default: original name in the current directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Overwrite an existing destination
        #[arg(long)]
        force: bool,
    },

    /// Delete a stored file
    Delete {
        id: String,
        #[arg(long, short = 'u', env = "DOCSEAL_OWNER")]
        owner: String,
    },

    /// List an owner's files
    List {
        #[arg(long, short = 'u', env = "DOCSEAL_OWNER")]
        owner: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// documents, images, temp
        #[arg(long)]
        category: Option<StorageCategory>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show storage totals for one owner, or for everyone
    Stats {
        #[arg(long, short = 'u', env = "DOCSEAL_OWNER")]
        owner: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Back up all of an owner's files into one encrypted blob
    ///
    /// The backup password is read from DOCSEAL_BACKUP_PASSWORD or prompted for.
    Backup {
        #[arg(long, short = 'u', env = "DOCSEAL_OWNER")]
        owner: String,
        /// List existing backups instead of creating one
        #[arg(long)]
        list: bool,
    },

    /// Restore a backup into the store
    Restore {
        /// Backup path as printed by `docseal backup`
        path: String,
        #[arg(long, short = 'u', env = "DOCSEAL_OWNER")]
        owner: String,
    },

    /// Delete blobs that no catalog entry refers to
    Cleanup,

    /// Generate an RSA-2048 key pair for signing stored records
    Keygen {
        /// Directory to write the PEM files into
        #[arg(long, short = 'o', default_value = ".")]
        out_dir: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check that the storage backend is reachable
    Health,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration as TOML
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = DocsealConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    if !cli.config.exists() {
        warn!("config file not found: {} (using defaults)", cli.config.display());
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "docseal starting"
    );

    match cli.command {
        Commands::Store {
            file,
            owner,
            name,
            mime,
            tags,
            description,
        } => cmd_store(&config, &file, &owner, name, mime, tags, description).await,
        Commands::Retrieve {
            id,
            owner,
            output,
            force,
        } => cmd_retrieve(&config, &id, &owner, output.as_deref(), force).await,
        Commands::Delete { id, owner } => cmd_delete(&config, &id, &owner).await,
        Commands::List {
            owner,
            page,
            limit,
            category,
            json,
        } => {
            let opts = ListOptions {
                page,
                limit,
                category,
            };
            cmd_list(&config, &owner, &opts, json).await
        }
        Commands::Stats { owner, json } => cmd_stats(&config, owner.as_deref(), json).await,
        Commands::Backup { owner, list } => cmd_backup(&config, &owner, list).await,
        Commands::Restore { path, owner } => cmd_restore(&config, &path, &owner).await,
        Commands::Cleanup => cmd_cleanup(&config).await,
        Commands::Keygen { out_dir } => cmd_keygen(&out_dir),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
        Commands::Health => cmd_health(&config).await,
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Store construction ────────────────────────────────────────────────────────

fn open_store(config: &DocsealConfig) -> Result<FileStore<JsonCatalog>> {
    let op = docseal_storage::build_operator(&config.storage)?;
    let catalog = JsonCatalog::open(&config.catalog.path)
        .with_context(|| format!("opening catalog: {}", config.catalog.path.display()))?;

    let mut store = FileStore::new(
        op,
        catalog,
        ValidationPolicy::from(&config.validation),
        kdf_params(&config.crypto)?,
    )?;

    if let Some(path) = &config.crypto.signing_key {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("reading signing key: {}", path.display()))?;
        let pair = DocumentKeyPair::from_private_pem(&pem)
            .with_context(|| format!("parsing signing key: {}", path.display()))?;
        store = store.with_signing_key(pair);
    }
    if let Some(path) = &config.crypto.verifying_key {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("reading verifying key: {}", path.display()))?;
        let key = public_key_from_pem(&pem)
            .with_context(|| format!("parsing verifying key: {}", path.display()))?;
        store = store.with_verifying_key(key);
    }

    Ok(store)
}

/// Secret from an env var, else an interactive prompt.
fn read_secret(env_var: &str, prompt: &str) -> Result<SecretString> {
    if let Ok(value) = std::env::var(env_var) {
        if !value.is_empty() {
            return Ok(SecretString::from(value));
        }
    }
    let value = rpassword::prompt_password(prompt).context("reading secret from terminal")?;
    if value.is_empty() {
        anyhow::bail!("empty secret (set {env_var} or enter a value)");
    }
    Ok(SecretString::from(value))
}

fn master_key() -> Result<SecretString> {
    read_secret("DOCSEAL_MASTER_KEY", "Master key: ")
}

fn backup_password() -> Result<SecretString> {
    read_secret("DOCSEAL_BACKUP_PASSWORD", "Backup password: ")
}

// ── `docseal store` ───────────────────────────────────────────────────────────

async fn cmd_store(
    config: &DocsealConfig,
    file: &Path,
    owner: &str,
    name: Option<String>,
    mime: Option<String>,
    tags: Vec<String>,
    description: Option<String>,
) -> Result<()> {
    let name = match name {
        Some(n) => n,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("no file name in {}", file.display()))?,
    };
    let mime_type = mime.unwrap_or_else(|| guess_mime(&name).to_string());

    let content =
        std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let store = open_store(config)?;
    let master = master_key()?;

    let new_file = NewFile {
        original_name: name,
        mime_type,
        tags: (!tags.is_empty()).then_some(tags),
        description,
    };
    let record = store.store(content, new_file, owner, &master).await?;

    println!("Stored {}", file.display());
    println!("  id:       {}", record.id);
    println!("  category: {}", record.category);
    println!("  size:     {}", fmt_bytes(record.size));
    println!("  sha256:   {}", record.checksum);
    Ok(())
}

/// MIME type for the default allow-list, by extension.
fn guess_mime(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "json" => "application/json",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

// ── `docseal retrieve` ────────────────────────────────────────────────────────

async fn cmd_retrieve(
    config: &DocsealConfig,
    id: &str,
    owner: &str,
    output: Option<&Path>,
    force: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let master = master_key()?;
    let file = store.retrieve(id, owner, &master).await?;

    let dest = match output {
        Some(p) => p.to_path_buf(),
        None => {
            // Only the final component of the recorded name is trusted.
            let base = Path::new(&file.metadata.original_name)
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(id));
            std::env::current_dir()?.join(base)
        }
    };
    if dest.exists() && !force {
        anyhow::bail!("{} exists (use --force to overwrite)", dest.display());
    }
    std::fs::write(&dest, file.content.as_slice())
        .with_context(|| format!("writing {}", dest.display()))?;

    println!("Retrieved {}", file.metadata.original_name);
    println!("  to:       {}", dest.display());
    println!("  type:     {}", file.metadata.mime_type);
    println!("  size:     {}", fmt_bytes(file.metadata.size));
    println!("  checksum: ok");
    println!(
        "  signed:   {}",
        if file.verified { "verified" } else { "not verified" }
    );
    Ok(())
}

// ── `docseal delete` ──────────────────────────────────────────────────────────

async fn cmd_delete(config: &DocsealConfig, id: &str, owner: &str) -> Result<()> {
    let store = open_store(config)?;
    store.delete(id, owner).await?;
    println!("Deleted {id}");
    Ok(())
}

// ── `docseal list` / `docseal stats` ──────────────────────────────────────────

async fn cmd_list(config: &DocsealConfig, owner: &str, opts: &ListOptions, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let page = store.list(owner, opts).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    let (page_no, limit) = opts.normalized();
    println!(
        "{} file(s) total, page {} ({} per page)",
        page.total, page_no, limit
    );
    if page.files.is_empty() {
        return Ok(());
    }
    println!();
    println!("{:<36}  {:<9}  {:>10}  {:>7}", "ID", "CATEGORY", "SIZE", "READS");
    for f in &page.files {
        println!(
            "{:<36}  {:<9}  {:>10}  {:>7}",
            f.id,
            f.category,
            fmt_bytes(f.size),
            f.access_count
        );
    }
    Ok(())
}

async fn cmd_stats(config: &DocsealConfig, owner: Option<&str>, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.stats(owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Storage stats ({})", owner.unwrap_or("all owners"));
    println!("  files: {}", stats.total_files);
    println!("  size:  {}", fmt_bytes(stats.total_size));
    for (category, s) in &stats.by_category {
        println!("  {:<10} {:>6} files  {:>10}", category.as_str(), s.files, fmt_bytes(s.size));
    }
    Ok(())
}

// ── `docseal backup` / `docseal restore` ──────────────────────────────────────

async fn cmd_backup(config: &DocsealConfig, owner: &str, list: bool) -> Result<()> {
    let store = open_store(config)?;

    if list {
        let backups = store.archiver().list_backups(owner).await?;
        if backups.is_empty() {
            println!("No backups for {owner}");
        }
        for path in backups {
            println!("{path}");
        }
        return Ok(());
    }

    let master = master_key()?;
    let password = backup_password()?;
    let report = store.archiver().create_backup(owner, &master, &password).await?;

    println!("Backup written:");
    println!("  path:     {}", report.path);
    println!("  included: {} files", report.included);
    if report.failed > 0 {
        println!("  failed:   {} files (see log)", report.failed);
    }
    Ok(())
}

async fn cmd_restore(config: &DocsealConfig, path: &str, owner: &str) -> Result<()> {
    let store = open_store(config)?;
    let master = master_key()?;
    let password = backup_password()?;
    let report = store
        .archiver()
        .restore_backup(path, owner, &master, &password)
        .await?;

    println!("Restore complete:");
    println!("  restored: {} files", report.restored);
    println!("  skipped:  {} files (already present)", report.skipped);
    if report.failed > 0 {
        println!("  failed:   {} files (see log)", report.failed);
    }
    Ok(())
}

// ── `docseal cleanup` ─────────────────────────────────────────────────────────

async fn cmd_cleanup(config: &DocsealConfig) -> Result<()> {
    let store = open_store(config)?;
    let report = store.cleanup_orphans().await?;

    println!("Orphan sweep:");
    println!("  scanned: {}", report.scanned);
    println!("  removed: {}", report.removed);
    if report.failed > 0 {
        println!("  failed:  {}", report.failed);
    }
    Ok(())
}

// ── `docseal keygen` ──────────────────────────────────────────────────────────

fn cmd_keygen(out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let private_path = out_dir.join("docseal-signing.pem");
    let public_path = out_dir.join("docseal-verifying.pem");
    for path in [&private_path, &public_path] {
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
    }

    let pair = generate_key_pair()?;
    std::fs::write(&private_path, pair.private_key_pem()?.as_bytes())
        .with_context(|| format!("writing {}", private_path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&private_path, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::write(&public_path, pair.public_key_pem()?)
        .with_context(|| format!("writing {}", public_path.display()))?;

    println!("Generated RSA-2048 key pair:");
    println!("  private: {}", private_path.display());
    println!("  public:  {}", public_path.display());
    println!();
    println!("Add to docseal.toml:");
    println!("  [crypto]");
    println!("  signing_key = {:?}", private_path.display().to_string());
    println!("  verifying_key = {:?}", public_path.display().to_string());
    Ok(())
}

// ── `docseal config show` / `docseal health` ──────────────────────────────────

fn cmd_config_show(config: &DocsealConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

async fn cmd_health(config: &DocsealConfig) -> Result<()> {
    let op = docseal_storage::build_operator(&config.storage)?;
    let report = docseal_storage::check_health(&op, &config.storage).await?;
    match report.backend.as_str() {
        "fs" => println!("storage: ok (fs at {})", config.storage.root.display()),
        other => println!("storage: ok ({other})"),
    }
    for category in StorageCategory::ALL {
        let state = if report.has_partition(category) {
            "present"
        } else {
            "not yet created"
        };
        println!("  {:<10} {state}", category.as_str());
    }
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
