use crate::{
    config::{AppConfig, ContentSourceName},
    diag::Diagnostics,
    entry::DiskEntry,
    metadata::{self, ModMap, ModMetaData},
    modsconfig::ConfigDocument,
};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Default)]
struct AnnotateOptions {
    config_path: Option<PathBuf>,
    mods_dir: Option<PathBuf>,
    source: Option<ContentSourceName>,
    write: bool,
}

struct ModsListOptions {
    mods_dir: Option<PathBuf>,
    source: Option<ContentSourceName>,
    format: OutputFormat,
}

enum CliCommand {
    Annotate(AnnotateOptions),
    ModsList(ModsListOptions),
    Paths,
    Help,
    Version,
}

pub fn run() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("rimsmith v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Paths => {
            let config = AppConfig::load_or_create()?;
            print_paths(&config);
            Ok(())
        }
        CliCommand::Annotate(options) => {
            let runtime = tokio::runtime::Runtime::new().context("start async runtime")?;
            runtime.block_on(run_annotate(options))
        }
        CliCommand::ModsList(options) => {
            let runtime = tokio::runtime::Runtime::new().context("start async runtime")?;
            runtime.block_on(run_mods_list(options))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

fn parse_args(args: &[String]) -> Result<CliCommand> {
    let Some(head) = args.first() else {
        return Ok(CliCommand::Help);
    };

    match head.as_str() {
        "--help" | "-h" | "help" => Ok(CliCommand::Help),
        "--version" | "-V" | "version" => Ok(CliCommand::Version),
        "paths" => Ok(CliCommand::Paths),
        "annotate" => Ok(CliCommand::Annotate(parse_annotate(&args[1..])?)),
        "mods" => Ok(CliCommand::ModsList(parse_mods_list(&args[1..])?)),
        // Bare flags mean annotate; anything else is unknown.
        _ if head.starts_with('-') => Ok(CliCommand::Annotate(parse_annotate(args)?)),
        _ => bail!("Unknown command: {head} (use 'annotate', 'mods', or 'paths')"),
    }
}

fn parse_annotate(args: &[String]) -> Result<AnnotateOptions> {
    let mut options = AnnotateOptions::default();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let Some(value) = iter.next() else {
                    bail!("--config requires a path");
                };
                options.config_path = Some(PathBuf::from(value));
            }
            value if value.starts_with("--config=") => {
                options.config_path = Some(PathBuf::from(value.trim_start_matches("--config=")));
            }
            "--mods" | "-m" => {
                let Some(value) = iter.next() else {
                    bail!("--mods requires a path");
                };
                options.mods_dir = Some(PathBuf::from(value));
            }
            value if value.starts_with("--mods=") => {
                options.mods_dir = Some(PathBuf::from(value.trim_start_matches("--mods=")));
            }
            "--source" => {
                let Some(value) = iter.next() else {
                    bail!("--source requires a value");
                };
                options.source = Some(parse_source(value)?);
            }
            value if value.starts_with("--source=") => {
                options.source = Some(parse_source(value.trim_start_matches("--source="))?);
            }
            "--write" | "-w" => options.write = true,
            _ => bail!("Unknown annotate option: {arg}"),
        }
    }
    Ok(options)
}

fn parse_mods_list(args: &[String]) -> Result<ModsListOptions> {
    let mut mods_dir = None;
    let mut source = None;
    let mut format = OutputFormat::Text;
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "list" => {}
            "--mods" | "-m" => {
                let Some(value) = iter.next() else {
                    bail!("--mods requires a path");
                };
                mods_dir = Some(PathBuf::from(value));
            }
            value if value.starts_with("--mods=") => {
                mods_dir = Some(PathBuf::from(value.trim_start_matches("--mods=")));
            }
            "--source" => {
                let Some(value) = iter.next() else {
                    bail!("--source requires a value");
                };
                source = Some(parse_source(value)?);
            }
            value if value.starts_with("--source=") => {
                source = Some(parse_source(value.trim_start_matches("--source="))?);
            }
            "--format" => {
                let Some(value) = iter.next() else {
                    bail!("--format requires a value");
                };
                format = OutputFormat::parse(value)
                    .with_context(|| format!("Unknown format: {value}"))?;
            }
            value if value.starts_with("--format=") => {
                let value = value.trim_start_matches("--format=");
                format = OutputFormat::parse(value)
                    .with_context(|| format!("Unknown format: {value}"))?;
            }
            _ => bail!("Unknown mods option: {arg}"),
        }
    }
    Ok(ModsListOptions {
        mods_dir,
        source,
        format,
    })
}

fn parse_source(value: &str) -> Result<ContentSourceName> {
    ContentSourceName::parse(value)
        .with_context(|| format!("Unknown source: {value} (use workshop, local, or official)"))
}

async fn run_annotate(options: AnnotateOptions) -> Result<()> {
    let mut app_config = AppConfig::load_or_create()?;

    let config_path = options
        .config_path
        .clone()
        .or_else(|| app_config.modsconfig_path.clone())
        .context("no ModsConfig.xml path; pass --config <file>")?;
    let mods_dir = options
        .mods_dir
        .clone()
        .or_else(|| app_config.mods_dir.clone())
        .context("no mods directory; pass --mods <dir>")?;
    let source = options
        .source
        .or(app_config.content_source)
        .unwrap_or(ContentSourceName::Workshop);

    let raw = tokio::fs::read_to_string(&config_path)
        .await
        .with_context(|| format!("read {}", config_path.display()))?;

    let mut diag = Diagnostics::new();
    let mods = scan_mods(&mods_dir, source, &mut diag).await?;
    let mut document = ConfigDocument::parse(&raw);

    match document.reconcile(&mods, &mut diag) {
        Some(updated) => {
            if options.write {
                tokio::fs::write(&config_path, &updated)
                    .await
                    .with_context(|| format!("write {}", config_path.display()))?;
                println!(
                    "Updated {} ({} mods scanned)",
                    config_path.display(),
                    mods.len()
                );
            } else {
                print!("{updated}");
            }
        }
        None => {
            println!("No changes needed ({} mods scanned)", mods.len());
        }
    }

    remember_paths(&mut app_config, &options, source, &config_path, &mods_dir);
    Ok(())
}

async fn run_mods_list(options: ModsListOptions) -> Result<()> {
    let app_config = AppConfig::load_or_create()?;
    let mods_dir = options
        .mods_dir
        .or_else(|| app_config.mods_dir.clone())
        .context("no mods directory; pass --mods <dir>")?;
    let source = options
        .source
        .or(app_config.content_source)
        .unwrap_or(ContentSourceName::Workshop);

    let mut diag = Diagnostics::new();
    let mods = scan_mods(&mods_dir, source, &mut diag).await?;

    let mut items: Vec<&ModMetaData> = mods.values().collect();
    items.sort_by(|a, b| a.package_id.to_lowercase().cmp(&b.package_id.to_lowercase()));

    match options.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            for meta in items {
                let deps = meta
                    .dependencies_for_version(metadata::CURRENT_VERSION)
                    .map(|deps| deps.len())
                    .unwrap_or(0);
                println!("{:<44} {:<4} {}", meta.package_id, deps, meta.name);
            }
        }
    }

    Ok(())
}

async fn scan_mods(
    mods_dir: &Path,
    source: ContentSourceName,
    diag: &mut Diagnostics,
) -> Result<ModMap> {
    let root = DiskEntry::open(mods_dir)
        .await
        .with_context(|| format!("open {}", mods_dir.display()))?;
    if !root.is_dir() {
        bail!("{} is not a directory", mods_dir.display());
    }
    let mods = metadata::build_mod_map(source.to_content_source(), &root, diag)
        .await
        .with_context(|| format!("scan {}", mods_dir.display()))?;
    Ok(mods)
}

fn remember_paths(
    app_config: &mut AppConfig,
    options: &AnnotateOptions,
    source: ContentSourceName,
    config_path: &Path,
    mods_dir: &Path,
) {
    let mut dirty = false;
    if options.config_path.is_some()
        && app_config.modsconfig_path.as_deref() != Some(config_path)
    {
        app_config.modsconfig_path = Some(config_path.to_path_buf());
        dirty = true;
    }
    if options.mods_dir.is_some() && app_config.mods_dir.as_deref() != Some(mods_dir) {
        app_config.mods_dir = Some(mods_dir.to_path_buf());
        dirty = true;
    }
    if options.source.is_some() && app_config.content_source != Some(source) {
        app_config.content_source = Some(source);
        dirty = true;
    }
    if dirty {
        if let Err(error) = app_config.save() {
            tracing::warn!("could not save config: {error:#}");
        }
    }
}

fn print_paths(config: &AppConfig) {
    let display = |path: &Option<PathBuf>| match path {
        Some(path) => path.display().to_string(),
        None => "(not set)".to_string(),
    };
    println!("ModsConfig.xml: {}", display(&config.modsconfig_path));
    println!("Mods dir:       {}", display(&config.mods_dir));
    println!(
        "Source:         {}",
        config
            .content_source
            .map(|source| source.as_str())
            .unwrap_or("workshop (default)")
    );
}

fn print_help() {
    println!("rimsmith v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  rimsmith annotate -c <ModsConfig.xml> -m <mods dir>   Print annotated config");
    println!("  rimsmith annotate ... --write                         Rewrite the file in place");
    println!("  rimsmith mods -m <mods dir>                           List scanned mod metadata");
    println!("  rimsmith paths                                        Show remembered paths");
    println!();
    println!("Options:");
    println!("  -c, --config <file>    Path to ModsConfig.xml");
    println!("  -m, --mods <dir>       Workshop-style mods directory (one folder per mod)");
    println!("      --source <name>    workshop | local | official (default: workshop)");
    println!("  -w, --write            Write the reconciled document back");
    println!("      --format <fmt>     json | text (mods command)");
    println!("  -h, --help             Show help");
    println!("  -V, --version          Show version");
    println!();
    println!("Paths passed explicitly are remembered for the next run.");
    println!("Set RUST_LOG=info for per-mod diagnostics.");
}
