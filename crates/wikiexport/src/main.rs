use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use wikiexport_core::config::{ConvertOptions, ExtensionPolicy, load_config};
use wikiexport_core::convert::convert_wiki;
use wikiexport_core::storage::DirectoryStorage;

#[derive(Debug, Parser)]
#[command(
    name = "wikiexport",
    version,
    about = "Export a wiki page store to a static file tree"
)]
struct Cli {
    /// TOML config describing the wiki being exported.
    input_config: PathBuf,
    /// Directory the output tree is written into.
    output_dir: PathBuf,
    #[arg(long, value_name = "DIR", help = "Nest raw files under this output subdirectory")]
    file_prefix: Option<String>,
    #[arg(long, help = "Flatten raw files into a single directory")]
    files_in_one_dir: bool,
    #[arg(
        long,
        value_name = "EXT",
        help = "Extension appended to markup page paths, e.g. .md"
    )]
    add_link_ext: Option<String>,
    #[arg(long, value_enum, default_value = "references")]
    ext_applies_to: ExtMode,
    #[arg(long, help = "Log per-page progress")]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExtMode {
    /// Physical output filenames only.
    Output,
    /// Cross-page references only.
    References,
    /// Both filenames and references.
    Both,
}

impl From<ExtMode> for ExtensionPolicy {
    fn from(mode: ExtMode) -> Self {
        match mode {
            ExtMode::Output => Self::Output,
            ExtMode::References => Self::ReferencesOnly,
            ExtMode::Both => Self::Both,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // --verbose enables DEBUG level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli.input_config)?;
    let storage = DirectoryStorage::open(&config.pages_dir(&cli.input_config))?;
    let options = ConvertOptions {
        file_prefix: cli.file_prefix,
        files_in_one_dir: cli.files_in_one_dir,
        link_extension: cli.add_link_ext,
        extension_policy: cli.ext_applies_to.into(),
    };

    let report = convert_wiki(&storage, &config, &cli.output_dir, &options)?;

    println!("output_dir: {}", cli.output_dir.display());
    println!("pages: {}", report.pages);
    println!("files: {}", report.files);
    Ok(())
}
