use clap::{Parser, Subcommand};
use frostbite_unpack::export::{ExportConfig, Exporter};
use frostbite_unpack::{CasCache, Game};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// File name of the Oodle codec library shipped next to the game binary.
const DEFAULT_OODLE_LIBRARY: &str = "oo2core_7_win64.dll";

#[derive(Parser)]
#[command(name = "fbunpack", version, about = "Frostbite CAS archive extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract asset payloads into a mirrored output tree
    Export {
        /// Root of the installed game
        game: PathBuf,
        /// Output directory for extracted assets
        #[arg(short, long)]
        output: PathBuf,
        /// Oodle shared library (defaults to the game's own copy)
        #[arg(long)]
        oodle: Option<PathBuf>,
        /// Skip Ebx files
        #[arg(long)]
        no_ebx: bool,
        /// Skip resource files
        #[arg(long)]
        no_resources: bool,
        /// Skip chunk files
        #[arg(long)]
        no_chunks: bool,
        /// Skip free-standing index resources
        #[arg(long)]
        no_toc_resources: bool,
        /// Reuse the parsed game tree across runs
        #[arg(long)]
        cache: bool,
        /// Location of the parsed-tree cache (defaults to <output>/cache.json)
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },
    /// List superbundles and their bundle/asset counts
    List {
        /// Root of the installed game
        game: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        // ── Export ───────────────────────────────────────────────────────────
        Commands::Export {
            game,
            output,
            oodle,
            no_ebx,
            no_resources,
            no_chunks,
            no_toc_resources,
            cache,
            cache_path,
        } => {
            let config = ExportConfig {
                oodle_path: oodle.unwrap_or_else(|| game.join(DEFAULT_OODLE_LIBRARY)),
                cache_path: cache_path.unwrap_or_else(|| output.join("cache.json")),
                game_folder: game,
                output_folder: output,
                export_ebx: !no_ebx,
                export_resources: !no_resources,
                export_chunks: !no_chunks,
                export_toc_resources: !no_toc_resources,
                cache_enabled: cache,
            };
            Exporter::new(config)?.export()?;
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { game } => {
            let cache = CasCache::new();
            let game = Game::load(&game, &cache)?;

            for layout in game.layouts() {
                println!("{}/", layout.dir);
                for (package, bundles) in layout.packages.iter().zip(&layout.bundles) {
                    println!("  [{}] {}", package.idx, package.rel_path);
                    let groups = bundles
                        .split_superbundles
                        .iter()
                        .chain(&bundles.superbundles);
                    for (name, index) in groups {
                        match index {
                            None => println!("    {name:<48} (not installed)"),
                            Some(index) => {
                                let files: usize =
                                    index.bundles.iter().map(|b| b.file_count()).sum();
                                println!(
                                    "    {name:<48} {:>5} bundles {:>7} files {:>5} toc resources",
                                    index.bundles.len(),
                                    files,
                                    index.resources.len(),
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
