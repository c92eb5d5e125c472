use chunklod::{run, verify, ChunkerConfig, ConfigOverrides};

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "chunklod",
    about = "Generate a chunked LOD terrain file (.chu) from a .BT terrain file or a grayscale bitmap"
)]
struct Cli {
    /// Depth of the chunk quadtree [default: 6]
    #[arg(short = 'd', long = "depth")]
    tree_depth: Option<u32>,
    /// Maximum geometric error of the finest chunks, in meters [default: 1.0]
    #[arg(short = 'e', long)]
    max_error: Option<f32>,
    /// Horizontal sample spacing in meters, for bitmaps [default: 4.0]
    #[arg(short = 's', long)]
    spacing: Option<f32>,
    /// Meters per unit of input height [default: 1.0]
    #[arg(short = 'v', long)]
    input_vertical_scale: Option<f32>,
    /// RON file with processing parameters; command line options override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Page sample grids to a database in this directory instead of holding them in memory
    #[arg(long)]
    paged: Option<PathBuf>,
    /// Read the output back and check every chunk record
    #[arg(long)]
    verify: bool,
    /// Input .BT or bitmap file
    input: PathBuf,
    /// Output .chu file
    output: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => match ChunkerConfig::read_file(path) {
            Ok(c) => c,
            Err(e) => {
                log::error!("failed to read config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => ChunkerConfig::default(),
    };
    let config = file_config.with_overrides(ConfigOverrides {
        tree_depth: cli.tree_depth,
        max_error: cli.max_error,
        sample_spacing: cli.spacing,
        input_vertical_scale: cli.input_vertical_scale,
        paged_storage: cli.paged,
    });

    log::info!("infile: {}", cli.input.display());
    log::info!("outfile: {}", cli.output.display());

    let stats = match run(&config, &cli.input, &cli.output) {
        Ok(stats) => stats,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    stats.log_report(config.tree_depth);

    if cli.verify {
        match verify(&cli.output) {
            Ok(chunks) => log::info!("verified {} chunks", chunks),
            Err(e) => {
                log::error!("verification failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
