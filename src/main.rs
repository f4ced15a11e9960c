use ant_colony::{ColonyConfig, FrameCacheWriter, InstanceRenderer, JsonLinesWriter};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Simulate an ant colony and write its per-frame particle stream.
#[derive(Parser, Debug)]
#[command(name = "ant-colony", version, about)]
struct Cli {
    /// JSON run configuration
    config: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Jsonl)]
    format: OutputFormat,

    /// Override the configured seed
    #[arg(long)]
    seed: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One JSON frame per line
    Jsonl,
    /// Binary frame cache
    Cache,
}

/// Level requested by `-v` repeats, if any. Overrides `RUST_LOG`.
fn verbosity(count: u8) -> Option<log::LevelFilter> {
    match count {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = verbosity(cli.verbose) {
        logger.filter_level(level);
    }
    logger.init();

    let text = fs::read_to_string(&cli.config)
        .with_context(|| format!("failed to read {}", cli.config.display()))?;
    let mut config = ColonyConfig::from_json(&text)
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let renderer: Box<dyn InstanceRenderer> = match cli.format {
        OutputFormat::Jsonl => Box::new(JsonLinesWriter::new(sink)),
        OutputFormat::Cache => Box::new(FrameCacheWriter::new(sink).context("failed to write cache header")?),
    };

    let summary = config
        .into_simulation()
        .context("invalid configuration")?
        .run(renderer)
        .context("simulation failed")?;

    log::info!(
        "wrote {} frames of {} particles in {:.3}s",
        summary.frames,
        summary.particles,
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}
