use anyhow::Context;
use clap::Parser;
use oaktracker::config::DEFAULT_DATA_DIR;
use oaktracker::{logging, wildtext};
use std::path::PathBuf;

/// Convert the plain-text wild encounter guide into the tracker's table
/// documents.
#[derive(Parser)]
#[command(name = "oaktracker-parse")]
struct Cli {
    /// Guide to parse
    #[arg(default_value = "data/Wild Area Changes.txt")]
    input: PathBuf,

    /// Where `main.json`, `postgame.json` and `hidden_grotto.json` are written
    #[arg(long, env = "OAKTRACKER_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    out_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(None).context("initialising logging")?;

    let written = wildtext::convert(&cli.input, &cli.out_dir)
        .with_context(|| format!("converting {}", cli.input.display()))?;
    for path in &written {
        println!("{}", path.display());
    }
    println!("Done! {} documents written", written.len());
    Ok(())
}
