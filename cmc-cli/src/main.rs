//! CMC evaluation CLI.
//!
//! Loads a similarity matrix from CSV, computes its Cumulative Matching
//! Characteristic curve and prints the recognition rate at a chosen rank.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p cmc-cli --release -- Li_folder/li_sim_mat.csv \
//!     --id-column subject_id \
//!     --n-ranks 100
//!
//! # Export the curve and print a JSON report
//! cargo run -p cmc-cli --release --features parallel -- data/ri_sim_mat.csv \
//!     --name "right index" \
//!     --output benchmark_results/ri_cmc.csv \
//!     --json
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cmc_core::Summarizable;
use cmc_io::{curve_to_json, read_similarity_matrix, write_curve_csv, CsvMatrixOptions};
use cmc_stats::{CmcCalculator, CmcConfig, Normalization, TieBreak, DEFAULT_N_RANKS, DEFAULT_TITLE};

/// Divisor for rank-hit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum NormalizationArg {
    /// Fraction of users identified.
    Users,
    /// Divide by gallery size.
    Enrollees,
}

impl From<NormalizationArg> for Normalization {
    fn from(arg: NormalizationArg) -> Self {
        match arg {
            NormalizationArg::Users => Normalization::Users,
            NormalizationArg::Enrollees => Normalization::Enrollees,
        }
    }
}

/// Ordering of tied scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TieBreakArg {
    /// Keep column order.
    ColumnOrder,
    /// Genuine match after tied impostors.
    Pessimistic,
    /// Genuine match before tied impostors.
    Optimistic,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::ColumnOrder => TieBreak::ColumnOrder,
            TieBreakArg::Pessimistic => TieBreak::Pessimistic,
            TieBreakArg::Optimistic => TieBreak::Optimistic,
        }
    }
}

/// CMC evaluation CLI.
#[derive(Parser, Debug)]
#[command(name = "cmc")]
#[command(about = "Compute the Cumulative Matching Characteristic curve of a similarity matrix")]
struct Args {
    /// Similarity matrix CSV: header row, one id column, one column per enrollee.
    matrix: PathBuf,

    /// Header of the identifier column (default: first column).
    #[arg(long)]
    id_column: Option<String>,

    /// Field delimiter.
    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Compare identifiers as exact strings instead of canonical integers.
    #[arg(long)]
    exact_ids: bool,

    /// Number of ranks to evaluate, clamped to the user count.
    #[arg(long, default_value_t = DEFAULT_N_RANKS, allow_hyphen_values = true)]
    n_ranks: i64,

    /// Rank to report (default: the effective number of ranks).
    #[arg(long)]
    rank: Option<usize>,

    /// Normalization divisor.
    #[arg(long, value_enum, default_value = "users")]
    normalization: NormalizationArg,

    /// Tie-break policy for equal scores.
    #[arg(long, value_enum, default_value = "column-order")]
    tie_break: TieBreakArg,

    /// Curve name shown in the chart title.
    #[arg(long)]
    name: Option<String>,

    /// Write `rank,recognition_rate` rows to this CSV file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print a JSON report instead of plain text.
    #[arg(long)]
    json: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn csv_options(&self) -> Result<CsvMatrixOptions> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter {:?} is not an ASCII character", self.delimiter);
        }
        let delimiter = self.delimiter as u8;
        let mut opts = CsvMatrixOptions::default()
            .with_delimiter(delimiter)
            .with_numeric_ids(!self.exact_ids);
        if let Some(col) = &self.id_column {
            opts = opts.with_id_column(col.clone());
        }
        Ok(opts)
    }

    fn cmc_config(&self) -> CmcConfig {
        let mut config = CmcConfig::new(self.n_ranks)
            .with_normalization(self.normalization.into())
            .with_tie_break(self.tie_break.into());
        if let Some(name) = &self.name {
            config = config.with_name(name.clone());
        }
        config
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    let matrix = read_similarity_matrix(&args.matrix, &args.csv_options()?)
        .with_context(|| format!("failed to load {}", args.matrix.display()))?;
    info!(
        users = matrix.n_users(),
        enrollees = matrix.n_enrollees(),
        "loaded similarity matrix"
    );

    let calc = CmcCalculator::computed(matrix, args.cmc_config());
    let curve = calc.curve().context("CMC curve was not computed")?;
    info!("{}", curve.summary());

    if let Some(path) = &args.output {
        write_curve_csv(path, curve)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote CMC curve");
    }

    if args.json {
        println!("{}", curve_to_json(curve)?);
        return Ok(());
    }

    print!("{}", render_text(&calc, args.rank)?);

    Ok(())
}

/// Plain-text report: chart title, rank-k recognition rate, legend.
///
/// Without an explicit `rank` the last computed rank is reported; an empty
/// curve then has no rank to report and only the title and legend are
/// printed. An explicit `rank` outside the window is an error.
fn render_text(calc: &CmcCalculator, rank: Option<usize>) -> Result<String> {
    let curve = calc.curve().context("CMC curve was not computed")?;
    let mut out = format!("{}\n", curve.title(DEFAULT_TITLE));
    match rank {
        None if curve.is_empty() => {
            out.push_str("CMC of first 0 ranks: curve is empty\n");
        }
        _ => {
            let rank = rank.unwrap_or(curve.n_ranks());
            let value = calc.cumulative_at(rank)?;
            out.push_str(&format!("CMC of first {rank} ranks = {value}\n"));
        }
    }
    out.push_str(&format!("{}\n", curve.legend_label()));
    Ok(out)
}
