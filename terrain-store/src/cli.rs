//! Command-line interface definition

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Normalize WDT world tables and ADT terrain tiles into a record store.
///
/// Accepts either a single world file (alpha worlds carry their tiles
/// embedded) or a directory of `.adt` tile files. Exit code 0 means a
/// clean parse, 1 a fatal error, 2 a partial parse with warnings.
#[derive(Debug, Parser)]
#[command(name = "terrain-store", version, about)]
pub struct Cli {
    /// World file (.wdt) or directory of .adt tiles
    pub input: PathBuf,

    /// Output store directory (created if missing)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Listfile of known asset paths; referenced names not in it are
    /// reported to the missing-asset stream
    #[arg(short, long)]
    pub listfile: Option<PathBuf>,

    /// Fail an MCNK on its first sub-chunk error instead of attaching
    /// the error and continuing
    #[arg(long)]
    pub strict: bool,

    /// Skip MCAL alpha-map decoding
    #[arg(long)]
    pub no_alpha_maps: bool,

    /// Skip MCSH shadow-map decoding
    #[arg(long)]
    pub no_shadow_maps: bool,

    /// Skip MCCV vertex-color decoding
    #[arg(long)]
    pub no_vertex_colors: bool,

    /// Tile presence grid rendering written into the output directory
    #[arg(long, value_enum, default_value_t = GridFormat::Text)]
    pub grid: GridFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// How the 64×64 tile presence grid is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GridFormat {
    /// Plain text, one character per tile
    Text,
    /// Self-contained HTML page
    Html,
    /// No grid output
    None,
}
