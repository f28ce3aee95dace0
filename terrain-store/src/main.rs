//! Main entry point for the terrain-store CLI

mod cli;
mod grid;
mod store;

use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use wow_terrain::{ParseOptions, ParseSummary, listfile, parse_file, parse_tile_directory, write_uid_ini};

use crate::cli::{Cli, GridFormat};
use crate::store::JsonlStore;

fn main() -> ExitCode {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Parse command line arguments
    let args = Cli::parse();

    // Set verbosity
    if args.verbose > 0 {
        log::set_max_level(match args.verbose {
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        });
    } else if args.quiet {
        log::set_max_level(log::LevelFilter::Error);
    }

    match run(&args) {
        Ok(summary) => {
            if summary.cancelled || summary.warnings > 0 || summary.failed_mcnks > 0 {
                log::warn!(
                    "partial success: {} warnings, {} failed MCNKs{}",
                    summary.warnings,
                    summary.failed_mcnks,
                    if summary.cancelled { ", cancelled" } else { "" }
                );
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Cli) -> Result<ParseSummary> {
    let options = build_options(args)?;
    let mut sink = JsonlStore::create(&args.output)
        .with_context(|| format!("creating store at {}", args.output.display()))?;

    let summary = if args.input.is_dir() {
        parse_tile_directory(&args.input, &options, &mut sink)
    } else {
        parse_file(&args.input, &options, &mut sink)
    }
    .with_context(|| format!("parsing {}", args.input.display()))?;

    log::info!(
        "{}: {} {} tiles, {} MCNKs ({} failed), {} placements",
        summary.path,
        summary.format,
        summary.tiles_present,
        summary.mcnks,
        summary.failed_mcnks,
        summary.placements
    );

    if let Some(max_unique_id) = summary.max_unique_id {
        write_uid_ini(&args.output, max_unique_id).context("writing uid.ini")?;
        log::info!("uid.ini written with max_unique_id={max_unique_id}");
    }

    match args.grid {
        GridFormat::Text => {
            let path = args.output.join("grid.txt");
            fs::write(&path, grid::render_text(&summary.presence))
                .with_context(|| format!("writing {}", path.display()))?;
        }
        GridFormat::Html => {
            let path = args.output.join("grid.html");
            fs::write(&path, grid::render_html(&summary.presence))
                .with_context(|| format!("writing {}", path.display()))?;
        }
        GridFormat::None => {}
    }

    Ok(summary)
}

fn build_options(args: &Cli) -> Result<ParseOptions> {
    let listfile = match &args.listfile {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading listfile {}", path.display()))?;
            let set = listfile::build_listfile(content.lines());
            log::info!("listfile loaded: {} known assets", set.len());
            Some(std::sync::Arc::new(set))
        }
        None => None,
    };

    Ok(ParseOptions {
        listfile,
        strict: args.strict,
        emit_vertex_colors: !args.no_vertex_colors,
        emit_shadow_map: !args.no_shadow_maps,
        emit_alpha_maps: !args.no_alpha_maps,
        cancel: None,
    })
}
