//! Example showing how to parse a world table or tile and inspect the
//! resulting record stream.

use wow_terrain::{MemorySink, ParseOptions, parse_file};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let path = if args.len() > 1 {
        &args[1]
    } else {
        println!("Usage: {} <path_to_wdt_or_adt>", args[0]);
        println!("\nExample paths:");
        println!("  World table: World/Maps/Azeroth/Azeroth.wdt");
        println!("  Single tile: World/Maps/Azeroth/Azeroth_32_48.adt");
        return Ok(());
    };

    let mut sink = MemorySink::new();
    let summary = parse_file(path, &ParseOptions::default(), &mut sink)?;

    println!("File: {path}");
    println!("Format: {} ({:?})", summary.format, summary.container);
    println!("Version: {}", summary.version);
    println!("Tiles present: {} / 4096", summary.tiles_present);
    println!(
        "MCNKs decoded: {} ({} failed)",
        summary.mcnks, summary.failed_mcnks
    );
    println!("Placements: {}", summary.placements);
    if let Some(max) = summary.max_unique_id {
        println!("Max placement unique id: {max}");
    }
    if summary.warnings > 0 {
        println!("Warnings: {}", summary.warnings);
    }

    // Show the first few placements with their resolved model names
    for (_, placement) in sink.placements.iter().take(10) {
        println!(
            "  {} #{} -> {} (scale {:.2})",
            placement.kind, placement.unique_id, placement.name, placement.scale
        );
    }

    Ok(())
}
