//! Tile presence grid rendering
//!
//! Turns the 64×64 boolean presence grid from a parse summary into a
//! text or HTML view, written next to the store output.

use wow_terrain::records::WORLD_TILE_DIM;
use wow_terrain::TileGrid;

/// Render the grid as text: `#` for present tiles, `.` for empty cells,
/// with a light coordinate ruler every 8 columns.
pub fn render_text(grid: &TileGrid) -> String {
    let mut out = String::with_capacity((WORLD_TILE_DIM + 8) * (WORLD_TILE_DIM + 2));
    out.push_str("    ");
    for x in 0..WORLD_TILE_DIM {
        out.push(if x % 8 == 0 { '|' } else { ' ' });
    }
    out.push('\n');
    for y in 0..WORLD_TILE_DIM {
        out.push_str(&format!("{y:3} "));
        for x in 0..WORLD_TILE_DIM {
            out.push(if grid.get(x, y) { '#' } else { '.' });
        }
        out.push('\n');
    }
    out
}

/// Render the grid as a self-contained HTML page.
pub fn render_html(grid: &TileGrid) -> String {
    let mut out = String::new();
    out.push_str(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Tile grid</title>\n<style>\n",
    );
    out.push_str(
        "table { border-collapse: collapse; }\ntd { width: 10px; height: 10px; }\n\
         td.present { background: #3a7d44; }\ntd.empty { background: #e8e8e8; }\n",
    );
    out.push_str("</style>\n</head>\n<body>\n<table>\n");
    for y in 0..WORLD_TILE_DIM {
        out.push_str("<tr>");
        for x in 0..WORLD_TILE_DIM {
            if grid.get(x, y) {
                out.push_str(&format!("<td class=\"present\" title=\"({x}, {y})\"></td>"));
            } else {
                out.push_str("<td class=\"empty\"></td>");
            }
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}
