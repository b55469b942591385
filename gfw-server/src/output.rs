//! Terminal rendering for `--list-processed`.

use std::path::Path;

use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use gfw_core::ProcessedRecord;

pub const FILE_COLUMN_WIDTH: usize = 40;
pub const DEST_COLUMN_WIDTH: usize = 28;

const HEADERS: [&str; 6] = ["ID", "Tenant", "File", "Size", "Dest Dir", "Processed At"];

/// Cut `name` to at most `max` characters, marking the cut with `...`.
pub fn truncate_file_name(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let keep = max.saturating_sub(3);
    let head: String = name.chars().take(keep).collect();
    format!("{head}...")
}

/// Keep the tail of `path` so it fits in `max` characters, prefixed by `...`.
pub fn normalize_path(path: &str, max: usize) -> String {
    let len = path.chars().count();
    if len <= max {
        return path.to_string();
    }
    let keep = max.saturating_sub(3);
    let tail: String = path.chars().skip(len - keep).collect();
    format!("...{tail}")
}

/// Binary-unit size: `512 B`, `1.5 KiB`, ... `EiB`.
pub fn human_size(bytes: i64) -> String {
    const UNIT: i64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let unit = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {unit}iB", bytes as f64 / div as f64)
}

fn record_row(record: &ProcessedRecord) -> Vec<String> {
    let base = Path::new(&record.source_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| record.source_path.clone());

    vec![
        record.id.to_string(),
        record.tenant.clone(),
        truncate_file_name(&base, FILE_COLUMN_WIDTH),
        record.file_size.map(human_size).unwrap_or_default(),
        record
            .dest_dir
            .as_deref()
            .map(|d| normalize_path(d, DEST_COLUMN_WIDTH))
            .unwrap_or_default(),
        record.processed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]
}

pub fn render_records(records: &[ProcessedRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> =
        HEADERS.iter().map(|h| Cell::new(h).fg(Color::Cyan)).collect();
    table.set_header(header_cells);

    for record in records {
        table.add_row(record_row(record));
    }
    table
}

pub fn print_listing(records: &[ProcessedRecord], page: i64, page_size: i64) {
    println!("{}", render_records(records));
    println!("Page {page} (Page Size {page_size})");
}
