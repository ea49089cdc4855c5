//! Table formatting for datasets, previews and changesets
//!
//! Previews are rendered with the review highlights: added rows are marked
//! `+` in green, rows with modified cells `~` with the changed cells in
//! yellow, and deleted rows are listed separately in red.

use console::style;
use miette::{IntoDiagnostic, Result};
use std::collections::BTreeMap;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::truncate_str;
use crate::cli::OutputFormat;
use crate::core::diff::Changeset;
use crate::core::identity::RowIdentity;
use crate::core::preview::{Preview, PreviewRow};
use crate::core::spreadsheet::write_csv;
use crate::core::Dataset;

/// Configuration for table output
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Maximum width of a column before its cells are truncated
    pub max_width: usize,
    /// Show summary line after table (e.g., "5 row(s)")
    pub show_summary: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_width: 30,
            show_summary: true,
        }
    }
}

/// Column widths from headers and content, capped at `max_width`
fn calculate_widths(preview: &Preview, max_width: usize) -> Vec<usize> {
    preview
        .columns
        .iter()
        .map(|column| {
            let content = preview
                .rows
                .iter()
                .map(|r| r.row.text(column).chars().count())
                .chain(preview.deleted.iter().map(|d| d.row.text(column).chars().count()))
                .max()
                .unwrap_or(0);
            column.chars().count().max(content).min(max_width)
        })
        .collect()
}

fn pad(text: &str, width: usize) -> String {
    format!("{:<width$}", truncate_str(text, width), width = width)
}

fn row_marker(row: &PreviewRow) -> String {
    if row.is_added_row() {
        style("+").green().bold().to_string()
    } else if row.has_modified_cells() {
        style("~").yellow().bold().to_string()
    } else {
        " ".to_string()
    }
}

/// Aligned, highlighted table for terminals
pub fn format_table(preview: &Preview, config: &TableConfig) -> String {
    let widths = calculate_widths(preview, config.max_width);
    let index_width = preview.len().max(preview.deleted.len()).to_string().len().max(1);
    let mut out = String::new();

    let mut header = vec![format!("{:<w$}", style("#").bold().dim(), w = index_width + 2)];
    for (column, width) in preview.columns.iter().zip(&widths) {
        header.push(style(pad(column, *width)).bold().to_string());
    }
    out.push_str(&header.join(" "));
    out.push('\n');

    let total: usize = widths.iter().sum::<usize>() + widths.len() + index_width + 2;
    out.push_str(&"-".repeat(total));
    out.push('\n');

    for (index, row) in preview.rows.iter().enumerate() {
        let mut parts = vec![format!(
            "{} {:<w$}",
            row_marker(row),
            index,
            w = index_width
        )];
        for (column, width) in preview.columns.iter().zip(&widths) {
            let cell = pad(&row.row.text(column), *width);
            let cell = if row.is_added_row() {
                style(cell).green().to_string()
            } else if row.is_modified(column) {
                style(cell).yellow().bold().to_string()
            } else {
                cell
            };
            parts.push(cell);
        }
        out.push_str(parts.join(" ").trim_end());
        out.push('\n');
    }

    if !preview.deleted.is_empty() {
        out.push('\n');
        out.push_str(&format!("{}\n", style("Deleted rows").red().bold()));
        for deleted in &preview.deleted {
            let mut parts = vec![format!(
                "{} {:<w$}",
                style("-").red().bold(),
                deleted.original_index,
                w = index_width
            )];
            for (column, width) in preview.columns.iter().zip(&widths) {
                parts.push(style(pad(&deleted.row.text(column), *width)).red().dim().to_string());
            }
            out.push_str(parts.join(" ").trim_end());
            out.push('\n');
        }
    }

    if config.show_summary {
        let added = preview.rows.iter().filter(|r| r.is_added_row()).count();
        let modified = preview.rows.iter().filter(|r| r.has_modified_cells()).count();
        out.push('\n');
        out.push_str(&format!("{} row(s)", style(preview.len()).cyan()));
        if added + modified + preview.deleted.len() > 0 {
            out.push_str(&format!(
                " ({} added, {} modified, {} deleted)",
                style(added).green(),
                style(modified).yellow(),
                style(preview.deleted.len()).red()
            ));
        }
        out.push('\n');
    }

    out
}

/// Plain tab-separated rows with a header line
pub fn format_tsv(dataset: &Dataset) -> String {
    let mut out = dataset.columns.join("\t");
    out.push('\n');
    for row in &dataset.rows {
        let cells: Vec<String> = dataset
            .columns
            .iter()
            .map(|c| row.text(c).replace(['\t', '\n'], " "))
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

fn escape_md(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Markdown tables; modified cells in bold, deleted rows in their own table
pub fn format_md(preview: &Preview) -> String {
    let mut builder = Builder::default();
    let mut header = vec!["#".to_string()];
    header.extend(preview.columns.iter().map(|c| escape_md(c)));
    builder.push_record(header.clone());

    for (index, row) in preview.rows.iter().enumerate() {
        let mut record = vec![if row.is_added_row() {
            format!("{} (added)", index)
        } else {
            index.to_string()
        }];
        for column in &preview.columns {
            let text = escape_md(&row.row.text(column));
            record.push(if row.is_modified(column) && !text.is_empty() {
                format!("**{}**", text)
            } else {
                text
            });
        }
        builder.push_record(record);
    }

    let mut output = builder.build().with(Style::markdown()).to_string();
    output.push('\n');

    if !preview.deleted.is_empty() {
        let mut deleted = Builder::default();
        deleted.push_record(header);
        for row in &preview.deleted {
            let mut record = vec![row.original_index.to_string()];
            record.extend(preview.columns.iter().map(|c| escape_md(&row.row.text(c))));
            deleted.push_record(record);
        }
        output.push_str("\n### Deleted rows\n\n");
        output.push_str(&deleted.build().with(Style::markdown()).to_string());
        output.push('\n');
    }

    output
}

/// Print a preview in the requested format
pub fn output_preview(preview: &Preview, format: OutputFormat, config: &TableConfig) -> Result<()> {
    match format {
        OutputFormat::Auto => print!("{}", format_table(preview, config)),
        OutputFormat::Tsv => print!("{}", format_tsv(&preview.to_dataset())),
        OutputFormat::Md => print!("{}", format_md(preview)),
        OutputFormat::Csv => write_csv(&preview.to_dataset(), std::io::stdout())
            .map_err(|e| miette::miette!("{}", e))?,
        OutputFormat::Json => {
            let json = serde_json::json!({
                "columns": preview.columns,
                "rows": preview.to_marked_json(),
                "deleted": preview.deleted,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(preview).into_diagnostic()?),
    }
    Ok(())
}

/// Human-readable changeset: one line per added, deleted or modified row
pub fn format_changeset(
    changeset: &Changeset,
    original: &Dataset,
    proposed: &Dataset,
    identity: &dyn RowIdentity,
) -> String {
    let mut out = String::new();

    for added in &changeset.added {
        out.push_str(&format!(
            "{} [row {}] {}\n",
            style("+").green().bold(),
            added.row_index,
            style(identity.key_of(&added.row)).green()
        ));
    }

    for deleted in &changeset.deleted {
        out.push_str(&format!(
            "{} [row {}] {}\n",
            style("-").red().bold(),
            deleted.original_index,
            style(identity.key_of(&deleted.row)).red()
        ));
    }

    let mut by_row: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for change in &changeset.modified {
        by_row.entry(change.original_index).or_default().push(format!(
            "{}: {} → {}",
            change.column,
            display_value(change.old_value.as_ref().map(|v| v.as_text().into_owned())),
            style(display_value(change.new_value.as_ref().map(|v| v.as_text().into_owned()))).yellow()
        ));
    }
    for (original_index, changes) in by_row {
        let key = original
            .row(original_index)
            .or_else(|| {
                changeset
                    .proposed_index_of(original_index)
                    .and_then(|i| proposed.row(i))
            })
            .map(|row| identity.key_of(row).to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "{} [row {}] {}  {}\n",
            style("~").yellow().bold(),
            original_index,
            key,
            changes.join(", ")
        ));
    }

    if !changeset.new_columns.is_empty() {
        out.push_str(&format!(
            "{} new column(s): {}\n",
            style("→").blue(),
            changeset.new_columns.join(", ")
        ));
    }

    out
}

fn display_value(value: Option<String>) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "(empty)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::Row;
    use crate::core::diff::DiffEngine;

    fn fixture() -> (Dataset, Dataset) {
        let original = Dataset::from_rows(vec![
            Row::from([("AssetType", "Pump"), ("Component", "Seal"), ("FLOC", "P-100"), ("Severity", "3")]),
            Row::from([("AssetType", "Fan"), ("Component", "Motor"), ("FLOC", "F-200"), ("Severity", "5")]),
        ]);
        let candidate = Dataset::from_rows(vec![
            Row::from([("AssetType", "Pump"), ("Component", "Seal"), ("FLOC", "P-100"), ("Severity", "7")]),
            Row::from([("AssetType", "Valve"), ("Component", "Stem|Packing"), ("FLOC", "V-300"), ("Severity", "2")]),
        ]);
        (original, candidate)
    }

    #[test]
    fn test_format_table_marks_rows() {
        console::set_colors_enabled(false);
        let (original, candidate) = fixture();
        let cs = DiffEngine::default().diff(&original, &candidate);
        let out = format_table(&Preview::build(&original, &cs), &TableConfig::default());

        assert!(out.contains("~ 0"));
        assert!(out.contains("+ 1"));
        assert!(out.contains("Deleted rows"));
        assert!(out.contains("- 1"));
        assert!(out.contains("2 row(s) (1 added, 1 modified, 1 deleted)"));
    }

    #[test]
    fn test_format_table_truncates_wide_cells() {
        console::set_colors_enabled(false);
        let ds = Dataset::from_rows(vec![Row::from([("Effect", "Loss of containment at the mechanical seal")])]);
        let config = TableConfig {
            max_width: 12,
            show_summary: false,
        };
        let out = format_table(&Preview::idle(&ds), &config);
        assert!(out.contains("Loss of c..."));
        assert!(!out.contains("row(s)"));
    }

    #[test]
    fn test_format_md_escapes_and_bolds() {
        let (original, candidate) = fixture();
        let cs = DiffEngine::default().diff(&original, &candidate);
        let md = format_md(&Preview::build(&original, &cs));

        assert!(md.contains("**7**"));
        assert!(md.contains("Stem\\|Packing"));
        assert!(md.contains("1 (added)"));
        assert!(md.contains("### Deleted rows"));
    }

    #[test]
    fn test_format_tsv() {
        let (original, _) = fixture();
        let tsv = format_tsv(&original);
        let mut lines = tsv.lines();
        assert_eq!(lines.next(), Some("AssetType\tComponent\tFLOC\tSeverity"));
        assert_eq!(lines.next(), Some("Pump\tSeal\tP-100\t3"));
    }

    #[test]
    fn test_format_changeset() {
        console::set_colors_enabled(false);
        let (original, candidate) = fixture();
        let engine = DiffEngine::default();
        let cs = engine.diff(&original, &candidate);
        let out = format_changeset(&cs, &original, &candidate, engine.identity());

        assert!(out.contains("+ [row 1] Valve / Stem|Packing / V-300"));
        assert!(out.contains("- [row 1] Fan / Motor / F-200"));
        assert!(out.contains("~ [row 0] Pump / Seal / P-100  Severity: 3 → 7"));
    }
}
