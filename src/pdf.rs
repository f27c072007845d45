use crate::config::DepartmentSplitConfig;
use crate::department::process_departments;
use crate::error::{ReconcilerError, Result};
use crate::table::{CellValue, Dataset, RawTable};
use crate::utils::normalize_headers;
use log::{debug, info, warn};
use lopdf::Document;
use std::path::Path;

/// Finds tables in the text of a single PDF page.
pub trait TableDetector {
    fn detect(&self, page_number: u32, page_text: &str) -> Vec<RawTable>;
}

/// Detects tables in text laid out in columns separated by wide gaps.
///
/// A line with at least two cells (split on tabs or on runs of `min_gap` or
/// more spaces) starts a table and becomes its header. Each later line with
/// its first column populated starts a new row. Lines whose first column is
/// empty, or that carry fewer cells than the row they follow, are stacked
/// values: their cells are appended to the current row with line breaks.
/// Cells are assigned to columns by their horizontal offset. A blank line or
/// a single cell in the first column ends the table.
#[derive(Debug, Clone)]
pub struct WhitespaceTableDetector {
    pub min_gap: usize,
}

impl Default for WhitespaceTableDetector {
    fn default() -> Self {
        Self { min_gap: 2 }
    }
}

/// A cell of one text line with the character offset it starts at.
type LineCell = (usize, String);

struct PendingRow {
    cells: Vec<Option<String>>,
    anchors: Vec<usize>,
    width: usize,
    lines: usize,
}

impl PendingRow {
    fn new(header_anchors: &[usize], placed: Vec<(usize, LineCell)>) -> Self {
        let width = placed.len();
        let mut anchors = header_anchors.to_vec();
        let mut cells = vec![None; header_anchors.len()];
        for (column, (start, text)) in placed {
            if column >= cells.len() {
                cells.resize(column + 1, None);
                anchors.resize(column + 1, start);
            }
            anchors[column] = start;
            cells[column] = Some(text);
        }
        Self {
            cells,
            anchors,
            width,
            lines: 1,
        }
    }

    /// Appends a stacked line so that its values sit at segment `self.lines`.
    fn append(&mut self, placed: Vec<(usize, LineCell)>) {
        for (column, (_, text)) in placed {
            if column >= self.cells.len() {
                self.cells.resize(column + 1, None);
            }
            let merged = match self.cells[column].take() {
                None => format!("{}{}", "\n".repeat(self.lines), text),
                Some(existing) => {
                    let segments = existing.split('\n').count();
                    let gap = self.lines.saturating_sub(segments) + 1;
                    format!("{}{}{}", existing, "\n".repeat(gap), text)
                }
            };
            self.cells[column] = Some(merged);
        }
        self.lines += 1;
    }
}

struct PendingTable {
    anchors: Vec<usize>,
    rows: Vec<Vec<Option<String>>>,
    current: Option<PendingRow>,
}

impl PendingTable {
    fn start(header: Vec<LineCell>) -> Self {
        let anchors = header.iter().map(|(start, _)| *start).collect();
        let header = header.into_iter().map(|(_, text)| Some(text)).collect();
        Self {
            anchors,
            rows: vec![header],
            current: None,
        }
    }

    /// Feeds one non-blank line; returns `false` when the line ends the table.
    fn push_line(&mut self, cells: Vec<LineCell>) -> bool {
        let anchors = match &self.current {
            Some(row) => row.anchors.as_slice(),
            None => self.anchors.as_slice(),
        };
        let placed = place_cells(anchors, cells);
        let first_column_empty = placed.first().is_some_and(|(column, _)| *column > 0);

        if let Some(row) = &mut self.current {
            if first_column_empty || placed.len() < row.width {
                if placed.len() == 1 && !first_column_empty {
                    return false;
                }
                row.append(placed);
                return true;
            }
        }
        if placed.len() < 2 && !first_column_empty {
            return false;
        }

        self.finish_row();
        self.current = Some(PendingRow::new(&self.anchors, placed));
        true
    }

    fn finish_row(&mut self) {
        if let Some(row) = self.current.take() {
            self.rows.push(row.cells);
        }
    }

    fn finish(mut self) -> RawTable {
        self.finish_row();
        RawTable::new(self.rows)
    }
}

/// Assigns each cell, in order, to the column whose start offset is nearest.
///
/// Later cells always land in later columns. Cells beyond the known columns
/// keep counting past the last one so that ragged rows stay detectable.
fn place_cells(anchors: &[usize], cells: Vec<LineCell>) -> Vec<(usize, LineCell)> {
    let total = cells.len();
    let mut next = 0;
    let mut placed = Vec::with_capacity(total);

    for (i, cell) in cells.into_iter().enumerate() {
        let last = anchors.len().saturating_sub(total - i).max(next);
        let column = (next..=last)
            .min_by_key(|&c| anchors.get(c).map_or(usize::MAX, |a| a.abs_diff(cell.0)))
            .unwrap_or(next);
        placed.push((column, cell));
        next = column + 1;
    }
    placed
}

impl WhitespaceTableDetector {
    fn split_cells(&self, line: &str) -> Vec<LineCell> {
        let mut cells = Vec::new();
        let mut current = String::new();
        let mut start = 0;
        let mut spaces = 0;

        for (offset, ch) in line.trim_end().chars().enumerate() {
            match ch {
                '\t' => {
                    if !current.is_empty() {
                        cells.push((start, std::mem::take(&mut current)));
                    }
                    spaces = 0;
                }
                ' ' => spaces += 1,
                _ => {
                    if current.is_empty() {
                        start = offset;
                    } else if spaces >= self.min_gap {
                        cells.push((start, std::mem::take(&mut current)));
                        start = offset;
                    } else {
                        current.extend(std::iter::repeat(' ').take(spaces));
                    }
                    spaces = 0;
                    current.push(ch);
                }
            }
        }
        if !current.is_empty() {
            cells.push((start, current));
        }
        cells
    }
}

impl TableDetector for WhitespaceTableDetector {
    fn detect(&self, page_number: u32, page_text: &str) -> Vec<RawTable> {
        let mut tables = Vec::new();
        let mut pending: Option<PendingTable> = None;

        for line in page_text.lines() {
            let cells = self.split_cells(line);

            let continued = match &mut pending {
                Some(table) => !cells.is_empty() && table.push_line(cells.clone()),
                None => false,
            };
            if continued {
                continue;
            }
            if let Some(table) = pending.take() {
                tables.push(table.finish());
            }

            if cells.len() >= 2 {
                pending = Some(PendingTable::start(cells));
            }
        }
        if let Some(table) = pending {
            tables.push(table.finish());
        }

        debug!("Page {}: detected {} table(s)", page_number, tables.len());
        tables
    }
}

/// Converts one raw table into department rows.
///
/// Tables without the department column are unrelated page content and yield
/// an empty dataset.
pub fn process_table(table: &RawTable, config: &DepartmentSplitConfig) -> Result<Dataset> {
    let Some(header) = table.header() else {
        return Ok(Dataset::empty());
    };

    let mut dataset = Dataset::new(normalize_headers(header))?;
    for row in table.data_rows() {
        dataset.push_row(
            row.iter()
                .map(|cell| CellValue::from_optional(cell.as_deref()))
                .collect(),
        )?;
    }

    if !dataset.has_column(&config.department_column) {
        debug!(
            "Discarding table without a {} column ({} column(s))",
            config.department_column,
            dataset.columns().len()
        );
        return Ok(Dataset::empty());
    }

    Ok(process_departments(&dataset, config))
}

pub struct PdfTableExtractor<D: TableDetector = WhitespaceTableDetector> {
    detector: D,
    config: DepartmentSplitConfig,
}

impl Default for PdfTableExtractor {
    fn default() -> Self {
        Self::new(WhitespaceTableDetector::default(), DepartmentSplitConfig::default())
    }
}

impl<D: TableDetector> PdfTableExtractor<D> {
    pub fn new(detector: D, config: DepartmentSplitConfig) -> Self {
        Self { detector, config }
    }

    pub fn config(&self) -> &DepartmentSplitConfig {
        &self.config
    }

    pub fn extract_file(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReconcilerError::InputNotFound(path.to_path_buf()));
        }

        info!("Extracting department tables from {}", path.display());
        let document = Document::load(path)?;
        self.extract_document(&document)
    }

    /// Visits pages in page-number order.
    pub fn extract_document(&self, document: &Document) -> Result<Dataset> {
        let pages = document.get_pages();
        debug!("Document has {} page(s)", pages.len());

        let mut page_tables = Vec::with_capacity(pages.len());
        for &page_number in pages.keys() {
            let text = match document.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Could not read text of page {}: {}", page_number, e);
                    continue;
                }
            };
            page_tables.push(self.detector.detect(page_number, &text));
        }

        self.extract_pages(page_tables)
    }

    /// Processes already detected tables, one `Vec` per page.
    pub fn extract_pages<I>(&self, pages: I) -> Result<Dataset>
    where
        I: IntoIterator<Item = Vec<RawTable>>,
    {
        let mut datasets = Vec::new();
        for tables in pages {
            for table in &tables {
                let processed = process_table(table, &self.config)?;
                if !processed.is_empty() {
                    datasets.push(processed);
                }
            }
        }

        let combined = Dataset::concat(datasets);
        info!("Extracted {} department row(s)", combined.len());
        Ok(combined)
    }
}

/// Extracts every department table of a financial summary PDF into one dataset.
pub fn extract_tables_from_pdf(path: impl AsRef<Path>) -> Result<Dataset> {
    let extractor: PdfTableExtractor = Default::default();
    extractor.extract_file(path)
}
