// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared table renderer for the dashboard views.
//!
//! Provides consistent column alignment, color application, and
//! truncation across the fleet, task, and stats views.

use crate::color;

/// Column text alignment.
pub enum Align {
    Left,
    Right,
}

/// How a cell's text is styled after padding.
pub enum CellStyle {
    /// No color applied.
    Plain,
    /// Apply [`color::muted()`].
    Muted,
    /// Apply [`color::status()`] — auto-detects green/yellow/red.
    Status,
}

/// A column definition in a [`Table`].
pub struct Column {
    pub name: &'static str,
    pub align: Align,
    pub style: CellStyle,
    /// Maximum width (`None` = unlimited). Values exceeding this are truncated.
    pub max_width: Option<usize>,
}

impl Column {
    /// Left-aligned, plain style.
    pub fn left(name: &'static str) -> Self {
        Self {
            name,
            align: Align::Left,
            style: CellStyle::Plain,
            max_width: None,
        }
    }

    /// Right-aligned, plain style.
    pub fn right(name: &'static str) -> Self {
        Self {
            name,
            align: Align::Right,
            style: CellStyle::Plain,
            max_width: None,
        }
    }

    pub fn muted(mut self) -> Self {
        self.style = CellStyle::Muted;
        self
    }

    pub fn status(mut self) -> Self {
        self.style = CellStyle::Status;
        self
    }

    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }
}

/// A simple fixed-column table.
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn truncate(text: &str, max: Option<usize>) -> String {
        match max {
            Some(max) if text.chars().count() > max && max > 1 => {
                let kept: String = text.chars().take(max - 1).collect();
                format!("{kept}…")
            }
            _ => text.to_string(),
        }
    }

    /// Render header plus rows as display lines (no trailing newline).
    pub fn render(&self) -> Vec<String> {
        // Column widths: header or widest (truncated) cell.
        let mut widths: Vec<usize> = self
            .columns
            .iter()
            .map(|c| c.name.chars().count())
            .collect();
        let truncated_rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.columns)
                    .map(|(cell, col)| Self::truncate(cell, col.max_width))
                    .collect()
            })
            .collect();
        for row in &truncated_rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let mut lines = Vec::with_capacity(truncated_rows.len() + 1);

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, width)| color::header(&pad(col.name, *width, &col.align)))
            .collect();
        lines.push(header.join("  ").trim_end().to_string());

        for row in &truncated_rows {
            let cells: Vec<String> = row
                .iter()
                .zip(self.columns.iter().zip(&widths))
                .map(|(cell, (col, width))| {
                    let padded = pad(cell, *width, &col.align);
                    match col.style {
                        CellStyle::Plain => padded,
                        CellStyle::Muted => color::muted(&padded),
                        // Color only the word, keep the padding plain so
                        // escape codes never affect column math.
                        CellStyle::Status => {
                            let fill = " ".repeat(width.saturating_sub(cell.chars().count()));
                            match col.align {
                                Align::Left => format!("{}{fill}", color::status(cell)),
                                Align::Right => format!("{fill}{}", color::status(cell)),
                            }
                        }
                    }
                })
                .collect();
            lines.push(cells.join("  ").trim_end().to_string());
        }
        lines
    }
}

fn pad(text: &str, width: usize, align: &Align) -> String {
    let len = text.chars().count();
    let fill = " ".repeat(width.saturating_sub(len));
    match align {
        Align::Left => format!("{text}{fill}"),
        Align::Right => format!("{fill}{text}"),
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
