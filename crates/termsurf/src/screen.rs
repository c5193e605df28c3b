//! Decoded screen state: styled text, plain text, and the cell grid.

use serde::Deserialize;

use crate::error::Error;
use termsurf_ipc::IpcError;

/// Which row range a read covers: the visible viewport or the full
/// scrollback ("screen" on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenMode {
    Viewport,
    Scrollback,
}

impl ScreenMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScreenMode::Viewport => "viewport",
            ScreenMode::Scrollback => "screen",
        }
    }
}

/// One snapshot of a surface's rendered content.
///
/// `text` keeps the emulator's inline SGR style markers so runs of differing
/// attributes stay distinguishable; `plain_text` is the style-stripped form
/// and the canonical target for pattern matching.
#[derive(Debug, Clone)]
pub struct Screen {
    pub text: String,
    pub plain_text: String,
    pub cursor_row: u32,
    pub cursor_col: u32,
}

#[derive(Deserialize)]
struct ScreenDto {
    #[serde(default)]
    content: String,
    #[serde(default)]
    cursor_row: u32,
    #[serde(default)]
    cursor_col: u32,
}

impl Screen {
    pub(crate) fn from_result(value: serde_json::Value) -> Result<Self, Error> {
        let dto: ScreenDto = serde_json::from_value(value)
            .map_err(|err| IpcError::InvalidResponse(format!("screen payload: {err}")))?;
        let plain_text = strip_style(&dto.content);
        Ok(Self {
            text: dto.content,
            plain_text,
            cursor_row: dto.cursor_row,
            cursor_col: dto.cursor_col,
        })
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.plain_text.lines()
    }

    /// Substring check against the plain text.
    pub fn contains(&self, pattern: &str) -> bool {
        self.plain_text.contains(pattern)
    }
}

/// Remove ANSI/SGR escape sequences, leaving the printable content.
pub fn strip_style(text: &str) -> String {
    strip_ansi_escapes::strip_str(text)
}

/// One character position's rendered state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub ch: char,
    pub fg: Option<String>,
    pub bg: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub inverse: bool,
}

impl Cell {
    fn blank(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            ch: ' ',
            fg: None,
            bg: None,
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            inverse: false,
        }
    }
}

#[derive(Deserialize)]
struct CellDto {
    #[serde(default)]
    ch: String,
    #[serde(default)]
    fg: Option<String>,
    #[serde(default)]
    bg: Option<String>,
    #[serde(default)]
    bold: bool,
    #[serde(default)]
    italic: bool,
    #[serde(default)]
    underline: bool,
    #[serde(default)]
    strikethrough: bool,
    #[serde(default)]
    inverse: bool,
}

#[derive(Deserialize)]
struct CellsDto {
    #[serde(default)]
    rows: u32,
    #[serde(default)]
    cols: u32,
    #[serde(default)]
    cursor_row: u32,
    #[serde(default)]
    cursor_col: u32,
    #[serde(default)]
    lines: Vec<Vec<CellDto>>,
}

/// Upper bound on decoded grid cells, derived from the frame size cap.
const MAX_GRID_CELLS: u64 = termsurf_ipc::MAX_MESSAGE_SIZE as u64;

/// A dense rectangular grid of [`Cell`]s plus cursor position.
///
/// The grid always holds exactly `rows * cols` cells covering every
/// `(row, col)` pair once; short or missing wire rows are padded with
/// blanks so trailing blank cells are never dropped. In scrollback mode the
/// dimensions may exceed the nominal surface size.
#[derive(Debug, Clone)]
pub struct ScreenCells {
    pub rows: u32,
    pub cols: u32,
    pub cursor_row: u32,
    pub cursor_col: u32,
    cells: Vec<Cell>,
}

impl ScreenCells {
    pub(crate) fn from_result(value: serde_json::Value) -> Result<Self, Error> {
        let dto: CellsDto = serde_json::from_value(value)
            .map_err(|err| IpcError::InvalidResponse(format!("cells payload: {err}")))?;

        let rows = dto.rows.max(dto.lines.len() as u32);
        let widest = dto.lines.iter().map(Vec::len).max().unwrap_or(0) as u32;
        let cols = dto.cols.max(widest);

        // The nominal header is untrusted. A frame of MAX_MESSAGE_SIZE bytes
        // cannot describe more cells than it has bytes, so anything past
        // that is a corrupt header, not a big screen.
        let total = u64::from(rows) * u64::from(cols);
        if total > MAX_GRID_CELLS {
            return Err(IpcError::InvalidResponse(format!(
                "cell grid {rows}x{cols} exceeds the message size limit"
            ))
            .into());
        }

        let mut cells = Vec::with_capacity(total as usize);
        for row in 0..rows {
            let line = dto.lines.get(row as usize);
            for col in 0..cols {
                let cell = line
                    .and_then(|l| l.get(col as usize))
                    .map(|dto| Cell {
                        row,
                        col,
                        ch: dto.ch.chars().next().unwrap_or(' '),
                        fg: dto.fg.clone(),
                        bg: dto.bg.clone(),
                        bold: dto.bold,
                        italic: dto.italic,
                        underline: dto.underline,
                        strikethrough: dto.strikethrough,
                        inverse: dto.inverse,
                    })
                    .unwrap_or_else(|| Cell::blank(row, col));
                cells.push(cell);
            }
        }

        Ok(Self {
            rows,
            cols,
            cursor_row: dto.cursor_row,
            cursor_col: dto.cursor_col,
            cells,
        })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell_at(&self, row: u32, col: u32) -> Option<&Cell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get((row * self.cols + col) as usize)
    }

    /// The characters of one row, joined in column order.
    pub fn row_text(&self, row: u32) -> String {
        (0..self.cols)
            .filter_map(|col| self.cell_at(row, col))
            .map(|cell| cell.ch)
            .collect()
    }
}
