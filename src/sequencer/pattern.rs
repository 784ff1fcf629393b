// Pattern - Grid of beat states played in cyclic order
// Cells are stored row-major; the (column, row) layout only matters for display

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatState {
    #[default]
    Empty,
    Normal,
    Accent,
}

/// Loudness of an audible trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Normal,
    Accent,
}

impl BeatState {
    /// Next state in the edit cycle: Empty -> Normal -> Accent -> Empty
    pub fn next(self) -> Self {
        match self {
            BeatState::Empty => BeatState::Normal,
            BeatState::Normal => BeatState::Accent,
            BeatState::Accent => BeatState::Empty,
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, BeatState::Empty)
    }

    /// Intensity this state sounds at, `None` for silent cells
    pub fn intensity(self) -> Option<Intensity> {
        match self {
            BeatState::Empty => None,
            BeatState::Normal => Some(Intensity::Normal),
            BeatState::Accent => Some(Intensity::Accent),
        }
    }

    /// Compact text symbol ('.', 'x', 'A')
    pub fn symbol(self) -> char {
        match self {
            BeatState::Empty => '.',
            BeatState::Normal => 'x',
            BeatState::Accent => 'A',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' | '-' | '_' => Some(BeatState::Empty),
            'x' | 'X' | 'n' | 'N' => Some(BeatState::Normal),
            'a' | 'A' => Some(BeatState::Accent),
            _ => None,
        }
    }
}

impl From<Intensity> for BeatState {
    fn from(intensity: Intensity) -> Self {
        match intensity {
            Intensity::Normal => BeatState::Normal,
            Intensity::Accent => BeatState::Accent,
        }
    }
}

/// Error returned when parsing the compact pattern notation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternParseError {
    #[error("pattern is empty")]
    Empty,

    #[error("unknown cell symbol '{symbol}' at row {row}, column {column}")]
    UnknownSymbol {
        symbol: char,
        row: usize,
        column: usize,
    },

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// Beat pattern: `width * height` cells visited in index order
///
/// Dimensions are always at least 1x1, so a pattern is never empty and the
/// scheduler can always index into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    width: usize,
    height: usize,
    cells: Vec<BeatState>,
}

impl Pattern {
    /// Create an all-empty pattern
    /// Zero dimensions are raised to 1
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);

        Self {
            width,
            height,
            cells: vec![BeatState::Empty; width * height],
        }
    }

    /// Build a pattern from existing cells, padding with Empty or dropping
    /// trailing cells so the length matches `width * height`
    pub fn from_cells(width: usize, height: usize, cells: Vec<BeatState>) -> Self {
        let mut pattern = Self {
            width: width.max(1),
            height: height.max(1),
            cells,
        };
        let len = pattern.width * pattern.height;
        pattern.cells.resize(len, BeatState::Empty);
        pattern
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells (always `width * height`)
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Never true: every constructor and `resize` keep dimensions at least 1x1
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[BeatState] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Option<BeatState> {
        self.cells.get(index).copied()
    }

    /// Display position (column, row) of a cell index
    pub fn cell_position(&self, index: usize) -> Option<(usize, usize)> {
        if index < self.len() {
            Some((index % self.width, index / self.width))
        } else {
            None
        }
    }

    /// Number of cells that produce sound
    pub fn active_count(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_empty()).count()
    }

    /// Change the grid dimensions
    ///
    /// Cells keep their state by index; new cells are Empty and trailing cells
    /// beyond the new length are dropped. Dimensions are expected to be clamped
    /// by the caller already.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.cells.resize(self.width * self.height, BeatState::Empty);
    }

    /// Cycle a cell Empty -> Normal -> Accent -> Empty
    /// Returns false (and changes nothing) if the index is out of bounds
    pub fn toggle_cell(&mut self, index: usize) -> bool {
        match self.cells.get_mut(index) {
            Some(cell) => {
                *cell = cell.next();
                true
            }
            None => false,
        }
    }

    /// Set a cell to a given state, no-op when out of bounds
    pub fn set_cell(&mut self, index: usize, state: BeatState) -> bool {
        match self.cells.get_mut(index) {
            Some(cell) => {
                *cell = state;
                true
            }
            None => false,
        }
    }

    /// Set every cell to Empty, keeping dimensions
    pub fn clear(&mut self) {
        self.cells.fill(BeatState::Empty);
    }
}

impl Default for Pattern {
    /// 4 columns x 2 rows, all empty
    fn default() -> Self {
        Self::new(4, 2)
    }
}

/// Compact notation: one symbol per cell, rows separated by '/'
/// e.g. `A.x./x.x.` is a 4x2 grid
impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row_index, row) in self.cells.chunks(self.width).enumerate() {
            if row_index > 0 {
                f.write_str("/")?;
            }
            for cell in row {
                write!(f, "{}", cell.symbol())?;
            }
        }
        Ok(())
    }
}

impl FromStr for Pattern {
    type Err = PatternParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows: Vec<&str> = s
            .split('/')
            .map(str::trim)
            .filter(|row| !row.is_empty())
            .collect();

        let Some(first) = rows.first() else {
            return Err(PatternParseError::Empty);
        };
        let width = first.chars().count();

        let mut cells = Vec::with_capacity(width * rows.len());
        for (row, text) in rows.iter().enumerate() {
            let found = text.chars().count();
            if found != width {
                return Err(PatternParseError::RaggedRow {
                    row,
                    found,
                    expected: width,
                });
            }
            for (column, symbol) in text.chars().enumerate() {
                let state = BeatState::from_symbol(symbol).ok_or(
                    PatternParseError::UnknownSymbol {
                        symbol,
                        row,
                        column,
                    },
                )?;
                cells.push(state);
            }
        }

        Ok(Self::from_cells(width, rows.len(), cells))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_creation() {
        let pattern = Pattern::new(4, 2);
        assert_eq!(pattern.width(), 4);
        assert_eq!(pattern.height(), 2);
        assert_eq!(pattern.len(), 8);
        assert!(pattern.cells().iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_zero_dimensions_raised() {
        let pattern = Pattern::new(0, 0);
        assert_eq!(pattern.len(), 1);
        assert!(!pattern.is_empty());

        assert!(!Pattern::from_cells(0, 3, Vec::new()).is_empty());

        let mut resized = Pattern::new(4, 2);
        resized.resize(0, 0);
        assert_eq!((resized.width(), resized.height()), (1, 1));
        assert!(!resized.is_empty());
    }

    #[test]
    fn test_toggle_cycles_states() {
        let mut pattern = Pattern::new(2, 1);

        assert!(pattern.toggle_cell(1));
        assert_eq!(pattern.get(1), Some(BeatState::Normal));
        pattern.toggle_cell(1);
        assert_eq!(pattern.get(1), Some(BeatState::Accent));
        pattern.toggle_cell(1);
        assert_eq!(pattern.get(1), Some(BeatState::Empty));

        // Neighbour untouched
        assert_eq!(pattern.get(0), Some(BeatState::Empty));
    }

    #[test]
    fn test_toggle_out_of_bounds_is_noop() {
        let mut pattern = Pattern::new(2, 2);
        let before = pattern.clone();

        assert!(!pattern.toggle_cell(4));
        assert!(!pattern.toggle_cell(usize::MAX));
        assert_eq!(pattern, before);
    }

    #[test]
    fn test_resize_grow_pads_empty() {
        let mut pattern: Pattern = "Ax".parse().unwrap();
        pattern.resize(3, 2);

        assert_eq!(pattern.len(), 6);
        assert_eq!(pattern.get(0), Some(BeatState::Accent));
        assert_eq!(pattern.get(1), Some(BeatState::Normal));
        assert!(pattern.cells()[2..].iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_resize_shrink_truncates() {
        let mut pattern: Pattern = "A.x./xxA.".parse().unwrap();
        pattern.resize(2, 1);

        assert_eq!(pattern.len(), 2);
        assert_eq!(pattern.cells(), &[BeatState::Accent, BeatState::Empty]);

        // Growing back does not resurrect dropped cells
        pattern.resize(4, 2);
        assert_eq!(pattern.active_count(), 1);
    }

    #[test]
    fn test_clear_keeps_dimensions() {
        let mut pattern: Pattern = "AxAx/xAxA".parse().unwrap();
        pattern.clear();

        assert_eq!(pattern.width(), 4);
        assert_eq!(pattern.height(), 2);
        assert_eq!(pattern.active_count(), 0);
    }

    #[test]
    fn test_cell_position_row_major() {
        let pattern = Pattern::new(4, 2);
        assert_eq!(pattern.cell_position(0), Some((0, 0)));
        assert_eq!(pattern.cell_position(3), Some((3, 0)));
        assert_eq!(pattern.cell_position(5), Some((1, 1)));
        assert_eq!(pattern.cell_position(8), None);
    }

    #[test]
    fn test_parse_and_display() {
        let pattern: Pattern = "A.x./x..A".parse().unwrap();
        assert_eq!(pattern.width(), 4);
        assert_eq!(pattern.height(), 2);
        assert_eq!(pattern.to_string(), "A.x./x..A");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Pattern>(), Err(PatternParseError::Empty));
        assert_eq!(
            "A.?".parse::<Pattern>(),
            Err(PatternParseError::UnknownSymbol {
                symbol: '?',
                row: 0,
                column: 2
            })
        );
        assert_eq!(
            "A.x/A.".parse::<Pattern>(),
            Err(PatternParseError::RaggedRow {
                row: 1,
                found: 2,
                expected: 3
            })
        );
    }

    #[test]
    fn test_from_cells_fits_length() {
        let padded = Pattern::from_cells(2, 2, vec![BeatState::Accent]);
        assert_eq!(padded.len(), 4);
        assert_eq!(padded.get(0), Some(BeatState::Accent));

        let truncated = Pattern::from_cells(1, 1, vec![BeatState::Normal; 5]);
        assert_eq!(truncated.len(), 1);
    }
}
