use ob_core::frame::CharacterGrid;
use serde::{Deserialize, Serialize};

use crate::error::FrameDecodeError;

/// Un caractère répété `len` fois (`len >= 1`).
///
/// Sérialisé comme la paire JSON `[char, len]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(char, u32)", into = "(char, u32)")]
pub struct RunSegment {
    /// Repeated character.
    pub ch: char,
    /// Run length.
    pub len: u32,
}

impl From<(char, u32)> for RunSegment {
    fn from((ch, len): (char, u32)) -> Self {
        Self { ch, len }
    }
}

impl From<RunSegment> for (char, u32) {
    fn from(run: RunSegment) -> Self {
        (run.ch, run.len)
    }
}

/// Encode a grid as runs, row-major.
///
/// A run always stops at the end of a row, even when the next row starts
/// with the same character, so the width is never stored per row.
///
/// # Example
/// ```
/// use ob_codec::rle::{encode_rle, RunSegment};
/// use ob_core::frame::CharacterGrid;
/// let grid = CharacterGrid::filled(3, 2, '.', 0, 0.0).unwrap();
/// let runs = encode_rle(&grid);
/// assert_eq!(runs, vec![RunSegment { ch: '.', len: 3 }; 2]);
/// ```
#[must_use]
pub fn encode_rle(grid: &CharacterGrid) -> Vec<RunSegment> {
    let mut runs = Vec::new();
    for row in grid.rows() {
        let mut current = row[0];
        let mut len = 0u32;
        for &ch in row {
            if ch == current {
                len += 1;
            } else {
                runs.push(RunSegment { ch: current, len });
                current = ch;
                len = 1;
            }
        }
        runs.push(RunSegment { ch: current, len });
    }
    runs
}

/// Expand runs back into `width * height` cells.
///
/// Strict: a zero-length run, a run crossing a row boundary, or a total
/// different from `width * height` is rejected, never truncated or padded.
///
/// # Errors
/// `ZeroRun`, `RunCrossesRow` or `RunLengthMismatch`.
///
/// # Example
/// ```
/// use ob_codec::rle::{decode_rle, RunSegment};
/// let runs = [RunSegment { ch: '#', len: 2 }, RunSegment { ch: ' ', len: 2 }];
/// assert_eq!(decode_rle(&runs, 2, 2).unwrap(), vec!['#', '#', ' ', ' ']);
/// assert!(decode_rle(&runs, 3, 2).is_err());
/// ```
pub fn decode_rle(
    runs: &[RunSegment],
    width: u32,
    height: u32,
) -> Result<Vec<char>, FrameDecodeError> {
    let expected = u64::from(width) * u64::from(height);
    let actual: u64 = runs.iter().map(|r| u64::from(r.len)).sum();
    if actual != expected {
        return Err(FrameDecodeError::RunLengthMismatch { expected, actual });
    }

    let mut cells = Vec::with_capacity(expected as usize);
    let mut column = 0u32;
    for (position, run) in runs.iter().enumerate() {
        if run.len == 0 {
            return Err(FrameDecodeError::ZeroRun { position });
        }
        if u64::from(column) + u64::from(run.len) > u64::from(width) {
            return Err(FrameDecodeError::RunCrossesRow {
                column,
                len: run.len,
                width,
            });
        }
        cells.extend(std::iter::repeat_n(run.ch, run.len as usize));
        column = (column + run.len) % width;
    }
    Ok(cells)
}

/// Octets JSON au plus par paire : `["\u001f",4294967295],`.
const MAX_PAIR_BYTES: u64 = 22;

/// Upper bound on the serialized run list of a `width × height` grid.
///
/// Approached only when every cell is its own run; a frame header announcing
/// more than this cannot come from [`serialize_runs`].
///
/// # Example
/// ```
/// use ob_codec::rle::max_raw_size;
/// assert_eq!(max_raw_size(1, 1), 24);
/// ```
#[must_use]
pub fn max_raw_size(width: u32, height: u32) -> u64 {
    2 + u64::from(width) * u64::from(height) * MAX_PAIR_BYTES
}

/// Compact JSON form, e.g. `[[" ",12],["@",3]]`.
///
/// # Errors
/// Only if serde_json fails to write into memory.
pub fn serialize_runs(runs: &[RunSegment]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(runs)
}

/// Parse the JSON run list.
///
/// # Errors
/// `Payload` when the bytes are not a list of `[char, length]` pairs.
pub fn parse_runs(raw: &[u8]) -> Result<Vec<RunSegment>, FrameDecodeError> {
    serde_json::from_slice(raw).map_err(|e| FrameDecodeError::Payload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&str]) -> CharacterGrid {
        let cells: Vec<char> = rows.iter().flat_map(|r| r.chars()).collect();
        CharacterGrid::from_cells(rows[0].chars().count() as u32, rows.len() as u32, cells, 0, 0.0)
            .unwrap()
    }

    #[test]
    fn runs_stop_at_row_boundaries() {
        let g = grid(&["..##", "##..", "...."]);
        let runs = encode_rle(&g);
        assert_eq!(
            runs,
            vec![
                RunSegment { ch: '.', len: 2 },
                RunSegment { ch: '#', len: 2 },
                RunSegment { ch: '#', len: 2 },
                RunSegment { ch: '.', len: 2 },
                RunSegment { ch: '.', len: 4 },
            ]
        );
        let total: u32 = runs.iter().map(|r| r.len).sum();
        assert_eq!(total, 12);
    }

    #[test]
    fn round_trip_on_assorted_shapes() {
        let shapes = [
            grid(&["@"]),
            grid(&["a", "b", "b"]),
            grid(&["░▒▓█ ", "     "]),
            grid(&[" .:-=+*#%@", "@%#*+=-:. "]),
        ];
        for g in shapes {
            let raw = serialize_runs(&encode_rle(&g)).unwrap();
            let runs = parse_runs(&raw).unwrap();
            let cells = decode_rle(&runs, g.width(), g.height()).unwrap();
            assert_eq!(cells, g.cells());
        }
    }

    #[test]
    fn json_form_is_compact_pairs() {
        let g = grid(&["   @"]);
        let raw = serialize_runs(&encode_rle(&g)).unwrap();
        assert_eq!(raw, br#"[[" ",3],["@",1]]"#);
    }

    #[test]
    fn short_sum_is_rejected() {
        let runs = [RunSegment { ch: '.', len: 5 }];
        assert_eq!(
            decode_rle(&runs, 3, 2),
            Err(FrameDecodeError::RunLengthMismatch {
                expected: 6,
                actual: 5
            })
        );
    }

    #[test]
    fn long_sum_is_rejected() {
        let runs = [RunSegment { ch: '.', len: 3 }, RunSegment { ch: '.', len: 4 }];
        assert!(matches!(
            decode_rle(&runs, 3, 2),
            Err(FrameDecodeError::RunLengthMismatch { actual: 7, .. })
        ));
    }

    #[test]
    fn zero_run_is_rejected() {
        let runs = [
            RunSegment { ch: '.', len: 2 },
            RunSegment { ch: '#', len: 0 },
            RunSegment { ch: '.', len: 2 },
        ];
        assert_eq!(
            decode_rle(&runs, 2, 2),
            Err(FrameDecodeError::ZeroRun { position: 1 })
        );
    }

    #[test]
    fn run_across_rows_is_rejected() {
        let runs = [RunSegment { ch: '.', len: 1 }, RunSegment { ch: '#', len: 3 }];
        assert!(matches!(
            decode_rle(&runs, 2, 2),
            Err(FrameDecodeError::RunCrossesRow { column: 1, .. })
        ));
    }

    #[test]
    fn worst_case_json_stays_under_the_bound() {
        // Une cellule par run, caractères échappés ou multi-octets.
        let g = grid(&["\u{1}\"\u{1}\"", "é\u{1f}€\\"]);
        let raw = serialize_runs(&encode_rle(&g)).unwrap();
        assert!(raw.len() as u64 <= max_raw_size(4, 2));

        let runs = [RunSegment { ch: '\u{1}', len: u32::MAX }];
        let raw = serialize_runs(&runs).unwrap();
        assert_eq!(raw, br#"[["\u0001",4294967295]]"#);
        assert!(raw.len() as u64 <= max_raw_size(1, 1));
    }

    #[test]
    fn garbage_payload_is_a_payload_error() {
        assert!(matches!(
            parse_runs(b"[[\"ab\", 3]]"),
            Err(FrameDecodeError::Payload(_))
        ));
        assert!(matches!(parse_runs(b"not json"), Err(FrameDecodeError::Payload(_))));
    }
}
