//! Square conversions for algebraic coordinates.
//!
//! Converts between human-readable coordinates (e.g., `e4`) and the
//! collaborator's `chess::Square`, validating file and rank characters so
//! callers get a precise error instead of a silently wrong square.

use chess::{File, Rank, Square};

use crate::errors::QuantumChessErrors;

/// Convert algebraic notation (for example: "e4") to a square.
#[inline]
pub fn parse_square(text: &str) -> Result<Square, QuantumChessErrors> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 {
        return Err(QuantumChessErrors::InvalidSquare(text.to_owned()));
    }

    let file = bytes[0];
    let rank = bytes[1];

    if !(b'a'..=b'h').contains(&file) {
        return Err(QuantumChessErrors::InvalidSquare(format!(
            "invalid file in {text}"
        )));
    }
    if !(b'1'..=b'8').contains(&rank) {
        return Err(QuantumChessErrors::InvalidSquare(format!(
            "invalid rank in {text}"
        )));
    }

    Ok(Square::make_square(
        Rank::from_index((rank - b'1') as usize),
        File::from_index((file - b'a') as usize),
    ))
}

/// Convert a square to algebraic notation (for example: "e4").
#[inline]
pub fn square_name(square: Square) -> String {
    let file = char::from(b'a' + square.get_file().to_index() as u8);
    let rank = char::from(b'1' + square.get_rank().to_index() as u8);
    format!("{file}{rank}")
}
