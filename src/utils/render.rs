//! Terminal-oriented Unicode board renderer.
//!
//! Creates a human-readable view of a game snapshot for debugging, tests,
//! and diagnostics in text environments: the classical board as a Unicode
//! grid with superposed claims marked, followed by one line per quantum
//! branch with its probability.

use chess::{Color, File, Piece, Rank, Square};

use crate::classical::algebraic::square_name;
use crate::protocol::requests::GameSnapshot;

/// Render the snapshot to a Unicode string for terminal output.
///
/// Squares claimed only by superposed pieces show `?`; the claims are
/// itemized below the grid.
pub fn render_snapshot(snapshot: &GameSnapshot) -> String {
    let occupancies = snapshot.quantum.all_occupancies();
    let mut out = String::new();

    out.push_str("  a b c d e f g h\n");

    for rank in (0..8).rev() {
        out.push(char::from(b'1' + rank as u8));
        out.push(' ');

        for file in 0..8 {
            let square =
                Square::make_square(Rank::from_index(rank), File::from_index(file));
            match snapshot.position.piece_at(square) {
                Some((piece, color)) => out.push(piece_to_unicode(color, piece)),
                None if occupancies.contains_key(&square) => out.push('?'),
                None => out.push('·'),
            }

            if file < 7 {
                out.push(' ');
            }
        }

        out.push(' ');
        out.push(char::from(b'1' + rank as u8));
        out.push('\n');
    }

    out.push_str("  a b c d e f g h");

    for piece in snapshot.quantum.iter() {
        for (state_id, branch) in piece.state.iter() {
            out.push('\n');
            out.push_str(&format!(
                "{} {} {:>5.1}%  piece {} state {}",
                square_name(branch.square),
                piece_to_unicode(piece.color, piece.kind),
                branch.probability * 100.0,
                piece.id.value(),
                state_id,
            ));
        }
    }

    out
}

fn piece_to_unicode(color: Color, piece: Piece) -> char {
    match (color, piece) {
        (Color::White, Piece::Pawn) => '♙',
        (Color::White, Piece::Knight) => '♘',
        (Color::White, Piece::Bishop) => '♗',
        (Color::White, Piece::Rook) => '♖',
        (Color::White, Piece::Queen) => '♕',
        (Color::White, Piece::King) => '♔',
        (Color::Black, Piece::Pawn) => '♟',
        (Color::Black, Piece::Knight) => '♞',
        (Color::Black, Piece::Bishop) => '♝',
        (Color::Black, Piece::Rook) => '♜',
        (Color::Black, Piece::Queen) => '♛',
        (Color::Black, Piece::King) => '♚',
    }
}
