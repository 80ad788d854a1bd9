//! Game status under quantum king rules.
//!
//! A king with still-superposed branches is "in check" if any of its
//! possible squares is attacked, and "checkmate" only if none of its
//! possible squares admits an escaping move. The classical case falls out
//! naturally: one candidate square, and (while in check) any legal move is
//! an evasion.

use chess::Piece;

use crate::classical::position::ClassicalPosition;
use crate::quantum::quantum_board::QuantumBoard;

/// Status of the side to move after an operation commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Active,
    Check,
    Checkmate,
}

/// Recompute the status for the side to move, merging the classical king
/// square with every branch of a superposed king of that color.
pub fn compute_game_status(
    position: &ClassicalPosition,
    quantum: &QuantumBoard,
) -> GameStatus {
    let side = position.side_to_move();

    let mut candidates = Vec::new();
    if let Some(square) = position.king_square(side) {
        candidates.push(square);
    }
    for piece in quantum.iter() {
        if piece.kind == Piece::King && piece.color == side {
            for (_, branch) in piece.state.iter() {
                candidates.push(branch.square);
            }
        }
    }
    if candidates.is_empty() {
        return GameStatus::Active;
    }

    let in_check = candidates
        .iter()
        .any(|&square| position.square_attacked_by(square, !side));
    if !in_check {
        return GameStatus::Active;
    }

    // Escape probes need a board the collaborator accepts, so a superposed
    // opponent king is stood in at its most probable branch square.
    let mut probe_base = position.clone();
    if probe_base.king_square(!side).is_none() {
        if let Some(square) = quantum.king_claim(!side, &[]) {
            probe_base.place_piece(square, Piece::King, !side);
        }
    }

    for &candidate in &candidates {
        let mut probe = probe_base.clone();
        if probe.king_square(side) != Some(candidate) {
            probe.place_piece(candidate, Piece::King, side);
        }
        // A branch position that cannot be materialized classically offers
        // no escape.
        if probe.has_any_legal_move().unwrap_or(false) {
            return GameStatus::Check;
        }
    }

    GameStatus::Checkmate
}

#[cfg(test)]
mod tests {
    use super::{compute_game_status, GameStatus};
    use crate::classical::algebraic::parse_square;
    use crate::classical::position::ClassicalPosition;
    use crate::quantum::probability_state::StateId;
    use crate::quantum::quantum_board::QuantumBoard;
    use chess::{Color, Piece};

    #[test]
    fn quiet_position_is_active() {
        let status = compute_game_status(&ClassicalPosition::starting(), &QuantumBoard::new());
        assert_eq!(status, GameStatus::Active);
    }

    #[test]
    fn classical_check_with_escapes() {
        // 1. e4 d5 2. Bb5+ — black can block or interpose.
        let position = ClassicalPosition::from_fen(
            "rnbqkbnr/ppp1pppp/8/1B1p4/4P3/8/PPPP1PPP/RNBQK1NR b KQkq - 1 2",
        )
        .unwrap();
        let status = compute_game_status(&position, &QuantumBoard::new());
        assert_eq!(status, GameStatus::Check);
    }

    #[test]
    fn classical_checkmate() {
        // Fool's mate final position, white to move.
        let position = ClassicalPosition::from_fen(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        )
        .unwrap();
        let status = compute_game_status(&position, &QuantumBoard::new());
        assert_eq!(status, GameStatus::Checkmate);
    }

    #[test]
    fn superposed_king_checked_on_one_branch_can_still_escape() {
        // Black king is superposed between h8 (attacked by the rook) and
        // a8; both branches have king moves available.
        let position = ClassicalPosition::from_fen("8/8/8/8/8/8/8/K6R b - - 0 1").unwrap();
        let mut quantum = QuantumBoard::new();
        let king = quantum.add_piece(parse_square("h8").unwrap(), Piece::King, Color::Black);
        quantum
            .split(
                king,
                &StateId::root(),
                parse_square("h8").unwrap(),
                parse_square("a8").unwrap(),
            )
            .expect("king split");

        let status = compute_game_status(&position, &quantum);
        assert_eq!(status, GameStatus::Check);
    }

    #[test]
    fn escape_probes_work_while_the_opponent_king_is_superposed() {
        // Black is in check from the rook while the *white* king is split
        // across a1/a2 and hence off the classical board. The escape probe
        // must still find Kg8/Kg7 instead of misreporting checkmate.
        let position = ClassicalPosition::from_fen("7k/8/8/8/8/8/8/7R b - - 0 1").unwrap();
        let mut quantum = QuantumBoard::new();
        let king = quantum.add_piece(parse_square("a1").unwrap(), Piece::King, Color::White);
        quantum
            .split(
                king,
                &StateId::root(),
                parse_square("a1").unwrap(),
                parse_square("a2").unwrap(),
            )
            .expect("king split");

        let status = compute_game_status(&position, &quantum);
        assert_eq!(status, GameStatus::Check);
    }

    #[test]
    fn superposed_king_with_no_attacked_branch_is_active() {
        let position = ClassicalPosition::from_fen("8/8/8/8/8/8/8/K7 b - - 0 1").unwrap();
        let mut quantum = QuantumBoard::new();
        let king = quantum.add_piece(parse_square("g8").unwrap(), Piece::King, Color::Black);
        quantum
            .split(
                king,
                &StateId::root(),
                parse_square("g8").unwrap(),
                parse_square("e8").unwrap(),
            )
            .expect("king split");

        let status = compute_game_status(&position, &quantum);
        assert_eq!(status, GameStatus::Active);
    }
}
