//! Facade over the classical chess-rules collaborator.
//!
//! The engine never reimplements chess rules: legality, move generation,
//! move application, and attack queries are all delegated to the `chess`
//! crate. The authoritative classical state is a `chess::BoardBuilder`
//! because it round-trips FEN without validation — necessary while a king
//! is superposed and therefore absent from the classical board — and a
//! validated `chess::Board` is materialized on demand for rules queries.
//!
//! This type is the single place where "is square X occupied" is answered
//! for the classical half of the game; superposed claims live solely in
//! the quantum board, and a square never hosts both at once.

use std::fmt;
use std::str::FromStr;

use chess::{
    get_bishop_moves, get_king_moves, get_knight_moves, get_pawn_attacks, get_rook_moves,
    BitBoard, Board, BoardBuilder, CastleRights, ChessMove, Color, MoveGen, Piece, Square,
    ALL_SQUARES, EMPTY,
};

use crate::errors::QuantumChessErrors;

/// Standard chess starting position in Forsyth-Edwards Notation (FEN).
pub const STARTING_POSITION_FEN: &str =
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Authoritative classical position of one game.
#[derive(Clone)]
pub struct ClassicalPosition {
    builder: BoardBuilder,
}

// The builder itself has no Debug impl; the FEN says everything anyway.
impl fmt::Debug for ClassicalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassicalPosition").field(&self.fen()).finish()
    }
}

impl ClassicalPosition {
    /// The standard starting position.
    pub fn starting() -> Self {
        Self::from_fen(STARTING_POSITION_FEN).expect("starting FEN should always parse")
    }

    /// Parse a position string. Lenient: positions with a superposed
    /// (hence classically absent) king are accepted.
    pub fn from_fen(fen: &str) -> Result<Self, QuantumChessErrors> {
        let builder = BoardBuilder::from_str(fen)
            .map_err(|error| QuantumChessErrors::InvalidPosition(error.to_string()))?;
        Ok(ClassicalPosition { builder })
    }

    fn from_board(board: &Board) -> Result<Self, QuantumChessErrors> {
        Self::from_fen(&board.to_string())
    }

    /// The position string handed back to the persistence layer.
    pub fn fen(&self) -> String {
        format!("{}", self.builder)
    }

    /// Materialize a validated board for rules queries. Fails when the
    /// position is not currently expressible classically (for example a
    /// superposed king).
    ///
    /// The kings are checked here first: `Board::try_from` indexes its
    /// king-square tables unchecked and must never see a kingless builder.
    pub fn board(&self) -> Result<Board, QuantumChessErrors> {
        for color in [Color::White, Color::Black] {
            if self.king_square(color).is_none() {
                return Err(QuantumChessErrors::InvalidPosition(format!(
                    "{color:?} has no king on the classical board"
                )));
            }
        }
        Board::try_from(&self.builder)
            .map_err(|error| QuantumChessErrors::InvalidPosition(error.to_string()))
    }

    pub fn piece_at(&self, square: Square) -> Option<(Piece, Color)> {
        self.builder[square]
    }

    pub fn place_piece(&mut self, square: Square, piece: Piece, color: Color) {
        self.builder.piece(square, piece, color);
    }

    /// Remove a piece from the classical board (it is entering
    /// superposition). Castling rights tied to the vacated home square are
    /// revoked so the position stays acceptable to the validator.
    pub fn remove_piece(&mut self, square: Square) {
        if let Some((piece, color)) = self.builder[square] {
            if matches!(piece, Piece::King | Piece::Rook) {
                let current = self.builder.get_castle_rights(color);
                let home_rank = match color {
                    Color::White => 0,
                    Color::Black => 7,
                };
                if square.get_rank().to_index() == home_rank {
                    let remaining = match (piece, square.get_file().to_index()) {
                        (Piece::King, _) => CastleRights::NoRights,
                        (Piece::Rook, 0) => current.remove(CastleRights::QueenSide),
                        (Piece::Rook, 7) => current.remove(CastleRights::KingSide),
                        _ => current,
                    };
                    self.builder.castle_rights(color, remaining);
                }
            }
        }
        self.builder.clear_square(square);
    }

    pub fn side_to_move(&self) -> Color {
        self.builder.get_side_to_move()
    }

    /// Pass the turn without a classical move (splits and entangles do
    /// this). Any en-passant square is stale once the turn changes hands
    /// this way.
    pub fn flip_side_to_move(&mut self) {
        let next = !self.builder.get_side_to_move();
        self.builder.side_to_move(next);
        self.builder.en_passant(None);
    }

    /// Classical king square of `color`, if the king is on the board.
    pub fn king_square(&self, color: Color) -> Option<Square> {
        ALL_SQUARES
            .iter()
            .copied()
            .find(|&square| self.builder[square] == Some((Piece::King, color)))
    }

    /// Whether the collaborator judges the move legal in this position.
    pub fn is_legal(&self, mv: ChessMove) -> Result<bool, QuantumChessErrors> {
        Ok(self.board()?.legal(mv))
    }

    /// Apply a legal move, producing the successor position (side to move
    /// flipped by the collaborator).
    pub fn apply(&self, mv: ChessMove) -> Result<Self, QuantumChessErrors> {
        let board = self.board()?;
        if !board.legal(mv) {
            return Err(QuantumChessErrors::IllegalClassicalMove(format!(
                "{}{} is not legal here",
                mv.get_source(),
                mv.get_dest()
            )));
        }
        Self::from_board(&board.make_move_new(mv))
    }

    /// All legal moves for the side to move.
    pub fn legal_moves(&self) -> Result<Vec<ChessMove>, QuantumChessErrors> {
        Ok(MoveGen::new_legal(&self.board()?).collect())
    }

    pub fn has_any_legal_move(&self) -> Result<bool, QuantumChessErrors> {
        Ok(MoveGen::new_legal(&self.board()?).next().is_some())
    }

    /// Whether the move is a classical capture: the destination hosts an
    /// enemy piece, or a pawn steps diagonally onto an empty square
    /// (en passant).
    pub fn is_capture(&self, mv: ChessMove) -> bool {
        let mover = self.builder[mv.get_source()];
        match self.builder[mv.get_dest()] {
            Some((_, color)) => mover.map(|(_, mine)| mine != color).unwrap_or(true),
            None => matches!(mover, Some((Piece::Pawn, _)))
                && mv.get_source().get_file() != mv.get_dest().get_file(),
        }
    }

    /// Whether any piece of `by` attacks `square`, independent of whose
    /// turn it is. Computed from the collaborator's attack lookups over
    /// the builder's occupancy so it also works in king-superposed
    /// positions the validated `Board` would refuse.
    pub fn square_attacked_by(&self, square: Square, by: Color) -> bool {
        let mut occupancy = EMPTY;
        let mut pawns = EMPTY;
        let mut knights = EMPTY;
        let mut kings = EMPTY;
        let mut diagonal = EMPTY;
        let mut straight = EMPTY;

        for from in ALL_SQUARES {
            let Some((piece, color)) = self.builder[from] else {
                continue;
            };
            let bit = BitBoard::from_square(from);
            occupancy |= bit;
            if color != by {
                continue;
            }
            match piece {
                Piece::Pawn => pawns |= bit,
                Piece::Knight => knights |= bit,
                Piece::Bishop => diagonal |= bit,
                Piece::Rook => straight |= bit,
                Piece::Queen => {
                    diagonal |= bit;
                    straight |= bit;
                }
                Piece::King => kings |= bit,
            }
        }

        get_pawn_attacks(square, !by, pawns) != EMPTY
            || get_knight_moves(square) & knights != EMPTY
            || get_king_moves(square) & kings != EMPTY
            || get_bishop_moves(square, occupancy) & diagonal != EMPTY
            || get_rook_moves(square, occupancy) & straight != EMPTY
    }
}

impl Default for ClassicalPosition {
    fn default() -> Self {
        Self::starting()
    }
}

#[cfg(test)]
mod tests {
    use super::ClassicalPosition;
    use crate::classical::algebraic::parse_square;
    use crate::errors::QuantumChessErrors;
    use chess::{ChessMove, Color, Piece};

    fn mv(from: &str, to: &str) -> ChessMove {
        ChessMove::new(
            parse_square(from).unwrap(),
            parse_square(to).unwrap(),
            None,
        )
    }

    #[test]
    fn starting_position_round_trips() {
        let position = ClassicalPosition::starting();
        let fen = position.fen();
        assert!(fen.starts_with("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w"));
        let reparsed = ClassicalPosition::from_fen(&fen).expect("fen parses");
        assert_eq!(reparsed.fen(), fen);
    }

    #[test]
    fn debug_formatting_shows_the_fen() {
        let position = ClassicalPosition::starting();
        let rendered = format!("{position:?}");
        assert!(rendered.contains("rnbqkbnr/pppppppp"));
    }

    #[test]
    fn legality_is_delegated_to_the_collaborator() {
        let position = ClassicalPosition::starting();
        assert!(position.is_legal(mv("e2", "e4")).unwrap());
        assert!(!position.is_legal(mv("e2", "e5")).unwrap());
        assert_eq!(position.legal_moves().unwrap().len(), 20);
    }

    #[test]
    fn apply_flips_the_side_to_move() {
        let position = ClassicalPosition::starting();
        let next = position.apply(mv("e2", "e4")).expect("e4 is legal");
        assert_eq!(next.side_to_move(), Color::Black);
        assert_eq!(
            next.piece_at(parse_square("e4").unwrap()),
            Some((Piece::Pawn, Color::White))
        );
        assert!(next.piece_at(parse_square("e2").unwrap()).is_none());
    }

    #[test]
    fn tolerates_a_kingless_position() {
        // A split king leaves the classical board without one; the builder
        // must carry the position, and `board()` must report the missing
        // king as an error rather than hand the builder to the validator.
        let fen = "rnbq1bnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1";
        let position = ClassicalPosition::from_fen(fen).expect("lenient parse");
        match position.board() {
            Err(QuantumChessErrors::InvalidPosition(detail)) => {
                assert!(detail.contains("no king"))
            }
            other => panic!("expected InvalidPosition, got {other:?}"),
        }
        assert!(position.king_square(Color::Black).is_none());
        assert!(position.king_square(Color::White).is_some());
    }

    #[test]
    fn manual_edits_and_turn_flip() {
        let mut position = ClassicalPosition::starting();
        position.remove_piece(parse_square("e2").unwrap());
        assert!(position.piece_at(parse_square("e2").unwrap()).is_none());
        position.place_piece(parse_square("e4").unwrap(), Piece::Pawn, Color::White);
        position.flip_side_to_move();
        assert_eq!(position.side_to_move(), Color::Black);
    }

    #[test]
    fn capture_classification() {
        let position = ClassicalPosition::from_fen(
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
        )
        .unwrap();
        assert!(position.is_capture(mv("e4", "d5")));
        assert!(!position.is_capture(mv("e4", "e5")));
    }

    #[test]
    fn attack_queries_use_the_collaborator_lookups() {
        let position = ClassicalPosition::starting();
        let e2 = parse_square("e2").unwrap();
        let e5 = parse_square("e5").unwrap();
        // g1 knight covers e2; nothing white reaches e5 from the start.
        assert!(position.square_attacked_by(e2, Color::White));
        assert!(!position.square_attacked_by(e5, Color::White));
        // f6 is covered by the g8 knight.
        assert!(position.square_attacked_by(parse_square("f6").unwrap(), Color::Black));
    }
}
