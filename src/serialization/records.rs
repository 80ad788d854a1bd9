//! Persisted-state records for one game.
//!
//! The classical half of the game travels as a FEN string; the quantum
//! half travels as a list of piece records, each carrying its branch
//! distribution (`qnum`) and entanglement list. Decoding is tolerant of
//! records written by older builds: the per-piece `id` is optional, and a
//! partner may be referenced by piece symbol instead of id, in which case
//! it resolves to the first matching piece. Links that cannot be
//! reconstructed are dropped rather than failing the whole load.

use serde::{Deserialize, Serialize};

use chess::{Color, Piece};

use crate::classical::algebraic::{parse_square, square_name};
use crate::classical::position::ClassicalPosition;
use crate::errors::QuantumChessErrors;
use crate::protocol::requests::GameSnapshot;
use crate::quantum::entanglement::{EntanglementLink, PieceId};
use crate::quantum::probability_state::{Branch, ProbabilityState, StateId};
use crate::quantum::quantum_board::QuantumBoard;
use crate::quantum::quantum_piece::QuantumPiece;

/// Reference to an entanglement partner in a persisted record.
///
/// Older records name the partner by its piece symbol; current records use
/// the stable numeric id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartnerRef {
    Id(u32),
    Symbol(String),
}

/// One quantum piece as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantumPieceRecord {
    /// FEN-style piece letter; case encodes the color (`"N"` / `"n"`).
    pub piece: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Branch distribution: (state id, square, probability) triples.
    pub qnum: Vec<(String, String, f64)>,
    /// Entanglement list: (partner, own trigger state, partner state).
    #[serde(default)]
    pub entangled: Vec<(PartnerRef, String, String)>,
}

/// A whole game as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub fen: String,
    pub quantum_mode: bool,
    #[serde(default)]
    pub quantum_pieces: Vec<QuantumPieceRecord>,
}

fn piece_symbol(kind: Piece, color: Color) -> String {
    let letter = match kind {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    };
    match color {
        Color::White => letter.to_ascii_uppercase().to_string(),
        Color::Black => letter.to_string(),
    }
}

fn parse_symbol(symbol: &str) -> Result<(Piece, Color), QuantumChessErrors> {
    let mut chars = symbol.chars();
    let (letter, extra) = (chars.next(), chars.next());
    let Some(letter) = letter else {
        return Err(QuantumChessErrors::InvalidPosition(
            "empty piece symbol".to_owned(),
        ));
    };
    if extra.is_some() {
        return Err(QuantumChessErrors::InvalidPosition(format!(
            "piece symbol must be one letter, got {symbol:?}"
        )));
    }
    let kind = match letter.to_ascii_lowercase() {
        'p' => Piece::Pawn,
        'n' => Piece::Knight,
        'b' => Piece::Bishop,
        'r' => Piece::Rook,
        'q' => Piece::Queen,
        'k' => Piece::King,
        _ => {
            return Err(QuantumChessErrors::InvalidPosition(format!(
                "unknown piece symbol {symbol:?}"
            )))
        }
    };
    let color = if letter.is_ascii_uppercase() {
        Color::White
    } else {
        Color::Black
    };
    Ok((kind, color))
}

/// Encode a snapshot for persistence.
pub fn encode_snapshot(snapshot: &GameSnapshot) -> GameRecord {
    let quantum_pieces = snapshot
        .quantum
        .iter()
        .map(|piece| QuantumPieceRecord {
            piece: piece_symbol(piece.kind, piece.color),
            id: Some(piece.id.value()),
            qnum: piece
                .state
                .iter()
                .map(|(state_id, branch)| {
                    (
                        state_id.as_str().to_owned(),
                        square_name(branch.square),
                        branch.probability,
                    )
                })
                .collect(),
            entangled: piece
                .links
                .iter()
                .map(|link| {
                    (
                        PartnerRef::Id(link.partner.value()),
                        link.my_state.as_str().to_owned(),
                        link.partner_state.as_str().to_owned(),
                    )
                })
                .collect(),
        })
        .collect();

    GameRecord {
        fen: snapshot.position.fen(),
        quantum_mode: snapshot.quantum_mode,
        quantum_pieces,
    }
}

/// Rebuild a snapshot from a persisted record.
///
/// Branch data must be fully valid; entanglement links are best-effort and
/// silently dropped when their partner cannot be resolved.
pub fn decode_snapshot(record: &GameRecord) -> Result<GameSnapshot, QuantumChessErrors> {
    let position = ClassicalPosition::from_fen(&record.fen)?;

    // First pass: assign ids and rebuild every piece's distribution, so
    // partner references in the second pass can see the whole roster.
    let mut board = QuantumBoard::new();
    let mut assigned = Vec::with_capacity(record.quantum_pieces.len());
    let mut next_fresh = record
        .quantum_pieces
        .iter()
        .filter_map(|piece| piece.id)
        .max()
        .map_or(0, |max| max + 1);
    for piece_record in &record.quantum_pieces {
        let (kind, color) = parse_symbol(&piece_record.piece)?;
        let id = match piece_record.id {
            Some(value) => PieceId::new(value),
            None => {
                let fresh = PieceId::new(next_fresh);
                next_fresh += 1;
                fresh
            }
        };

        let mut state = ProbabilityState::default();
        for (state_id, square, probability) in &piece_record.qnum {
            state.insert(
                StateId::parse(state_id)?,
                Branch {
                    square: parse_square(square)?,
                    probability: *probability,
                },
            );
        }
        state.validate()?;

        board.insert_piece(QuantumPiece {
            id,
            kind,
            color,
            state,
            links: Vec::new(),
        });
        assigned.push(id);
    }

    // Second pass: resolve partners and install the links we can.
    for (piece_record, &id) in record.quantum_pieces.iter().zip(&assigned) {
        let mut links = Vec::new();
        for (partner_ref, my_state, partner_state) in &piece_record.entangled {
            let Some(partner) = resolve_partner(&board, partner_ref, id) else {
                continue;
            };
            let (Ok(my_state), Ok(partner_state)) =
                (StateId::parse(my_state), StateId::parse(partner_state))
            else {
                continue;
            };
            links.push(EntanglementLink::new(partner, partner_state, my_state));
        }
        if let Some(piece) = board.piece(id) {
            let mut piece = piece.clone();
            piece.links = links;
            board.insert_piece(piece);
        }
    }

    Ok(GameSnapshot {
        position,
        quantum: board,
        quantum_mode: record.quantum_mode,
    })
}

fn resolve_partner(
    board: &QuantumBoard,
    partner_ref: &PartnerRef,
    own_id: PieceId,
) -> Option<PieceId> {
    match partner_ref {
        PartnerRef::Id(value) => {
            let id = PieceId::new(*value);
            board.piece(id).map(|piece| piece.id)
        }
        // Legacy records name partners by symbol only: resolve to the
        // first other piece with that symbol.
        PartnerRef::Symbol(symbol) => {
            let (kind, color) = parse_symbol(symbol).ok()?;
            board
                .iter()
                .find(|piece| piece.id != own_id && piece.kind == kind && piece.color == color)
                .map(|piece| piece.id)
        }
    }
}
