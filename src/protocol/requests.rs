//! Move requests and the game snapshot the protocol transacts against.

use chess::{Piece, Square};

use crate::classical::position::ClassicalPosition;
use crate::quantum::quantum_board::QuantumBoard;

/// A declared request from the caller (the excluded API layer).
///
/// Squares arrive already parsed; the caller converts its text payloads
/// through [`crate::classical::algebraic::parse_square`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRequest {
    /// An ordinary move or capture.
    Normal {
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    },
    /// Move into superposition across two destination squares.
    Split {
        from: Square,
        to_first: Square,
        to_second: Square,
    },
    /// Move to `to` through a square claimed by a superposed piece,
    /// entangling the mover with it.
    Entangle {
        from: Square,
        to: Square,
        through: Square,
    },
    /// Collapse whatever quantum piece claims `square`.
    Measure { square: Square },
    /// Enable or disable quantum moves for this game.
    ToggleQuantumMode { enabled: bool },
}

/// One game's complete state as the protocol sees it: the classical
/// position held by the rules collaborator, the quantum piece collection,
/// and the quantum-mode flag.
///
/// A full resolution is one atomic transaction against this snapshot: the
/// protocol works on a staged copy and the caller swaps in the returned
/// snapshot, so two requests for the same game must be serialized at the
/// caller boundary.
#[derive(Debug, Clone, Default)]
pub struct GameSnapshot {
    pub position: ClassicalPosition,
    pub quantum: QuantumBoard,
    pub quantum_mode: bool,
}

impl GameSnapshot {
    /// A fresh game: standard starting position, no quantum pieces.
    pub fn new_game() -> Self {
        GameSnapshot {
            position: ClassicalPosition::starting(),
            quantum: QuantumBoard::new(),
            quantum_mode: false,
        }
    }
}
