//! Crate-wide error type.
//!
//! Every fallible operation in the engine returns this enum. The variants
//! split into two audiences: user-visible rejections the protocol reports
//! as a `Rejected` resolution (a declared move that turned out to be
//! unplayable), and internal inconsistencies ([`Self::is_internal`]) that
//! indicate corrupted state and surface as a hard `Err` without mutating
//! the game.

use std::error::Error;
use std::fmt;

use chess::Square;

use crate::quantum::entanglement::PieceId;

#[derive(Debug, Clone, PartialEq)]
pub enum QuantumChessErrors {
    /// A square or state-id string that does not parse.
    InvalidSquare(String),
    /// The request named a square with no quantum piece claiming it.
    NoQuantumPieceFound(Square),
    /// The rules collaborator judged the declared move illegal, before or
    /// after measurement.
    IllegalClassicalMove(String),
    /// A declared capture whose defender collapsed to a different square.
    CaptureCollapseFailed { declared: Square, collapsed: Square },
    /// A split target already hosts a classical piece or a quantum claim.
    SplitTargetOccupied(Square),
    /// A split target the piece's movement rule cannot reach.
    SplitTargetUnreachable(Square),
    /// A quantum move was declared while quantum mode is off for the game.
    QuantumModeDisabled,
    /// An entanglement link names a piece that is no longer on the board.
    EntanglementPartnerMissing(PieceId),
    /// The classical position cannot be parsed or validated.
    InvalidPosition(String),
    /// Probability bookkeeping violated an invariant (zero mass, missing
    /// branch, collapse onto an occupied square).
    InconsistentProbabilityState(String),
}

impl QuantumChessErrors {
    /// Internal errors mean corrupted state rather than a bad request;
    /// the protocol refuses to persist anything when one surfaces.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            QuantumChessErrors::EntanglementPartnerMissing(_)
                | QuantumChessErrors::InvalidPosition(_)
                | QuantumChessErrors::InconsistentProbabilityState(_)
        )
    }
}

impl fmt::Display for QuantumChessErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantumChessErrors::InvalidSquare(detail) => {
                write!(f, "invalid square: {detail}")
            }
            QuantumChessErrors::NoQuantumPieceFound(square) => {
                write!(f, "no quantum piece found at {square}")
            }
            QuantumChessErrors::IllegalClassicalMove(detail) => {
                write!(f, "illegal move: {detail}")
            }
            QuantumChessErrors::CaptureCollapseFailed {
                declared,
                collapsed,
            } => {
                write!(
                    f,
                    "capture failed - piece collapsed to {collapsed} instead of {declared}"
                )
            }
            QuantumChessErrors::SplitTargetOccupied(square) => {
                write!(f, "split target {square} is occupied")
            }
            QuantumChessErrors::SplitTargetUnreachable(square) => {
                write!(f, "split target {square} is not reachable")
            }
            QuantumChessErrors::QuantumModeDisabled => {
                write!(f, "quantum moves are disabled for this game")
            }
            QuantumChessErrors::EntanglementPartnerMissing(id) => {
                write!(f, "entanglement partner {} is missing", id.value())
            }
            QuantumChessErrors::InvalidPosition(detail) => {
                write!(f, "invalid position: {detail}")
            }
            QuantumChessErrors::InconsistentProbabilityState(detail) => {
                write!(f, "inconsistent probability state: {detail}")
            }
        }
    }
}

impl Error for QuantumChessErrors {}
