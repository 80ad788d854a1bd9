//! Stable piece identities and entanglement link records.
//!
//! Pieces reference each other through opaque `PieceId`s handed out by the
//! board, never through positions in a live collection: removal during a
//! collapse must not be able to redirect a link to the wrong piece.

use serde::{Deserialize, Serialize};

use crate::quantum::probability_state::StateId;

/// Stable opaque identity of one quantum piece within a game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PieceId(u32);

impl PieceId {
    pub fn new(value: u32) -> Self {
        PieceId(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// One half of a symmetric correlation between two pieces' branches.
///
/// Reading: "if my branch `my_state` wins a measurement, the partner's
/// branch `partner_state` did not happen and must be detangled". The
/// partner holds the mirrored record, so a collapse starting on either
/// side prunes the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntanglementLink {
    /// The other piece in the correlation.
    pub partner: PieceId,
    /// The partner branch rendered impossible when `my_state` wins.
    pub partner_state: StateId,
    /// The local branch that triggers this link.
    pub my_state: StateId,
}

impl EntanglementLink {
    pub fn new(partner: PieceId, partner_state: StateId, my_state: StateId) -> Self {
        EntanglementLink {
            partner,
            partner_state,
            my_state,
        }
    }
}
