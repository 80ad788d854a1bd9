//! The per-game collection of quantum pieces.
//!
//! `QuantumBoard` owns every superposed piece of one game in a stable-id
//! arena and hosts the operations that need to see more than one piece at a
//! time: installing symmetric entanglement links and running the
//! measurement cascade across a connected component of the entanglement
//! graph. The classical side of the board lives in the rules-engine facade;
//! a square claimed here never simultaneously hosts a classical piece.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chess::{Color, Piece, Square};

use crate::errors::QuantumChessErrors;
use crate::quantum::entanglement::PieceId;
use crate::quantum::entropy::EntropySource;
use crate::quantum::probability_state::StateId;
use crate::quantum::quantum_piece::{LinkPlan, QuantumPiece};

/// Result of collapsing one piece, with every piece the cascade fully
/// resolved along the way (the measured piece itself always included).
#[derive(Debug, Clone)]
pub struct MeasurementOutcome {
    pub piece: PieceId,
    pub square: Square,
    /// Probability of the collapsed state. Always 1.0 after a collapse.
    pub probability: f64,
    /// Pieces whose distribution is now a single certain square, in the
    /// order they resolved (measured piece first). These are ready to be
    /// promoted back onto the classical board.
    pub resolved: Vec<PieceId>,
}

/// All quantum pieces for one game.
#[derive(Debug, Clone, Default)]
pub struct QuantumBoard {
    pieces: BTreeMap<PieceId, QuantumPiece>,
    next_id: u32,
}

impl QuantumBoard {
    pub fn new() -> Self {
        QuantumBoard::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Add a still-classical piece to the quantum collection, claiming
    /// `square` with probability 1. Returns its stable id.
    pub fn add_piece(&mut self, square: Square, kind: Piece, color: Color) -> PieceId {
        let id = PieceId::new(self.next_id);
        self.next_id += 1;
        self.pieces
            .insert(id, QuantumPiece::new(id, kind, color, square));
        id
    }

    /// Insert a fully-formed piece (deserialization path). The id counter
    /// is bumped past the piece's id so later additions stay unique.
    pub fn insert_piece(&mut self, piece: QuantumPiece) {
        self.next_id = self.next_id.max(piece.id.value() + 1);
        self.pieces.insert(piece.id, piece);
    }

    pub fn piece(&self, id: PieceId) -> Option<&QuantumPiece> {
        self.pieces.get(&id)
    }

    fn piece_mut(&mut self, id: PieceId) -> Result<&mut QuantumPiece, QuantumChessErrors> {
        self.pieces
            .get_mut(&id)
            .ok_or(QuantumChessErrors::EntanglementPartnerMissing(id))
    }

    /// Remove a piece and scrub any links still referencing it.
    pub fn remove_piece(&mut self, id: PieceId) -> Option<QuantumPiece> {
        let removed = self.pieces.remove(&id);
        if removed.is_some() {
            for piece in self.pieces.values_mut() {
                piece.links.retain(|link| link.partner != id);
            }
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuantumPiece> {
        self.pieces.values()
    }

    /// First piece/branch claiming `square`: lowest piece id, then lowest
    /// state id. Ties are not expected but must resolve deterministically.
    pub fn find_piece_at(&self, square: Square) -> Option<(PieceId, StateId)> {
        for (id, piece) in &self.pieces {
            if let Some((state_id, _)) = piece.state.branch_at(square) {
                return Some((*id, state_id.clone()));
            }
        }
        None
    }

    /// Most probable branch square of a superposed king of `color`, ties
    /// broken toward the lower state id. The rules collaborator cannot
    /// represent a kingless board, so legality probes stand the king back
    /// in at this square while it is superposed. Squares in `avoid` are
    /// passed over when another branch exists, so a stand-in never lands
    /// on a square the probe itself is about.
    pub fn king_claim(&self, color: Color, avoid: &[Square]) -> Option<Square> {
        let king = self
            .pieces
            .values()
            .find(|piece| piece.kind == Piece::King && piece.color == color)?;
        let mut best_square = None;
        let mut best_probability = f64::NEG_INFINITY;
        let mut fallback_square = None;
        let mut fallback_probability = f64::NEG_INFINITY;
        for (_, branch) in king.state.iter() {
            if branch.probability > fallback_probability {
                fallback_probability = branch.probability;
                fallback_square = Some(branch.square);
            }
            if avoid.contains(&branch.square) {
                continue;
            }
            if branch.probability > best_probability {
                best_probability = branch.probability;
                best_square = Some(branch.square);
            }
        }
        best_square.or(fallback_square)
    }

    /// Every square claimed by any branch of any piece, with the claiming
    /// piece and its branch mass. A square can appear for several pieces
    /// and branches simultaneously; that overlap is the point, so nothing
    /// is deduplicated.
    pub fn all_occupancies(&self) -> BTreeMap<Square, Vec<(PieceId, f64)>> {
        let mut occupancies: BTreeMap<Square, Vec<(PieceId, f64)>> = BTreeMap::new();
        for (id, piece) in &self.pieces {
            for (_, branch) in piece.state.iter() {
                occupancies
                    .entry(branch.square)
                    .or_default()
                    .push((*id, branch.probability));
            }
        }
        occupancies
    }

    /// Split one branch of a piece across two squares.
    pub fn split(
        &mut self,
        id: PieceId,
        state_id: &StateId,
        square_a: Square,
        square_b: Square,
    ) -> Result<(), QuantumChessErrors> {
        self.piece_mut(id)?.split(state_id, square_a, square_b)
    }

    fn apply_link_plan(&mut self, plan: LinkPlan) -> Result<(), QuantumChessErrors> {
        self.piece_mut(plan.partner)?.links.extend(plan.links);
        Ok(())
    }

    /// Entangle `mover`'s branch with the blocker branch standing on its
    /// path, installing the symmetric links on both pieces.
    pub fn entangle_one_blocker(
        &mut self,
        mover: PieceId,
        state_id: &StateId,
        target: Square,
        blocker: PieceId,
        blocker_state: &StateId,
    ) -> Result<(), QuantumChessErrors> {
        if mover == blocker {
            return Err(QuantumChessErrors::InconsistentProbabilityState(
                "a piece cannot block itself".to_owned(),
            ));
        }
        let blocker_probability = self.branch_probability(blocker, blocker_state)?;
        let plan = self.piece_mut(mover)?.entangle_one_blocker(
            state_id,
            target,
            blocker,
            blocker_state,
            blocker_probability,
        )?;
        self.apply_link_plan(plan)
    }

    /// Entangle `mover`'s branch with two potential blocking branches
    /// (possibly two branches of the same piece).
    #[allow(clippy::too_many_arguments)]
    pub fn entangle_two_blockers(
        &mut self,
        mover: PieceId,
        state_id: &StateId,
        square_a: Square,
        square_b: Square,
        blocker1: PieceId,
        blocker1_state: &StateId,
        blocker2: PieceId,
        blocker2_state: &StateId,
    ) -> Result<(), QuantumChessErrors> {
        if mover == blocker1 || mover == blocker2 {
            return Err(QuantumChessErrors::InconsistentProbabilityState(
                "a piece cannot block itself".to_owned(),
            ));
        }
        let p1 = self.branch_probability(blocker1, blocker1_state)?;
        let p2 = self.branch_probability(blocker2, blocker2_state)?;
        let plans = self.piece_mut(mover)?.entangle_two_blockers(
            state_id,
            square_a,
            square_b,
            blocker1,
            blocker1_state,
            p1,
            blocker2,
            blocker2_state,
            p2,
        )?;
        for plan in plans {
            self.apply_link_plan(plan)?;
        }
        Ok(())
    }

    fn branch_probability(
        &self,
        id: PieceId,
        state_id: &StateId,
    ) -> Result<f64, QuantumChessErrors> {
        let piece = self
            .pieces
            .get(&id)
            .ok_or(QuantumChessErrors::EntanglementPartnerMissing(id))?;
        piece
            .state
            .get(state_id)
            .map(|branch| branch.probability)
            .ok_or_else(|| {
                QuantumChessErrors::InconsistentProbabilityState(format!(
                    "piece {} has no branch {state_id}",
                    id.value()
                ))
            })
    }

    /// Measure the first piece claiming `square`, if any.
    pub fn measure_piece_at(
        &mut self,
        square: Square,
        entropy: &mut dyn EntropySource,
    ) -> Result<Option<MeasurementOutcome>, QuantumChessErrors> {
        match self.find_piece_at(square) {
            Some((id, _)) => Ok(Some(self.measure_piece(id, entropy)?)),
            None => Ok(None),
        }
    }

    /// Collapse one piece to a definite square and propagate the outcome
    /// through the whole connected component of the entanglement graph.
    ///
    /// The propagation is a worklist of (piece, dead branch prefix) jobs
    /// rather than a one-hop sweep: detangling a partner can make one of
    /// its own branches certain, which dooms branches on a third piece,
    /// and so on until no further pruning occurs.
    pub fn measure_piece(
        &mut self,
        id: PieceId,
        entropy: &mut dyn EntropySource,
    ) -> Result<MeasurementOutcome, QuantumChessErrors> {
        let measured = self
            .pieces
            .get(&id)
            .ok_or(QuantumChessErrors::EntanglementPartnerMissing(id))?;
        let winner = measured.sample_branch(entropy)?;

        // Every link on the winning path dooms its partner branch.
        let mut worklist: VecDeque<(PieceId, StateId)> = measured
            .links
            .iter()
            .filter(|link| link.my_state.is_prefix_of(&winner))
            .map(|link| (link.partner, link.partner_state.clone()))
            .collect();

        let square = self.piece_mut(id)?.collapse_to(&winner)?;
        self.scrub_links_to(id, None);

        let mut touched = BTreeSet::new();
        while let Some((partner, dead_prefix)) = worklist.pop_front() {
            let report = self.piece_mut(partner)?.detangle(&dead_prefix)?;
            if !report.pruned {
                continue;
            }
            touched.insert(partner);
            self.scrub_links_to(partner, Some(&dead_prefix));
            for job in report.fired {
                worklist.push_back(job);
            }
        }

        let mut resolved = vec![id];
        for partner in touched {
            if self
                .pieces
                .get(&partner)
                .is_some_and(|piece| piece.is_fully_resolved())
            {
                resolved.push(partner);
            }
        }

        Ok(MeasurementOutcome {
            piece: id,
            square,
            probability: 1.0,
            resolved,
        })
    }

    /// Drop links on other pieces that point at `owner` branches which no
    /// longer exist: all of them when `dead_prefix` is `None` (owner
    /// collapsed), otherwise those under the pruned subtree.
    fn scrub_links_to(&mut self, owner: PieceId, dead_prefix: Option<&StateId>) {
        for (id, piece) in self.pieces.iter_mut() {
            if *id == owner {
                continue;
            }
            piece.links.retain(|link| {
                link.partner != owner
                    || dead_prefix.is_some_and(|dead| !dead.is_prefix_of(&link.partner_state))
            });
        }
    }

    /// Defensive invariant sweep: every piece's probabilities are
    /// consistent and every link partner is present.
    pub fn validate(&self) -> Result<(), QuantumChessErrors> {
        for piece in self.pieces.values() {
            piece.state.validate()?;
            for link in &piece.links {
                if !self.pieces.contains_key(&link.partner) {
                    return Err(QuantumChessErrors::EntanglementPartnerMissing(link.partner));
                }
            }
        }
        Ok(())
    }
}
