//! The quantum piece and its state transitions.
//!
//! A `QuantumPiece` owns one probability distribution over squares and the
//! entanglement links that tie its branches to other pieces' branches. The
//! transitions here implement the probability bookkeeping of the game:
//! splitting mass across two squares, entangling a move through one or two
//! possibly-occupied squares, pruning branches proven impossible by a
//! partner's collapse, and sampling a measurement winner.
//!
//! Links live symmetrically on both pieces, and Rust does not allow a piece
//! to reach into its partner through an aliased mutable reference. The
//! entangle methods therefore mutate only the local piece and return a
//! [`LinkPlan`] for each partner; [`crate::quantum::quantum_board`] applies
//! the partner halves.

use chess::{Color, Piece, Square};

use crate::errors::QuantumChessErrors;
use crate::quantum::entanglement::{EntanglementLink, PieceId};
use crate::quantum::entropy::EntropySource;
use crate::quantum::probability_state::{
    Branch, ProbabilityState, StateId, PROBABILITY_TOLERANCE,
};

/// Link records to install on one partner piece.
#[derive(Debug, Clone)]
pub struct LinkPlan {
    pub partner: PieceId,
    pub links: Vec<EntanglementLink>,
}

/// What a detangle pass did to a piece, so the board can continue the
/// cascade across the connected component.
#[derive(Debug, Default)]
pub struct DetangleReport {
    /// Whether any branch was actually removed.
    pub pruned: bool,
    /// Links whose trigger branch became certain once the dead subtree was
    /// gone: each entry is a further (partner, doomed partner branch) job.
    pub fired: Vec<(PieceId, StateId)>,
}

/// One quantum piece: identity, probability state, and outbound links.
#[derive(Debug, Clone)]
pub struct QuantumPiece {
    pub id: PieceId,
    pub kind: Piece,
    pub color: Color,
    pub state: ProbabilityState,
    pub links: Vec<EntanglementLink>,
}

impl QuantumPiece {
    /// A piece entering the quantum collection from a classical square.
    pub fn new(id: PieceId, kind: Piece, color: Color, square: Square) -> Self {
        QuantumPiece {
            id,
            kind,
            color,
            state: ProbabilityState::single(square),
            links: Vec::new(),
        }
    }

    fn branch(&self, state_id: &StateId) -> Result<Branch, QuantumChessErrors> {
        self.state.get(state_id).copied().ok_or_else(|| {
            QuantumChessErrors::InconsistentProbabilityState(format!(
                "piece {} has no branch {state_id}",
                self.id.value()
            ))
        })
    }

    /// Split the branch at `state_id` into two half-mass branches at
    /// `square_a` and `square_b`. Total probability mass is conserved.
    pub fn split(
        &mut self,
        state_id: &StateId,
        square_a: Square,
        square_b: Square,
    ) -> Result<(), QuantumChessErrors> {
        if square_a == square_b {
            return Err(QuantumChessErrors::InvalidSquare(format!(
                "split targets must differ, got {square_a} twice"
            )));
        }
        let parent = self.branch(state_id)?;
        self.state.remove(state_id);
        self.state.insert(
            state_id.child(0),
            Branch {
                square: square_a,
                probability: parent.probability / 2.0,
            },
        );
        self.state.insert(
            state_id.child(1),
            Branch {
                square: square_b,
                probability: parent.probability / 2.0,
            },
        );
        Ok(())
    }

    /// Entangle a move through one square claimed by `blocker_state` of the
    /// blocker piece (mass `blocker_probability`).
    ///
    /// With x the mover's branch mass and y the blocker's, the branch
    /// splits into "blocked, stayed put" with x*y and "passed through to
    /// `target`" with x*(1-y): the move succeeds exactly in the branches
    /// where the blocker was not there. Two links per side tie each outcome
    /// to the complementary blocker branch.
    pub fn entangle_one_blocker(
        &mut self,
        state_id: &StateId,
        target: Square,
        blocker: PieceId,
        blocker_state: &StateId,
        blocker_probability: f64,
    ) -> Result<LinkPlan, QuantumChessErrors> {
        let parent = self.branch(state_id)?;
        let x = parent.probability;
        let y = blocker_probability;

        let stayed = state_id.child(0);
        let moved = state_id.child(1);
        self.state.remove(state_id);
        self.state.insert(
            stayed.clone(),
            Branch {
                square: parent.square,
                probability: x * y,
            },
        );
        self.state.insert(
            moved.clone(),
            Branch {
                square: target,
                probability: x * (1.0 - y),
            },
        );

        let blocker_absent = blocker_state.sibling();
        self.links.push(EntanglementLink::new(
            blocker,
            blocker_state.clone(),
            moved.clone(),
        ));
        self.links.push(EntanglementLink::new(
            blocker,
            blocker_absent.clone(),
            stayed.clone(),
        ));

        Ok(LinkPlan {
            partner: blocker,
            links: vec![
                EntanglementLink::new(self.id, moved, blocker_state.clone()),
                EntanglementLink::new(self.id, stayed, blocker_absent),
            ],
        })
    }

    /// Entangle a move with two potential blocking squares.
    ///
    /// The two sub-cases and their probability formulas are domain
    /// contracts (including the 0.5 tie-break for the fully-open case) and
    /// are used exactly as given:
    ///
    /// Same blocking piece for both paths (branches `+"0"`, `+"1"`):
    /// `P(a) = x*y_b + 0.5*x*(1 - y_a - y_b)` and symmetrically for `b`.
    ///
    /// Two distinct blockers (branches `+"00"` unmoved, `+"01"`, `+"10"`):
    /// `P(unmoved) = x*y1*y2`,
    /// `P(a) = x*(1-y1)*y2 + 0.5*x*(1-y1)*(1-y2)`,
    /// `P(b) = x*y1*(1-y2) + 0.5*x*(1-y1)*(1-y2)`.
    #[allow(clippy::too_many_arguments)]
    pub fn entangle_two_blockers(
        &mut self,
        state_id: &StateId,
        square_a: Square,
        square_b: Square,
        blocker1: PieceId,
        blocker1_state: &StateId,
        blocker1_probability: f64,
        blocker2: PieceId,
        blocker2_state: &StateId,
        blocker2_probability: f64,
    ) -> Result<Vec<LinkPlan>, QuantumChessErrors> {
        let parent = self.branch(state_id)?;
        let x = parent.probability;
        let y1 = blocker1_probability;
        let y2 = blocker2_probability;

        let absent1 = blocker1_state.sibling();
        let absent2 = blocker2_state.sibling();

        if blocker1 == blocker2 {
            let to_a = state_id.child(0);
            let to_b = state_id.child(1);
            let open = 0.5 * x * (1.0 - y1 - y2);

            self.state.remove(state_id);
            self.state.insert(
                to_a.clone(),
                Branch {
                    square: square_a,
                    probability: x * y2 + open,
                },
            );
            self.state.insert(
                to_b.clone(),
                Branch {
                    square: square_b,
                    probability: x * y1 + open,
                },
            );

            self.links.extend([
                EntanglementLink::new(blocker1, blocker1_state.clone(), to_a.clone()),
                EntanglementLink::new(blocker1, absent1.clone(), to_b.clone()),
                EntanglementLink::new(blocker2, blocker2_state.clone(), to_b.clone()),
                EntanglementLink::new(blocker2, absent2.clone(), to_a.clone()),
            ]);

            let plan = LinkPlan {
                partner: blocker1,
                links: vec![
                    EntanglementLink::new(self.id, to_a.clone(), blocker1_state.clone()),
                    EntanglementLink::new(self.id, to_b.clone(), absent1),
                    EntanglementLink::new(self.id, to_b, blocker2_state.clone()),
                    EntanglementLink::new(self.id, to_a, absent2),
                ],
            };
            return Ok(vec![plan]);
        }

        let unmoved = state_id.grandchild(0, 0);
        let to_a = state_id.grandchild(0, 1);
        let to_b = state_id.grandchild(1, 0);
        let open = 0.5 * x * (1.0 - y1) * (1.0 - y2);

        self.state.remove(state_id);
        self.state.insert(
            unmoved.clone(),
            Branch {
                square: parent.square,
                probability: x * y1 * y2,
            },
        );
        self.state.insert(
            to_a.clone(),
            Branch {
                square: square_a,
                probability: x * (1.0 - y1) * y2 + open,
            },
        );
        self.state.insert(
            to_b.clone(),
            Branch {
                square: square_b,
                probability: x * y1 * (1.0 - y2) + open,
            },
        );

        self.links.extend([
            EntanglementLink::new(blocker1, blocker1_state.clone(), to_a.clone()),
            EntanglementLink::new(blocker1, absent1.clone(), unmoved.clone()),
            EntanglementLink::new(blocker2, blocker2_state.clone(), to_b.clone()),
            EntanglementLink::new(blocker2, absent2.clone(), unmoved.clone()),
        ]);

        Ok(vec![
            LinkPlan {
                partner: blocker1,
                links: vec![
                    EntanglementLink::new(self.id, to_a, blocker1_state.clone()),
                    EntanglementLink::new(self.id, unmoved.clone(), absent1),
                ],
            },
            LinkPlan {
                partner: blocker2,
                links: vec![
                    EntanglementLink::new(self.id, to_b, blocker2_state.clone()),
                    EntanglementLink::new(self.id, unmoved, absent2),
                ],
            },
        ])
    }

    /// Prune the subtree under `dead_prefix` (a partner's measurement
    /// proved those branches never happened) and renormalize the
    /// survivors.
    ///
    /// Own links rooted in the dead subtree are dropped. Links whose
    /// trigger branch now covers every surviving leaf have become certain;
    /// they are consumed and reported so the board can cascade further.
    pub fn detangle(
        &mut self,
        dead_prefix: &StateId,
    ) -> Result<DetangleReport, QuantumChessErrors> {
        let removed = self.state.remove_subtree(dead_prefix);
        if removed.is_empty() {
            return Ok(DetangleReport::default());
        }
        if self.state.is_empty() {
            return Err(QuantumChessErrors::InconsistentProbabilityState(format!(
                "detangling {dead_prefix} removed every branch of piece {}",
                self.id.value()
            )));
        }
        self.state.normalize()?;

        self.links
            .retain(|link| !dead_prefix.is_prefix_of(&link.my_state));

        let mut fired = Vec::new();
        let mut kept = Vec::new();
        for link in self.links.drain(..) {
            let certain = self
                .state
                .iter()
                .all(|(id, _)| link.my_state.is_prefix_of(id));
            if certain {
                fired.push((link.partner, link.partner_state));
            } else {
                kept.push(link);
            }
        }
        self.links = kept;

        Ok(DetangleReport { pruned: true, fired })
    }

    /// Pick the winning branch by weighted-random sampling, normalizing
    /// the weights against floating-point drift. Does not mutate the
    /// piece; the board collapses it after propagating the outcome.
    pub fn sample_branch(
        &self,
        entropy: &mut dyn EntropySource,
    ) -> Result<StateId, QuantumChessErrors> {
        if self.state.is_empty() {
            return Err(QuantumChessErrors::InconsistentProbabilityState(format!(
                "cannot measure piece {} with no branches",
                self.id.value()
            )));
        }
        let total = self.state.total_probability();
        if total <= 0.0 {
            return Err(QuantumChessErrors::InconsistentProbabilityState(format!(
                "piece {} has zero total probability",
                self.id.value()
            )));
        }

        let roll = entropy.next_unit();
        let mut cumulative = 0.0;
        let mut last = None;
        for (id, branch) in self.state.iter() {
            cumulative += branch.probability / total;
            last = Some(id.clone());
            if roll <= cumulative {
                return Ok(id.clone());
            }
        }
        // Drift can leave the cumulative sum fractionally short of 1.
        Ok(last.expect("state checked non-empty"))
    }

    /// Replace the whole distribution with the winning branch at
    /// probability 1 and clear all links. Returns the collapsed square.
    pub fn collapse_to(&mut self, winner: &StateId) -> Result<Square, QuantumChessErrors> {
        let branch = self.branch(winner)?;
        self.state = ProbabilityState::single(branch.square);
        self.links.clear();
        Ok(branch.square)
    }

    /// A piece whose distribution has collapsed to one certain square.
    pub fn is_fully_resolved(&self) -> bool {
        match self.sole_branch() {
            Some((_, branch)) => (branch.probability - 1.0).abs() <= PROBABILITY_TOLERANCE,
            None => false,
        }
    }

    /// The only branch, when exactly one remains.
    pub fn sole_branch(&self) -> Option<(&StateId, &Branch)> {
        if self.state.len() == 1 {
            self.state.iter().next()
        } else {
            None
        }
    }
}
