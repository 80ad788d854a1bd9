//! The move-resolution protocol.
//!
//! A declared request runs through a fixed sequence of phases:
//! Declared -> ClassicalPrecheck -> MeasurementPending -> Validated ->
//! Committed, with Rejected reachable from every phase. The declaration is
//! locked before any measurement (declare-before-measure), the attacker is
//! measured before the defender, and the declared move is re-validated
//! against the post-measurement classical position.
//!
//! All mutation is staged on a clone of the caller's snapshot. A committed
//! or rejected resolution hands the staged snapshot back; in the rejected
//! case it still contains any measurement side effects, because a collapse
//! is part of the irrevocable physical outcome even when the declared move
//! turns out to be impossible afterward. Only an internal error (`Err`)
//! leaves the caller's state untouched.

use std::collections::BTreeMap;

use chess::{ChessMove, Color, Piece, Square};

use crate::classical::position::ClassicalPosition;
use crate::classical::status::{compute_game_status, GameStatus};
use crate::errors::QuantumChessErrors;
use crate::protocol::requests::{GameSnapshot, MoveRequest};
use crate::quantum::entanglement::PieceId;
use crate::quantum::entropy::EntropySource;
use crate::quantum::probability_state::StateId;
use crate::quantum::quantum_board::QuantumBoard;

/// A successfully staged game state plus its recomputed status.
#[derive(Debug, Clone)]
pub struct GameUpdate {
    pub snapshot: GameSnapshot,
    pub status: GameStatus,
}

/// Outcome of one resolution transaction.
///
/// `Rejected` is an ordinary, user-visible outcome: the declared request
/// was not playable. Its `update` carries the snapshot to persist anyway,
/// since measurements that already collapsed are kept.
#[derive(Debug, Clone)]
pub enum MoveResolution {
    Committed(GameUpdate),
    Rejected {
        reason: QuantumChessErrors,
        update: GameUpdate,
    },
}

/// Resolve one declared request against a game snapshot.
///
/// This is the single entry point for the API layer. The transaction is
/// atomic: callers must serialize requests per game and swap the returned
/// snapshot into their authoritative state.
pub fn resolve_move(
    snapshot: &GameSnapshot,
    request: &MoveRequest,
    entropy: &mut dyn EntropySource,
) -> Result<MoveResolution, QuantumChessErrors> {
    snapshot.quantum.validate()?;

    match *request {
        MoveRequest::ToggleQuantumMode { enabled } => {
            let mut staged = snapshot.clone();
            staged.quantum_mode = enabled;
            Ok(commit(staged))
        }
        MoveRequest::Measure { square } => resolve_measure(snapshot, square, entropy),
        MoveRequest::Normal {
            from,
            to,
            promotion,
        } => resolve_normal(snapshot, from, to, promotion, entropy),
        MoveRequest::Split {
            from,
            to_first,
            to_second,
        } => resolve_split(snapshot, from, to_first, to_second),
        MoveRequest::Entangle { from, to, through } => {
            resolve_entangle(snapshot, from, to, through)
        }
    }
}

fn commit(staged: GameSnapshot) -> MoveResolution {
    let status = compute_game_status(&staged.position, &staged.quantum);
    MoveResolution::Committed(GameUpdate {
        snapshot: staged,
        status,
    })
}

fn rejected(staged: GameSnapshot, reason: QuantumChessErrors) -> MoveResolution {
    let status = compute_game_status(&staged.position, &staged.quantum);
    MoveResolution::Rejected {
        reason,
        update: GameUpdate {
            snapshot: staged,
            status,
        },
    }
}

/// Reject before anything was measured: the caller's state is returned
/// verbatim.
fn rejected_unchanged(snapshot: &GameSnapshot, reason: QuantumChessErrors) -> MoveResolution {
    rejected(snapshot.clone(), reason)
}

/// Move a fully collapsed piece out of the quantum collection and back
/// onto the classical board at its certain square.
fn promote_resolved(
    staged: &mut GameSnapshot,
    resolved: &[PieceId],
    promotions: &mut BTreeMap<PieceId, Square>,
) -> Result<(), QuantumChessErrors> {
    for &id in resolved {
        let piece = staged.quantum.piece(id).ok_or_else(|| {
            QuantumChessErrors::InconsistentProbabilityState(format!(
                "resolved piece {} vanished before promotion",
                id.value()
            ))
        })?;
        let (_, branch) = piece.sole_branch().ok_or_else(|| {
            QuantumChessErrors::InconsistentProbabilityState(format!(
                "piece {} reported resolved with multiple branches",
                id.value()
            ))
        })?;
        let (square, kind, color) = (branch.square, piece.kind, piece.color);
        if staged.position.piece_at(square).is_some() {
            return Err(QuantumChessErrors::InconsistentProbabilityState(format!(
                "collapse landed on classically occupied square {square}"
            )));
        }
        staged.quantum.remove_piece(id);
        staged.position.place_piece(square, kind, color);
        promotions.insert(id, square);
    }
    Ok(())
}

/// Stand any superposed king back onto `view` at its most probable branch
/// square. The rules collaborator refuses a kingless board, so legality
/// and movegen while a king is superposed run against this approximation;
/// the authoritative classical board never learns about the stand-in.
/// Returns the squares that must be cleared again after a move is applied.
fn materialize_kings(
    view: &mut ClassicalPosition,
    quantum: &QuantumBoard,
    avoid: &[Square],
) -> Vec<Square> {
    let mut stand_ins = Vec::new();
    for color in [Color::White, Color::Black] {
        if view.king_square(color).is_none() {
            if let Some(square) = quantum.king_claim(color, avoid) {
                view.place_piece(square, Piece::King, color);
                stand_ins.push(square);
            }
        }
    }
    stand_ins
}

fn is_legal_with_kings(
    position: &ClassicalPosition,
    quantum: &QuantumBoard,
    mv: ChessMove,
) -> Result<bool, QuantumChessErrors> {
    let mut view = position.clone();
    materialize_kings(&mut view, quantum, &[]);
    view.is_legal(mv)
}

fn apply_with_kings(
    position: &ClassicalPosition,
    quantum: &QuantumBoard,
    mv: ChessMove,
) -> Result<ClassicalPosition, QuantumChessErrors> {
    let mut view = position.clone();
    let stand_ins = materialize_kings(&mut view, quantum, &[]);
    let mut next = view.apply(mv)?;
    for square in stand_ins {
        if matches!(next.piece_at(square), Some((Piece::King, _))) {
            next.remove_piece(square);
        }
    }
    Ok(next)
}

/// The identity of whatever would move from `square`: the quantum claimant
/// if one exists, otherwise the classical occupant.
fn mover_identity(
    snapshot: &GameSnapshot,
    square: Square,
) -> Option<(Piece, Color, Option<(PieceId, StateId)>)> {
    if let Some((id, state)) = snapshot.quantum.find_piece_at(square) {
        let piece = snapshot.quantum.piece(id)?;
        return Some((piece.kind, piece.color, Some((id, state))));
    }
    snapshot
        .position
        .piece_at(square)
        .map(|(kind, color)| (kind, color, None))
}

fn resolve_normal(
    snapshot: &GameSnapshot,
    from: Square,
    to: Square,
    promotion: Option<Piece>,
    entropy: &mut dyn EntropySource,
) -> Result<MoveResolution, QuantumChessErrors> {
    let Some((_, mover_color, source_claim)) = mover_identity(snapshot, from) else {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::IllegalClassicalMove(format!("no piece at {from}")),
        ));
    };
    if mover_color != snapshot.position.side_to_move() {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::IllegalClassicalMove(format!(
                "it is not {mover_color:?}'s turn"
            )),
        ));
    }

    let target_claim = snapshot.quantum.find_piece_at(to);

    // Declared: the move type is locked before any measurement. A target
    // claimed by a superposed piece counts as a capture declaration even
    // though the classical board shows the square empty.
    let declared_capture = snapshot
        .position
        .is_capture(ChessMove::new(from, to, promotion))
        || target_claim.is_some();

    // ClassicalPrecheck: neither square has quantum occupancy, so the
    // whole move is delegated to the rules collaborator.
    if source_claim.is_none() && target_claim.is_none() {
        let mv = ChessMove::new(from, to, promotion);
        if !is_legal_with_kings(&snapshot.position, &snapshot.quantum, mv)? {
            return Ok(rejected_unchanged(
                snapshot,
                QuantumChessErrors::IllegalClassicalMove(format!("{from}{to} is not legal")),
            ));
        }
        let mut staged = snapshot.clone();
        staged.position = apply_with_kings(&snapshot.position, &snapshot.quantum, mv)?;
        return Ok(commit(staged));
    }

    // MeasurementPending: attacker first. Its collapse may reveal it was
    // never at the declared source.
    let mut staged = snapshot.clone();
    let mut promotions = BTreeMap::new();
    let mut mover_square = from;
    if let Some((source_id, _)) = source_claim {
        let outcome = staged.quantum.measure_piece(source_id, entropy)?;
        mover_square = outcome.square;
        promote_resolved(&mut staged, &outcome.resolved, &mut promotions)?;
    }

    // Defender second, unless the attacker's measurement already settled
    // it (same piece claiming both squares, or resolved by the cascade).
    let mut defender_collapsed = None;
    if let Some((target_id, _)) = target_claim {
        if source_claim.is_some_and(|(source_id, _)| source_id == target_id) {
            defender_collapsed = Some(mover_square);
        } else if let Some(&square) = promotions.get(&target_id) {
            defender_collapsed = Some(square);
        } else {
            let outcome = staged.quantum.measure_piece(target_id, entropy)?;
            defender_collapsed = Some(outcome.square);
            promote_resolved(&mut staged, &outcome.resolved, &mut promotions)?;
        }
    }

    // Validated: the declared move is re-checked from the mover's
    // post-measurement square. A declared capture whose defender is no
    // longer on the target square has failed outright.
    if declared_capture {
        if let Some(collapsed) = defender_collapsed {
            if collapsed != to {
                return Ok(rejected(
                    staged,
                    QuantumChessErrors::CaptureCollapseFailed {
                        declared: to,
                        collapsed,
                    },
                ));
            }
        }
    }
    if mover_square == to {
        return Ok(rejected(
            staged,
            QuantumChessErrors::IllegalClassicalMove(format!(
                "mover collapsed onto the target square {to}"
            )),
        ));
    }
    let mv = ChessMove::new(mover_square, to, promotion);
    if !is_legal_with_kings(&staged.position, &staged.quantum, mv)? {
        return Ok(rejected(
            staged,
            QuantumChessErrors::IllegalClassicalMove(format!(
                "{mover_square}{to} is not legal after measurement"
            )),
        ));
    }

    // Committed.
    staged.position = apply_with_kings(&staged.position, &staged.quantum, mv)?;
    Ok(commit(staged))
}

fn resolve_split(
    snapshot: &GameSnapshot,
    from: Square,
    to_first: Square,
    to_second: Square,
) -> Result<MoveResolution, QuantumChessErrors> {
    if !snapshot.quantum_mode {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::QuantumModeDisabled,
        ));
    }
    if to_first == to_second {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::InvalidSquare(format!(
                "split targets must differ, got {to_first} twice"
            )),
        ));
    }
    let Some((kind, color, source_claim)) = mover_identity(snapshot, from) else {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::IllegalClassicalMove(format!("no piece at {from}")),
        ));
    };
    if color != snapshot.position.side_to_move() {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::IllegalClassicalMove(format!("it is not {color:?}'s turn")),
        ));
    }

    // Splits are defined only into empty squares: no classical occupant,
    // no quantum claim. Capturing via split is disallowed.
    for target in [to_first, to_second] {
        if snapshot.position.piece_at(target).is_some()
            || snapshot.quantum.find_piece_at(target).is_some()
        {
            return Ok(rejected_unchanged(
                snapshot,
                QuantumChessErrors::SplitTargetOccupied(target),
            ));
        }
    }

    // Both targets must be reachable by the piece's normal movement rule.
    // A still-superposed mover is placed on a scratch copy so the
    // collaborator can judge reachability from the declared source.
    let mut view = snapshot.position.clone();
    if source_claim.is_some() {
        view.place_piece(from, kind, color);
    }
    materialize_kings(&mut view, &snapshot.quantum, &[from, to_first, to_second]);
    for target in [to_first, to_second] {
        if !view.is_legal(ChessMove::new(from, target, None))? {
            return Ok(rejected_unchanged(
                snapshot,
                QuantumChessErrors::SplitTargetUnreachable(target),
            ));
        }
    }

    let mut staged = snapshot.clone();
    match source_claim {
        Some((id, state_id)) => {
            staged.quantum.split(id, &state_id, to_first, to_second)?;
        }
        None => {
            let id = staged.quantum.add_piece(from, kind, color);
            staged.quantum.split(id, &StateId::root(), to_first, to_second)?;
            staged.position.remove_piece(from);
        }
    }
    staged.position.flip_side_to_move();
    Ok(commit(staged))
}

fn resolve_entangle(
    snapshot: &GameSnapshot,
    from: Square,
    to: Square,
    through: Square,
) -> Result<MoveResolution, QuantumChessErrors> {
    if !snapshot.quantum_mode {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::QuantumModeDisabled,
        ));
    }
    let Some((blocker_id, blocker_state)) = snapshot.quantum.find_piece_at(through) else {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::NoQuantumPieceFound(through),
        ));
    };
    let Some((kind, color, source_claim)) = mover_identity(snapshot, from) else {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::IllegalClassicalMove(format!("no piece at {from}")),
        ));
    };
    if color != snapshot.position.side_to_move() {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::IllegalClassicalMove(format!("it is not {color:?}'s turn")),
        ));
    }
    if source_claim.as_ref().is_some_and(|(id, _)| *id == blocker_id) {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::IllegalClassicalMove(
                "a piece cannot entangle through itself".to_owned(),
            ),
        ));
    }
    if snapshot.position.piece_at(to).is_some() || snapshot.quantum.find_piece_at(to).is_some()
    {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::IllegalClassicalMove(format!(
                "entangle target square {to} is occupied"
            )),
        ));
    }

    // Reachability ignoring the quantum blocker: it is not on the
    // classical board, so the collaborator sees the path as open; any
    // classical blocker still makes the move illegal.
    let mut view = snapshot.position.clone();
    if source_claim.is_some() {
        view.place_piece(from, kind, color);
    }
    materialize_kings(&mut view, &snapshot.quantum, &[from, to, through]);
    if !view.is_legal(ChessMove::new(from, to, None))? {
        return Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::IllegalClassicalMove(format!(
                "cannot reach {to} from {from}"
            )),
        ));
    }

    let mut staged = snapshot.clone();
    let (mover_id, mover_state) = match source_claim {
        Some(claim) => claim,
        None => {
            let id = staged.quantum.add_piece(from, kind, color);
            staged.position.remove_piece(from);
            (id, StateId::root())
        }
    };
    staged
        .quantum
        .entangle_one_blocker(mover_id, &mover_state, to, blocker_id, &blocker_state)?;
    staged.position.flip_side_to_move();
    Ok(commit(staged))
}

fn resolve_measure(
    snapshot: &GameSnapshot,
    square: Square,
    entropy: &mut dyn EntropySource,
) -> Result<MoveResolution, QuantumChessErrors> {
    let mut staged = snapshot.clone();
    match staged.quantum.measure_piece_at(square, entropy)? {
        None => Ok(rejected_unchanged(
            snapshot,
            QuantumChessErrors::NoQuantumPieceFound(square),
        )),
        Some(outcome) => {
            let mut promotions = BTreeMap::new();
            promote_resolved(&mut staged, &outcome.resolved, &mut promotions)?;
            // Measuring is not a move: the turn does not flip.
            Ok(commit(staged))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_move, GameUpdate, MoveResolution};
    use crate::classical::algebraic::parse_square;
    use crate::classical::status::GameStatus;
    use crate::errors::QuantumChessErrors;
    use crate::protocol::requests::{GameSnapshot, MoveRequest};
    use crate::quantum::entropy::ScriptedEntropy;
    use chess::{Color, Piece, Square};

    fn sq(name: &str) -> Square {
        parse_square(name).expect("test square should parse")
    }

    fn committed(resolution: MoveResolution) -> GameUpdate {
        match resolution {
            MoveResolution::Committed(update) => update,
            MoveResolution::Rejected { reason, .. } => {
                panic!("expected commit, got rejection: {reason}")
            }
        }
    }

    fn rejected(resolution: MoveResolution) -> (QuantumChessErrors, GameUpdate) {
        match resolution {
            MoveResolution::Rejected { reason, update } => (reason, update),
            MoveResolution::Committed(_) => panic!("expected rejection, got commit"),
        }
    }

    fn play(snapshot: &GameSnapshot, request: MoveRequest, rolls: &[f64]) -> MoveResolution {
        let mut entropy = ScriptedEntropy::new(rolls);
        resolve_move(snapshot, &request, &mut entropy).expect("resolution should not error")
    }

    fn quantum_game() -> GameSnapshot {
        let update = committed(play(
            &GameSnapshot::new_game(),
            MoveRequest::ToggleQuantumMode { enabled: true },
            &[],
        ));
        update.snapshot
    }

    fn normal(from: &str, to: &str) -> MoveRequest {
        MoveRequest::Normal {
            from: sq(from),
            to: sq(to),
            promotion: None,
        }
    }

    /// New game, white splits the e2 pawn across e3 and e4.
    fn split_e2() -> GameSnapshot {
        let update = committed(play(
            &quantum_game(),
            MoveRequest::Split {
                from: sq("e2"),
                to_first: sq("e3"),
                to_second: sq("e4"),
            },
            &[],
        ));
        update.snapshot
    }

    #[test]
    fn classical_moves_bypass_the_quantum_engine() {
        let update = committed(play(&GameSnapshot::new_game(), normal("e2", "e4"), &[]));
        assert_eq!(update.snapshot.position.side_to_move(), Color::Black);
        assert_eq!(
            update.snapshot.position.piece_at(sq("e4")),
            Some((Piece::Pawn, Color::White))
        );
        assert!(update.snapshot.quantum.is_empty());
        assert_eq!(update.status, GameStatus::Active);
    }

    #[test]
    fn illegal_classical_move_rejects_without_mutation() {
        let snapshot = GameSnapshot::new_game();
        let (reason, update) = rejected(play(&snapshot, normal("e2", "e5"), &[]));
        assert!(matches!(reason, QuantumChessErrors::IllegalClassicalMove(_)));
        assert!(!reason.is_internal());
        assert_eq!(update.snapshot.position.fen(), snapshot.position.fen());
        assert_eq!(update.snapshot.position.side_to_move(), Color::White);
    }

    #[test]
    fn split_creates_two_half_branches_and_flips_the_turn() {
        let snapshot = split_e2();

        // e2 is empty on the classical board; the pawn lives only in the
        // quantum collection now.
        assert!(snapshot.position.piece_at(sq("e2")).is_none());
        assert_eq!(snapshot.position.side_to_move(), Color::Black);
        assert_eq!(snapshot.quantum.len(), 1);

        let piece = snapshot.quantum.iter().next().expect("one quantum piece");
        assert_eq!(piece.state.len(), 2);
        for (_, branch) in piece.state.iter() {
            assert!((branch.probability - 0.5).abs() < 1e-12);
            assert!(branch.square == sq("e3") || branch.square == sq("e4"));
        }
    }

    #[test]
    fn split_validation_errors() {
        let game = quantum_game();

        let (reason, _) = rejected(play(
            &game,
            MoveRequest::Split {
                from: sq("e2"),
                to_first: sq("e3"),
                to_second: sq("e3"),
            },
            &[],
        ));
        assert!(matches!(reason, QuantumChessErrors::InvalidSquare(_)));

        // d1 hosts the queen: occupied target.
        let (reason, _) = rejected(play(
            &game,
            MoveRequest::Split {
                from: sq("e2"),
                to_first: sq("e3"),
                to_second: sq("d1"),
            },
            &[],
        ));
        assert_eq!(reason, QuantumChessErrors::SplitTargetOccupied(sq("d1")));

        // e6 is far beyond a pawn's movement rule.
        let (reason, _) = rejected(play(
            &game,
            MoveRequest::Split {
                from: sq("e2"),
                to_first: sq("e3"),
                to_second: sq("e6"),
            },
            &[],
        ));
        assert_eq!(reason, QuantumChessErrors::SplitTargetUnreachable(sq("e6")));

        // Quantum mode off: splits are not accepted at all.
        let (reason, _) = rejected(play(
            &GameSnapshot::new_game(),
            MoveRequest::Split {
                from: sq("e2"),
                to_first: sq("e3"),
                to_second: sq("e4"),
            },
            &[],
        ));
        assert_eq!(reason, QuantumChessErrors::QuantumModeDisabled);
    }

    #[test]
    fn measure_only_collapses_without_flipping_the_turn() {
        let snapshot = split_e2();
        let update = committed(play(
            &snapshot,
            MoveRequest::Measure { square: sq("e4") },
            &[0.1],
        ));

        // Side to move is still black; the pawn is classical again at e3.
        assert_eq!(update.snapshot.position.side_to_move(), Color::Black);
        assert!(update.snapshot.quantum.is_empty());
        assert_eq!(
            update.snapshot.position.piece_at(sq("e3")),
            Some((Piece::Pawn, Color::White))
        );
        assert!(update.snapshot.position.piece_at(sq("e4")).is_none());
    }

    #[test]
    fn measure_on_an_unclaimed_square_is_rejected() {
        let snapshot = split_e2();
        let (reason, update) = rejected(play(
            &snapshot,
            MoveRequest::Measure { square: sq("h5") },
            &[0.5],
        ));
        assert_eq!(reason, QuantumChessErrors::NoQuantumPieceFound(sq("h5")));
        assert_eq!(update.snapshot.quantum.len(), 1);
    }

    /// Drives the game to the point where black can declare a capture on
    /// the superposed pawn's e4 branch.
    fn capture_setup() -> GameSnapshot {
        let mut snapshot = split_e2();
        for request in [
            normal("b8", "c6"), // black develops, no quantum interaction
            normal("g1", "f3"), // white develops
            normal("d7", "d5"), // black's pawn now attacks e4
            normal("a2", "a3"), // white waits
        ] {
            snapshot = committed(play(&snapshot, request, &[])).snapshot;
        }
        assert_eq!(snapshot.position.side_to_move(), Color::Black);
        snapshot
    }

    #[test]
    fn capture_of_a_superposed_piece_succeeds_when_it_collapses_there() {
        let snapshot = capture_setup();
        // High roll: the pawn's e4 branch wins the measurement.
        let update = committed(play(&snapshot, normal("d5", "e4"), &[0.9]));

        assert_eq!(
            update.snapshot.position.piece_at(sq("e4")),
            Some((Piece::Pawn, Color::Black))
        );
        assert!(update.snapshot.position.piece_at(sq("e3")).is_none());
        assert!(update.snapshot.position.piece_at(sq("d5")).is_none());
        assert!(update.snapshot.quantum.is_empty());
        assert_eq!(update.snapshot.position.side_to_move(), Color::White);
    }

    #[test]
    fn failed_capture_is_rejected_but_the_collapse_persists() {
        let snapshot = capture_setup();
        // Low roll: the pawn collapses to e3, so the declared capture on
        // e4 evaporates.
        let (reason, update) = rejected(play(&snapshot, normal("d5", "e4"), &[0.1]));
        assert_eq!(
            reason,
            QuantumChessErrors::CaptureCollapseFailed {
                declared: sq("e4"),
                collapsed: sq("e3"),
            }
        );

        // The declared move was not applied: black's pawn is still on d5
        // and it is still black's turn. The measurement, however, is
        // physically real and persisted: the white pawn is classical on e3.
        assert_eq!(
            update.snapshot.position.piece_at(sq("d5")),
            Some((Piece::Pawn, Color::Black))
        );
        assert_eq!(
            update.snapshot.position.piece_at(sq("e3")),
            Some((Piece::Pawn, Color::White))
        );
        assert!(update.snapshot.quantum.is_empty());
        assert_eq!(update.snapshot.position.side_to_move(), Color::Black);
    }

    #[test]
    fn moving_a_superposed_piece_measures_it_first() {
        let snapshot = split_e2();
        let snapshot = committed(play(&snapshot, normal("g8", "f6"), &[])).snapshot;

        // White declares e4-e5 with the pawn still split. Low roll: it
        // collapses to e3, and e3-e5 is no pawn move, so the declaration
        // dies -- but the pawn stays collapsed on e3.
        let (reason, update) = rejected(play(&snapshot, normal("e4", "e5"), &[0.1]));
        assert!(matches!(reason, QuantumChessErrors::IllegalClassicalMove(_)));
        assert_eq!(
            update.snapshot.position.piece_at(sq("e3")),
            Some((Piece::Pawn, Color::White))
        );
        assert!(update.snapshot.quantum.is_empty());
        assert_eq!(update.snapshot.position.side_to_move(), Color::White);

        // High roll: it collapses to e4 and e4-e5 is a plain pawn push.
        let update = committed(play(&snapshot, normal("e4", "e5"), &[0.9]));
        assert_eq!(
            update.snapshot.position.piece_at(sq("e5")),
            Some((Piece::Pawn, Color::White))
        );
        assert_eq!(update.snapshot.position.side_to_move(), Color::Black);
    }

    #[test]
    fn entangle_links_mover_and_blocker_and_measurement_settles_both() {
        // Black knight splits across a6/c6; the white rook then slides
        // c1-c8 through the c6 claim, entangling with the knight.
        let mut snapshot = GameSnapshot {
            position: crate::classical::position::ClassicalPosition::from_fen(
                "1n5k/8/8/8/8/8/8/K1R5 b - - 0 1",
            )
            .expect("test position parses"),
            quantum: Default::default(),
            quantum_mode: true,
        };
        snapshot = committed(play(
            &snapshot,
            MoveRequest::Split {
                from: sq("b8"),
                to_first: sq("a6"),
                to_second: sq("c6"),
            },
            &[],
        ))
        .snapshot;

        let update = committed(play(
            &snapshot,
            MoveRequest::Entangle {
                from: sq("c1"),
                to: sq("c8"),
                through: sq("c6"),
            },
            &[],
        ));
        let snapshot = update.snapshot;
        assert_eq!(snapshot.position.side_to_move(), Color::Black);
        assert!(snapshot.position.piece_at(sq("c1")).is_none());
        assert_eq!(snapshot.quantum.len(), 2);
        let rook = snapshot
            .quantum
            .iter()
            .find(|piece| piece.kind == Piece::Rook)
            .expect("rook is quantum now");
        assert_eq!(rook.links.len(), 2);
        assert_eq!(rook.state.len(), 2);

        // Measuring the rook's c8 branch with a high roll puts the rook on
        // c8, which forces the knight out of c6 and onto a6.
        let update = committed(play(
            &snapshot,
            MoveRequest::Measure { square: sq("c8") },
            &[0.9],
        ));
        assert_eq!(
            update.snapshot.position.piece_at(sq("c8")),
            Some((Piece::Rook, Color::White))
        );
        assert_eq!(
            update.snapshot.position.piece_at(sq("a6")),
            Some((Piece::Knight, Color::Black))
        );
        assert!(update.snapshot.quantum.is_empty());
    }

    #[test]
    fn play_continues_while_a_king_is_superposed() {
        let snapshot = GameSnapshot {
            position: crate::classical::position::ClassicalPosition::from_fen(
                "4k3/8/8/8/8/8/8/4K3 w - - 0 1",
            )
            .expect("test position parses"),
            quantum: Default::default(),
            quantum_mode: true,
        };

        // White splits the king off the classical board entirely.
        let snapshot = committed(play(
            &snapshot,
            MoveRequest::Split {
                from: sq("e1"),
                to_first: sq("d1"),
                to_second: sq("f1"),
            },
            &[],
        ))
        .snapshot;
        assert!(snapshot.position.king_square(Color::White).is_none());
        assert_eq!(snapshot.quantum.len(), 1);

        // Black's ordinary reply must still resolve: the collaborator sees
        // a stand-in for the superposed king, and the committed position
        // must not keep it.
        let update = committed(play(&snapshot, normal("e8", "e7"), &[]));
        let snapshot = update.snapshot;
        assert_eq!(update.status, GameStatus::Active);
        assert_eq!(
            snapshot.position.piece_at(sq("e7")),
            Some((Piece::King, Color::Black))
        );
        assert!(snapshot.position.king_square(Color::White).is_none());
        assert_eq!(snapshot.quantum.len(), 1);
        assert_eq!(snapshot.position.side_to_move(), Color::White);

        // Moving the superposed king measures it first; a low roll pins it
        // to d1 and the declared d1-c1 step goes through classically.
        let update = committed(play(&snapshot, normal("d1", "c1"), &[0.1]));
        assert_eq!(
            update.snapshot.position.piece_at(sq("c1")),
            Some((Piece::King, Color::White))
        );
        assert!(update.snapshot.quantum.is_empty());
        assert_eq!(update.snapshot.position.side_to_move(), Color::Black);
    }

    #[test]
    fn entangle_requires_a_quantum_blocker() {
        let game = quantum_game();
        let (reason, _) = rejected(play(
            &game,
            MoveRequest::Entangle {
                from: sq("d1"),
                to: sq("d4"),
                through: sq("d3"),
            },
            &[],
        ));
        assert_eq!(reason, QuantumChessErrors::NoQuantumPieceFound(sq("d3")));
    }

    #[test]
    fn toggling_quantum_mode_only_touches_the_flag() {
        let snapshot = GameSnapshot::new_game();
        let update = committed(play(
            &snapshot,
            MoveRequest::ToggleQuantumMode { enabled: true },
            &[],
        ));
        assert!(update.snapshot.quantum_mode);
        assert_eq!(update.snapshot.position.fen(), snapshot.position.fen());
        assert_eq!(update.snapshot.position.side_to_move(), Color::White);
    }
}
