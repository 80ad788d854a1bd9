//! Scripted quantum-chess demo game.
//!
//! Plays a short fixed sequence against seeded entropy: enabling quantum
//! mode, splitting a pawn into superposition, developing both sides, and
//! declaring a capture on a superposed branch, printing the board after
//! every resolution.
//!
//! Usage:
//! `cargo run --bin quantum_demo [seed]`

use quantum_chess::classical::algebraic::parse_square;
use quantum_chess::protocol::requests::{GameSnapshot, MoveRequest};
use quantum_chess::protocol::resolve::{resolve_move, MoveResolution};
use quantum_chess::quantum::entropy::SeededEntropy;
use quantum_chess::utils::render::render_snapshot;

fn square(name: &str) -> chess::Square {
    parse_square(name).unwrap_or_else(|error| panic!("bad demo square {name}: {error}"))
}

fn normal(from: &str, to: &str) -> MoveRequest {
    MoveRequest::Normal {
        from: square(from),
        to: square(to),
        promotion: None,
    }
}

fn describe(request: &MoveRequest) -> String {
    match request {
        MoveRequest::Normal { from, to, .. } => format!("move {from}-{to}"),
        MoveRequest::Split {
            from,
            to_first,
            to_second,
        } => format!("split {from} -> {to_first} / {to_second}"),
        MoveRequest::Entangle { from, to, through } => {
            format!("entangle {from}-{to} through {through}")
        }
        MoveRequest::Measure { square } => format!("measure {square}"),
        MoveRequest::ToggleQuantumMode { enabled } => {
            format!("quantum mode {}", if *enabled { "on" } else { "off" })
        }
    }
}

fn main() {
    let seed = std::env::args()
        .nth(1)
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(7);
    let mut entropy = SeededEntropy::from_seed(seed);

    let script = [
        MoveRequest::ToggleQuantumMode { enabled: true },
        MoveRequest::Split {
            from: square("e2"),
            to_first: square("e3"),
            to_second: square("e4"),
        },
        normal("b8", "c6"),
        normal("g1", "f3"),
        normal("d7", "d5"),
        normal("a2", "a3"),
        // Black declares a capture on the pawn's e4 branch; the pawn is
        // measured before the capture can land.
        normal("d5", "e4"),
    ];

    let mut snapshot = GameSnapshot::new_game();
    println!("seed {seed}");
    println!("{}", render_snapshot(&snapshot));

    for request in script {
        println!("\n> {}", describe(&request));
        match resolve_move(&snapshot, &request, &mut entropy) {
            Ok(MoveResolution::Committed(update)) => {
                println!("committed ({:?})", update.status);
                snapshot = update.snapshot;
            }
            Ok(MoveResolution::Rejected { reason, update }) => {
                println!("rejected: {reason}");
                snapshot = update.snapshot;
            }
            Err(error) => {
                eprintln!("engine error: {error}");
                return;
            }
        }
        println!("{}", render_snapshot(&snapshot));
    }
}
