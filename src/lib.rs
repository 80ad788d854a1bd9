//! Crate root module declarations for the quantum chess engine.
//!
//! This file exposes all top-level subsystems (the quantum state engine,
//! the classical rules-engine facade, the move-resolution protocol,
//! persisted-state serialization, and utility helpers) so binaries, tests,
//! and external tooling can import stable module paths.

pub mod classical {
    pub mod algebraic;
    pub mod position;
    pub mod status;
}

pub mod quantum {
    pub mod entanglement;
    pub mod entropy;
    pub mod probability_state;
    pub mod quantum_board;
    pub mod quantum_piece;
}

pub mod protocol {
    pub mod requests;
    pub mod resolve;
}

pub mod serialization {
    pub mod records;
}

pub mod utils {
    pub mod render;
}

pub mod errors;
