//! CRDT building blocks: logical clocks, LWW registers, collaborative text,
//! and the wire encoding shared by snapshots and deltas.

pub mod register;
pub mod stamp;
pub mod text;
pub(crate) mod wire;

pub use register::LwwRegister;
pub use stamp::{LamportClock, Stamp, StateVector};
pub use text::{Atom, TextCrdt};
