//! Coding aggregation and inter-coder agreement

mod aggregate;
mod consensus;
mod manager;


pub use aggregate::{aggregate, CodeEvidence, CodingMap, Codings};
pub use consensus::{consensus, Cell, CellKey, Consensus, SheetMirror, SlotStatus, Validation};
pub use manager::CodingManager;
