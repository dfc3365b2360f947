//! Handler unit subsystem
//!
//! Handler units are dynamic libraries living in the configured units
//! directory. Each exports [`loader::UNIT_ENTRY`], which hands back the
//! unit's command declarations. The registry owns the live command table
//! and rebuilds it wholesale whenever `/reload` is invoked.

pub mod loader;
pub mod registry;

pub use loader::{HandlerUnit, LibraryLoader, UnitCandidate, UnitExports, UnitLoader, UNIT_ENTRY};
pub use registry::{CommandRegistry, LoadOutcome};
