//! Type definitions for the cellmon detection pipeline
//!
//! ## Pipeline Flow
//!
//! ```text
//! capture stream → parser → decoder → store → verification engine
//!                                                  │
//!                                                  └─→ score + classification
//! ```
//!
//! ## Key Types
//!
//! - [`CellMeasurement`] - One observed serving or neighbor cell
//! - [`DecodedIdentifier`] - Compound cell id split into (station, sector)
//! - [`PacketRecord`] - Raw diagnostic protocol packet (ARI or QMI)
//! - [`ConnectivityEvent`] - Discrete capture/SIM state change

pub mod event;
pub mod measurement;
pub mod packet;

pub use event::{connectivity_label, ConnectivityEvent};
pub use measurement::{CaptureSource, CellMeasurement, CellRole, DecodedIdentifier, Technology};
pub use packet::{PacketDirection, PacketProtocol, PacketRecord};
