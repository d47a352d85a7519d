//! This crate contains the types and methods needed to interact
//! with DICOM nodes through the upper layer protocol,
//! as the requesting side of an association.
//!
//! - The [`address`] module
//!   provides an abstraction for working with compound addresses
//!   referring to application entities in a network.
//! - The [`pdu`] module
//!   provides data structures representing _protocol data units_,
//!   and their encoding and decoding.
//! - The [`message`] module
//!   provides DIMSE command sets and status codes.
//! - The [`association`] module
//!   comprises the association engine,
//!   which negotiates presentation contexts,
//!   reassembles incoming messages
//!   and correlates responses with their requests.
//!
//! ## Features
//! * `async` (default): Enables a tokio driver for the association engine.
//!   See [`ClientAssociationOptions`] for details.

pub mod address;
pub mod association;
pub mod message;
pub mod pdu;

/// The implementation class UID sent in association requests.
///
/// This UID may change in future versions,
/// even between patch versions.
pub const IMPLEMENTATION_CLASS_UID: &str = "2.25.201807220215353294726815718453108651427";

/// The implementation version name sent in association requests.
///
/// This name may change in future versions,
/// even between patch versions.
pub const IMPLEMENTATION_VERSION_NAME: &str = "NETDICOM 0.3.0";

// re-exports

pub use address::AeAddr;
#[cfg(feature = "async")]
pub use association::client::{ClientAssociation, ClientAssociationOptions};
pub use association::engine::{Engine, EngineOptions, Event};
pub use message::{Command, CommandField, Priority, Status};
pub use pdu::read_pdu;
pub use pdu::write_pdu;
pub use pdu::Pdu;
