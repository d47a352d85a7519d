//! DICOM association module
//!
//! This module contains the association requester,
//! which establishes associations with DICOM nodes
//! and exchanges DIMSE messages with them.
//!
//! The protocol logic lives in the [`engine`],
//! which performs no I/O of its own:
//! it consumes received bytes and produces bytes to send
//! and [events](engine::Event) for the application.
//! Its building blocks are
//! [PDU framing](framing) of the incoming byte stream,
//! [PDV reassembly and fragmentation](pdata),
//! and [request correlation](correlation) by message ID.
//!
//! With the `async` feature,
//! the [`client`] module drives the engine over a tokio TCP stream
//! via the [`ClientAssociationOptions`][1] type.
//!
//! [1]: crate::association::client::ClientAssociationOptions
#[cfg(feature = "async")]
pub mod client;
pub mod correlation;
pub mod engine;
pub mod framing;
pub mod pdata;

#[cfg(feature = "async")]
pub use client::{ClientAssociation, ClientAssociationOptions, Response, ResponseStream, StoreHandler};
pub use engine::{Engine, EngineOptions, Event, NegotiatedContext, State};
