//! Protocol Data Unit module
//!
//! This module comprises the data structures representing the
//! protocol data units (PDUs) exchanged by an association requester,
//! as well as the functions which decode them from
//! and encode them into complete in-memory PDU buffers.
//!
//! Splitting a byte stream into PDU buffers is the job of
//! the association's framing layer.
pub mod reader;
pub mod writer;

use bytes::Bytes;
use std::fmt::{self, Display};

pub use reader::{check_pdu_header, pdu_length, read_pdu};
pub use writer::write_pdu;

/// The default maximum PDU length, in bytes.
pub const DEFAULT_MAX_PDU: u32 = 16_384;

/// The minimum PDU length accepted in strict mode, in bytes.
pub const MINIMUM_PDU_SIZE: u32 = 4_096;

/// The maximum PDU length accepted in strict mode, in bytes.
pub const MAXIMUM_PDU_SIZE: u32 = 131_072;

/// The length of the PDU header:
/// the type, one reserved byte and the 4-byte length.
pub const PDU_HEADER_SIZE: u32 = 6;

/// The bytes taken by a PDV item before its message fragment:
/// the 4-byte item length, the context ID and the message control header.
pub const PDV_HEADER_SIZE: u32 = 6;

/// The protocol version of the DICOM upper layer.
pub const PROTOCOL_VERSION: u16 = 1;

/// PDU type codes.
pub mod pdu_type {
    pub const ASSOCIATE_RQ: u8 = 0x01;
    pub const ASSOCIATE_AC: u8 = 0x02;
    pub const ASSOCIATE_RJ: u8 = 0x03;
    pub const P_DATA_TF: u8 = 0x04;
    pub const RELEASE_RQ: u8 = 0x05;
    pub const RELEASE_RP: u8 = 0x06;
    pub const ABORT_RQ: u8 = 0x07;
}

/// Item and sub-item type codes.
pub mod item_type {
    pub const APPLICATION_CONTEXT: u8 = 0x10;
    pub const PRESENTATION_CONTEXT_RQ: u8 = 0x20;
    pub const PRESENTATION_CONTEXT_AC: u8 = 0x21;
    pub const ABSTRACT_SYNTAX: u8 = 0x30;
    pub const TRANSFER_SYNTAX: u8 = 0x40;
    pub const USER_INFORMATION: u8 = 0x50;
    pub const MAXIMUM_LENGTH: u8 = 0x51;
    pub const IMPLEMENTATION_CLASS_UID: u8 = 0x52;
    pub const IMPLEMENTATION_VERSION_NAME: u8 = 0x55;
}

/// Message component for a proposed presentation context.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct PresentationContextProposed {
    /// the presentation context identifier, an odd number
    pub id: u8,
    /// the expected abstract syntax UID
    /// (commonly referring to the expected SOP class)
    pub abstract_syntax: String,
    /// a list of transfer syntax UIDs to support in this interaction
    pub transfer_syntaxes: Vec<String>,
}

/// The acceptor's answer to one proposed presentation context.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct PresentationContextResult {
    pub id: u8,
    pub reason: PresentationContextResultReason,
    /// the accepted transfer syntax UID,
    /// meaningless unless the context was accepted
    pub transfer_syntax: String,
}

impl PresentationContextResult {
    /// Whether the acceptor accepted this presentation context.
    pub fn is_accepted(&self) -> bool {
        self.reason == PresentationContextResultReason::Acceptance
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PresentationContextResultReason {
    Acceptance = 0,
    UserRejection = 1,
    NoReason = 2,
    AbstractSyntaxNotSupported = 3,
    TransferSyntaxesNotSupported = 4,
}

impl PresentationContextResultReason {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        use PresentationContextResultReason::*;
        Some(match code {
            0 => Acceptance,
            1 => UserRejection,
            2 => NoReason,
            3 => AbstractSyntaxNotSupported,
            4 => TransferSyntaxesNotSupported,
            _ => return None,
        })
    }
}

impl Display for PresentationContextResultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PresentationContextResultReason::*;
        f.write_str(match self {
            Acceptance => "acceptance",
            UserRejection => "user rejection",
            NoReason => "no reason",
            AbstractSyntaxNotSupported => "abstract syntax not supported",
            TransferSyntaxesNotSupported => "transfer syntaxes not supported",
        })
    }
}

/// Whether an association rejection is permanent or transient.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AssociationRJResult {
    Permanent = 1,
    Transient = 2,
}

impl AssociationRJResult {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(AssociationRJResult::Permanent),
            2 => Some(AssociationRJResult::Transient),
            _ => None,
        }
    }
}

/// Who rejected the association.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AssociationRJSource {
    ServiceUser = 1,
    /// the ACSE related function of the service provider
    ServiceProviderAcse = 2,
    /// the presentation related function of the service provider
    ServiceProviderPresentation = 3,
}

impl AssociationRJSource {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(AssociationRJSource::ServiceUser),
            2 => Some(AssociationRJSource::ServiceProviderAcse),
            3 => Some(AssociationRJSource::ServiceProviderPresentation),
            _ => None,
        }
    }
}

/// An A-ASSOCIATE-RJ PDU.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct AssociationRJ {
    pub result: AssociationRJResult,
    pub source: AssociationRJSource,
    /// the reason code, interpreted according to the source
    pub reason: u8,
}

impl AssociationRJ {
    /// A human readable description of the rejection reason.
    pub fn reason_description(&self) -> &'static str {
        match (self.source, self.reason) {
            (AssociationRJSource::ServiceUser, 1) => "no reason given",
            (AssociationRJSource::ServiceUser, 2) => "application context name not supported",
            (AssociationRJSource::ServiceUser, 3) => "calling AE title not recognized",
            (AssociationRJSource::ServiceUser, 7) => "called AE title not recognized",
            (AssociationRJSource::ServiceProviderAcse, 1) => "no reason given",
            (AssociationRJSource::ServiceProviderAcse, 2) => "protocol version not supported",
            (AssociationRJSource::ServiceProviderPresentation, 1) => "temporary congestion",
            (AssociationRJSource::ServiceProviderPresentation, 2) => "local limit exceeded",
            _ => "reserved",
        }
    }
}

impl Display for AssociationRJ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self.result {
            AssociationRJResult::Permanent => "permanent",
            AssociationRJResult::Transient => "transient",
        };
        write!(f, "{} rejection: {}", result, self.reason_description())
    }
}

/// Whether a PDV carries command or data set bytes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PDataValueType {
    Command,
    Data,
}

/// One presentation data value item of a P-DATA-TF PDU.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct PDataValue {
    pub presentation_context_id: u8,
    pub value_type: PDataValueType,
    /// whether this is the last fragment of a message
    pub is_last: bool,
    /// the message fragment
    pub data: Bytes,
}

impl PDataValue {
    /// The message control header byte:
    /// bit 0 set for a command, bit 1 set for the last fragment.
    pub fn control_header(&self) -> u8 {
        let mut header = 0;
        if self.value_type == PDataValueType::Command {
            header |= 0x01;
        }
        if self.is_last {
            header |= 0x02;
        }
        header
    }
}

/// The reason given by the service provider for an A-ABORT.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AbortRQServiceProviderReason {
    ReasonNotSpecified = 0,
    UnrecognizedPdu = 1,
    UnexpectedPdu = 2,
    UnrecognizedPduParameter = 4,
    UnexpectedPduParameter = 5,
    InvalidPduParameter = 6,
}

/// The source of an A-ABORT.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AbortRQSource {
    ServiceUser,
    Reserved,
    ServiceProvider(AbortRQServiceProviderReason),
}

impl AbortRQSource {
    pub(crate) fn from_codes(source: u8, reason: u8) -> Option<Self> {
        use AbortRQServiceProviderReason::*;
        Some(match source {
            0 => AbortRQSource::ServiceUser,
            1 => AbortRQSource::Reserved,
            2 => AbortRQSource::ServiceProvider(match reason {
                0 => ReasonNotSpecified,
                1 => UnrecognizedPdu,
                2 => UnexpectedPdu,
                4 => UnrecognizedPduParameter,
                5 => UnexpectedPduParameter,
                6 => InvalidPduParameter,
                _ => return None,
            }),
            _ => return None,
        })
    }

    /// The source and reason bytes of the A-ABORT PDU.
    pub(crate) fn to_codes(self) -> (u8, u8) {
        match self {
            AbortRQSource::ServiceUser => (0, 0),
            AbortRQSource::Reserved => (1, 0),
            AbortRQSource::ServiceProvider(reason) => (2, reason as u8),
        }
    }
}

impl Display for AbortRQSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortRQSource::ServiceUser => f.write_str("service user"),
            AbortRQSource::Reserved => f.write_str("reserved source"),
            AbortRQSource::ServiceProvider(reason) => {
                write!(f, "service provider ({:?})", reason)
            }
        }
    }
}

/// A sub-item of the user information item.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum UserVariableItem {
    /// A sub-item this implementation does not interpret,
    /// kept as its type code and raw bytes.
    Unknown(u8, Vec<u8>),
    /// The maximum length of a P-DATA-TF PDU variable field
    /// that the sender can receive. Zero means unlimited.
    MaxLength(u32),
    ImplementationClassUID(String),
    ImplementationVersionName(String),
}

/// An A-ASSOCIATE-RQ PDU.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct AssociationRQ {
    pub protocol_version: u16,
    pub calling_ae_title: String,
    pub called_ae_title: String,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContextProposed>,
    pub user_variables: Vec<UserVariableItem>,
}

/// An A-ASSOCIATE-AC PDU.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct AssociationAC {
    pub protocol_version: u16,
    pub calling_ae_title: String,
    pub called_ae_title: String,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContextResult>,
    pub user_variables: Vec<UserVariableItem>,
}

impl AssociationAC {
    /// The maximum P-DATA-TF length announced by the acceptor, if any.
    pub fn max_pdu_length(&self) -> Option<u32> {
        self.user_variables.iter().find_map(|item| match item {
            UserVariableItem::MaxLength(len) => Some(*len),
            _ => None,
        })
    }
}

/// A protocol data unit of the DICOM upper layer.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Pdu {
    AssociationRQ(AssociationRQ),
    AssociationAC(AssociationAC),
    AssociationRJ(AssociationRJ),
    PData { data: Vec<PDataValue> },
    ReleaseRQ,
    ReleaseRP,
    AbortRQ { source: AbortRQSource },
}

impl Pdu {
    /// The PDU type code.
    pub fn pdu_type(&self) -> u8 {
        match self {
            Pdu::AssociationRQ(_) => pdu_type::ASSOCIATE_RQ,
            Pdu::AssociationAC(_) => pdu_type::ASSOCIATE_AC,
            Pdu::AssociationRJ(_) => pdu_type::ASSOCIATE_RJ,
            Pdu::PData { .. } => pdu_type::P_DATA_TF,
            Pdu::ReleaseRQ => pdu_type::RELEASE_RQ,
            Pdu::ReleaseRP => pdu_type::RELEASE_RP,
            Pdu::AbortRQ { .. } => pdu_type::ABORT_RQ,
        }
    }

    /// Provide a short description of the PDU.
    pub fn short_description(&self) -> impl Display + '_ {
        PduShortDescription(self)
    }
}

struct PduShortDescription<'a>(&'a Pdu);

impl Display for PduShortDescription<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Pdu::AssociationRQ(rq) => write!(
                f,
                "A-ASSOCIATE-RQ {} -> {} ({} presentation contexts)",
                rq.calling_ae_title,
                rq.called_ae_title,
                rq.presentation_contexts.len()
            ),
            Pdu::AssociationAC(ac) => write!(
                f,
                "A-ASSOCIATE-AC ({} presentation contexts)",
                ac.presentation_contexts.len()
            ),
            Pdu::AssociationRJ(rj) => write!(f, "A-ASSOCIATE-RJ ({})", rj),
            Pdu::PData { data } => {
                let total: usize = data.iter().map(|pdv| pdv.data.len()).sum();
                write!(f, "P-DATA-TF ({} PDVs, {} bytes)", data.len(), total)
            }
            Pdu::ReleaseRQ => f.write_str("A-RELEASE-RQ"),
            Pdu::ReleaseRP => f.write_str("A-RELEASE-RP"),
            Pdu::AbortRQ { source } => write!(f, "A-ABORT ({})", source),
        }
    }
}
