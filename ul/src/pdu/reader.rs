//! PDU reader module
//!
//! Decodes one complete PDU from an in-memory buffer.
//! All multi-byte integers at this layer are big endian.
use crate::pdu::*;
use bytes::Bytes;
use netdicom_encoding::cursor::{self, ReadCursor};
use netdicom_encoding::Endianness;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use tracing::warn;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read PDU field `{}`", field))]
    Read {
        field: &'static str,
        #[snafu(backtrace)]
        source: cursor::Error,
    },

    #[snafu(display("Unknown PDU type {:#04x}", pdu_type))]
    UnknownPduType { pdu_type: u8, backtrace: Backtrace },

    #[snafu(display("Unexpected item type {:#04x} in {}", item_type, context))]
    UnexpectedItem {
        item_type: u8,
        context: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "PDU declares {} bytes, but only {} are available",
        pdu_length,
        available
    ))]
    Truncated {
        pdu_length: u32,
        available: usize,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Incoming pdu was too large: length {}, maximum is {}",
        pdu_length,
        max_pdu_length
    ))]
    PduTooLarge {
        pdu_length: u32,
        max_pdu_length: u32,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid PDV item length {} (must be >= 2)", length))]
    InvalidItemLength { length: u32, backtrace: Backtrace },

    #[snafu(display("Invalid reject result, source or reason"))]
    InvalidRejectSourceOrReason { backtrace: Backtrace },

    #[snafu(display("Invalid abort source or reason"))]
    InvalidAbortSourceOrReason { backtrace: Backtrace },

    #[snafu(display("Invalid presentation context result reason {}", reason))]
    InvalidPresentationContextResultReason { reason: u8, backtrace: Backtrace },

    #[snafu(display("Missing application context name"))]
    MissingApplicationContextName { backtrace: Backtrace },

    #[snafu(display("Missing abstract syntax"))]
    MissingAbstractSyntax { backtrace: Backtrace },

    #[snafu(display("Missing transfer syntax"))]
    MissingTransferSyntax { backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Inspect the start of a byte stream for a PDU header,
/// returning the total length of the PDU including its header.
///
/// Returns `None` if fewer than [`PDU_HEADER_SIZE`] bytes are available.
pub fn pdu_length(buf: &[u8]) -> Option<usize> {
    if buf.len() < PDU_HEADER_SIZE as usize {
        return None;
    }
    let len = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
    Some(len as usize + PDU_HEADER_SIZE as usize)
}

/// Validate a PDU header before its body is buffered.
///
/// Fails on an unknown PDU type and, in strict mode,
/// on a P-DATA-TF length above `max_pdu_length` (0 for no limit).
/// Returns `Ok(())` if fewer than [`PDU_HEADER_SIZE`] bytes are available.
pub fn check_pdu_header(buf: &[u8], max_pdu_length: u32, strict: bool) -> Result<()> {
    if buf.len() < PDU_HEADER_SIZE as usize {
        return Ok(());
    }
    let pdu_type = buf[0];
    ensure!(
        (pdu_type::ASSOCIATE_RQ..=pdu_type::ABORT_RQ).contains(&pdu_type),
        UnknownPduTypeSnafu { pdu_type }
    );
    let pdu_length = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
    ensure!(
        !strict
            || pdu_type != pdu_type::P_DATA_TF
            || max_pdu_length == 0
            || pdu_length <= max_pdu_length,
        PduTooLargeSnafu {
            pdu_length,
            max_pdu_length
        }
    );
    Ok(())
}

/// Decode one complete PDU, header included.
///
/// `max_pdu_length` is the largest P-DATA-TF variable field
/// this side is willing to receive (0 for no limit).
/// An oversized P-DATA-TF PDU is an error in strict mode
/// and only logged otherwise.
pub fn read_pdu(bytes: impl Into<Bytes>, max_pdu_length: u32, strict: bool) -> Result<Pdu> {
    let mut cursor = ReadCursor::new(bytes, Endianness::Big);

    let pdu_type = cursor.read_u8().context(ReadSnafu { field: "type" })?;
    cursor.skip(1).context(ReadSnafu { field: "reserved" })?;
    let pdu_length = cursor.read_u32().context(ReadSnafu { field: "length" })?;

    ensure!(
        pdu_length as usize <= cursor.remaining(),
        TruncatedSnafu {
            pdu_length,
            available: cursor.remaining()
        }
    );

    if pdu_type == pdu_type::P_DATA_TF && max_pdu_length != 0 && pdu_length > max_pdu_length {
        ensure!(
            !strict,
            PduTooLargeSnafu {
                pdu_length,
                max_pdu_length
            }
        );
        warn!(
            "Incoming pdu was too large: length {}, maximum is {}",
            pdu_length, max_pdu_length
        );
    }

    let mut body = cursor
        .more(pdu_length as usize)
        .context(ReadSnafu { field: "body" })?;

    match pdu_type {
        pdu_type::ASSOCIATE_RQ => read_association_rq(&mut body).map(Pdu::AssociationRQ),
        pdu_type::ASSOCIATE_AC => read_association_ac(&mut body).map(Pdu::AssociationAC),
        pdu_type::ASSOCIATE_RJ => read_association_rj(&mut body).map(Pdu::AssociationRJ),
        pdu_type::P_DATA_TF => read_pdata(&mut body).map(|data| Pdu::PData { data }),
        pdu_type::RELEASE_RQ => Ok(Pdu::ReleaseRQ),
        pdu_type::RELEASE_RP => Ok(Pdu::ReleaseRP),
        pdu_type::ABORT_RQ => {
            // 7-8 - Reserved
            body.skip(2).context(ReadSnafu { field: "reserved" })?;
            // 9 - Source
            let source = body.read_u8().context(ReadSnafu { field: "Source" })?;
            // 10 - Reason/Diag.
            let reason = body.read_u8().context(ReadSnafu {
                field: "Reason/Diag.",
            })?;
            let source =
                AbortRQSource::from_codes(source, reason).context(InvalidAbortSourceOrReasonSnafu)?;
            Ok(Pdu::AbortRQ { source })
        }
        _ => UnknownPduTypeSnafu { pdu_type }.fail(),
    }
}

/// The fixed part shared by A-ASSOCIATE-RQ and A-ASSOCIATE-AC.
struct AssociationHeader {
    protocol_version: u16,
    called_ae_title: String,
    calling_ae_title: String,
}

fn read_association_header(c: &mut ReadCursor) -> Result<AssociationHeader> {
    // 7-8 - Protocol-version - one bit per supported version,
    // bit 0 for version 1
    let protocol_version = c.read_u16().context(ReadSnafu {
        field: "Protocol-version",
    })?;

    // 9-10 - Reserved
    c.skip(2).context(ReadSnafu { field: "reserved" })?;

    // 11-26 - Called-AE-title, 16 characters with
    // non-significant leading and trailing spaces
    let called_ae_title = read_ae_title(c, "Called-AE-title")?;

    // 27-42 - Calling-AE-title
    let calling_ae_title = read_ae_title(c, "Calling-AE-title")?;

    // 43-74 - Reserved
    c.skip(32).context(ReadSnafu { field: "reserved" })?;

    Ok(AssociationHeader {
        protocol_version,
        called_ae_title,
        calling_ae_title,
    })
}

fn read_association_rq(c: &mut ReadCursor) -> Result<AssociationRQ> {
    let header = read_association_header(c)?;

    let mut application_context_name = None;
    let mut presentation_contexts = vec![];
    let mut user_variables = vec![];

    // 75-xxx - Variable items: one Application Context item,
    // one or more Presentation Context items and one User Information item
    while !c.end() {
        let (item_type, mut item) = read_item(c)?;
        match item_type {
            item_type::APPLICATION_CONTEXT => {
                application_context_name = Some(read_uid(&mut item, "Application-context-name")?);
            }
            item_type::PRESENTATION_CONTEXT_RQ => {
                presentation_contexts.push(read_presentation_context_proposed(&mut item)?);
            }
            item_type::USER_INFORMATION => {
                user_variables = read_user_variables(&mut item)?;
            }
            _ => {
                return UnexpectedItemSnafu {
                    item_type,
                    context: "A-ASSOCIATE-RQ",
                }
                .fail()
            }
        }
    }

    Ok(AssociationRQ {
        protocol_version: header.protocol_version,
        called_ae_title: header.called_ae_title,
        calling_ae_title: header.calling_ae_title,
        application_context_name: application_context_name
            .context(MissingApplicationContextNameSnafu)?,
        presentation_contexts,
        user_variables,
    })
}

fn read_association_ac(c: &mut ReadCursor) -> Result<AssociationAC> {
    // the called and calling AE title fields are returned
    // as they were sent in the request, but shall not be tested
    let header = read_association_header(c)?;

    let mut application_context_name = None;
    let mut presentation_contexts = vec![];
    let mut user_variables = vec![];

    while !c.end() {
        let (item_type, mut item) = read_item(c)?;
        match item_type {
            item_type::APPLICATION_CONTEXT => {
                application_context_name = Some(read_uid(&mut item, "Application-context-name")?);
            }
            item_type::PRESENTATION_CONTEXT_AC => {
                presentation_contexts.push(read_presentation_context_result(&mut item)?);
            }
            item_type::USER_INFORMATION => {
                user_variables = read_user_variables(&mut item)?;
            }
            _ => {
                return UnexpectedItemSnafu {
                    item_type,
                    context: "A-ASSOCIATE-AC",
                }
                .fail()
            }
        }
    }

    Ok(AssociationAC {
        protocol_version: header.protocol_version,
        called_ae_title: header.called_ae_title,
        calling_ae_title: header.calling_ae_title,
        application_context_name: application_context_name
            .context(MissingApplicationContextNameSnafu)?,
        presentation_contexts,
        user_variables,
    })
}

fn read_association_rj(c: &mut ReadCursor) -> Result<AssociationRJ> {
    // 7 - Reserved
    c.skip(1).context(ReadSnafu { field: "reserved" })?;
    // 8 - Result
    let result = c.read_u8().context(ReadSnafu { field: "Result" })?;
    // 9 - Source
    let source = c.read_u8().context(ReadSnafu { field: "Source" })?;
    // 10 - Reason/Diag.
    let reason = c.read_u8().context(ReadSnafu {
        field: "Reason/Diag.",
    })?;

    Ok(AssociationRJ {
        result: AssociationRJResult::from_code(result)
            .context(InvalidRejectSourceOrReasonSnafu)?,
        source: AssociationRJSource::from_code(source)
            .context(InvalidRejectSourceOrReasonSnafu)?,
        reason,
    })
}

fn read_pdata(c: &mut ReadCursor) -> Result<Vec<PDataValue>> {
    let mut values = vec![];
    while !c.end() {
        // 1-4 - Item-length, counting the context ID,
        // the message control header and the fragment
        let length = c.read_u32().context(ReadSnafu {
            field: "Item-length",
        })?;
        ensure!(length >= 2, InvalidItemLengthSnafu { length });

        // 5 - Presentation-context-ID
        let presentation_context_id = c.read_u8().context(ReadSnafu {
            field: "Presentation-context-ID",
        })?;

        // 6 - Message control header: bit 0 command/data, bit 1 last fragment
        let header = c.read_u8().context(ReadSnafu {
            field: "Message Control Header",
        })?;
        let value_type = if header & 0x01 != 0 {
            PDataValueType::Command
        } else {
            PDataValueType::Data
        };
        let is_last = header & 0x02 != 0;

        let data = c
            .read_bytes(length as usize - 2)
            .context(ReadSnafu { field: "fragment" })?;

        values.push(PDataValue {
            presentation_context_id,
            value_type,
            is_last,
            data,
        });
    }
    Ok(values)
}

fn read_presentation_context_proposed(c: &mut ReadCursor) -> Result<PresentationContextProposed> {
    // 5 - Presentation-context-ID
    let id = c.read_u8().context(ReadSnafu {
        field: "Presentation-context-ID",
    })?;
    // 6-8 - Reserved
    c.skip(3).context(ReadSnafu { field: "reserved" })?;

    // 9-xxx - one Abstract Syntax sub-item and one or more Transfer Syntax sub-items
    let mut abstract_syntax = None;
    let mut transfer_syntaxes = vec![];
    while !c.end() {
        let (item_type, mut item) = read_item(c)?;
        match item_type {
            item_type::ABSTRACT_SYNTAX => {
                abstract_syntax = Some(read_uid(&mut item, "Abstract-syntax-name")?);
            }
            item_type::TRANSFER_SYNTAX => {
                transfer_syntaxes.push(read_uid(&mut item, "Transfer-syntax-name")?);
            }
            _ => {
                return UnexpectedItemSnafu {
                    item_type,
                    context: "Presentation Context item",
                }
                .fail()
            }
        }
    }
    ensure!(!transfer_syntaxes.is_empty(), MissingTransferSyntaxSnafu);

    Ok(PresentationContextProposed {
        id,
        abstract_syntax: abstract_syntax.context(MissingAbstractSyntaxSnafu)?,
        transfer_syntaxes,
    })
}

fn read_presentation_context_result(c: &mut ReadCursor) -> Result<PresentationContextResult> {
    // 5 - Presentation-context-ID
    let id = c.read_u8().context(ReadSnafu {
        field: "Presentation-context-ID",
    })?;
    // 6 - Reserved
    c.skip(1).context(ReadSnafu { field: "reserved" })?;
    // 7 - Result/Reason
    let reason = c.read_u8().context(ReadSnafu {
        field: "Result/Reason",
    })?;
    let reason = PresentationContextResultReason::from_code(reason)
        .context(InvalidPresentationContextResultReasonSnafu { reason })?;
    // 8 - Reserved
    c.skip(1).context(ReadSnafu { field: "reserved" })?;

    // 9-xxx - one Transfer Syntax sub-item, not significant
    // unless the context was accepted
    let mut transfer_syntax = None;
    while !c.end() {
        let (item_type, mut item) = read_item(c)?;
        match item_type {
            item_type::TRANSFER_SYNTAX => {
                transfer_syntax = Some(read_uid(&mut item, "Transfer-syntax-name")?);
            }
            _ => {
                return UnexpectedItemSnafu {
                    item_type,
                    context: "Presentation Context item",
                }
                .fail()
            }
        }
    }

    let transfer_syntax = match transfer_syntax {
        Some(ts) => ts,
        None if reason != PresentationContextResultReason::Acceptance => String::new(),
        None => return MissingTransferSyntaxSnafu.fail(),
    };

    Ok(PresentationContextResult {
        id,
        reason,
        transfer_syntax,
    })
}

fn read_user_variables(c: &mut ReadCursor) -> Result<Vec<UserVariableItem>> {
    let mut user_variables = vec![];
    while !c.end() {
        let (item_type, mut item) = read_item(c)?;
        let variable = match item_type {
            item_type::MAXIMUM_LENGTH => {
                // 5-8 - Maximum-length-received
                UserVariableItem::MaxLength(item.read_u32().context(ReadSnafu {
                    field: "Maximum-length-received",
                })?)
            }
            item_type::IMPLEMENTATION_CLASS_UID => UserVariableItem::ImplementationClassUID(
                read_uid(&mut item, "Implementation-class-uid")?,
            ),
            item_type::IMPLEMENTATION_VERSION_NAME => UserVariableItem::ImplementationVersionName(
                read_uid(&mut item, "Implementation-version-name")?,
            ),
            _ => {
                warn!("Unknown user information sub-item {:#04x}", item_type);
                UserVariableItem::Unknown(item_type, item.rest().to_vec())
            }
        };
        user_variables.push(variable);
    }
    Ok(user_variables)
}

/// Read an item header, returning the item type
/// and a cursor bounded to the item's body.
fn read_item(c: &mut ReadCursor) -> Result<(u8, ReadCursor)> {
    // 1 - Item-type
    let item_type = c.read_u8().context(ReadSnafu { field: "Item-type" })?;
    // 2 - Reserved
    c.skip(1).context(ReadSnafu { field: "reserved" })?;
    // 3-4 - Item-length
    let length = c.read_u16().context(ReadSnafu {
        field: "Item-length",
    })?;
    let body = c
        .more(length as usize)
        .context(ReadSnafu { field: "item" })?;
    Ok((item_type, body))
}

/// Read the whole remaining body as a UID or name,
/// dropping null padding and surrounding spaces.
fn read_uid(c: &mut ReadCursor, field: &'static str) -> Result<String> {
    let text = c.read_ascii(c.remaining()).context(ReadSnafu { field })?;
    Ok(text.trim_end_matches('\0').trim().to_string())
}

fn read_ae_title(c: &mut ReadCursor, field: &'static str) -> Result<String> {
    let text = c.read_ascii(16).context(ReadSnafu { field })?;
    Ok(text.trim_matches(|ch: char| ch == ' ' || ch == '\0').to_string())
}
