//! PDU writer module
//!
//! Every PDU is first laid out as a list of [`Field`]s.
//! Each length field is computed from the fields it covers,
//! so that lengths are never set by hand.
use crate::pdu::*;
use bytes::Bytes;
use netdicom_encoding::field::{self, fields_len, fields_to_vec, Field};
use netdicom_encoding::Endianness;
use snafu::{ensure, Backtrace, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not encode field `{}`", field))]
    EncodeField {
        field: &'static str,
        #[snafu(backtrace)]
        source: field::Error,
    },

    #[snafu(display("Could not write PDU"))]
    WritePdu {
        #[snafu(backtrace)]
        source: field::Error,
    },

    #[snafu(display("{} of {} bytes does not fit its length field", what, len))]
    TooLong {
        what: &'static str,
        len: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Encode a PDU into a new buffer, header included.
pub fn write_pdu(pdu: &Pdu) -> Result<Vec<u8>> {
    let fields = pdu_fields(pdu)?;
    fields_to_vec(&fields, Endianness::Big).context(WritePduSnafu)
}

/// Lay out a PDU as a list of fields, header included.
pub fn pdu_fields(pdu: &Pdu) -> Result<Vec<Field>> {
    let body = match pdu {
        Pdu::AssociationRQ(rq) => {
            let mut body = association_header(
                rq.protocol_version,
                &rq.called_ae_title,
                &rq.calling_ae_title,
            )?;
            body.extend(uid_item(
                item_type::APPLICATION_CONTEXT,
                &rq.application_context_name,
            )?);
            for pc in &rq.presentation_contexts {
                body.extend(presentation_context_proposed(pc)?);
            }
            body.extend(user_information(&rq.user_variables)?);
            body
        }
        Pdu::AssociationAC(ac) => {
            let mut body = association_header(
                ac.protocol_version,
                &ac.called_ae_title,
                &ac.calling_ae_title,
            )?;
            body.extend(uid_item(
                item_type::APPLICATION_CONTEXT,
                &ac.application_context_name,
            )?);
            for pc in &ac.presentation_contexts {
                body.extend(presentation_context_result(pc)?);
            }
            body.extend(user_information(&ac.user_variables)?);
            body
        }
        Pdu::AssociationRJ(rj) => vec![
            Field::Reserved(1),
            Field::U8(rj.result as u8),
            Field::U8(rj.source as u8),
            Field::U8(rj.reason),
        ],
        Pdu::PData { data } => {
            let mut body = Vec::with_capacity(data.len() * 4);
            for pdv in data {
                let len = pdv.data.len() + 2;
                ensure!(
                    len <= u32::MAX as usize,
                    TooLongSnafu {
                        what: "PDV item",
                        len
                    }
                );
                body.push(Field::U32(len as u32));
                body.push(Field::U8(pdv.presentation_context_id));
                body.push(Field::U8(pdv.control_header()));
                body.push(Field::Buffer(pdv.data.clone()));
            }
            body
        }
        Pdu::ReleaseRQ | Pdu::ReleaseRP => vec![Field::Reserved(4)],
        Pdu::AbortRQ { source } => {
            let (source, reason) = source.to_codes();
            vec![Field::Reserved(2), Field::U8(source), Field::U8(reason)]
        }
    };

    let len = fields_len(&body);
    ensure!(len <= u32::MAX as usize, TooLongSnafu { what: "PDU", len });

    let mut fields = Vec::with_capacity(body.len() + 3);
    fields.push(Field::U8(pdu.pdu_type()));
    fields.push(Field::Reserved(1));
    fields.push(Field::U32(len as u32));
    fields.extend(body);
    Ok(fields)
}

fn association_header(
    protocol_version: u16,
    called_ae_title: &str,
    calling_ae_title: &str,
) -> Result<Vec<Field>> {
    Ok(vec![
        // 7-8 - Protocol-version
        Field::U16(protocol_version),
        // 9-10 - Reserved
        Field::Reserved(2),
        // 11-26 - Called-AE-title
        Field::filled(called_ae_title, 16, b' ').context(EncodeFieldSnafu {
            field: "Called-AE-title",
        })?,
        // 27-42 - Calling-AE-title
        Field::filled(calling_ae_title, 16, b' ').context(EncodeFieldSnafu {
            field: "Calling-AE-title",
        })?,
        // 43-74 - Reserved
        Field::Reserved(32),
    ])
}

fn presentation_context_proposed(pc: &PresentationContextProposed) -> Result<Vec<Field>> {
    let mut body = vec![
        // 5 - Presentation-context-ID
        Field::U8(pc.id),
        // 6-8 - Reserved
        Field::Reserved(3),
    ];
    body.extend(uid_item(item_type::ABSTRACT_SYNTAX, &pc.abstract_syntax)?);
    for ts in &pc.transfer_syntaxes {
        body.extend(uid_item(item_type::TRANSFER_SYNTAX, ts)?);
    }
    item(item_type::PRESENTATION_CONTEXT_RQ, body)
}

fn presentation_context_result(pc: &PresentationContextResult) -> Result<Vec<Field>> {
    let mut body = vec![
        // 5 - Presentation-context-ID
        Field::U8(pc.id),
        // 6 - Reserved
        Field::Reserved(1),
        // 7 - Result/Reason
        Field::U8(pc.reason as u8),
        // 8 - Reserved
        Field::Reserved(1),
    ];
    body.extend(uid_item(item_type::TRANSFER_SYNTAX, &pc.transfer_syntax)?);
    item(item_type::PRESENTATION_CONTEXT_AC, body)
}

fn user_information(user_variables: &[UserVariableItem]) -> Result<Vec<Field>> {
    let mut body = vec![];
    for variable in user_variables {
        body.extend(match variable {
            UserVariableItem::MaxLength(len) => {
                item(item_type::MAXIMUM_LENGTH, vec![Field::U32(*len)])?
            }
            UserVariableItem::ImplementationClassUID(uid) => {
                uid_item(item_type::IMPLEMENTATION_CLASS_UID, uid)?
            }
            UserVariableItem::ImplementationVersionName(name) => {
                uid_item(item_type::IMPLEMENTATION_VERSION_NAME, name)?
            }
            UserVariableItem::Unknown(item_type, data) => item(
                *item_type,
                vec![Field::Buffer(Bytes::copy_from_slice(data))],
            )?,
        });
    }
    item(item_type::USER_INFORMATION, body)
}

fn uid_item(item_type: u8, uid: &str) -> Result<Vec<Field>> {
    item(item_type, vec![Field::text(uid)])
}

/// Prepend an item header to the item's body.
fn item(item_type: u8, body: Vec<Field>) -> Result<Vec<Field>> {
    let len = fields_len(&body);
    ensure!(
        len <= u16::MAX as usize,
        TooLongSnafu { what: "item", len }
    );
    let mut fields = Vec::with_capacity(body.len() + 3);
    fields.push(Field::U8(item_type));
    fields.push(Field::Reserved(1));
    fields.push(Field::U16(len as u16));
    fields.extend(body);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::reader::read_pdu;
    use matches::assert_matches;

    fn association_rq() -> AssociationRQ {
        AssociationRQ {
            protocol_version: 1,
            calling_ae_title: "CALLING AE".to_string(),
            called_ae_title: "CALLED AE".to_string(),
            application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
            presentation_contexts: vec![
                PresentationContextProposed {
                    id: 1,
                    abstract_syntax: "1.2.840.10008.5.1.4.1.1.2".to_string(),
                    transfer_syntaxes: vec![
                        "1.2.840.10008.1.2".to_string(),
                        "1.2.840.10008.1.2.1".to_string(),
                    ],
                },
                PresentationContextProposed {
                    id: 3,
                    abstract_syntax: "1.2.840.10008.5.1.4.1.1.4".to_string(),
                    transfer_syntaxes: vec!["1.2.840.10008.1.2".to_string()],
                },
            ],
            user_variables: vec![
                UserVariableItem::MaxLength(16384),
                UserVariableItem::ImplementationClassUID("1.2.345.6.7890".to_string()),
                UserVariableItem::ImplementationVersionName("NETDICOM".to_string()),
                UserVariableItem::Unknown(0x54, vec![0x00, 0x01, 0x02]),
            ],
        }
    }

    #[test]
    fn association_rq_header_layout() {
        let bytes = write_pdu(&Pdu::AssociationRQ(association_rq())).unwrap();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 0x00);
        let len = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;
        assert_eq!(len + 6, bytes.len());
        // protocol version
        assert_eq!(&bytes[6..8], &[0x00, 0x01]);
        // called AE title, then calling AE title
        assert_eq!(&bytes[10..26], b"CALLED AE       ");
        assert_eq!(&bytes[26..42], b"CALLING AE      ");
        assert!(bytes[42..74].iter().all(|b| *b == 0));
        // application context item
        assert_eq!(bytes[74], 0x10);
        assert_eq!(&bytes[76..78], &[0x00, 21]);
        assert_eq!(&bytes[78..99], b"1.2.840.10008.3.1.1.1");
    }

    #[test]
    fn association_rq_reads_back() {
        let rq = association_rq();
        let bytes = write_pdu(&Pdu::AssociationRQ(rq.clone())).unwrap();
        let pdu = read_pdu(bytes, DEFAULT_MAX_PDU, true).unwrap();
        assert_eq!(pdu, Pdu::AssociationRQ(rq));
    }

    #[test]
    fn association_ac_reads_back() {
        let ac = AssociationAC {
            protocol_version: 1,
            calling_ae_title: "SCU".to_string(),
            called_ae_title: "SCP".to_string(),
            application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
            presentation_contexts: vec![
                PresentationContextResult {
                    id: 1,
                    reason: PresentationContextResultReason::AbstractSyntaxNotSupported,
                    transfer_syntax: "1.2.840.10008.1.2".to_string(),
                },
                PresentationContextResult {
                    id: 3,
                    reason: PresentationContextResultReason::Acceptance,
                    transfer_syntax: "1.2.840.10008.1.2.1".to_string(),
                },
            ],
            user_variables: vec![UserVariableItem::MaxLength(32768)],
        };
        let bytes = write_pdu(&Pdu::AssociationAC(ac.clone())).unwrap();
        let pdu = read_pdu(bytes, DEFAULT_MAX_PDU, true).unwrap();
        let Pdu::AssociationAC(read) = pdu else {
            panic!("expected A-ASSOCIATE-AC, got {:?}", pdu);
        };
        assert_eq!(read.max_pdu_length(), Some(32768));
        assert!(!read.presentation_contexts[0].is_accepted());
        assert!(read.presentation_contexts[1].is_accepted());
        assert_eq!(read, ac);
    }

    #[test]
    fn pdata_item_lengths_are_computed() {
        let pdu = Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id: 5,
                value_type: PDataValueType::Data,
                is_last: true,
                data: Bytes::from_static(&[1, 2, 3]),
            }],
        };
        let bytes = write_pdu(&pdu).unwrap();
        assert_eq!(
            bytes,
            vec![0x04, 0x00, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00, 0x05, 0x05, 0x02, 1, 2, 3]
        );
    }

    #[test]
    fn release_and_abort_layouts() {
        assert_eq!(
            write_pdu(&Pdu::ReleaseRQ).unwrap(),
            vec![0x05, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            write_pdu(&Pdu::AbortRQ {
                source: AbortRQSource::ServiceUser
            })
            .unwrap(),
            vec![0x07, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn overlong_ae_title_is_rejected() {
        let mut rq = association_rq();
        rq.called_ae_title = "THIS-AE-TITLE-IS-TOO-LONG".to_string();
        assert_matches!(
            write_pdu(&Pdu::AssociationRQ(rq)),
            Err(Error::EncodeField {
                field: "Called-AE-title",
                ..
            })
        );
    }
}
