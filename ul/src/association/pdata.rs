//! Presentation data value handling.
//!
//! Incoming PDVs are merged into whole DIMSE messages by
//! [`PdvAssembler`], across P-DATA-TF PDU boundaries if need be.
//! Outgoing messages are split into P-DATA-TF PDUs
//! which respect the peer's maximum length by [`fragment`].
use crate::pdu::{PDataValue, PDataValueType, Pdu, PDV_HEADER_SIZE};
use bytes::{Bytes, BytesMut};
use snafu::{ensure, Backtrace, Snafu};
use tracing::trace;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display(
        "PDV for context {} ({:?}) interrupts a message on context {} ({:?})",
        got_context,
        got_type,
        context,
        value_type
    ))]
    InterleavedFragment {
        context: u8,
        value_type: PDataValueType,
        got_context: u8,
        got_type: PDataValueType,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A whole message reassembled from its PDV fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledMessage {
    pub presentation_context_id: u8,
    pub value_type: PDataValueType,
    pub data: Bytes,
}

#[derive(Debug)]
struct Partial {
    presentation_context_id: u8,
    value_type: PDataValueType,
    data: BytesMut,
}

/// Merges PDV fragments into whole messages.
///
/// An incomplete message is kept until its last fragment arrives.
#[derive(Debug, Default)]
pub struct PdvAssembler {
    pending: Option<Partial>,
}

impl PdvAssembler {
    pub fn new() -> Self {
        PdvAssembler::default()
    }

    /// Feed one PDV, returning the message it completes, if any.
    pub fn push(&mut self, pdv: PDataValue) -> Result<Option<AssembledMessage>> {
        if let Some(partial) = &self.pending {
            ensure!(
                partial.presentation_context_id == pdv.presentation_context_id
                    && partial.value_type == pdv.value_type,
                InterleavedFragmentSnafu {
                    context: partial.presentation_context_id,
                    value_type: partial.value_type,
                    got_context: pdv.presentation_context_id,
                    got_type: pdv.value_type,
                }
            );
        }

        match (self.pending.take(), pdv.is_last) {
            // single-fragment message, no copy needed
            (None, true) => Ok(Some(AssembledMessage {
                presentation_context_id: pdv.presentation_context_id,
                value_type: pdv.value_type,
                data: pdv.data,
            })),
            (None, false) => {
                trace!("first fragment of {} bytes held", pdv.data.len());
                self.pending = Some(Partial {
                    presentation_context_id: pdv.presentation_context_id,
                    value_type: pdv.value_type,
                    data: BytesMut::from(&pdv.data[..]),
                });
                Ok(None)
            }
            (Some(mut partial), is_last) => {
                partial.data.extend_from_slice(&pdv.data);
                if is_last {
                    Ok(Some(AssembledMessage {
                        presentation_context_id: partial.presentation_context_id,
                        value_type: partial.value_type,
                        data: partial.data.freeze(),
                    }))
                } else {
                    trace!("fragment held, {} bytes so far", partial.data.len());
                    self.pending = Some(partial);
                    Ok(None)
                }
            }
        }
    }

    /// Whether part of a message is waiting for more fragments.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Split a message into P-DATA-TF PDUs of one PDV each,
/// so that no PDU's variable field exceeds `max_pdu_length`
/// (0 for no limit).
///
/// Only the final PDV has the last-fragment bit set.
pub fn fragment(
    presentation_context_id: u8,
    value_type: PDataValueType,
    data: Bytes,
    max_pdu_length: u32,
) -> Vec<Pdu> {
    let max_fragment = if max_pdu_length == 0 {
        usize::MAX
    } else {
        // a peer announcing a tiny maximum still gets one byte per PDV
        (max_pdu_length.saturating_sub(PDV_HEADER_SIZE) as usize).max(1)
    };

    if data.len() <= max_fragment {
        return vec![Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id,
                value_type,
                is_last: true,
                data,
            }],
        }];
    }

    let mut pdus = Vec::with_capacity(data.len() / max_fragment + 1);
    let mut rest = data;
    while !rest.is_empty() {
        let chunk = rest.split_to(max_fragment.min(rest.len()));
        pdus.push(Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id,
                value_type,
                is_last: rest.is_empty(),
                data: chunk,
            }],
        });
    }
    pdus
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;

    fn pdv(context: u8, value_type: PDataValueType, is_last: bool, data: &'static [u8]) -> PDataValue {
        PDataValue {
            presentation_context_id: context,
            value_type,
            is_last,
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn merges_three_fragments() {
        let mut assembler = PdvAssembler::new();
        assert_eq!(
            assembler
                .push(pdv(1, PDataValueType::Data, false, b"ab"))
                .unwrap(),
            None
        );
        assert_eq!(
            assembler
                .push(pdv(1, PDataValueType::Data, false, b"cde"))
                .unwrap(),
            None
        );
        assert!(assembler.has_pending());
        let message = assembler
            .push(pdv(1, PDataValueType::Data, true, b"f"))
            .unwrap()
            .unwrap();
        assert_eq!(message.presentation_context_id, 1);
        assert_eq!(message.value_type, PDataValueType::Data);
        assert_eq!(&message.data[..], b"abcdef");
        assert!(!assembler.has_pending());
    }

    #[test]
    fn single_fragment_passes_through() {
        let mut assembler = PdvAssembler::new();
        let message = assembler
            .push(pdv(3, PDataValueType::Command, true, b"cmd"))
            .unwrap()
            .unwrap();
        assert_eq!(message.value_type, PDataValueType::Command);
        assert_eq!(&message.data[..], b"cmd");
    }

    #[test]
    fn interleaved_fragment_is_an_error() {
        let mut assembler = PdvAssembler::new();
        assembler
            .push(pdv(1, PDataValueType::Command, false, b"x"))
            .unwrap();
        assert_matches!(
            assembler.push(pdv(1, PDataValueType::Data, true, b"y")),
            Err(Error::InterleavedFragment { context: 1, .. })
        );
    }

    #[test]
    fn fragments_respect_max_length() {
        let data = Bytes::from((0..25_u8).collect::<Vec<_>>());
        // 16 byte PDUs leave 10 bytes per fragment
        let pdus = fragment(7, PDataValueType::Data, data.clone(), 16);
        assert_eq!(pdus.len(), 3);

        let mut joined = Vec::new();
        for (i, pdu) in pdus.iter().enumerate() {
            let Pdu::PData { data: pdvs } = pdu else {
                panic!("expected P-DATA-TF, got {:?}", pdu);
            };
            assert_eq!(pdvs.len(), 1);
            assert_eq!(pdvs[0].presentation_context_id, 7);
            assert_eq!(pdvs[0].is_last, i == 2);
            assert!(pdvs[0].data.len() <= 10);
            joined.extend_from_slice(&pdvs[0].data);
        }
        assert_eq!(joined, data.to_vec());
    }

    #[test]
    fn unlimited_length_sends_one_pdu() {
        let pdus = fragment(1, PDataValueType::Command, Bytes::from_static(&[0; 100]), 0);
        assert_eq!(pdus.len(), 1);
        assert_matches!(&pdus[0], Pdu::PData { data } if data[0].is_last);
    }
}
