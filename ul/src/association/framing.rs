//! Reassembly of PDUs from a byte stream.
//!
//! Bytes arrive from the transport in chunks with no relation
//! to PDU boundaries. [`PduFramer`] accumulates them and hands out
//! one complete PDU buffer at a time, header included.
use crate::pdu::{pdu_length, PDU_HEADER_SIZE};
use bytes::{Bytes, BytesMut};
use tracing::trace;

/// A reassembly buffer for incoming PDUs.
#[derive(Debug, Default)]
pub struct PduFramer {
    buf: BytesMut,
}

impl PduFramer {
    pub fn new() -> Self {
        PduFramer::default()
    }

    /// Append newly received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take the next complete PDU, if one is fully buffered.
    ///
    /// Bytes following the PDU stay buffered
    /// as the start of the next one.
    pub fn next_pdu(&mut self) -> Option<Bytes> {
        let Some(len) = pdu_length(&self.buf) else {
            trace!("holding {} bytes, PDU header incomplete", self.buf.len());
            return None;
        };
        if self.buf.len() < len {
            trace!("holding {} of {} PDU bytes", self.buf.len(), len);
            return None;
        }
        if self.buf.len() > len {
            trace!(
                "PDU of {} bytes complete, {} bytes carried over",
                len,
                self.buf.len() - len
            );
        }
        Some(self.buf.split_to(len).freeze())
    }

    /// The header of the next PDU, once all of it is buffered.
    pub fn header(&self) -> Option<&[u8]> {
        self.buf.get(..PDU_HEADER_SIZE as usize)
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        if !self.buf.is_empty() {
            trace!("discarding {} buffered bytes", self.buf.len());
        }
        self.buf.clear();
    }

    /// The number of bytes buffered but not yet handed out.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE_RQ: &[u8] = &[0x05, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00];
    const PDATA: &[u8] = &[
        0x04, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x04, 0x01, 0x03, 0xca, 0xfe,
    ];

    fn drain(framer: &mut PduFramer) -> Vec<Bytes> {
        std::iter::from_fn(|| framer.next_pdu()).collect()
    }

    #[test]
    fn holds_incomplete_header() {
        let mut framer = PduFramer::new();
        framer.push(&PDATA[..5]);
        assert!(framer.next_pdu().is_none());
        assert_eq!(framer.pending_len(), 5);
        framer.push(&PDATA[5..]);
        assert_eq!(framer.next_pdu().as_deref(), Some(PDATA));
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn header_is_available_before_the_body() {
        let mut framer = PduFramer::new();
        framer.push(&PDATA[..4]);
        assert_eq!(framer.header(), None);
        framer.push(&PDATA[4..8]);
        assert_eq!(framer.header(), Some(&PDATA[..6]));
        assert!(framer.next_pdu().is_none());
        framer.clear();
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn splits_concatenated_pdus() {
        let mut framer = PduFramer::new();
        let mut stream = PDATA.to_vec();
        stream.extend_from_slice(RELEASE_RQ);
        stream.extend_from_slice(&PDATA[..3]);
        framer.push(&stream);
        let pdus = drain(&mut framer);
        assert_eq!(pdus, vec![Bytes::from_static(PDATA), Bytes::from_static(RELEASE_RQ)]);
        assert_eq!(framer.pending_len(), 3);
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let mut stream = PDATA.to_vec();
        stream.extend_from_slice(RELEASE_RQ);
        stream.extend_from_slice(PDATA);

        let mut whole = PduFramer::new();
        whole.push(&stream);
        let expected = drain(&mut whole);
        assert_eq!(expected.len(), 3);

        for chunk_size in 1..stream.len() {
            let mut framer = PduFramer::new();
            let mut pdus = vec![];
            for chunk in stream.chunks(chunk_size) {
                framer.push(chunk);
                pdus.extend(drain(&mut framer));
            }
            assert_eq!(pdus, expected, "chunk size {}", chunk_size);
            assert_eq!(framer.pending_len(), 0);
        }
    }
}
