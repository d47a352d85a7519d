//! Data element and data set codec.
//!
//! An [`ElementCodec`] reads and writes data elements
//! in one transfer syntax.
//! Under implicit VR, the value representation of each element
//! is looked up in a data dictionary, so a dictionary miss is an error.
//! Under explicit VR, the dictionary only contributes
//! the value multiplicity.
//!
//! Sequences are always written with undefined lengths,
//! each item ending in an item delimitation item
//! and the sequence ending in a sequence delimitation item.
//! Both defined and undefined lengths are accepted on reading.

use crate::cursor::{ReadCursor, WriteCursor};
use crate::error::{
    LengthOverflowSnafu, ReadSnafu, Result, UnexpectedDelimiterSnafu,
    UnexpectedSequenceTagSnafu, UnknownTagSnafu, UnknownVrSnafu, WriteSnafu,
};
use crate::field::{fields_len, fields_to_vec, write_fields, Field};
use crate::transfer_syntax::TransferSyntax;
use crate::vr::{self, has_long_explicit_length, UNDEFINED_LENGTH};
use bytes::Bytes;
use netdicom_core::dictionary::{DataDictionary, DictionaryEntry};
use netdicom_core::{DataElement, DataSet, Tag, Value, VM, VR};
use netdicom_dictionary_std::StandardDataDictionary;
use snafu::{ensure, OptionExt, ResultExt};
use tracing::trace;

/// A codec of data elements for a specific transfer syntax.
#[derive(Debug, Clone)]
pub struct ElementCodec<D = StandardDataDictionary> {
    ts: TransferSyntax,
    dict: D,
}

impl ElementCodec<StandardDataDictionary> {
    /// Create a codec backed by the standard data dictionary.
    pub fn new(ts: TransferSyntax) -> Self {
        ElementCodec {
            ts,
            dict: StandardDataDictionary,
        }
    }

    /// The codec for DIMSE command sets,
    /// which are always in implicit VR little endian.
    pub fn command() -> Self {
        Self::new(TransferSyntax::ImplicitVrLittleEndian)
    }
}

impl<D> ElementCodec<D>
where
    D: DataDictionary,
{
    /// Create a codec backed by the given data dictionary.
    pub fn with_dictionary(ts: TransferSyntax, dict: D) -> Self {
        ElementCodec { ts, dict }
    }

    /// The transfer syntax of this codec.
    pub fn transfer_syntax(&self) -> TransferSyntax {
        self.ts
    }

    /// Create a data element, taking the value representation
    /// and multiplicity from the data dictionary.
    pub fn element_by_tag(&self, tag: Tag, value: impl Into<Value>) -> Result<DataElement> {
        let entry = self.dict.by_tag(tag).context(UnknownTagSnafu { tag })?;
        Ok(DataElement::with_vm(tag, entry.vr(), entry.vm(), value))
    }

    /// Read one data element at the cursor's position.
    ///
    /// The cursor's byte order is switched to the codec's
    /// for the duration of the read.
    pub fn read_element(&self, cursor: &mut ReadCursor) -> Result<DataElement> {
        cursor.scoped(self.ts.endianness(), |c| self.read_element_here(c))
    }

    fn read_element_here(&self, cursor: &mut ReadCursor) -> Result<DataElement> {
        let tag = read_tag(cursor)?;
        ensure!(!tag.is_item_related(), UnexpectedDelimiterSnafu { tag });

        let entry = self.dict.by_tag(tag);
        let (vr, length) = if self.ts.is_explicit_vr() {
            let vr = read_vr(cursor, tag)?;
            (vr, read_explicit_length(cursor, vr)?)
        } else {
            let vr = entry.map(|e| e.vr()).context(UnknownTagSnafu { tag })?;
            let length = cursor.read_u32().context(ReadSnafu {
                what: "element length",
            })?;
            (vr, length)
        };
        let vm = entry.map(|e| e.vm()).unwrap_or(VM::Single);
        trace!("element {} {} length {}", tag, vr, length);

        let value = vr::read_value(self, vr, cursor, length)?;
        Ok(DataElement::with_vm(tag, vr, vm, value))
    }

    /// Read data elements until the cursor is exhausted.
    pub fn read_dataset(&self, mut cursor: ReadCursor) -> Result<DataSet> {
        let mut dataset = DataSet::new();
        while !cursor.end() {
            dataset.put(self.read_element(&mut cursor)?);
        }
        Ok(dataset)
    }

    /// Decode a whole data set from a byte buffer.
    pub fn decode_dataset(&self, bytes: impl Into<Bytes>) -> Result<DataSet> {
        self.read_dataset(ReadCursor::new(bytes, self.ts.endianness()))
    }

    /// Read the items of a sequence value of the given length.
    pub(crate) fn read_sequence(&self, cursor: &mut ReadCursor, length: u32) -> Result<Vec<DataSet>> {
        let undefined = length == UNDEFINED_LENGTH;
        let start = cursor.position();
        let mut items = Vec::new();
        loop {
            if undefined {
                // tolerate a missing sequence delimiter at the end of the data
                if cursor.end() {
                    break;
                }
            } else if cursor.position() - start >= length as usize {
                break;
            }

            let tag = read_tag(cursor)?;
            let item_length = cursor.read_u32().context(ReadSnafu {
                what: "item length",
            })?;
            if tag == Tag::SEQUENCE_DELIMITER {
                break;
            }
            ensure!(tag == Tag::ITEM, UnexpectedSequenceTagSnafu { tag });

            let item = if item_length == UNDEFINED_LENGTH {
                let extent = self.item_extent(cursor)?;
                let item = cursor.more(extent).context(ReadSnafu { what: "item" })?;
                // item delimitation item
                cursor.skip(8).context(ReadSnafu { what: "item" })?;
                item
            } else {
                cursor
                    .more(item_length as usize)
                    .context(ReadSnafu { what: "item" })?
            };
            items.push(self.read_dataset(item)?);
        }
        Ok(items)
    }

    /// Find the number of bytes up to the delimiter
    /// of an undefined-length item starting at the cursor.
    ///
    /// The scan walks element headers without decoding values,
    /// balancing nested undefined-length sequences and items.
    fn item_extent(&self, cursor: &ReadCursor) -> Result<usize> {
        let mut lookahead = cursor.clone();
        let start = lookahead.position();
        let mut depth = 0usize;
        loop {
            let at = lookahead.position();
            let tag = read_tag(&mut lookahead)?;
            let length = if tag.is_item_related() {
                let length = lookahead.read_u32().context(ReadSnafu {
                    what: "item length",
                })?;
                if tag == Tag::ITEM_DELIMITER || tag == Tag::SEQUENCE_DELIMITER {
                    if depth == 0 {
                        ensure!(tag == Tag::ITEM_DELIMITER, UnexpectedSequenceTagSnafu { tag });
                        return Ok(at - start);
                    }
                    depth -= 1;
                    continue;
                }
                length
            } else if self.ts.is_explicit_vr() {
                let vr = read_vr(&mut lookahead, tag)?;
                read_explicit_length(&mut lookahead, vr)?
            } else {
                lookahead.read_u32().context(ReadSnafu {
                    what: "element length",
                })?
            };

            if length == UNDEFINED_LENGTH {
                depth += 1;
            } else {
                lookahead
                    .skip(length as usize)
                    .context(ReadSnafu { what: "element" })?;
            }
        }
    }

    /// Lay out a data element as fields.
    pub fn element_fields(&self, element: &DataElement) -> Result<Vec<Field>> {
        let vr = element.vr();
        let value = vr::value_fields(self, vr, element.value())?;
        let length = if vr == VR::SQ {
            UNDEFINED_LENGTH
        } else {
            let length = fields_len(&value);
            ensure!(
                length < UNDEFINED_LENGTH as usize,
                LengthOverflowSnafu {
                    tag: element.tag(),
                    vr,
                    len: length
                }
            );
            length as u32
        };

        let mut fields = Vec::with_capacity(value.len() + 5);
        push_tag(&mut fields, element.tag());
        if self.ts.is_explicit_vr() {
            fields.push(Field::text(vr.to_string()));
            if has_long_explicit_length(vr) {
                fields.push(Field::Reserved(2));
                fields.push(Field::U32(length));
            } else {
                ensure!(
                    length <= u32::from(u16::MAX),
                    LengthOverflowSnafu {
                        tag: element.tag(),
                        vr,
                        len: length as usize
                    }
                );
                fields.push(Field::U16(length as u16));
            }
        } else {
            fields.push(Field::U32(length));
        }
        fields.extend(value);
        Ok(fields)
    }

    /// Lay out all elements of a data set as fields, in ascending tag order.
    pub fn dataset_fields(&self, dataset: &DataSet) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        for element in dataset {
            fields.extend(self.element_fields(element)?);
        }
        Ok(fields)
    }

    /// Lay out sequence items with undefined lengths,
    /// followed by the sequence delimitation item.
    pub(crate) fn sequence_fields(&self, items: &[DataSet]) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        for item in items {
            push_tag(&mut fields, Tag::ITEM);
            fields.push(Field::U32(UNDEFINED_LENGTH));
            fields.extend(self.dataset_fields(item)?);
            push_tag(&mut fields, Tag::ITEM_DELIMITER);
            fields.push(Field::U32(0));
        }
        push_tag(&mut fields, Tag::SEQUENCE_DELIMITER);
        fields.push(Field::U32(0));
        Ok(fields)
    }

    /// Write a data element at the cursor's position.
    pub fn write_element(&self, cursor: &mut WriteCursor, element: &DataElement) -> Result<()> {
        let fields = self.element_fields(element)?;
        cursor
            .scoped(self.ts.endianness(), |c| write_fields(c, &fields))
            .context(WriteSnafu { what: "data element" })
    }

    /// Encode a whole data set.
    pub fn encode_dataset(&self, dataset: &DataSet) -> Result<Vec<u8>> {
        let fields = self.dataset_fields(dataset)?;
        fields_to_vec(&fields, self.ts.endianness()).context(WriteSnafu { what: "data set" })
    }
}

/// Create a data element using the standard data dictionary
/// to resolve its value representation and multiplicity.
pub fn element_by_tag(tag: Tag, value: impl Into<Value>) -> Result<DataElement> {
    ElementCodec::command().element_by_tag(tag, value)
}

fn push_tag(fields: &mut Vec<Field>, tag: Tag) {
    fields.push(Field::U16(tag.group()));
    fields.push(Field::U16(tag.element()));
}

fn read_tag(cursor: &mut ReadCursor) -> Result<Tag> {
    let group = cursor.read_u16().context(ReadSnafu { what: "tag" })?;
    let element = cursor.read_u16().context(ReadSnafu { what: "tag" })?;
    Ok(Tag(group, element))
}

fn read_vr(cursor: &mut ReadCursor, tag: Tag) -> Result<VR> {
    let a = cursor.read_u8().context(ReadSnafu { what: "VR" })?;
    let b = cursor.read_u8().context(ReadSnafu { what: "VR" })?;
    VR::from_binary([a, b]).context(UnknownVrSnafu { tag, bytes: [a, b] })
}

fn read_explicit_length(cursor: &mut ReadCursor, vr: VR) -> Result<u32> {
    if has_long_explicit_length(vr) {
        cursor
            .skip(2)
            .and_then(|_| cursor.read_u32())
            .context(ReadSnafu {
                what: "element length",
            })
    } else {
        cursor.read_u16().map(u32::from).context(ReadSnafu {
            what: "element length",
        })
    }
}
