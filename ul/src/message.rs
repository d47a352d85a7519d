//! DIMSE messages.
//!
//! A DIMSE message is either a command set,
//! always encoded in implicit VR little endian,
//! or a data set in the presentation context's transfer syntax.
//! [`Command`] wraps the command set with typed constructors
//! and accessors for the attributes used by the composite services.
use bytes::Bytes;
use netdicom_core::{DataElement, DataSet, Tag, VR};
use netdicom_dictionary_std::{tags, uids};
use netdicom_encoding::field::{self, fields_len, fields_to_vec};
use netdicom_encoding::{ElementCodec, Endianness};
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not encode command set"))]
    EncodeCommand {
        #[snafu(backtrace)]
        source: netdicom_encoding::Error,
    },
    #[snafu(display("Could not write command set"))]
    WriteCommand {
        #[snafu(backtrace)]
        source: field::Error,
    },
    #[snafu(display("Command set of {} bytes is too long", len))]
    CommandTooLong { len: usize, backtrace: Backtrace },
    #[snafu(display("Could not decode command set"))]
    DecodeCommand {
        #[snafu(backtrace)]
        source: netdicom_encoding::Error,
    },
    #[snafu(display("Command set has no command field"))]
    MissingCommandField { backtrace: Backtrace },
    #[snafu(display("Unknown command field {:#06x}", code))]
    UnknownCommandField { code: u16, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The DIMSE-C command field codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CommandField {
    CStoreRq = 0x0001,
    CStoreRsp = 0x8001,
    CGetRq = 0x0010,
    CGetRsp = 0x8010,
    CFindRq = 0x0020,
    CFindRsp = 0x8020,
    CMoveRq = 0x0021,
    CMoveRsp = 0x8021,
    CEchoRq = 0x0030,
    CEchoRsp = 0x8030,
    CCancelRq = 0x0FFF,
}

impl CommandField {
    pub fn from_code(code: u16) -> Option<Self> {
        use CommandField::*;
        Some(match code {
            0x0001 => CStoreRq,
            0x8001 => CStoreRsp,
            0x0010 => CGetRq,
            0x8010 => CGetRsp,
            0x0020 => CFindRq,
            0x8020 => CFindRsp,
            0x0021 => CMoveRq,
            0x8021 => CMoveRsp,
            0x0030 => CEchoRq,
            0x8030 => CEchoRsp,
            0x0FFF => CCancelRq,
            _ => return None,
        })
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    /// Whether this is the command field of a response.
    pub fn is_response(self) -> bool {
        self.code() & 0x8000 != 0
    }

    /// The response command field matching this request,
    /// or `None` for responses and C-CANCEL-RQ.
    pub fn response(self) -> Option<Self> {
        if self.is_response() || self == CommandField::CCancelRq {
            None
        } else {
            Self::from_code(self.code() | 0x8000)
        }
    }

    /// The command name, as in "C-FIND-RQ".
    pub fn name(self) -> &'static str {
        use CommandField::*;
        match self {
            CStoreRq => "C-STORE-RQ",
            CStoreRsp => "C-STORE-RSP",
            CGetRq => "C-GET-RQ",
            CGetRsp => "C-GET-RSP",
            CFindRq => "C-FIND-RQ",
            CFindRsp => "C-FIND-RSP",
            CMoveRq => "C-MOVE-RQ",
            CMoveRsp => "C-MOVE-RSP",
            CEchoRq => "C-ECHO-RQ",
            CEchoRsp => "C-ECHO-RSP",
            CCancelRq => "C-CANCEL-RQ",
        }
    }
}

impl fmt::Display for CommandField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    Low = 0x0002,
    #[default]
    Medium = 0x0000,
    High = 0x0001,
}

impl Priority {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0002 => Some(Priority::Low),
            0x0000 => Some(Priority::Medium),
            0x0001 => Some(Priority::High),
            _ => None,
        }
    }
}

/// Command data set type value stating that no data set follows.
pub const DATA_SET_ABSENT: u16 = 0x0101;

/// Command data set type value written when a data set follows.
/// Any value other than [`DATA_SET_ABSENT`] means the same on reading.
pub const DATA_SET_PRESENT: u16 = 0x0001;

/// A DIMSE status code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Status(pub u16);

impl Status {
    pub const SUCCESS: Status = Status(0x0000);
    pub const PENDING: Status = Status(0xFF00);
    pub const PENDING_WITH_WARNINGS: Status = Status(0xFF01);
    pub const CANCEL: Status = Status(0xFE00);
    /// Refused: out of resources.
    pub const OUT_OF_RESOURCES: Status = Status(0xA700);
    /// Generic processing failure.
    pub const PROCESSING_FAILURE: Status = Status(0x0110);
    /// Error: cannot understand.
    pub const CANNOT_UNDERSTAND: Status = Status(0xC000);

    pub fn is_success(self) -> bool {
        self.0 == 0x0000
    }

    pub fn is_warning(self) -> bool {
        self.0 == 0x0001 || self.0 & 0xF000 == 0xB000
    }

    pub fn is_failure(self) -> bool {
        let nibble = self.0 & 0xF000;
        nibble == 0xA000 || nibble == 0xC000 || self.0 & 0xFF00 == 0x0100
    }

    pub fn is_pending(self) -> bool {
        self.0 == 0xFF00 || self.0 == 0xFF01
    }

    pub fn is_cancel(self) -> bool {
        self.0 == 0xFE00
    }

    /// Whether no further responses follow a response with this status.
    ///
    /// Only success, failure and cancel are final.
    /// Warnings and unclassified codes are not.
    pub fn is_final(self) -> bool {
        self.is_success() || self.is_failure() || self.is_cancel()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = if self.is_success() {
            "success"
        } else if self.is_pending() {
            "pending"
        } else if self.is_cancel() {
            "cancel"
        } else if self.is_warning() {
            "warning"
        } else if self.is_failure() {
            "failure"
        } else {
            "unknown"
        };
        write!(f, "{:#06X} ({})", self.0, class)
    }
}

/// A DIMSE command set.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    field: CommandField,
    elements: DataSet,
}

impl Command {
    /// Create a command with the given command field
    /// and no data set.
    pub fn new(field: CommandField) -> Self {
        let mut elements = DataSet::new();
        elements.put(DataElement::new(tags::COMMAND_FIELD, VR::US, field.code()));
        elements.put(DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            DATA_SET_ABSENT,
        ));
        Command { field, elements }
    }

    /// Interpret a decoded command set.
    pub fn from_dataset(elements: DataSet) -> Result<Self> {
        let code = elements
            .get(tags::COMMAND_FIELD)
            .and_then(|e| e.uint16().ok())
            .context(MissingCommandFieldSnafu)?;
        let field = CommandField::from_code(code).context(UnknownCommandFieldSnafu { code })?;
        Ok(Command { field, elements })
    }

    /// A C-FIND-RQ for the given query model.
    pub fn find_rq(sop_class_uid: &str, priority: Priority) -> Self {
        Command::new(CommandField::CFindRq)
            .with_affected_sop_class_uid(sop_class_uid)
            .with_priority(priority)
    }

    /// A C-GET-RQ for the given retrieve model.
    pub fn get_rq(sop_class_uid: &str, priority: Priority) -> Self {
        Command::new(CommandField::CGetRq)
            .with_affected_sop_class_uid(sop_class_uid)
            .with_priority(priority)
    }

    /// A C-MOVE-RQ sending the matches to `destination`.
    pub fn move_rq(sop_class_uid: &str, destination: &str, priority: Priority) -> Self {
        Command::new(CommandField::CMoveRq)
            .with_affected_sop_class_uid(sop_class_uid)
            .with_priority(priority)
            .with_move_destination(destination)
    }

    /// A C-STORE-RQ for one SOP instance.
    pub fn store_rq(sop_class_uid: &str, sop_instance_uid: &str, priority: Priority) -> Self {
        Command::new(CommandField::CStoreRq)
            .with_affected_sop_class_uid(sop_class_uid)
            .with_affected_sop_instance_uid(sop_instance_uid)
            .with_priority(priority)
    }

    /// A C-ECHO-RQ.
    pub fn echo_rq() -> Self {
        Command::new(CommandField::CEchoRq).with_affected_sop_class_uid(uids::VERIFICATION)
    }

    /// A C-CANCEL-RQ for the outstanding request `message_id`.
    pub fn cancel_rq(message_id: u16) -> Self {
        Command::new(CommandField::CCancelRq).with_responded_to(message_id)
    }

    /// A response to `request` with the given status.
    ///
    /// Returns `None` if the request has no response counterpart.
    pub fn response_to(request: &Command, status: Status) -> Option<Self> {
        let field = request.field.response()?;
        let mut response = Command::new(field).with_status(status);
        if let Some(uid) = request.affected_sop_class_uid() {
            response = response.with_affected_sop_class_uid(&uid);
        }
        if let Some(id) = request.message_id() {
            response = response.with_responded_to(id);
        }
        Some(response)
    }

    /// The C-STORE-RSP answering a C-STORE-RQ.
    pub fn store_rsp(request: &Command, status: Status) -> Self {
        let mut response = Command::new(CommandField::CStoreRsp).with_status(status);
        if let Some(uid) = request.affected_sop_class_uid() {
            response = response.with_affected_sop_class_uid(&uid);
        }
        if let Some(uid) = request.affected_sop_instance_uid() {
            response = response.with_affected_sop_instance_uid(&uid);
        }
        if let Some(id) = request.message_id() {
            response = response.with_responded_to(id);
        }
        response
    }

    pub fn with_affected_sop_class_uid(mut self, uid: &str) -> Self {
        self.put_str(tags::AFFECTED_SOP_CLASS_UID, VR::UI, uid);
        self
    }

    pub fn with_affected_sop_instance_uid(mut self, uid: &str) -> Self {
        self.put_str(tags::AFFECTED_SOP_INSTANCE_UID, VR::UI, uid);
        self
    }

    pub fn with_message_id(mut self, id: u16) -> Self {
        self.set_message_id(id);
        self
    }

    pub fn with_responded_to(mut self, id: u16) -> Self {
        self.put_u16(tags::MESSAGE_ID_BEING_RESPONDED_TO, id);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.put_u16(tags::PRIORITY, priority as u16);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.put_u16(tags::STATUS, status.0);
        self
    }

    pub fn with_data_set(mut self, present: bool) -> Self {
        self.set_data_set_present(present);
        self
    }

    pub fn with_move_destination(mut self, ae_title: &str) -> Self {
        self.put_str(tags::MOVE_DESTINATION, VR::AE, ae_title);
        self
    }

    pub fn with_move_originator(mut self, ae_title: &str, message_id: u16) -> Self {
        self.put_str(tags::MOVE_ORIGINATOR_APPLICATION_ENTITY_TITLE, VR::AE, ae_title);
        self.put_u16(tags::MOVE_ORIGINATOR_MESSAGE_ID, message_id);
        self
    }

    /// Set the sub-operation counters:
    /// remaining, completed, failed and warning.
    pub fn with_sub_operations(
        mut self,
        remaining: u16,
        completed: u16,
        failed: u16,
        warning: u16,
    ) -> Self {
        self.put_u16(tags::NUMBER_OF_REMAINING_SUBOPERATIONS, remaining);
        self.put_u16(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS, completed);
        self.put_u16(tags::NUMBER_OF_FAILED_SUBOPERATIONS, failed);
        self.put_u16(tags::NUMBER_OF_WARNING_SUBOPERATIONS, warning);
        self
    }

    /// Add or replace any command element.
    pub fn with_element(mut self, element: DataElement) -> Self {
        self.elements.put(element);
        self
    }

    pub fn set_message_id(&mut self, id: u16) {
        self.put_u16(tags::MESSAGE_ID, id);
    }

    pub fn set_data_set_present(&mut self, present: bool) {
        let value = if present {
            DATA_SET_PRESENT
        } else {
            DATA_SET_ABSENT
        };
        self.put_u16(tags::COMMAND_DATA_SET_TYPE, value);
    }

    fn put_u16(&mut self, tag: Tag, value: u16) {
        self.elements.put(DataElement::new(tag, VR::US, value));
    }

    fn put_str(&mut self, tag: Tag, vr: VR, value: &str) {
        self.elements.put(DataElement::new(tag, vr, value));
    }

    fn u16_at(&self, tag: Tag) -> Option<u16> {
        self.elements.get(tag).and_then(|e| e.uint16().ok())
    }

    fn str_at(&self, tag: Tag) -> Option<Cow<'_, str>> {
        self.elements
            .get(tag)
            .and_then(|e| e.to_str().ok())
            .filter(|s| !s.is_empty())
    }

    pub fn command_field(&self) -> CommandField {
        self.field
    }

    /// The command name, for logging.
    pub fn name(&self) -> &'static str {
        self.field.name()
    }

    pub fn is_response(&self) -> bool {
        self.field.is_response()
    }

    pub fn message_id(&self) -> Option<u16> {
        self.u16_at(tags::MESSAGE_ID)
    }

    pub fn responded_to(&self) -> Option<u16> {
        self.u16_at(tags::MESSAGE_ID_BEING_RESPONDED_TO)
    }

    pub fn priority(&self) -> Option<Priority> {
        self.u16_at(tags::PRIORITY).and_then(Priority::from_code)
    }

    pub fn status(&self) -> Option<Status> {
        self.u16_at(tags::STATUS).map(Status)
    }

    /// Whether a data set message follows this command.
    pub fn has_data_set(&self) -> bool {
        self.u16_at(tags::COMMAND_DATA_SET_TYPE)
            .map_or(false, |v| v != DATA_SET_ABSENT)
    }

    /// Whether this is a response with a final status.
    pub fn is_final(&self) -> bool {
        self.is_response() && self.status().map_or(false, Status::is_final)
    }

    pub fn affected_sop_class_uid(&self) -> Option<Cow<'_, str>> {
        self.str_at(tags::AFFECTED_SOP_CLASS_UID)
    }

    pub fn affected_sop_instance_uid(&self) -> Option<Cow<'_, str>> {
        self.str_at(tags::AFFECTED_SOP_INSTANCE_UID)
    }

    pub fn move_destination(&self) -> Option<Cow<'_, str>> {
        self.str_at(tags::MOVE_DESTINATION)
    }

    pub fn move_originator_ae_title(&self) -> Option<Cow<'_, str>> {
        self.str_at(tags::MOVE_ORIGINATOR_APPLICATION_ENTITY_TITLE)
    }

    pub fn move_originator_message_id(&self) -> Option<u16> {
        self.u16_at(tags::MOVE_ORIGINATOR_MESSAGE_ID)
    }

    pub fn remaining_sub_operations(&self) -> Option<u16> {
        self.u16_at(tags::NUMBER_OF_REMAINING_SUBOPERATIONS)
    }

    pub fn completed_sub_operations(&self) -> Option<u16> {
        self.u16_at(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS)
    }

    pub fn failed_sub_operations(&self) -> Option<u16> {
        self.u16_at(tags::NUMBER_OF_FAILED_SUBOPERATIONS)
    }

    pub fn warning_sub_operations(&self) -> Option<u16> {
        self.u16_at(tags::NUMBER_OF_WARNING_SUBOPERATIONS)
    }

    /// The command elements, without the group length.
    pub fn elements(&self) -> &DataSet {
        &self.elements
    }

    pub fn into_elements(self) -> DataSet {
        self.elements
    }

    /// Encode the command set in implicit VR little endian,
    /// starting with a group length over all other elements.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let codec = ElementCodec::command();
        let mut body = Vec::new();
        for element in self
            .elements
            .iter()
            .filter(|e| e.tag() != tags::COMMAND_GROUP_LENGTH)
        {
            body.extend(codec.element_fields(element).context(EncodeCommandSnafu)?);
        }
        let len = fields_len(&body);
        let group_length = u32::try_from(len)
            .ok()
            .context(CommandTooLongSnafu { len })?;

        let mut fields = codec
            .element_fields(&DataElement::new(
                tags::COMMAND_GROUP_LENGTH,
                VR::UL,
                group_length,
            ))
            .context(EncodeCommandSnafu)?;
        fields.extend(body);
        fields_to_vec(&fields, Endianness::Little).context(WriteCommandSnafu)
    }

    /// Decode a command set.
    ///
    /// The group length element is not kept.
    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self> {
        let mut elements = ElementCodec::command()
            .decode_dataset(bytes)
            .context(DecodeCommandSnafu)?;
        elements.remove(tags::COMMAND_GROUP_LENGTH);
        Command::from_dataset(elements)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if let Some(id) = self.message_id() {
            write!(f, " #{}", id)?;
        }
        if let Some(id) = self.responded_to() {
            write!(f, " (to #{})", id)?;
        }
        if let Some(status) = self.status() {
            write!(f, " status {}", status)?;
        }
        Ok(())
    }
}
