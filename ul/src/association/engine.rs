//! The association engine.
//!
//! [`Engine`] implements the requester side of the upper layer protocol
//! without doing any I/O of its own.
//! Bytes received from the peer are fed with [`Engine::handle_received`],
//! bytes to send are collected with [`Engine::poll_transmit`],
//! and everything of interest to the application
//! is reported through [`Engine::poll_event`].
//! Time is passed in by the caller,
//! so that the idle watchdog can be driven by any clock.
use super::correlation::Correlation;
use super::framing::PduFramer;
use super::pdata::{self, fragment, AssembledMessage, PdvAssembler};
use crate::message::{self, Command, CommandField, Status};
use crate::pdu::{
    reader, writer, AbortRQServiceProviderReason, AbortRQSource, AssociationAC, AssociationRJ,
    AssociationRQ, PDataValueType, Pdu, PresentationContextProposed, UserVariableItem,
    DEFAULT_MAX_PDU, PROTOCOL_VERSION,
};
use crate::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};
use bytes::Bytes;
use netdicom_core::DataSet;
use netdicom_dictionary_std::uids;
use netdicom_encoding::{ElementCodec, TransferSyntax};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::borrow::Cow;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("cannot {} while the association is {}", operation, state))]
    InvalidState {
        operation: &'static str,
        state: State,
        backtrace: Backtrace,
    },

    #[snafu(display("could not decode incoming PDU"))]
    ReadPdu {
        #[snafu(backtrace)]
        source: reader::Error,
    },

    #[snafu(display("could not encode outgoing PDU"))]
    WritePdu {
        #[snafu(backtrace)]
        source: writer::Error,
    },

    #[snafu(display("unexpected {} while the association is {}", pdu, state))]
    UnexpectedPdu {
        pdu: String,
        state: State,
        backtrace: Backtrace,
    },

    #[snafu(display("accepted presentation context {} was never proposed", id))]
    UnknownPresentationContext { id: u8, backtrace: Backtrace },

    #[snafu(display(
        "presentation context {} accepted with unsupported transfer syntax {}",
        id,
        uid
    ))]
    UnsupportedTransferSyntax {
        id: u8,
        uid: String,
        backtrace: Backtrace,
    },

    #[snafu(display("message on presentation context {}, which was not negotiated", id))]
    ContextNotNegotiated { id: u8, backtrace: Backtrace },

    #[snafu(display("could not reassemble message"))]
    Reassemble {
        #[snafu(backtrace)]
        source: pdata::Error,
    },

    #[snafu(display("could not decode command"))]
    DecodeCommand {
        #[snafu(backtrace)]
        source: message::Error,
    },

    #[snafu(display("could not decode data set"))]
    DecodeDataSet {
        #[snafu(backtrace)]
        source: netdicom_encoding::Error,
    },

    #[snafu(display("could not encode command"))]
    EncodeCommand {
        #[snafu(backtrace)]
        source: message::Error,
    },

    #[snafu(display("could not encode data set"))]
    EncodeDataSet {
        #[snafu(backtrace)]
        source: netdicom_encoding::Error,
    },

    #[snafu(display("data set received without a preceding command"))]
    DataSetWithoutCommand { backtrace: Backtrace },

    #[snafu(display("data set received after {} announcing none", command))]
    UnexpectedDataSet {
        command: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("response to message {}, which is not outstanding", message_id))]
    UnknownResponse { message_id: u16, backtrace: Backtrace },

    #[snafu(display("{} has no message ID being responded to", command))]
    MissingRespondedTo {
        command: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("C-STORE sub-operation does not belong to any outstanding request"))]
    NoStoreOriginator { backtrace: Backtrace },

    #[snafu(display(
        "no presentation context negotiated for abstract syntax {}",
        abstract_syntax
    ))]
    NoPresentationContext {
        abstract_syntax: String,
        backtrace: Backtrace,
    },

    #[snafu(display("{} has no affected SOP class UID", command))]
    MissingAffectedSopClass {
        command: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("{} cannot be sent as a new request", command))]
    NotARequest {
        command: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("all message IDs are in use"))]
    MessageIdsExhausted { backtrace: Backtrace },

    #[snafu(display("message {} is not outstanding", message_id))]
    NotOutstanding { message_id: u16, backtrace: Backtrace },

    #[snafu(display("{} cannot be cancelled", command))]
    NotCancellable {
        command: &'static str,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether the error leaves the association unusable.
    ///
    /// The engine aborts the association on fatal errors
    /// raised while handling received data.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ReadPdu { .. }
                | Error::UnexpectedPdu { .. }
                | Error::UnknownPresentationContext { .. }
                | Error::UnsupportedTransferSyntax { .. }
                | Error::ContextNotNegotiated { .. }
                | Error::Reassemble { .. }
                | Error::DecodeCommand { .. }
                | Error::DataSetWithoutCommand { .. }
                | Error::UnexpectedDataSet { .. }
                | Error::UnknownResponse { .. }
                | Error::MissingRespondedTo { .. }
                | Error::NoStoreOriginator { .. }
        )
    }
}

/// The state of an association.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum State {
    /// connected, association not yet requested
    Idle,
    /// A-ASSOCIATE-RQ sent, awaiting the answer
    Requesting,
    Established,
    /// A-RELEASE-RQ sent, awaiting A-RELEASE-RP
    Releasing,
    Released,
    Aborted,
    Rejected,
    /// the transport connection is gone
    Closed,
}

impl State {
    /// Whether no further exchange is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            State::Released | State::Aborted | State::Rejected | State::Closed
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Idle => "idle",
            State::Requesting => "requesting",
            State::Established => "established",
            State::Releasing => "releasing",
            State::Released => "released",
            State::Aborted => "aborted",
            State::Rejected => "rejected",
            State::Closed => "closed",
        })
    }
}

/// A presentation context accepted by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedContext {
    pub id: u8,
    pub transfer_syntax: TransferSyntax,
    pub abstract_syntax: String,
}

/// Something that happened on the association.
#[derive(Debug)]
pub enum Event {
    /// The peer accepted the association.
    Associated,
    /// The peer rejected the association.
    Rejected(AssociationRJ),
    /// The association was released, by either side.
    Released,
    /// The association was aborted, by either side.
    Aborted(AbortRQSource),
    /// The transport connection was closed.
    Closed,
    /// A response to the outstanding request `message_id`.
    Response { message_id: u16, command: Command },
    /// The data set following the last response to `message_id`.
    DataSet {
        message_id: u16,
        data_set: DataSet,
        /// whether the response carried a failure status
        failed: bool,
    },
    /// No more messages will be delivered for `message_id`.
    Completed { message_id: u16 },
    /// A C-STORE sub-operation of the outstanding request `message_id`.
    ///
    /// It must be answered with [`Engine::respond_store`].
    StoreRequest {
        message_id: u16,
        presentation_context_id: u8,
        command: Command,
        data_set: DataSet,
    },
    /// Any other request from the peer.
    Request {
        presentation_context_id: u8,
        command: Command,
        data_set: Option<DataSet>,
    },
    /// A non-fatal error, such as a data set which could not be decoded.
    Error(Error),
}

/// Association parameters of the engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub calling_ae_title: Cow<'static, str>,
    pub called_ae_title: Cow<'static, str>,
    pub application_context_name: Cow<'static, str>,
    /// one presentation context is proposed per abstract syntax
    pub abstract_syntaxes: Vec<Cow<'static, str>>,
    /// the transfer syntaxes proposed in every presentation context
    pub transfer_syntaxes: Vec<TransferSyntax>,
    pub protocol_version: u16,
    /// the maximum P-DATA-TF length this side accepts, 0 for no limit
    pub max_pdu_length: u32,
    /// whether to reject received PDUs over `max_pdu_length`
    pub strict: bool,
    /// release the association after this long without receiving anything
    pub idle_timeout: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            calling_ae_title: "THIS-SCU".into(),
            called_ae_title: "ANY-SCP".into(),
            application_context_name: uids::DICOM_APPLICATION_CONTEXT_NAME.into(),
            abstract_syntaxes: Vec::new(),
            transfer_syntaxes: TransferSyntax::ALL.to_vec(),
            protocol_version: PROTOCOL_VERSION,
            max_pdu_length: DEFAULT_MAX_PDU,
            strict: true,
            idle_timeout: None,
        }
    }
}

/// The command most recently received,
/// to which a following data set belongs.
#[derive(Debug)]
struct LastCommand {
    command: Command,
    presentation_context_id: u8,
}

/// A sans-I/O DICOM upper layer association requester.
#[derive(Debug)]
pub struct Engine {
    options: EngineOptions,
    state: State,
    framer: PduFramer,
    assembler: PdvAssembler,
    proposed: Vec<PresentationContextProposed>,
    contexts: BTreeMap<u8, NegotiatedContext>,
    peer_max_pdu_length: u32,
    correlation: Correlation,
    last_command: Option<LastCommand>,
    started: Option<Instant>,
    last_received: Option<Instant>,
    transmit: VecDeque<Vec<u8>>,
    events: VecDeque<Event>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Engine {
            options,
            state: State::Idle,
            framer: PduFramer::new(),
            assembler: PdvAssembler::new(),
            proposed: Vec::new(),
            contexts: BTreeMap::new(),
            peer_max_pdu_length: DEFAULT_MAX_PDU,
            correlation: Correlation::new(),
            last_command: None,
            started: None,
            last_received: None,
            transmit: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Mark the transport as connected, starting the idle clock.
    pub fn connected(&mut self, now: Instant) {
        self.started = Some(now);
    }

    /// Queue an A-ASSOCIATE-RQ proposing one presentation context
    /// per configured abstract syntax.
    pub fn associate(&mut self) -> Result<()> {
        ensure!(
            self.state == State::Idle,
            InvalidStateSnafu {
                operation: "request an association",
                state: self.state
            }
        );

        let transfer_syntaxes: Vec<String> = self
            .options
            .transfer_syntaxes
            .iter()
            .map(|ts| ts.uid().to_string())
            .collect();
        self.proposed = self
            .options
            .abstract_syntaxes
            .iter()
            .zip((1..=255_u8).step_by(2))
            .map(|(abstract_syntax, id)| PresentationContextProposed {
                id,
                abstract_syntax: abstract_syntax.to_string(),
                transfer_syntaxes: transfer_syntaxes.clone(),
            })
            .collect();

        let rq = AssociationRQ {
            protocol_version: self.options.protocol_version,
            calling_ae_title: self.options.calling_ae_title.to_string(),
            called_ae_title: self.options.called_ae_title.to_string(),
            application_context_name: self.options.application_context_name.to_string(),
            presentation_contexts: self.proposed.clone(),
            user_variables: vec![
                UserVariableItem::MaxLength(self.options.max_pdu_length),
                UserVariableItem::ImplementationClassUID(IMPLEMENTATION_CLASS_UID.to_string()),
                UserVariableItem::ImplementationVersionName(
                    IMPLEMENTATION_VERSION_NAME.to_string(),
                ),
            ],
        };
        self.queue_pdu(&Pdu::AssociationRQ(rq))?;
        self.state = State::Requesting;
        Ok(())
    }

    /// The presentation contexts proposed in the association request.
    pub fn proposed_contexts(&self) -> &[PresentationContextProposed] {
        &self.proposed
    }

    /// The presentation contexts accepted by the peer.
    pub fn presentation_contexts(&self) -> impl Iterator<Item = &NegotiatedContext> {
        self.contexts.values()
    }

    /// Look up an accepted presentation context,
    /// `None` if it was not negotiated.
    pub fn presentation_context(&self, id: u8) -> Option<&NegotiatedContext> {
        self.contexts.get(&id)
    }

    /// The maximum P-DATA-TF length the peer accepts, 0 for no limit.
    pub fn peer_max_pdu_length(&self) -> u32 {
        self.peer_max_pdu_length
    }

    pub fn is_outstanding(&self, message_id: u16) -> bool {
        self.correlation.is_outstanding(message_id)
    }

    /// The number of requests awaiting responses.
    pub fn outstanding(&self) -> usize {
        self.correlation.len()
    }

    /// Process bytes received from the peer.
    ///
    /// Any number of PDUs may be completed by one call,
    /// and incomplete data is kept for the next one.
    /// On a fatal error an A-ABORT is queued
    /// and the association moves to [`State::Aborted`].
    pub fn handle_received(&mut self, data: &[u8], now: Instant) -> Result<()> {
        if self.state.is_terminal() {
            trace!("ignoring {} bytes received while {}", data.len(), self.state);
            return Ok(());
        }
        self.framer.push(data);
        let result = self.process_buffered();
        self.last_received = Some(now);
        if let Err(e) = &result {
            if e.is_fatal() {
                self.fail(e);
            }
        }
        result
    }

    fn process_buffered(&mut self) -> Result<()> {
        loop {
            if let Some(header) = self.framer.header() {
                reader::check_pdu_header(header, self.options.max_pdu_length, self.options.strict)
                    .context(ReadPduSnafu)?;
            }
            let Some(bytes) = self.framer.next_pdu() else {
                break;
            };
            let pdu = reader::read_pdu(bytes, self.options.max_pdu_length, self.options.strict)
                .context(ReadPduSnafu)?;
            debug!("received {}", pdu.short_description());
            self.handle_pdu(pdu)?;
            if self.state.is_terminal() {
                break;
            }
        }
        Ok(())
    }

    fn handle_pdu(&mut self, pdu: Pdu) -> Result<()> {
        match (self.state, pdu) {
            (State::Requesting, Pdu::AssociationAC(ac)) => self.on_accepted(ac),
            (State::Requesting, Pdu::AssociationRJ(rj)) => {
                warn!("association rejected: {}", rj);
                self.state = State::Rejected;
                self.events.push_back(Event::Rejected(rj));
                Ok(())
            }
            (State::Established | State::Releasing, Pdu::PData { data }) => {
                for pdv in data {
                    if let Some(message) = self.assembler.push(pdv).context(ReassembleSnafu)? {
                        self.on_message(message)?;
                    }
                }
                Ok(())
            }
            (State::Established | State::Releasing, Pdu::ReleaseRQ) => {
                self.queue_pdu(&Pdu::ReleaseRP)?;
                info!("association released by peer");
                self.state = State::Released;
                self.events.push_back(Event::Released);
                Ok(())
            }
            (State::Releasing, Pdu::ReleaseRP) => {
                info!("association released");
                self.state = State::Released;
                self.events.push_back(Event::Released);
                Ok(())
            }
            (_, Pdu::AbortRQ { source }) => {
                info!("association aborted by peer ({})", source);
                self.state = State::Aborted;
                self.events.push_back(Event::Aborted(source));
                Ok(())
            }
            (state, pdu) => UnexpectedPduSnafu {
                pdu: pdu.short_description().to_string(),
                state,
            }
            .fail(),
        }
    }

    fn on_accepted(&mut self, ac: AssociationAC) -> Result<()> {
        for pc in &ac.presentation_contexts {
            if !pc.is_accepted() {
                debug!("presentation context {} not accepted: {}", pc.id, pc.reason);
                continue;
            }
            let proposed = self
                .proposed
                .iter()
                .find(|p| p.id == pc.id)
                .context(UnknownPresentationContextSnafu { id: pc.id })?;
            let transfer_syntax = TransferSyntax::from_uid(&pc.transfer_syntax).context(
                UnsupportedTransferSyntaxSnafu {
                    id: pc.id,
                    uid: &pc.transfer_syntax,
                },
            )?;
            self.contexts.insert(
                pc.id,
                NegotiatedContext {
                    id: pc.id,
                    transfer_syntax,
                    abstract_syntax: proposed.abstract_syntax.clone(),
                },
            );
        }
        if self.contexts.is_empty() {
            warn!("no presentation context was accepted");
        }

        self.peer_max_pdu_length = ac.max_pdu_length().unwrap_or(DEFAULT_MAX_PDU);
        self.state = State::Established;
        info!(
            "association established with {} ({} of {} presentation contexts accepted)",
            self.options.called_ae_title,
            self.contexts.len(),
            self.proposed.len()
        );
        self.events.push_back(Event::Associated);
        Ok(())
    }

    fn on_message(&mut self, message: AssembledMessage) -> Result<()> {
        let id = message.presentation_context_id;
        let transfer_syntax = self
            .contexts
            .get(&id)
            .map(|c| c.transfer_syntax)
            .context(ContextNotNegotiatedSnafu { id })?;
        match message.value_type {
            PDataValueType::Command => {
                let command = Command::decode(message.data).context(DecodeCommandSnafu)?;
                debug!("received {} on context {}", command, id);
                self.on_command(command, id)
            }
            PDataValueType::Data => self.on_data_set(message.data, id, transfer_syntax),
        }
    }

    fn on_command(&mut self, command: Command, presentation_context_id: u8) -> Result<()> {
        self.last_command = Some(LastCommand {
            command: command.clone(),
            presentation_context_id,
        });

        if !command.is_response() {
            if !command.has_data_set() {
                self.events.push_back(Event::Request {
                    presentation_context_id,
                    command,
                    data_set: None,
                });
            }
            return Ok(());
        }

        let message_id = command.responded_to().context(MissingRespondedToSnafu {
            command: command.name(),
        })?;
        ensure!(
            self.correlation.is_outstanding(message_id),
            UnknownResponseSnafu { message_id }
        );
        if let Some(status) = command.status().filter(|s| s.is_failure()) {
            warn!("{} for message {} failed: {}", command.name(), message_id, status);
        }

        let is_final = command.is_final();
        let has_data_set = command.has_data_set();
        if command.command_field() == CommandField::CGetRsp
            && is_final
            && command.remaining_sub_operations().unwrap_or(0) == 0
        {
            self.correlation.retire_get(message_id);
        }

        self.events.push_back(Event::Response {
            message_id,
            command,
        });
        if is_final && !has_data_set {
            self.complete(message_id);
        }
        Ok(())
    }

    fn on_data_set(
        &mut self,
        data: Bytes,
        presentation_context_id: u8,
        transfer_syntax: TransferSyntax,
    ) -> Result<()> {
        let last = self
            .last_command
            .take()
            .context(DataSetWithoutCommandSnafu)?;
        let command = last.command;
        ensure!(
            command.has_data_set(),
            UnexpectedDataSetSnafu {
                command: command.name()
            }
        );
        if last.presentation_context_id != presentation_context_id {
            warn!(
                "data set on context {} follows {} on context {}",
                presentation_context_id,
                command.name(),
                last.presentation_context_id
            );
        }

        let decoded = ElementCodec::new(transfer_syntax)
            .decode_dataset(data)
            .context(DecodeDataSetSnafu);

        if command.is_response() {
            let message_id = command.responded_to().context(MissingRespondedToSnafu {
                command: command.name(),
            })?;
            match decoded {
                Ok(data_set) => self.events.push_back(Event::DataSet {
                    message_id,
                    data_set,
                    failed: command.status().map_or(false, Status::is_failure),
                }),
                Err(e) => {
                    warn!("dropping data set of {}: {}", command.name(), e);
                    self.events.push_back(Event::Error(e));
                }
            }
            if command.is_final() {
                self.complete(message_id);
            }
            return Ok(());
        }

        if command.command_field() == CommandField::CStoreRq {
            let message_id = self
                .correlation
                .store_originator(command.move_originator_message_id())
                .context(NoStoreOriginatorSnafu)?;
            match decoded {
                Ok(data_set) => self.events.push_back(Event::StoreRequest {
                    message_id,
                    presentation_context_id,
                    command,
                    data_set,
                }),
                Err(e) => {
                    warn!("could not decode C-STORE sub-operation: {}", e);
                    self.events.push_back(Event::Error(e));
                    self.respond_store(&command, presentation_context_id, Status::CANNOT_UNDERSTAND)?;
                }
            }
            return Ok(());
        }

        match decoded {
            Ok(data_set) => self.events.push_back(Event::Request {
                presentation_context_id,
                command,
                data_set: Some(data_set),
            }),
            Err(e) => self.events.push_back(Event::Error(e)),
        }
        Ok(())
    }

    fn complete(&mut self, message_id: u16) {
        if self.correlation.complete(message_id).is_some() {
            trace!("message {} completed", message_id);
            self.events.push_back(Event::Completed { message_id });
        }
    }

    /// Send a request with an optional data set,
    /// returning the message ID assigned to it.
    ///
    /// The presentation context is chosen by the
    /// command's affected SOP class UID.
    pub fn send(&mut self, command: Command, data_set: Option<&DataSet>) -> Result<u16> {
        ensure!(
            self.state == State::Established,
            InvalidStateSnafu {
                operation: "send a request",
                state: self.state
            }
        );
        ensure!(
            !command.is_response() && command.command_field() != CommandField::CCancelRq,
            NotARequestSnafu {
                command: command.name()
            }
        );

        let abstract_syntax = command
            .affected_sop_class_uid()
            .context(MissingAffectedSopClassSnafu {
                command: command.name(),
            })?
            .into_owned();
        let (id, transfer_syntax) = self
            .contexts
            .values()
            .find(|c| c.abstract_syntax == abstract_syntax)
            .map(|c| (c.id, c.transfer_syntax))
            .context(NoPresentationContextSnafu {
                abstract_syntax: &abstract_syntax,
            })?;
        let message_id = self
            .correlation
            .allocate()
            .context(MessageIdsExhaustedSnafu)?;

        let mut command = command;
        command.set_message_id(message_id);
        command.set_data_set_present(data_set.is_some());

        let command_bytes = command.encode().context(EncodeCommandSnafu)?;
        let data_bytes = data_set
            .map(|ds| ElementCodec::new(transfer_syntax).encode_dataset(ds))
            .transpose()
            .context(EncodeDataSetSnafu)?;

        debug!("sending {} on context {}", command, id);
        self.queue_message(id, PDataValueType::Command, command_bytes)?;
        if let Some(bytes) = data_bytes {
            self.queue_message(id, PDataValueType::Data, bytes)?;
        }
        self.correlation
            .register(message_id, command.command_field(), id);
        Ok(message_id)
    }

    /// Answer a C-STORE sub-operation with the given status.
    pub fn respond_store(
        &mut self,
        request: &Command,
        presentation_context_id: u8,
        status: Status,
    ) -> Result<()> {
        ensure!(
            matches!(self.state, State::Established | State::Releasing),
            InvalidStateSnafu {
                operation: "answer a C-STORE request",
                state: self.state
            }
        );
        let response = Command::store_rsp(request, status);
        debug!("sending {} on context {}", response, presentation_context_id);
        let bytes = response.encode().context(EncodeCommandSnafu)?;
        self.queue_message(presentation_context_id, PDataValueType::Command, bytes)
    }

    /// Ask the peer to cancel the outstanding request `message_id`.
    ///
    /// The request stays outstanding until its final response arrives.
    pub fn cancel(&mut self, message_id: u16) -> Result<()> {
        ensure!(
            self.state == State::Established,
            InvalidStateSnafu {
                operation: "cancel a request",
                state: self.state
            }
        );
        let entry = self
            .correlation
            .get(message_id)
            .context(NotOutstandingSnafu { message_id })?;
        ensure!(
            matches!(
                entry.command_field,
                CommandField::CFindRq | CommandField::CMoveRq | CommandField::CGetRq
            ),
            NotCancellableSnafu {
                command: entry.command_field.name()
            }
        );
        let id = entry.presentation_context_id;

        let command = Command::cancel_rq(message_id);
        debug!("sending {} on context {}", command, id);
        let bytes = command.encode().context(EncodeCommandSnafu)?;
        self.queue_message(id, PDataValueType::Command, bytes)
    }

    /// Request an orderly release of the association.
    ///
    /// Calling this again while the release is under way does nothing.
    pub fn release(&mut self) -> Result<()> {
        match self.state {
            State::Established => {
                self.queue_pdu(&Pdu::ReleaseRQ)?;
                self.state = State::Releasing;
                Ok(())
            }
            State::Releasing => Ok(()),
            state => InvalidStateSnafu {
                operation: "release the association",
                state,
            }
            .fail(),
        }
    }

    /// Abort the association.
    pub fn abort(&mut self) -> Result<()> {
        ensure!(
            !self.state.is_terminal(),
            InvalidStateSnafu {
                operation: "abort the association",
                state: self.state
            }
        );
        self.queue_pdu(&Pdu::AbortRQ {
            source: AbortRQSource::ServiceUser,
        })?;
        info!("association aborted");
        self.state = State::Aborted;
        self.events
            .push_back(Event::Aborted(AbortRQSource::ServiceUser));
        Ok(())
    }

    /// Record that the transport connection is gone.
    pub fn closed(&mut self) {
        if self.state == State::Closed {
            return;
        }
        if !self.state.is_terminal() {
            warn!("connection closed while the association was {}", self.state);
        }
        self.state = State::Closed;
        self.events.push_back(Event::Closed);
    }

    /// Release the association if nothing was received
    /// for longer than the idle timeout.
    ///
    /// Returns whether the release was started.
    pub fn check_idle(&mut self, now: Instant) -> Result<bool> {
        let Some(timeout) = self.options.idle_timeout else {
            return Ok(false);
        };
        if self.state != State::Established {
            return Ok(false);
        }
        let Some(since) = self.last_received.or(self.started) else {
            return Ok(false);
        };
        let idle = now.saturating_duration_since(since);
        if idle < timeout {
            return Ok(false);
        }
        warn!("nothing received for {:?}, releasing association", idle);
        self.release()?;
        Ok(true)
    }

    /// Take the next buffer to send to the peer.
    pub fn poll_transmit(&mut self) -> Option<Vec<u8>> {
        self.transmit.pop_front()
    }

    /// Take the next event.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    fn queue_message(
        &mut self,
        presentation_context_id: u8,
        value_type: PDataValueType,
        bytes: Vec<u8>,
    ) -> Result<()> {
        for pdu in fragment(
            presentation_context_id,
            value_type,
            Bytes::from(bytes),
            self.peer_max_pdu_length,
        ) {
            self.queue_pdu(&pdu)?;
        }
        Ok(())
    }

    fn queue_pdu(&mut self, pdu: &Pdu) -> Result<()> {
        let bytes = writer::write_pdu(pdu).context(WritePduSnafu)?;
        debug!("sending {}", pdu.short_description());
        self.transmit.push_back(bytes);
        Ok(())
    }

    fn fail(&mut self, e: &Error) {
        error!("aborting association: {}", e);
        self.framer.clear();
        self.assembler = PdvAssembler::new();
        if self.state.is_terminal() {
            return;
        }
        let reason = match e {
            Error::UnexpectedPdu { .. } => AbortRQServiceProviderReason::UnexpectedPdu,
            Error::ReadPdu { .. } => AbortRQServiceProviderReason::UnrecognizedPdu,
            Error::UnknownPresentationContext { .. }
            | Error::UnsupportedTransferSyntax { .. } => {
                AbortRQServiceProviderReason::InvalidPduParameter
            }
            _ => AbortRQServiceProviderReason::ReasonNotSpecified,
        };
        let source = AbortRQSource::ServiceProvider(reason);
        if let Err(e) = self.queue_pdu(&Pdu::AbortRQ { source }) {
            warn!("could not queue A-ABORT: {}", e);
        }
        self.state = State::Aborted;
        self.events.push_back(Event::Aborted(source));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Priority;
    use crate::pdu::{
        read_pdu, write_pdu, AssociationRJResult, AssociationRJSource, PDataValue,
        PresentationContextResult, PresentationContextResultReason,
    };
    use matches::assert_matches;
    use netdicom_core::{DataElement, VR};
    use netdicom_dictionary_std::tags;

    const FIND: &str = uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND;
    const GET: &str = uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_GET;
    const MOVE: &str = uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE;
    const CT: &str = uids::CT_IMAGE_STORAGE;

    fn options() -> EngineOptions {
        EngineOptions {
            calling_ae_title: "TEST-SCU".into(),
            called_ae_title: "TEST-SCP".into(),
            abstract_syntaxes: vec![FIND.into(), GET.into(), MOVE.into(), CT.into()],
            idle_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        }
    }

    fn accept(contexts: &[(u8, PresentationContextResultReason)]) -> Vec<u8> {
        write_pdu(&Pdu::AssociationAC(AssociationAC {
            protocol_version: 1,
            calling_ae_title: "TEST-SCU".to_string(),
            called_ae_title: "TEST-SCP".to_string(),
            application_context_name: uids::DICOM_APPLICATION_CONTEXT_NAME.to_string(),
            presentation_contexts: contexts
                .iter()
                .map(|(id, reason)| PresentationContextResult {
                    id: *id,
                    reason: *reason,
                    transfer_syntax: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
                })
                .collect(),
            user_variables: vec![UserVariableItem::MaxLength(DEFAULT_MAX_PDU)],
        }))
        .unwrap()
    }

    fn accept_all() -> Vec<u8> {
        use PresentationContextResultReason::Acceptance;
        accept(&[(1, Acceptance), (3, Acceptance), (5, Acceptance), (7, Acceptance)])
    }

    fn established(now: Instant) -> Engine {
        let mut engine = Engine::new(options());
        engine.connected(now);
        engine.associate().unwrap();
        engine.handle_received(&accept_all(), now).unwrap();
        assert_eq!(engine.state(), State::Established);
        sent(&mut engine);
        events(&mut engine);
        engine
    }

    fn pdata(context: u8, value_type: PDataValueType, bytes: Vec<u8>) -> Vec<u8> {
        write_pdu(&Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id: context,
                value_type,
                is_last: true,
                data: Bytes::from(bytes),
            }],
        })
        .unwrap()
    }

    fn command_pdu(context: u8, command: &Command) -> Vec<u8> {
        pdata(context, PDataValueType::Command, command.encode().unwrap())
    }

    fn data_set_pdu(context: u8, data_set: &DataSet) -> Vec<u8> {
        let codec = ElementCodec::new(TransferSyntax::ImplicitVrLittleEndian);
        pdata(context, PDataValueType::Data, codec.encode_dataset(data_set).unwrap())
    }

    fn patient(id: &str) -> DataSet {
        let mut ds = DataSet::new();
        ds.put(DataElement::new(tags::PATIENT_ID, VR::LO, id));
        ds
    }

    fn sent(engine: &mut Engine) -> Vec<Pdu> {
        std::iter::from_fn(|| engine.poll_transmit())
            .map(|bytes| read_pdu(bytes, 0, false).unwrap())
            .collect()
    }

    fn sent_commands(engine: &mut Engine) -> Vec<Command> {
        sent(engine)
            .into_iter()
            .filter_map(|pdu| match pdu {
                Pdu::PData { data } => Some(data),
                _ => None,
            })
            .flatten()
            .filter(|pdv| pdv.value_type == PDataValueType::Command)
            .map(|pdv| Command::decode(pdv.data).unwrap())
            .collect()
    }

    fn events(engine: &mut Engine) -> Vec<Event> {
        std::iter::from_fn(|| engine.poll_event()).collect()
    }

    #[test]
    fn association_request_proposes_every_abstract_syntax() {
        let mut engine = Engine::new(options());
        engine.connected(Instant::now());
        engine.associate().unwrap();
        assert_eq!(engine.state(), State::Requesting);

        let pdus = sent(&mut engine);
        assert_eq!(pdus.len(), 1);
        let Pdu::AssociationRQ(rq) = &pdus[0] else {
            panic!("expected A-ASSOCIATE-RQ, got {:?}", pdus[0]);
        };
        assert_eq!(rq.calling_ae_title, "TEST-SCU");
        assert_eq!(rq.called_ae_title, "TEST-SCP");
        let ids: Vec<u8> = rq.presentation_contexts.iter().map(|pc| pc.id).collect();
        assert_eq!(ids, vec![1, 3, 5, 7]);
        assert_eq!(rq.presentation_contexts[3].abstract_syntax, CT);
        assert_eq!(
            rq.presentation_contexts[0].transfer_syntaxes,
            vec![
                uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
                uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
                uids::EXPLICIT_VR_BIG_ENDIAN.to_string(),
            ]
        );
        assert!(rq
            .user_variables
            .contains(&UserVariableItem::MaxLength(DEFAULT_MAX_PDU)));

        assert_matches!(engine.associate(), Err(Error::InvalidState { .. }));
    }

    #[test]
    fn only_accepted_contexts_are_negotiated() {
        let mut engine = Engine::new(EngineOptions {
            abstract_syntaxes: vec![CT.into(), uids::MR_IMAGE_STORAGE.into()],
            ..Default::default()
        });
        engine.associate().unwrap();
        engine
            .handle_received(
                &accept(&[
                    (1, PresentationContextResultReason::AbstractSyntaxNotSupported),
                    (3, PresentationContextResultReason::Acceptance),
                ]),
                Instant::now(),
            )
            .unwrap();

        assert_eq!(engine.state(), State::Established);
        assert!(engine.presentation_context(1).is_none());
        assert_eq!(
            engine.presentation_context(3),
            Some(&NegotiatedContext {
                id: 3,
                transfer_syntax: TransferSyntax::ImplicitVrLittleEndian,
                abstract_syntax: uids::MR_IMAGE_STORAGE.to_string(),
            })
        );
        assert_eq!(engine.presentation_contexts().count(), 1);
        assert_matches!(events(&mut engine).as_slice(), [Event::Associated]);

        // nothing was negotiated for CT
        let store = Command::store_rq(CT, "1.2.3", Priority::Medium);
        assert_matches!(
            engine.send(store, Some(&patient("1"))),
            Err(Error::NoPresentationContext { .. })
        );
    }

    #[test]
    fn accepting_an_unproposed_context_aborts() {
        let mut engine = Engine::new(options());
        engine.associate().unwrap();
        sent(&mut engine);

        let err = engine
            .handle_received(
                &accept(&[(9, PresentationContextResultReason::Acceptance)]),
                Instant::now(),
            )
            .unwrap_err();
        assert_matches!(err, Error::UnknownPresentationContext { id: 9, .. });
        assert!(err.is_fatal());
        assert_eq!(engine.state(), State::Aborted);
        assert_matches!(sent(&mut engine).as_slice(), [Pdu::AbortRQ { .. }]);
    }

    #[test]
    fn rejection_is_reported() {
        let mut engine = Engine::new(options());
        engine.associate().unwrap();
        let rj = write_pdu(&Pdu::AssociationRJ(AssociationRJ {
            result: AssociationRJResult::Permanent,
            source: AssociationRJSource::ServiceUser,
            reason: 7,
        }))
        .unwrap();
        engine.handle_received(&rj, Instant::now()).unwrap();
        assert_eq!(engine.state(), State::Rejected);
        assert_matches!(
            events(&mut engine).as_slice(),
            [Event::Rejected(AssociationRJ { reason: 7, .. })]
        );
    }

    #[test]
    fn chunk_boundaries_do_not_change_events() {
        let now = Instant::now();
        let request = Command::find_rq(FIND, Priority::Medium).with_message_id(1);
        let pending = Command::response_to(&request, Status::PENDING)
            .unwrap()
            .with_data_set(true);
        let mut stream = command_pdu(1, &pending);
        stream.extend(data_set_pdu(1, &patient("42")));
        stream.extend(command_pdu(
            1,
            &Command::response_to(&request, Status::SUCCESS).unwrap(),
        ));

        let run = |chunk_size: usize| {
            let mut engine = established(now);
            engine
                .send(Command::find_rq(FIND, Priority::Medium), Some(&patient("*")))
                .unwrap();
            let mut log = vec![];
            for chunk in stream.chunks(chunk_size) {
                engine.handle_received(chunk, now).unwrap();
                log.extend(events(&mut engine).into_iter().map(|e| format!("{:?}", e)));
            }
            log
        };

        let expected = run(stream.len());
        assert_eq!(expected.len(), 4);
        assert!(expected[0].starts_with("Response"));
        assert!(expected[1].starts_with("DataSet"));
        assert!(expected[3].starts_with("Completed"));
        for chunk_size in [1, 2, 5, 7, 64] {
            assert_eq!(run(chunk_size), expected, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn responses_are_routed_by_message_id() {
        let now = Instant::now();
        let mut engine = established(now);

        let first = engine
            .send(Command::find_rq(FIND, Priority::Medium), Some(&patient("1")))
            .unwrap();
        let second = engine
            .send(Command::find_rq(FIND, Priority::Medium), Some(&patient("2")))
            .unwrap();
        assert_eq!((first, second), (1, 2));

        let commands = sent_commands(&mut engine);
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].message_id(), Some(2));
        assert!(commands[1].has_data_set());

        let response = Command::response_to(&commands[1], Status::SUCCESS).unwrap();
        engine
            .handle_received(&command_pdu(1, &response), now)
            .unwrap();

        let events = events(&mut engine);
        assert_matches!(
            events.as_slice(),
            [
                Event::Response { message_id: 2, .. },
                Event::Completed { message_id: 2 }
            ]
        );
        assert!(engine.is_outstanding(1));
        assert!(!engine.is_outstanding(2));
    }

    #[test]
    fn find_results_follow_their_responses() {
        let now = Instant::now();
        let mut engine = established(now);
        let id = engine
            .send(Command::find_rq(FIND, Priority::Medium), Some(&patient("*")))
            .unwrap();
        let request = sent_commands(&mut engine).remove(0);

        let pending = Command::response_to(&request, Status::PENDING)
            .unwrap()
            .with_data_set(true);
        let mut bytes = command_pdu(1, &pending);
        bytes.extend(data_set_pdu(1, &patient("7")));
        bytes.extend(command_pdu(
            1,
            &Command::response_to(&request, Status::SUCCESS).unwrap(),
        ));
        engine.handle_received(&bytes, now).unwrap();

        let events = events(&mut engine);
        assert_eq!(events.len(), 4);
        assert_matches!(&events[0], Event::Response { message_id, .. } if *message_id == id);
        let Event::DataSet {
            data_set, failed, ..
        } = &events[1]
        else {
            panic!("expected a data set, got {:?}", events[1]);
        };
        assert!(!failed);
        assert_eq!(
            data_set.get(tags::PATIENT_ID).unwrap().to_str().unwrap(),
            "7"
        );
        assert_matches!(&events[2], Event::Response { .. });
        assert_matches!(&events[3], Event::Completed { .. });
        assert_eq!(engine.outstanding(), 0);
    }

    #[test]
    fn warning_response_keeps_the_request_outstanding() {
        let now = Instant::now();
        let mut engine = established(now);
        let id = engine
            .send(Command::find_rq(FIND, Priority::Medium), Some(&patient("*")))
            .unwrap();
        let request = sent_commands(&mut engine).remove(0);

        let warning = Command::response_to(&request, Status(0xB000)).unwrap();
        engine.handle_received(&command_pdu(1, &warning), now).unwrap();
        assert_matches!(
            events(&mut engine).as_slice(),
            [Event::Response { message_id, .. }] if *message_id == id
        );
        assert_eq!(engine.outstanding(), 1);

        let done = Command::response_to(&request, Status::SUCCESS).unwrap();
        engine.handle_received(&command_pdu(1, &done), now).unwrap();
        assert_matches!(
            events(&mut engine).as_slice(),
            [Event::Response { .. }, Event::Completed { message_id }] if *message_id == id
        );
        assert_eq!(engine.outstanding(), 0);
    }

    #[test]
    fn get_sub_operations_are_attributed_to_the_get() {
        let now = Instant::now();
        let mut engine = established(now);
        let get_id = engine
            .send(Command::get_rq(GET, Priority::Medium), Some(&patient("9")))
            .unwrap();
        let get = sent_commands(&mut engine).remove(0);

        let store = Command::store_rq(CT, "1.2.3.4.5", Priority::Medium)
            .with_message_id(100)
            .with_data_set(true);
        let mut bytes = command_pdu(7, &store);
        bytes.extend(data_set_pdu(7, &patient("9")));
        engine.handle_received(&bytes, now).unwrap();

        let mut events = events(&mut engine);
        assert_eq!(events.len(), 1);
        let Event::StoreRequest {
            message_id,
            presentation_context_id,
            command,
            ..
        } = events.remove(0)
        else {
            panic!("expected a C-STORE request");
        };
        assert_eq!(message_id, get_id);
        assert_eq!(presentation_context_id, 7);

        engine
            .respond_store(&command, presentation_context_id, Status::SUCCESS)
            .unwrap();
        let responses = sent_commands(&mut engine);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].command_field(), CommandField::CStoreRsp);
        assert_eq!(responses[0].responded_to(), Some(100));
        assert_eq!(responses[0].status(), Some(Status::SUCCESS));
        assert_eq!(
            responses[0].affected_sop_instance_uid().as_deref(),
            Some("1.2.3.4.5")
        );
        assert!(!responses[0].has_data_set());

        let done = Command::response_to(&get, Status::SUCCESS)
            .unwrap()
            .with_sub_operations(0, 1, 0, 0);
        engine.handle_received(&command_pdu(3, &done), now).unwrap();
        assert_matches!(
            self::events(&mut engine).as_slice(),
            [Event::Response { .. }, Event::Completed { .. }]
        );
        assert_eq!(engine.outstanding(), 0);
    }

    #[test]
    fn stray_store_request_aborts() {
        let now = Instant::now();
        let mut engine = established(now);
        let store = Command::store_rq(CT, "1.2.3", Priority::Medium)
            .with_message_id(1)
            .with_data_set(true);
        let mut bytes = command_pdu(7, &store);
        bytes.extend(data_set_pdu(7, &patient("1")));
        assert_matches!(
            engine.handle_received(&bytes, now),
            Err(Error::NoStoreOriginator { .. })
        );
        assert_eq!(engine.state(), State::Aborted);
    }

    #[test]
    fn sequencing_errors_are_fatal() {
        let now = Instant::now();

        // data set with no command before it
        let mut engine = established(now);
        let err = engine
            .handle_received(&data_set_pdu(1, &patient("1")), now)
            .unwrap_err();
        assert_matches!(err, Error::DataSetWithoutCommand { .. });
        assert!(err.is_fatal());

        // data set after a response announcing none
        let mut engine = established(now);
        engine
            .send(Command::find_rq(FIND, Priority::Medium), Some(&patient("1")))
            .unwrap();
        let request = sent_commands(&mut engine).remove(0);
        let pending = Command::response_to(&request, Status::PENDING).unwrap();
        let mut bytes = command_pdu(1, &pending);
        bytes.extend(data_set_pdu(1, &patient("1")));
        assert_matches!(
            engine.handle_received(&bytes, now),
            Err(Error::UnexpectedDataSet { .. })
        );

        // response to nothing
        let mut engine = established(now);
        let orphan = Command::new(CommandField::CFindRsp)
            .with_responded_to(42)
            .with_status(Status::SUCCESS);
        assert_matches!(
            engine.handle_received(&command_pdu(1, &orphan), now),
            Err(Error::UnknownResponse { message_id: 42, .. })
        );
        assert_eq!(engine.state(), State::Aborted);
        assert_matches!(
            sent(&mut engine).as_slice(),
            [Pdu::AbortRQ {
                source: AbortRQSource::ServiceProvider(_)
            }]
        );
    }

    #[test]
    fn undecodable_data_set_is_not_fatal() {
        let now = Instant::now();
        let mut engine = established(now);
        engine
            .send(Command::find_rq(FIND, Priority::Medium), Some(&patient("1")))
            .unwrap();
        let request = sent_commands(&mut engine).remove(0);

        // a private element cannot be decoded in implicit VR
        let private = vec![0x09, 0x00, 0x01, 0x10, 0x04, 0x00, 0x00, 0x00, b'A', b'B', b'C', b'D'];
        let pending = Command::response_to(&request, Status::PENDING)
            .unwrap()
            .with_data_set(true);
        let mut bytes = command_pdu(1, &pending);
        bytes.extend(pdata(1, PDataValueType::Data, private));
        bytes.extend(command_pdu(
            1,
            &Command::response_to(&request, Status::SUCCESS).unwrap(),
        ));
        engine.handle_received(&bytes, now).unwrap();

        assert_eq!(engine.state(), State::Established);
        let events = events(&mut engine);
        assert_matches!(
            events.as_slice(),
            [
                Event::Response { .. },
                Event::Error(Error::DecodeDataSet { .. }),
                Event::Response { .. },
                Event::Completed { .. }
            ]
        );
        assert!(sent(&mut engine).is_empty());
    }

    #[test]
    fn undecodable_store_request_is_refused() {
        let now = Instant::now();
        let mut engine = established(now);
        engine
            .send(Command::get_rq(GET, Priority::Medium), Some(&patient("1")))
            .unwrap();
        sent(&mut engine);

        let store = Command::store_rq(CT, "1.2.3", Priority::Medium)
            .with_message_id(7)
            .with_data_set(true);
        let private = vec![0x09, 0x00, 0x01, 0x10, 0x02, 0x00, 0x00, 0x00, b'A', b'B'];
        let mut bytes = command_pdu(7, &store);
        bytes.extend(pdata(7, PDataValueType::Data, private));
        engine.handle_received(&bytes, now).unwrap();

        assert_matches!(events(&mut engine).as_slice(), [Event::Error(_)]);
        let responses = sent_commands(&mut engine);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].status(), Some(Status::CANNOT_UNDERSTAND));
        assert_eq!(responses[0].responded_to(), Some(7));
    }

    #[test]
    fn cancel_keeps_the_request_outstanding() {
        let now = Instant::now();
        let mut engine = established(now);
        let id = engine
            .send(Command::move_rq(MOVE, "STORE-SCP", Priority::Medium), Some(&patient("1")))
            .unwrap();
        sent(&mut engine);

        engine.cancel(id).unwrap();
        let commands = sent_commands(&mut engine);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].command_field(), CommandField::CCancelRq);
        assert_eq!(commands[0].responded_to(), Some(id));
        assert!(!commands[0].has_data_set());
        assert!(engine.is_outstanding(id));

        assert_matches!(engine.cancel(99), Err(Error::NotOutstanding { .. }));
    }

    #[test]
    fn release_handshake() {
        let now = Instant::now();
        let mut engine = established(now);
        engine.release().unwrap();
        assert_eq!(engine.state(), State::Releasing);
        engine.release().unwrap();
        assert_matches!(sent(&mut engine).as_slice(), [Pdu::ReleaseRQ]);

        engine
            .handle_received(&write_pdu(&Pdu::ReleaseRP).unwrap(), now)
            .unwrap();
        assert_eq!(engine.state(), State::Released);
        assert_matches!(events(&mut engine).as_slice(), [Event::Released]);
        assert_matches!(engine.release(), Err(Error::InvalidState { .. }));
    }

    #[test]
    fn peer_release_is_answered() {
        let now = Instant::now();
        let mut engine = established(now);
        engine
            .handle_received(&write_pdu(&Pdu::ReleaseRQ).unwrap(), now)
            .unwrap();
        assert_eq!(engine.state(), State::Released);
        assert_matches!(sent(&mut engine).as_slice(), [Pdu::ReleaseRP]);
    }

    #[test]
    fn peer_abort_is_reported() {
        let now = Instant::now();
        let mut engine = established(now);
        let abort = write_pdu(&Pdu::AbortRQ {
            source: AbortRQSource::ServiceUser,
        })
        .unwrap();
        engine.handle_received(&abort, now).unwrap();
        assert_eq!(engine.state(), State::Aborted);
        assert_matches!(
            events(&mut engine).as_slice(),
            [Event::Aborted(AbortRQSource::ServiceUser)]
        );
        engine.closed();
        assert_eq!(engine.state(), State::Closed);
    }

    #[test]
    fn oversized_pdata_header_aborts_before_the_body_arrives() {
        let now = Instant::now();
        let mut engine = established(now);
        // P-DATA-TF declaring 0x7fff0000 bytes
        let header = [0x04, 0x00, 0x7f, 0xff, 0x00, 0x00];
        assert_matches!(
            engine.handle_received(&header, now),
            Err(Error::ReadPdu {
                source: reader::Error::PduTooLarge {
                    pdu_length: 0x7fff_0000,
                    ..
                },
            })
        );
        assert_eq!(engine.state(), State::Aborted);
        assert_matches!(
            sent(&mut engine).as_slice(),
            [Pdu::AbortRQ {
                source: AbortRQSource::ServiceProvider(
                    AbortRQServiceProviderReason::UnrecognizedPdu
                ),
            }]
        );

        engine.handle_received(&vec![0; 1 << 20], now).unwrap();
        assert_eq!(engine.framer.pending_len(), 0);
        assert!(sent(&mut engine).is_empty());
    }

    #[test]
    fn oversized_pdata_header_is_tolerated_when_lenient() {
        let now = Instant::now();
        let mut engine = Engine::new(EngineOptions {
            strict: false,
            ..options()
        });
        engine.connected(now);
        engine.associate().unwrap();
        engine.handle_received(&accept_all(), now).unwrap();
        sent(&mut engine);

        engine
            .handle_received(&[0x04, 0x00, 0x7f, 0xff, 0x00, 0x00], now)
            .unwrap();
        assert_eq!(engine.state(), State::Established);
        assert_eq!(engine.framer.pending_len(), 6);
    }

    #[test]
    fn unknown_pdu_type_aborts() {
        let now = Instant::now();
        let mut engine = established(now);
        assert_matches!(
            engine.handle_received(&[0x09, 0x00, 0x00, 0x10, 0x00, 0x00], now),
            Err(Error::ReadPdu {
                source: reader::Error::UnknownPduType { pdu_type: 0x09, .. },
            })
        );
        assert_eq!(engine.state(), State::Aborted);
        assert_matches!(sent(&mut engine).as_slice(), [Pdu::AbortRQ { .. }]);
        assert_matches!(events(&mut engine).as_slice(), [Event::Aborted(_)]);
    }

    #[test]
    fn idle_association_is_released() {
        let start = Instant::now();
        let mut engine = established(start);

        assert!(!engine.check_idle(start + Duration::from_secs(59)).unwrap());
        assert!(sent(&mut engine).is_empty());

        assert!(engine.check_idle(start + Duration::from_secs(60)).unwrap());
        assert_eq!(engine.state(), State::Releasing);
        assert_matches!(sent(&mut engine).as_slice(), [Pdu::ReleaseRQ]);

        // only one release request
        assert!(!engine.check_idle(start + Duration::from_secs(120)).unwrap());
    }

    #[test]
    fn received_data_resets_the_idle_clock() {
        let start = Instant::now();
        let mut engine = established(start);
        engine
            .send(Command::find_rq(FIND, Priority::Medium), Some(&patient("1")))
            .unwrap();
        let request = sent_commands(&mut engine).remove(0);
        let pending = Command::response_to(&request, Status::PENDING).unwrap();
        engine
            .handle_received(&command_pdu(1, &pending), start + Duration::from_secs(30))
            .unwrap();

        assert!(!engine.check_idle(start + Duration::from_secs(60)).unwrap());
        assert!(engine.check_idle(start + Duration::from_secs(90)).unwrap());
    }
}
