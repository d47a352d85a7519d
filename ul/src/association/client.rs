//! Association requester module
//!
//! The module provides an asynchronous DICOM association
//! in which this application entity is the one requesting the association.
//! See [`ClientAssociationOptions`](self::ClientAssociationOptions)
//! for details and examples on how to create an association.
//!
//! Each association is driven by one spawned task
//! which owns both the socket and the [`Engine`].
//! The [`ClientAssociation`] handle talks to it through channels.
use super::engine::{self, Engine, EngineOptions, Event, NegotiatedContext, State};
use crate::message::{Command, Status};
use crate::pdu::AssociationRJ;
use crate::AeAddr;
use netdicom_core::DataSet;
use netdicom_encoding::TransferSyntax;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// How often the idle watchdog looks at the association.
pub const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(3);

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// How many association events are held for [`ClientAssociation::next_event`]
/// before further events are dropped.
pub const EVENT_QUEUE_SIZE: usize = 64;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// missing abstract syntax to begin negotiation
    MissingAbstractSyntax { backtrace: Backtrace },

    /// could not parse the AE address
    ParseAddress {
        #[snafu(backtrace)]
        source: crate::address::ParseAeAddressError,
    },

    /// could not connect to server
    Connect {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// failed to send or receive on the wire
    Wire {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("association engine error"))]
    Engine {
        #[snafu(backtrace)]
        source: engine::Error,
    },

    #[snafu(display("association rejected by the server: {}", association_rj))]
    Rejected {
        association_rj: AssociationRJ,
        backtrace: Backtrace,
    },

    /// association aborted during negotiation
    Aborted { backtrace: Backtrace },

    /// connection closed by the server
    ConnectionClosed { backtrace: Backtrace },

    /// the association task is no longer running
    TaskGone { backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Answers the C-STORE sub-operations of a C-GET or C-MOVE request.
///
/// The returned status is sent back in the C-STORE-RSP.
pub trait StoreHandler: Send {
    fn store(&mut self, command: &Command, data_set: DataSet) -> Status;
}

impl<F> StoreHandler for F
where
    F: FnMut(&Command, DataSet) -> Status + Send,
{
    fn store(&mut self, command: &Command, data_set: DataSet) -> Status {
        self(command, data_set)
    }
}

/// One message belonging to an outstanding request.
#[derive(Debug)]
pub enum Response {
    Command(Command),
    DataSet { data_set: DataSet, failed: bool },
}

/// A DICOM association builder for a client node.
/// The final outcome is a [`ClientAssociation`].
///
/// # Example
///
/// ```no_run
/// # use netdicom_ul::association::client::ClientAssociationOptions;
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let association = ClientAssociationOptions::new()
///     .with_abstract_syntax("1.2.840.10008.1.1")
///     .establish_with("ANY-SCP@129.168.0.5:104")
///     .await?;
/// association.release().await?;
/// # Ok(())
/// # }
/// ```
///
/// At least one abstract syntax must be specified.
/// Each one is proposed in its own presentation context,
/// with all transfer syntaxes configured
/// (by default the three uncompressed ones).
#[derive(Debug, Clone, Default)]
pub struct ClientAssociationOptions {
    options: EngineOptions,
    /// whether the transfer syntax list was set explicitly
    custom_transfer_syntaxes: bool,
    /// whether the called AE title was set explicitly
    custom_called_ae_title: bool,
}

impl ClientAssociationOptions {
    /// Create a new set of options for establishing an association.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the calling application entity title for the association,
    /// which refers to this DICOM node.
    ///
    /// The default is `THIS-SCU`.
    pub fn calling_ae_title<T>(mut self, calling_ae_title: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.options.calling_ae_title = calling_ae_title.into();
        self
    }

    /// Define the called application entity title for the association,
    /// which refers to the target DICOM node.
    ///
    /// The default is `ANY-SCP`,
    /// or the AE title given to [`establish_with`](Self::establish_with).
    pub fn called_ae_title<T>(mut self, called_ae_title: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.options.called_ae_title = called_ae_title.into();
        self.custom_called_ae_title = true;
        self
    }

    pub fn application_context_name<T>(mut self, name: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.options.application_context_name = name.into();
        self
    }

    /// Propose a presentation context for this abstract syntax.
    pub fn with_abstract_syntax<T>(mut self, abstract_syntax_uid: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        let uid = abstract_syntax_uid.into();
        let trimmed = uid.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
        let uid = if trimmed.len() == uid.len() {
            uid
        } else {
            Cow::Owned(trimmed.to_string())
        };
        self.options.abstract_syntaxes.push(uid);
        self
    }

    /// Propose this transfer syntax in every presentation context.
    ///
    /// The first call replaces the default list.
    pub fn with_transfer_syntax(mut self, transfer_syntax: TransferSyntax) -> Self {
        if !self.custom_transfer_syntaxes {
            self.options.transfer_syntaxes.clear();
            self.custom_transfer_syntaxes = true;
        }
        if !self.options.transfer_syntaxes.contains(&transfer_syntax) {
            self.options.transfer_syntaxes.push(transfer_syntax);
        }
        self
    }

    /// Override the maximum PDU length
    /// that this application entity will admit.
    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.options.max_pdu_length = value;
        self
    }

    /// Override strict mode:
    /// whether received PDUs must not
    /// surpass the maximum PDU length.
    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    /// Release the association once nothing was received for this long.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.options.idle_timeout = Some(timeout);
        self
    }

    pub fn protocol_version(mut self, version: u16) -> Self {
        self.options.protocol_version = version;
        self
    }

    /// The association parameters, as handed to the engine.
    pub fn engine_options(&self) -> &EngineOptions {
        &self.options
    }

    /// Initiate the TCP connection to the given address
    /// and request a new DICOM association,
    /// negotiating the presentation contexts in the process.
    pub async fn establish<A: ToSocketAddrs>(self, address: A) -> Result<ClientAssociation> {
        ensure!(
            !self.options.abstract_syntaxes.is_empty(),
            MissingAbstractSyntaxSnafu
        );
        let stream = TcpStream::connect(address).await.context(ConnectSnafu)?;
        ClientAssociation::negotiate(stream, self.options).await
    }

    /// Initiate the TCP connection to the given address
    /// in the form `«ae_title»@«host»:«port»`
    /// and request a new DICOM association.
    ///
    /// The AE title in the address becomes the called AE title,
    /// unless one was set with [`called_ae_title`](Self::called_ae_title).
    pub async fn establish_with(mut self, ae_address: &str) -> Result<ClientAssociation> {
        let address: AeAddr = ae_address.parse().context(ParseAddressSnafu)?;
        let (ae_title, socket_addr) = address.into_parts();
        if let Some(ae_title) = ae_title.filter(|_| !self.custom_called_ae_title) {
            self.options.called_ae_title = ae_title.into();
        }
        self.establish(socket_addr).await
    }
}

/// An operation requested from the association task.
enum Request {
    Send {
        command: Command,
        data_set: Option<DataSet>,
        store: Option<Box<dyn StoreHandler>>,
        reply_to: oneshot::Sender<Result<(u16, mpsc::UnboundedReceiver<Response>), engine::Error>>,
    },
    Cancel {
        message_id: u16,
        reply_to: oneshot::Sender<Result<(), engine::Error>>,
    },
    Release {
        reply_to: oneshot::Sender<Result<(), engine::Error>>,
    },
    Abort {
        reply_to: oneshot::Sender<Result<(), engine::Error>>,
    },
}

/// A DICOM upper layer association from the perspective
/// of a requesting application entity.
///
/// Requests may be issued concurrently.
/// The responses to each one come through its own [`ResponseStream`].
/// Dropping the association releases it.
#[derive(Debug)]
pub struct ClientAssociation {
    requests: mpsc::Sender<Request>,
    events: mpsc::Receiver<Event>,
    task: JoinHandle<()>,
    presentation_contexts: Vec<NegotiatedContext>,
    peer_max_pdu_length: u32,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Send { command, .. } => write!(f, "Send({})", command),
            Request::Cancel { message_id, .. } => write!(f, "Cancel({})", message_id),
            Request::Release { .. } => f.write_str("Release"),
            Request::Abort { .. } => f.write_str("Abort"),
        }
    }
}

impl ClientAssociation {
    async fn negotiate(mut stream: TcpStream, options: EngineOptions) -> Result<Self> {
        let mut engine = Engine::new(options);
        engine.connected(Instant::now());
        engine.associate().context(EngineSnafu)?;
        flush(&mut stream, &mut engine).await.context(WireSnafu)?;

        let mut buf = vec![0; READ_BUFFER_SIZE];
        loop {
            let n = stream.read(&mut buf).await.context(WireSnafu)?;
            if n == 0 {
                engine.closed();
                return ConnectionClosedSnafu.fail();
            }
            let result = engine.handle_received(&buf[..n], Instant::now());
            // an A-ABORT may be waiting to go out
            flush(&mut stream, &mut engine).await.context(WireSnafu)?;
            result.context(EngineSnafu)?;

            while let Some(event) = engine.poll_event() {
                match event {
                    Event::Associated => return Ok(Self::spawn(stream, engine)),
                    Event::Rejected(association_rj) => {
                        return RejectedSnafu { association_rj }.fail()
                    }
                    Event::Aborted(_) => return AbortedSnafu.fail(),
                    other => trace!("ignoring {:?} during negotiation", other),
                }
            }
        }
    }

    fn spawn(stream: TcpStream, engine: Engine) -> Self {
        let presentation_contexts = engine.presentation_contexts().cloned().collect();
        let peer_max_pdu_length = engine.peer_max_pdu_length();
        let (requests, requests_rx) = mpsc::channel(16);
        let (events_tx, events) = mpsc::channel(EVENT_QUEUE_SIZE);
        let task = tokio::spawn(
            Driver {
                stream,
                engine,
                routes: HashMap::new(),
                events: events_tx,
                release_waiter: None,
            }
            .run(requests_rx),
        );
        ClientAssociation {
            requests,
            events,
            task,
            presentation_contexts,
            peer_max_pdu_length,
        }
    }

    /// The presentation contexts accepted by the peer.
    pub fn presentation_contexts(&self) -> &[NegotiatedContext] {
        &self.presentation_contexts
    }

    /// The maximum PDU length the peer accepts, 0 for no limit.
    pub fn peer_max_pdu_length(&self) -> u32 {
        self.peer_max_pdu_length
    }

    /// Send a request, returning the stream of its responses.
    pub async fn send(&self, command: Command, data_set: Option<DataSet>) -> Result<ResponseStream> {
        self.send_impl(command, data_set, None).await
    }

    /// Send a C-GET or C-MOVE request
    /// whose C-STORE sub-operations are answered by `handler`.
    pub async fn send_with_store<H>(
        &self,
        command: Command,
        data_set: Option<DataSet>,
        handler: H,
    ) -> Result<ResponseStream>
    where
        H: StoreHandler + 'static,
    {
        self.send_impl(command, data_set, Some(Box::new(handler)))
            .await
    }

    async fn send_impl(
        &self,
        command: Command,
        data_set: Option<DataSet>,
        store: Option<Box<dyn StoreHandler>>,
    ) -> Result<ResponseStream> {
        let (message_id, rx) = ask(&self.requests, |reply_to| Request::Send {
            command,
            data_set,
            store,
            reply_to,
        })
        .await?
        .context(EngineSnafu)?;
        Ok(ResponseStream {
            message_id,
            rx,
            requests: self.requests.clone(),
        })
    }

    /// Wait for the next association-level event,
    /// such as an unsolicited request or the association ending.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Gracefully release the association,
    /// waiting for the peer to confirm.
    pub async fn release(self) -> Result<()> {
        let result = ask(&self.requests, |reply_to| Request::Release { reply_to }).await;
        self.finish(result).await
    }

    /// Abort the association.
    pub async fn abort(self) -> Result<()> {
        let result = ask(&self.requests, |reply_to| Request::Abort { reply_to }).await;
        self.finish(result).await
    }

    async fn finish(self, result: Result<Result<(), engine::Error>>) -> Result<()> {
        let ClientAssociation { requests, task, .. } = self;
        drop(requests);
        if let Err(e) = task.await {
            warn!("association task failed: {}", e);
        }
        result?.context(EngineSnafu)
    }
}

/// Send a request to the task and wait for its reply.
async fn ask<T>(
    requests: &mpsc::Sender<Request>,
    request: impl FnOnce(oneshot::Sender<T>) -> Request,
) -> Result<T> {
    let (reply_to, reply) = oneshot::channel();
    requests
        .send(request(reply_to))
        .await
        .ok()
        .context(TaskGoneSnafu)?;
    reply.await.ok().context(TaskGoneSnafu)
}

/// The responses to one request.
///
/// The stream ends after the final response
/// (and its data set, if any) has been delivered,
/// or when the association ends.
#[derive(Debug)]
pub struct ResponseStream {
    message_id: u16,
    rx: mpsc::UnboundedReceiver<Response>,
    requests: mpsc::Sender<Request>,
}

impl ResponseStream {
    /// The message ID assigned to the request.
    pub fn message_id(&self) -> u16 {
        self.message_id
    }

    pub async fn next(&mut self) -> Option<Response> {
        self.rx.recv().await
    }

    /// Ask the peer to cancel the request.
    ///
    /// Responses keep coming until the peer sends the final one.
    pub async fn cancel(&self) -> Result<()> {
        let message_id = self.message_id;
        ask(&self.requests, |reply_to| Request::Cancel {
            message_id,
            reply_to,
        })
        .await?
        .context(EngineSnafu)
    }

    /// Collect all remaining responses.
    pub async fn collect(mut self) -> Vec<Response> {
        let mut responses = Vec::new();
        while let Some(response) = self.next().await {
            responses.push(response);
        }
        responses
    }
}

struct Route {
    tx: mpsc::UnboundedSender<Response>,
    store: Option<Box<dyn StoreHandler>>,
}

/// The task owning an established association.
struct Driver {
    stream: TcpStream,
    engine: Engine,
    routes: HashMap<u16, Route>,
    events: mpsc::Sender<Event>,
    release_waiter: Option<oneshot::Sender<Result<(), engine::Error>>>,
}

impl Driver {
    async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        let mut buf = vec![0; READ_BUFFER_SIZE];
        let mut idle_check = tokio::time::interval(IDLE_CHECK_INTERVAL);
        let mut requests_open = true;

        loop {
            tokio::select! {
                read = self.stream.read(&mut buf) => match read {
                    Ok(0) => self.engine.closed(),
                    Ok(n) => {
                        if let Err(e) = self.engine.handle_received(&buf[..n], Instant::now()) {
                            // fatal errors were already turned into an abort
                            debug!("error handling received data: {}", e);
                        }
                    }
                    Err(e) => {
                        error!("could not read from peer: {}", e);
                        self.engine.closed();
                    }
                },
                request = requests.recv(), if requests_open => match request {
                    Some(request) => self.handle_request(request),
                    None => {
                        requests_open = false;
                        if self.engine.state() == State::Established {
                            debug!("association handle dropped, releasing");
                            if let Err(e) = self.engine.release() {
                                warn!("could not release association: {}", e);
                            }
                        }
                    }
                },
                _ = idle_check.tick() => {
                    if let Err(e) = self.engine.check_idle(Instant::now()) {
                        warn!("idle check failed: {}", e);
                    }
                }
            }

            if let Err(e) = flush(&mut self.stream, &mut self.engine).await {
                error!("could not write to peer: {}", e);
                self.engine.closed();
            }
            self.dispatch();

            if self.engine.state().is_terminal() {
                break;
            }
        }

        if let Err(e) = self.stream.shutdown().await {
            trace!("could not shut down socket: {}", e);
        }
        info!("association task finished ({})", self.engine.state());
    }

    fn handle_request(&mut self, request: Request) {
        trace!("handling {:?}", request);
        match request {
            Request::Send {
                command,
                data_set,
                store,
                reply_to,
            } => {
                let result = self.engine.send(command, data_set.as_ref()).map(|id| {
                    let (tx, rx) = mpsc::unbounded_channel();
                    self.routes.insert(id, Route { tx, store });
                    (id, rx)
                });
                let _ = reply_to.send(result);
            }
            Request::Cancel {
                message_id,
                reply_to,
            } => {
                let _ = reply_to.send(self.engine.cancel(message_id));
            }
            Request::Release { reply_to } => match self.engine.release() {
                Ok(()) => self.release_waiter = Some(reply_to),
                Err(e) => {
                    let _ = reply_to.send(Err(e));
                }
            },
            Request::Abort { reply_to } => {
                let _ = reply_to.send(self.engine.abort());
            }
        }
    }

    /// Hand the engine's events to whoever waits for them.
    fn dispatch(&mut self) {
        while let Some(event) = self.engine.poll_event() {
            match event {
                Event::Response {
                    message_id,
                    command,
                } => self.route(message_id, Response::Command(command)),
                Event::DataSet {
                    message_id,
                    data_set,
                    failed,
                } => self.route(message_id, Response::DataSet { data_set, failed }),
                Event::Completed { message_id } => {
                    self.routes.remove(&message_id);
                }
                Event::StoreRequest {
                    message_id,
                    presentation_context_id,
                    command,
                    data_set,
                } => {
                    let status = match self
                        .routes
                        .get_mut(&message_id)
                        .and_then(|route| route.store.as_mut())
                    {
                        Some(handler) => handler.store(&command, data_set),
                        None => {
                            warn!(
                                "no store handler for sub-operations of message {}",
                                message_id
                            );
                            Status::PROCESSING_FAILURE
                        }
                    };
                    if let Err(e) =
                        self.engine
                            .respond_store(&command, presentation_context_id, status)
                    {
                        warn!("could not answer C-STORE request: {}", e);
                    }
                }
                event @ (Event::Released | Event::Aborted(_) | Event::Closed) => {
                    if let Some(waiter) = self.release_waiter.take() {
                        let _ = waiter.send(Ok(()));
                    }
                    self.routes.clear();
                    forward_event(&self.events, event);
                }
                other => forward_event(&self.events, other),
            }
        }
    }

    fn route(&mut self, message_id: u16, response: Response) {
        match self.routes.get(&message_id) {
            Some(route) => {
                if route.tx.send(response).is_err() {
                    trace!("response stream for message {} dropped", message_id);
                }
            }
            None => trace!("no route for message {}", message_id),
        }
    }
}

/// Queue an event for [`ClientAssociation::next_event`],
/// dropping it if the queue is full.
fn forward_event(events: &mpsc::Sender<Event>, event: Event) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!("event queue full, dropping {:?}", event);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

/// Write out everything the engine has queued.
async fn flush(stream: &mut TcpStream, engine: &mut Engine) -> std::io::Result<()> {
    while let Some(bytes) = engine.poll_transmit() {
        stream.write_all(&bytes).await?;
    }
    stream.flush().await
}
