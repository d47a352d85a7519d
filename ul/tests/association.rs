//! Association requester tests against an in-process fake SCP.
use matches::assert_matches;
use netdicom_core::{DataElement, DataSet, VR};
use netdicom_dictionary_std::{tags, uids};
use netdicom_encoding::{ElementCodec, TransferSyntax};
use netdicom_ul::association::client::{self, ClientAssociationOptions, Response};
use netdicom_ul::association::framing::PduFramer;
use netdicom_ul::association::Event;
use netdicom_ul::pdu::{
    AbortRQSource, AssociationAC, AssociationRJ, AssociationRJResult, AssociationRJSource,
    AssociationRQ, PDataValue, PDataValueType, PresentationContextResult,
    PresentationContextResultReason, UserVariableItem,
};
use netdicom_ul::{read_pdu, write_pdu, Command, CommandField, Pdu, Priority, Status};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

type Result<T = (), E = Box<dyn std::error::Error + Send + Sync>> = std::result::Result<T, E>;

const FIND: &str = uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND;
const GET: &str = uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_GET;
const CT: &str = uids::CT_IMAGE_STORAGE;

/// The accepting side of one association, scripted by each test.
struct FakeScp {
    stream: TcpStream,
    framer: PduFramer,
}

impl FakeScp {
    async fn receive(&mut self) -> Result<Pdu> {
        loop {
            if let Some(bytes) = self.framer.next_pdu() {
                return Ok(read_pdu(bytes, 0, false)?);
            }
            let mut buf = [0; 4096];
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err("connection closed".into());
            }
            self.framer.push(&buf[..n]);
        }
    }

    async fn send(&mut self, pdu: &Pdu) -> Result {
        self.stream.write_all(&write_pdu(pdu)?).await?;
        Ok(())
    }

    /// Accept every proposed context with implicit VR little endian.
    async fn accept(&mut self) -> Result<AssociationRQ> {
        let Pdu::AssociationRQ(rq) = self.receive().await? else {
            return Err("expected A-ASSOCIATE-RQ".into());
        };
        let ac = AssociationAC {
            protocol_version: 1,
            calling_ae_title: rq.calling_ae_title.clone(),
            called_ae_title: rq.called_ae_title.clone(),
            application_context_name: rq.application_context_name.clone(),
            presentation_contexts: rq
                .presentation_contexts
                .iter()
                .map(|pc| PresentationContextResult {
                    id: pc.id,
                    reason: PresentationContextResultReason::Acceptance,
                    transfer_syntax: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
                })
                .collect(),
            user_variables: vec![UserVariableItem::MaxLength(16_384)],
        };
        self.send(&Pdu::AssociationAC(ac)).await?;
        Ok(rq)
    }

    async fn receive_pdv(&mut self) -> Result<PDataValue> {
        match self.receive().await? {
            Pdu::PData { mut data } if data.len() == 1 => Ok(data.remove(0)),
            pdu => Err(format!("expected a single PDV, got {:?}", pdu).into()),
        }
    }

    async fn receive_command(&mut self) -> Result<(u8, Command)> {
        let pdv = self.receive_pdv().await?;
        assert_eq!(pdv.value_type, PDataValueType::Command);
        assert!(pdv.is_last);
        Ok((pdv.presentation_context_id, Command::decode(pdv.data)?))
    }

    async fn receive_data_set(&mut self) -> Result<DataSet> {
        let pdv = self.receive_pdv().await?;
        assert_eq!(pdv.value_type, PDataValueType::Data);
        Ok(codec().decode_dataset(pdv.data)?)
    }

    async fn send_message(
        &mut self,
        context: u8,
        command: &Command,
        data_set: Option<&DataSet>,
    ) -> Result {
        let mut pdvs = vec![PDataValue {
            presentation_context_id: context,
            value_type: PDataValueType::Command,
            is_last: true,
            data: command.encode()?.into(),
        }];
        if let Some(data_set) = data_set {
            pdvs.push(PDataValue {
                presentation_context_id: context,
                value_type: PDataValueType::Data,
                is_last: true,
                data: codec().encode_dataset(data_set)?.into(),
            });
        }
        // both PDVs in one PDU, as some peers do
        self.send(&Pdu::PData { data: pdvs }).await
    }

    async fn expect_release(&mut self) -> Result {
        assert_matches!(self.receive().await?, Pdu::ReleaseRQ);
        self.send(&Pdu::ReleaseRP).await
    }
}

fn codec() -> ElementCodec {
    ElementCodec::new(TransferSyntax::ImplicitVrLittleEndian)
}

fn query(patient_id: &str) -> DataSet {
    let mut ds = DataSet::new();
    ds.put(DataElement::new(tags::QUERY_RETRIEVE_LEVEL, VR::CS, "STUDY"));
    ds.put(DataElement::new(tags::PATIENT_ID, VR::LO, patient_id));
    ds
}

/// Run a fake SCP for a single connection.
async fn spawn_scp<F, Fut>(script: F) -> Result<(SocketAddr, JoinHandle<Result>)>
where
    F: FnOnce(FakeScp) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        script(FakeScp {
            stream,
            framer: PduFramer::new(),
        })
        .await
    });
    Ok((addr, handle))
}

#[tokio::test]
async fn find_yields_pending_results_then_completes() -> Result {
    let (addr, scp) = spawn_scp(|mut scp| async move {
        let rq = scp.accept().await?;
        assert_eq!(rq.called_ae_title, "FIND-SCP");
        assert_eq!(rq.presentation_contexts[0].abstract_syntax, FIND);

        let (context, request) = scp.receive_command().await?;
        assert_eq!(request.command_field(), CommandField::CFindRq);
        assert!(request.has_data_set());
        let identifier = scp.receive_data_set().await?;
        assert!(identifier.contains(tags::QUERY_RETRIEVE_LEVEL));

        for id in ["A", "B"] {
            let pending = Command::response_to(&request, Status::PENDING)
                .ok_or("no response type")?
                .with_data_set(true);
            scp.send_message(context, &pending, Some(&query(id))).await?;
        }
        let done = Command::response_to(&request, Status::SUCCESS).ok_or("no response type")?;
        scp.send_message(context, &done, None).await?;

        scp.expect_release().await
    })
    .await?;

    let association = ClientAssociationOptions::new()
        .with_abstract_syntax(FIND)
        .establish_with(&format!("FIND-SCP@{}", addr))
        .await?;
    assert_eq!(association.presentation_contexts().len(), 1);
    assert_eq!(
        association.presentation_contexts()[0].transfer_syntax,
        TransferSyntax::ImplicitVrLittleEndian
    );

    let responses = association
        .send(
            Command::find_rq(FIND, Priority::Medium),
            Some(query("*")),
        )
        .await?
        .collect()
        .await;

    assert_eq!(responses.len(), 5);
    let ids: Vec<String> = responses
        .iter()
        .filter_map(|r| match r {
            Response::DataSet { data_set, .. } => data_set
                .get(tags::PATIENT_ID)
                .and_then(|e| e.to_str().ok())
                .map(|s| s.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_matches!(
        &responses[4],
        Response::Command(c) if c.status() == Some(Status::SUCCESS)
    );

    association.release().await?;
    scp.await??;
    Ok(())
}

#[tokio::test]
async fn get_store_sub_operations_reach_the_handler() -> Result {
    let (addr, scp) = spawn_scp(|mut scp| async move {
        let rq = scp.accept().await?;
        let ct_context = rq
            .presentation_contexts
            .iter()
            .find(|pc| pc.abstract_syntax == CT)
            .map(|pc| pc.id)
            .ok_or("CT storage not proposed")?;

        let (context, request) = scp.receive_command().await?;
        assert_eq!(request.command_field(), CommandField::CGetRq);
        scp.receive_data_set().await?;

        let store = Command::store_rq(CT, "1.2.826.0.1.3680043.2.1125.1", Priority::Medium)
            .with_message_id(500)
            .with_data_set(true);
        scp.send_message(ct_context, &store, Some(&query("STORED")))
            .await?;

        let (store_context, store_rsp) = scp.receive_command().await?;
        assert_eq!(store_context, ct_context);
        assert_eq!(store_rsp.command_field(), CommandField::CStoreRsp);
        assert_eq!(store_rsp.responded_to(), Some(500));
        assert_eq!(store_rsp.status(), Some(Status::SUCCESS));

        let done = Command::response_to(&request, Status::SUCCESS)
            .ok_or("no response type")?
            .with_sub_operations(0, 1, 0, 0);
        scp.send_message(context, &done, None).await?;

        scp.expect_release().await
    })
    .await?;

    let association = ClientAssociationOptions::new()
        .with_abstract_syntax(GET)
        .with_abstract_syntax(CT)
        .establish(addr)
        .await?;

    let stored = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stored);
    let responses = association
        .send_with_store(
            Command::get_rq(GET, Priority::Medium),
            Some(query("STORED")),
            move |command: &Command, data_set: DataSet| {
                let uid = command
                    .affected_sop_instance_uid()
                    .map(|uid| uid.into_owned())
                    .unwrap_or_default();
                if let Ok(mut stored) = sink.lock() {
                    stored.push((uid, data_set));
                }
                Status::SUCCESS
            },
        )
        .await?
        .collect()
        .await;

    assert_matches!(
        responses.as_slice(),
        [Response::Command(c)] if c.completed_sub_operations() == Some(1)
    );
    {
        let stored = stored.lock().map_err(|_| "poisoned")?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].0, "1.2.826.0.1.3680043.2.1125.1");
        assert!(stored[0].1.contains(tags::PATIENT_ID));
    }

    association.release().await?;
    scp.await??;
    Ok(())
}

#[tokio::test]
async fn rejected_association_is_an_error() -> Result {
    let (addr, scp) = spawn_scp(|mut scp| async move {
        assert_matches!(scp.receive().await?, Pdu::AssociationRQ(_));
        scp.send(&Pdu::AssociationRJ(AssociationRJ {
            result: AssociationRJResult::Permanent,
            source: AssociationRJSource::ServiceUser,
            reason: 7,
        }))
        .await
    })
    .await?;

    let result = ClientAssociationOptions::new()
        .with_abstract_syntax(uids::VERIFICATION)
        .establish(addr)
        .await;
    assert_matches!(
        result,
        Err(client::Error::Rejected {
            association_rj: AssociationRJ { reason: 7, .. },
            ..
        })
    );
    scp.await??;
    Ok(())
}

#[tokio::test]
async fn missing_abstract_syntax_is_an_error() {
    let result = ClientAssociationOptions::new()
        .establish("127.0.0.1:1")
        .await;
    assert_matches!(result, Err(client::Error::MissingAbstractSyntax { .. }));
}

#[tokio::test]
async fn peer_abort_ends_outstanding_requests() -> Result {
    let (addr, scp) = spawn_scp(|mut scp| async move {
        scp.accept().await?;
        let (_, request) = scp.receive_command().await?;
        assert_eq!(request.command_field(), CommandField::CFindRq);
        scp.receive_data_set().await?;
        scp.send(&Pdu::AbortRQ {
            source: AbortRQSource::ServiceUser,
        })
        .await
    })
    .await?;

    let mut association = ClientAssociationOptions::new()
        .with_abstract_syntax(FIND)
        .establish(addr)
        .await?;
    let responses = association
        .send(Command::find_rq(FIND, Priority::Medium), Some(query("*")))
        .await?
        .collect()
        .await;
    assert!(responses.is_empty());
    assert_matches!(
        association.next_event().await,
        Some(Event::Aborted(AbortRQSource::ServiceUser))
    );
    scp.await??;
    Ok(())
}

#[tokio::test]
async fn cancel_sends_c_cancel_rq() -> Result {
    let (addr, scp) = spawn_scp(|mut scp| async move {
        scp.accept().await?;
        let (context, request) = scp.receive_command().await?;
        scp.receive_data_set().await?;
        let pending = Command::response_to(&request, Status::PENDING)
            .ok_or("no response type")?
            .with_data_set(true);
        scp.send_message(context, &pending, Some(&query("A"))).await?;

        let (cancel_context, cancel) = scp.receive_command().await?;
        assert_eq!(cancel_context, context);
        assert_eq!(cancel.command_field(), CommandField::CCancelRq);
        assert_eq!(cancel.responded_to(), request.message_id());

        let cancelled = Command::response_to(&request, Status::CANCEL).ok_or("no response type")?;
        scp.send_message(context, &cancelled, None).await?;
        scp.expect_release().await
    })
    .await?;

    let association = ClientAssociationOptions::new()
        .with_abstract_syntax(FIND)
        .establish(addr)
        .await?;
    let mut responses = association
        .send(Command::find_rq(FIND, Priority::Medium), Some(query("*")))
        .await?;

    assert_matches!(responses.next().await, Some(Response::Command(_)));
    assert_matches!(responses.next().await, Some(Response::DataSet { .. }));
    responses.cancel().await?;
    assert_matches!(
        responses.next().await,
        Some(Response::Command(c)) if c.status() == Some(Status::CANCEL)
    );
    assert_matches!(responses.next().await, None);

    association.release().await?;
    scp.await??;
    Ok(())
}
