//! Caller-side proxy: correlation table, initialization gating, teardown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use common::error::RpcError;
use common::storage::store::{IndexReport, SimilarityResultItem, UpsertRecord};

use crate::protocol::{ReplyBody, ReplyEnvelope, RequestBody, RequestEnvelope};

/// Transient record of one in-flight call, destroyed when its reply (or a
/// termination) arrives.
struct PendingCall {
    resolve: oneshot::Sender<Result<ReplyBody, RpcError>>,
}

type PendingTable = Arc<StdMutex<HashMap<String, PendingCall>>>;

type InitSignal = Option<Result<(), RpcError>>;

enum InitState {
    Uninitialized,
    /// One initialize call is in flight; everyone else waits on the
    /// watch channel.
    Initializing(watch::Receiver<InitSignal>),
    Ready,
}

enum InitRole {
    Ready,
    Leader(watch::Sender<InitSignal>),
    Waiter(watch::Receiver<InitSignal>),
}

/// Asynchronous proxy to the worker.
///
/// Owns the pending-call table exclusively; nothing else reads or writes
/// it. Calls may resolve in any order relative to dispatch order since
/// matching goes through correlation ids only.
pub struct WorkerProxy {
    outbound: StdMutex<Option<mpsc::UnboundedSender<RequestEnvelope>>>,
    pending: PendingTable,
    init: Mutex<InitState>,
    dispatcher: StdMutex<Option<JoinHandle<()>>>,
}

impl WorkerProxy {
    /// Wires a proxy onto a duplex channel pair. The concrete transport
    /// behind the pair (task, thread, subprocess bridge) is invisible here.
    pub fn connect(
        outbound: mpsc::UnboundedSender<RequestEnvelope>,
        mut inbound: mpsc::UnboundedReceiver<ReplyEnvelope>,
    ) -> Self {
        let pending: PendingTable = Arc::default();

        let dispatcher_pending = Arc::clone(&pending);
        let dispatcher = tokio::spawn(async move {
            while let Some(reply) = inbound.recv().await {
                let call = dispatcher_pending
                    .lock()
                    .expect("pending table poisoned")
                    .remove(&reply.id);

                match call {
                    Some(call) => {
                        let result = match reply.body {
                            ReplyBody::Error { message } => Err(RpcError::Worker(message)),
                            body => Ok(body),
                        };
                        if call.resolve.send(result).is_err() {
                            debug!(id = %reply.id, "caller gone before its reply arrived");
                        }
                    }
                    None => {
                        warn!(
                            id = %reply.id,
                            kind = reply.body.kind(),
                            "dropping reply with unknown or duplicate correlation id"
                        );
                    }
                }
            }

            // The worker hung up. Whatever is still pending will never be
            // answered.
            let stranded: Vec<PendingCall> = {
                let mut pending = dispatcher_pending.lock().expect("pending table poisoned");
                pending.drain().map(|(_, call)| call).collect()
            };
            for call in stranded {
                let _ = call.resolve.send(Err(RpcError::ChannelClosed));
            }
        });

        Self {
            outbound: StdMutex::new(Some(outbound)),
            pending,
            init: Mutex::new(InitState::Uninitialized),
            dispatcher: StdMutex::new(Some(dispatcher)),
        }
    }

    /// Number of calls currently awaiting replies.
    pub fn pending_calls(&self) -> usize {
        self.pending.lock().expect("pending table poisoned").len()
    }

    /// Completes the worker handshake, collapsing concurrent callers into
    /// a single in-flight initialize. Failure resets the state so a later
    /// call can retry.
    pub async fn ensure_initialized(&self) -> Result<(), RpcError> {
        let role = {
            let mut state = self.init.lock().await;
            match &*state {
                InitState::Ready => InitRole::Ready,
                InitState::Initializing(rx) => InitRole::Waiter(rx.clone()),
                InitState::Uninitialized => {
                    let (tx, rx) = watch::channel(None);
                    *state = InitState::Initializing(rx);
                    InitRole::Leader(tx)
                }
            }
        };

        match role {
            InitRole::Ready => Ok(()),
            InitRole::Leader(tx) => {
                let result = match self.dispatch(RequestBody::Initialize).await {
                    Ok(ReplyBody::InitializeResult { backend, dimension }) => {
                        debug!(backend = %backend, dimension, "worker initialized");
                        Ok(())
                    }
                    Ok(other) => Err(RpcError::InitializationFailed(format!(
                        "unexpected handshake reply {}",
                        other.kind()
                    ))),
                    Err(err) => Err(RpcError::InitializationFailed(err.to_string())),
                };

                let mut state = self.init.lock().await;
                *state = match result {
                    Ok(()) => InitState::Ready,
                    Err(_) => InitState::Uninitialized,
                };
                drop(state);

                let _ = tx.send(Some(result.clone()));
                result
            }
            InitRole::Waiter(mut rx) => loop {
                let settled = rx.borrow().clone();
                if let Some(result) = settled {
                    return result;
                }
                if rx.changed().await.is_err() {
                    return Err(RpcError::InitializationFailed(
                        "initialization abandoned".into(),
                    ));
                }
            },
        }
    }

    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, RpcError> {
        self.ensure_initialized().await?;
        match self.dispatch(RequestBody::EmbedBatch { texts }).await? {
            ReplyBody::EmbedBatchResult { vectors } => Ok(vectors),
            other => Err(unexpected("embedBatch", &other)),
        }
    }

    pub async fn average_vectors(&self, vectors: Vec<Vec<f32>>) -> Result<Vec<f32>, RpcError> {
        self.ensure_initialized().await?;
        match self.dispatch(RequestBody::AverageVectors { vectors }).await? {
            ReplyBody::AverageVectorsResult { vector } => Ok(vector),
            other => Err(unexpected("averageVectors", &other)),
        }
    }

    pub async fn vectorize_and_store(
        &self,
        records: Vec<UpsertRecord>,
    ) -> Result<usize, RpcError> {
        self.ensure_initialized().await?;
        match self
            .dispatch(RequestBody::VectorizeAndStore { records })
            .await?
        {
            ReplyBody::VectorizeAndStoreResult { count } => Ok(count),
            other => Err(unexpected("vectorizeAndStore", &other)),
        }
    }

    pub async fn query_similar(
        &self,
        vector: Vec<f32>,
        limit: usize,
        exclude_file_paths: Vec<String>,
    ) -> Result<Vec<SimilarityResultItem>, RpcError> {
        self.ensure_initialized().await?;
        match self
            .dispatch(RequestBody::QuerySimilar {
                vector,
                limit,
                exclude_file_paths,
            })
            .await?
        {
            ReplyBody::QuerySimilarResult { items } => Ok(items),
            other => Err(unexpected("querySimilar", &other)),
        }
    }

    pub async fn vectors_for_path(&self, path: &str) -> Result<Option<Vec<Vec<f32>>>, RpcError> {
        self.ensure_initialized().await?;
        match self
            .dispatch(RequestBody::VectorsForPath { path: path.to_string() })
            .await?
        {
            ReplyBody::VectorsForPathResult { vectors } => Ok(vectors),
            other => Err(unexpected("vectorsForPath", &other)),
        }
    }

    pub async fn rebuild_store(&self) -> Result<(), RpcError> {
        self.ensure_initialized().await?;
        match self.dispatch(RequestBody::RebuildStore).await? {
            ReplyBody::RebuildStoreResult => Ok(()),
            other => Err(unexpected("rebuildStore", &other)),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<IndexReport, RpcError> {
        self.ensure_initialized().await?;
        match self.dispatch(RequestBody::EnsureIndexes).await? {
            ReplyBody::EnsureIndexesResult { report } => Ok(report),
            other => Err(unexpected("ensureIndexes", &other)),
        }
    }

    pub async fn close_store(&self) -> Result<(), RpcError> {
        self.ensure_initialized().await?;
        match self.dispatch(RequestBody::CloseStore).await? {
            ReplyBody::CloseStoreResult => Ok(()),
            other => Err(unexpected("closeStore", &other)),
        }
    }

    /// Tears the proxy down: every pending call is rejected with a
    /// cancellation error, the outbound channel closes (which ends an
    /// in-process worker loop) and the dispatcher stops. Idempotent.
    pub fn terminate(&self) {
        let outbound = self.outbound.lock().expect("sender poisoned").take();
        drop(outbound);

        let stranded: Vec<PendingCall> = {
            let mut pending = self.pending.lock().expect("pending table poisoned");
            pending.drain().map(|(_, call)| call).collect()
        };
        for call in stranded {
            let _ = call.resolve.send(Err(RpcError::Terminated));
        }

        if let Some(handle) = self.dispatcher.lock().expect("dispatcher poisoned").take() {
            handle.abort();
        }
    }

    /// Registers a pending call, sends the request, and waits for the
    /// dispatcher to resolve it.
    async fn dispatch(&self, body: RequestBody) -> Result<ReplyBody, RpcError> {
        let id = Uuid::new_v4().to_string();
        let (resolve, resolved) = oneshot::channel();

        self.pending
            .lock()
            .expect("pending table poisoned")
            .insert(id.clone(), PendingCall { resolve });

        let sent = {
            let outbound = self.outbound.lock().expect("sender poisoned");
            match outbound.as_ref() {
                Some(sender) => sender
                    .send(RequestEnvelope { id: id.clone(), body })
                    .map_err(|_| RpcError::ChannelClosed),
                None => Err(RpcError::Terminated),
            }
        };
        if let Err(err) = sent {
            self.pending
                .lock()
                .expect("pending table poisoned")
                .remove(&id);
            return Err(err);
        }

        match resolved.await {
            Ok(result) => result,
            // Dispatcher dropped the handle without resolving it.
            Err(_) => Err(RpcError::ChannelClosed),
        }
    }
}

impl Drop for WorkerProxy {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn unexpected(request: &str, reply: &ReplyBody) -> RpcError {
    RpcError::UnexpectedReply(format!("{request} answered with {}", reply.kind()))
}
