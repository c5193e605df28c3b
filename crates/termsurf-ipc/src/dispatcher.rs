//! Request multiplexing over one shared transport.
//!
//! Many callers issue requests concurrently through one [`Dispatcher`]. Each
//! request gets a correlation id from a monotonic counter, a slot in the
//! pending table, and a frame on the wire; a single background reader task
//! decodes inbound frames and resolves the matching slot. A caller only ever
//! observes exactly one of: result, remote error, timeout, or transport
//! closure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::IpcError;
use crate::protocol::{Request, Response};
use crate::transport::{FrameReader, FrameWriter};

type PendingSlot = oneshot::Sender<Result<Value, IpcError>>;

struct Shared {
    pending: Mutex<HashMap<u64, PendingSlot>>,
    closed: AtomicBool,
}

impl Shared {
    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u64, PendingSlot>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, id: u64, slot: PendingSlot) {
        self.lock_pending().insert(id, slot);
    }

    fn take(&self, id: u64) -> Option<PendingSlot> {
        self.lock_pending().remove(&id)
    }

    /// Mark the transport dead and resolve every outstanding request with
    /// `TransportClosed`. Draining through `remove` keeps each slot
    /// single-resolution even if close races a response.
    fn close_and_drain(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<PendingSlot> = {
            let mut pending = self.lock_pending();
            pending.drain().map(|(_, slot)| slot).collect()
        };
        for slot in drained {
            let _ = slot.send(Err(IpcError::TransportClosed));
        }
    }
}

pub struct Dispatcher {
    next_id: AtomicU64,
    writer: tokio::sync::Mutex<FrameWriter>,
    shared: Arc<Shared>,
    reader_task: JoinHandle<()>,
}

impl Dispatcher {
    /// Take ownership of a connected transport and start the reader task.
    pub fn new(reader: FrameReader, writer: FrameWriter) -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });
        let reader_task = tokio::spawn(read_loop(reader, Arc::clone(&shared)));
        Self {
            next_id: AtomicU64::new(1),
            writer: tokio::sync::Mutex::new(writer),
            shared,
            reader_task,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Issue one request and suspend until its response, the timeout, or
    /// transport closure. Suspends only the calling task; concurrent calls
    /// share the transport without serializing on each other's responses.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, IpcError> {
        if self.is_closed() {
            return Err(IpcError::TransportClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.shared.insert(id, tx);

        // The reader may have drained the table between the closed check and
        // the insert; a slot registered after the drain would hang forever.
        if self.is_closed() {
            self.shared.take(id);
            return Err(IpcError::TransportClosed);
        }

        let request = Request::new(id, method, params);
        let payload = serde_json::to_vec(&request)?;

        let write_result = {
            let mut writer = self.writer.lock().await;
            writer.send(&payload).await
        };
        if let Err(err) = write_result {
            self.shared.take(id);
            return match err {
                // Nothing reached the wire; the channel is still usable.
                IpcError::MessageTooLarge(n) => Err(IpcError::MessageTooLarge(n)),
                _ => {
                    self.shared.close_and_drain();
                    Err(IpcError::TransportClosed)
                }
            };
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Slot dropped without resolution: the reader task is gone.
            Ok(Err(_)) => Err(IpcError::TransportClosed),
            Err(_) => {
                // Cancel locally. Removing the slot means a late response
                // finds no pending entry and is dropped, never resurrected.
                self.shared.take(id);
                Err(IpcError::Timeout {
                    method: method.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Close the transport. Every pending and future call resolves with
    /// `TransportClosed`.
    pub async fn close(&self) {
        self.shared.close_and_drain();
        let mut writer = self.writer.lock().await;
        writer.shutdown().await;
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_loop(mut reader: FrameReader, shared: Arc<Shared>) {
    loop {
        match reader.receive().await {
            Ok(Some(payload)) => {
                let response: Response = match serde_json::from_slice(&payload) {
                    Ok(response) => response,
                    Err(err) => {
                        warn!(error = %err, "dropping undecodable frame");
                        continue;
                    }
                };
                resolve(&shared, response);
            }
            Ok(None) => {
                debug!("emulator closed the connection");
                break;
            }
            Err(err) => {
                warn!(error = %err, "transport read failed");
                break;
            }
        }
    }
    shared.close_and_drain();
}

fn resolve(shared: &Shared, response: Response) {
    let Some(slot) = shared.take(response.id) else {
        // Cancelled locally or never ours; either way it has no caller.
        warn!(id = response.id, "dropping response with no pending request");
        return;
    };

    let outcome = match (response.result, response.error) {
        (_, Some(err)) => Err(IpcError::Remote {
            code: err.code,
            message: err.message,
        }),
        (Some(value), None) => Ok(value),
        (None, None) => Err(IpcError::InvalidResponse(
            "response carries neither result nor error".to_string(),
        )),
    };
    let _ = slot.send(outcome);
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::net::UnixStream;

    use super::*;
    use crate::frame;
    use crate::transport::Transport;

    /// Read one request frame from the server half and return its parsed id
    /// and method.
    async fn read_request(server: &mut UnixStream) -> (u64, String) {
        let payload = frame::read_frame(server).await.unwrap().unwrap();
        let value: Value = serde_json::from_slice(&payload).unwrap();
        (
            value["id"].as_u64().unwrap(),
            value["method"].as_str().unwrap().to_string(),
        )
    }

    async fn respond(server: &mut UnixStream, id: u64, result: Value) {
        let payload = serde_json::to_vec(&json!({ "id": id, "result": result })).unwrap();
        frame::write_frame(server, &payload).await.unwrap();
    }

    fn dispatcher_pair() -> (Dispatcher, UnixStream) {
        let (client, server) = UnixStream::pair().unwrap();
        let (reader, writer) = Transport::from_stream(client);
        (Dispatcher::new(reader, writer), server)
    }

    #[tokio::test]
    async fn concurrent_calls_resolve_to_their_own_callers() {
        let (dispatcher, mut server) = dispatcher_pair();

        let server_task = tokio::spawn(async move {
            let (first_id, _) = read_request(&mut server).await;
            let (second_id, _) = read_request(&mut server).await;
            // Answer out of order to prove correlation, not arrival order,
            // routes responses.
            respond(&mut server, second_id, json!({ "tag": "second" })).await;
            respond(&mut server, first_id, json!({ "tag": "first" })).await;
            server
        });

        let timeout = Duration::from_secs(5);
        let (first, second) = tokio::join!(
            dispatcher.call("get_screen", Some(json!({"surface_id": "a"})), timeout),
            dispatcher.call("get_screen", Some(json!({"surface_id": "b"})), timeout),
        );

        assert_eq!(first.unwrap()["tag"], "first");
        assert_eq!(second.unwrap()["tag"], "second");
        drop(server_task.await.unwrap());
    }

    #[tokio::test]
    async fn timeout_cancels_locally_and_discards_the_late_response() {
        let (dispatcher, mut server) = dispatcher_pair();

        let server_task = tokio::spawn(async move {
            let (first_id, _) = read_request(&mut server).await;
            // Far too late for the caller's deadline.
            tokio::time::sleep(Duration::from_millis(200)).await;
            respond(&mut server, first_id, json!({ "late": true })).await;

            let (second_id, _) = read_request(&mut server).await;
            respond(&mut server, second_id, json!({ "ok": true })).await;
            server
        });

        let result = dispatcher
            .call("get_screen", None, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(IpcError::Timeout { .. })));

        // The late response was dropped without crashing the reader, and a
        // fresh call still works on the same transport.
        let value = dispatcher
            .call("list_surfaces", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        drop(server_task.await.unwrap());
    }

    #[tokio::test]
    async fn unsolicited_response_ids_are_dropped() {
        let (dispatcher, mut server) = dispatcher_pair();

        let server_task = tokio::spawn(async move {
            respond(&mut server, 999, json!({ "stray": true })).await;
            let (id, _) = read_request(&mut server).await;
            respond(&mut server, id, json!({ "ok": true })).await;
            server
        });

        let value = dispatcher
            .call("list_surfaces", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        drop(server_task.await.unwrap());
    }

    #[tokio::test]
    async fn remote_errors_pass_through_verbatim() {
        let (dispatcher, mut server) = dispatcher_pair();

        tokio::spawn(async move {
            let (id, _) = read_request(&mut server).await;
            let payload = serde_json::to_vec(&json!({
                "id": id,
                "error": { "code": "surface-not-found", "message": "no surface s9" }
            }))
            .unwrap();
            frame::write_frame(&mut server, &payload).await.unwrap();
            // Keep the connection open until the assertion runs.
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let err = dispatcher
            .call("get_screen", Some(json!({"surface_id": "s9"})), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            IpcError::Remote { code, message } => {
                assert_eq!(code, "surface-not-found");
                assert_eq!(message, "no surface s9");
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_close_broadcasts_to_pending_and_future_calls() {
        let (dispatcher, mut server) = dispatcher_pair();

        let pending = dispatcher.call("get_screen", None, Duration::from_secs(5));
        let server_task = tokio::spawn(async move {
            let _ = read_request(&mut server).await;
            drop(server);
        });

        let result = pending.await;
        assert!(matches!(result, Err(IpcError::TransportClosed)));
        server_task.await.unwrap();

        let result = dispatcher.call("list_surfaces", None, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(IpcError::TransportClosed)));
        assert!(dispatcher.is_closed());
    }

    #[tokio::test]
    async fn correlation_ids_are_monotonic_and_unique() {
        let (dispatcher, mut server) = dispatcher_pair();

        let server_task = tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..3 {
                let (id, _) = read_request(&mut server).await;
                seen.push(id);
                respond(&mut server, id, json!({})).await;
            }
            seen
        });

        for _ in 0..3 {
            dispatcher
                .call("list_surfaces", None, Duration::from_secs(5))
                .await
                .unwrap();
        }

        let seen = server_task.await.unwrap();
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
