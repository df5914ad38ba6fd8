//! The request loop and its handlers.

pub mod handler;

pub use handler::ContactService;

use switchboard_core::Result;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::worker::relay::{Relay, RelayEvent};
use crate::worker::store::ContactStore;
use crate::worker::telemetry;

/// Runs the request loop until the supervisor closes the stream.
///
/// # Behavior
/// Strictly one event at a time: a heartbeat is acknowledged immediately,
/// and a request is dispatched and answered (or reported as an error frame)
/// before the next frame is read. Whether an error ends the loop depends
/// only on its category: per-request database failures are reported to the
/// supervisor and serving continues; protocol and transport failures
/// propagate.
///
/// # Errors
/// Returns the fatal error that ended the loop. A clean end of stream is
/// `Ok(())`.
pub async fn serve<R, W, C>(mut relay: Relay<R, W>, service: ContactService<C>) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    C: ContactStore,
{
    loop {
        match relay.next_event().await? {
            RelayEvent::EndOfStream => {
                #[cfg(feature = "tracing")]
                tracing::info!("Relay closed; exiting request loop");
                return Ok(());
            }
            RelayEvent::Heartbeat => {
                telemetry::increment_heartbeats();
                relay.heartbeat().await?;
            }
            RelayEvent::Request(request) => {
                telemetry::increment_requests();
                let started = std::time::Instant::now();

                match service.dispatch(&request).await {
                    Ok(response) => relay.respond(response).await?,
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        telemetry::increment_request_errors();
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Request failed: {err}");
                        relay.report_error(&err.to_string()).await?;
                    }
                }

                telemetry::record_request_duration(started.elapsed().as_secs_f64() * 1000.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::pool::ConnectionPool;
    use crate::worker::store::testing::{MemoryConn, MemoryTable};
    use std::convert::Infallible;
    use std::sync::Arc;
    use switchboard_core::{Error, Frame, HttpRequest, HttpResponse, read_frame, write_frame};
    use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
    use tokio::task::JoinHandle;

    struct Harness {
        to_worker: WriteHalf<DuplexStream>,
        from_worker: ReadHalf<DuplexStream>,
        pool: Arc<ConnectionPool<MemoryConn>>,
        worker: JoinHandle<Result<()>>,
    }

    async fn start_worker(table: &MemoryTable, capacity: usize) -> Harness {
        let pool = ConnectionPool::initialize(capacity, || {
            let conn = table.connection();
            async move { Ok::<_, Infallible>(conn) }
        })
        .await
        .expect("pool initializes");

        let (supervisor_io, worker_io) = tokio::io::duplex(64 * 1024);
        let (worker_rx, worker_tx) = tokio::io::split(worker_io);
        let (from_worker, to_worker) = tokio::io::split(supervisor_io);

        let relay = Relay::new(worker_rx, worker_tx);
        let service = ContactService::new(Arc::clone(&pool));
        let worker = tokio::spawn(serve(relay, service));

        Harness {
            to_worker,
            from_worker,
            pool,
            worker,
        }
    }

    impl Harness {
        async fn send(&mut self, frame: &Frame) {
            write_frame(&mut self.to_worker, frame).await.unwrap();
        }

        async fn reply(&mut self) -> Frame {
            read_frame(&mut self.from_worker)
                .await
                .unwrap()
                .expect("worker closed its stream")
        }

        async fn response(&mut self) -> HttpResponse {
            match self.reply().await {
                Frame::Response(response) => response,
                other => panic!("expected a response frame, got {other:?}"),
            }
        }

        async fn shutdown(mut self) -> Result<()> {
            self.to_worker.shutdown().await.unwrap();
            drop(self.to_worker);
            self.worker.await.expect("worker task completed")
        }
    }

    fn post_contact(external_id: &str, phone_number: &str) -> Frame {
        let body = serde_json::json!({
            "external_id": external_id,
            "phone_number": phone_number
        });
        Frame::Request(HttpRequest::new("POST", "/contacts").with_body(body.to_string().as_bytes()))
    }

    fn list_contacts(target: &str) -> Frame {
        Frame::Request(HttpRequest::new("GET", target))
    }

    #[tokio::test]
    async fn ping_round_trips_and_eof_exits_cleanly() {
        let table = MemoryTable::new();
        let mut harness = start_worker(&table, 1).await;

        harness
            .send(&Frame::Request(HttpRequest::new("GET", "/ping")))
            .await;
        let response = harness.response().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body().unwrap(), b"pong");

        assert!(harness.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn heartbeats_are_acknowledged_without_dispatch() {
        let table = MemoryTable::new();
        let mut harness = start_worker(&table, 1).await;

        harness.send(&Frame::Heartbeat).await;
        assert_eq!(harness.reply().await, Frame::Heartbeat);
        assert_eq!(table.row_count(), 0);
        assert_eq!(harness.pool.idle_count(), 1);

        assert!(harness.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn created_contacts_show_up_in_listings() {
        let table = MemoryTable::new();
        let mut harness = start_worker(&table, 2).await;

        harness.send(&post_contact("abc", "+15551234567")).await;
        assert_eq!(harness.response().await.status, 201);

        harness.send(&list_contacts("/contacts?external_id=abc")).await;
        let response = harness.response().await;
        assert_eq!(response.status, 200);
        let listed: serde_json::Value =
            serde_json::from_slice(&response.body().unwrap()).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["phone_number"], "+15551234567");

        assert!(harness.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn identical_listings_return_identical_results() {
        let table = MemoryTable::new();
        let mut harness = start_worker(&table, 1).await;

        harness.send(&post_contact("a", "+15550000001")).await;
        harness.response().await;
        harness.send(&post_contact("b", "+15550000002")).await;
        harness.response().await;

        harness.send(&list_contacts("/contacts")).await;
        let first = harness.response().await;
        harness.send(&list_contacts("/contacts")).await;
        let second = harness.response().await;
        assert_eq!(first, second);

        assert!(harness.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn invalid_input_gets_a_400_and_serving_continues() {
        let table = MemoryTable::new();
        let mut harness = start_worker(&table, 1).await;

        harness
            .send(&Frame::Request(
                HttpRequest::new("POST", "/contacts").with_body(b"{}"),
            ))
            .await;
        assert_eq!(harness.response().await.status, 400);

        harness.send(&post_contact("abc", "+15551234567")).await;
        assert_eq!(harness.response().await.status, 201);

        assert!(harness.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn store_failures_are_reported_and_survived() {
        let table = MemoryTable::new();
        let mut harness = start_worker(&table, 2).await;

        table.fail_next();
        harness.send(&post_contact("abc", "+15551234567")).await;
        match harness.reply().await {
            Frame::Error { message } => {
                assert!(message.contains("Database error"), "message: {message}");
            }
            other => panic!("expected an error frame, got {other:?}"),
        }

        // The failed request leaked nothing.
        assert_eq!(harness.pool.idle_count(), 2);

        harness.send(&post_contact("abc", "+15551234567")).await;
        assert_eq!(harness.response().await.status, 201);
        assert_eq!(harness.pool.idle_count(), 2);

        assert!(harness.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn immediate_eof_is_a_clean_exit() {
        let table = MemoryTable::new();
        let harness = start_worker(&table, 1).await;
        assert!(harness.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn protocol_violations_end_the_loop() {
        let table = MemoryTable::new();
        let mut harness = start_worker(&table, 1).await;

        harness
            .send(&Frame::Error {
                message: "supervisors do not send this".to_string(),
            })
            .await;
        let result = harness.worker.await.expect("worker task completed");
        assert!(matches!(result, Err(Error::Frame { .. })));
    }
}
