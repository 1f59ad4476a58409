//! Client builder and connection lifecycle.
//!
//! The [`ClientBuilder`] configures the capability manifest and timing
//! knobs; [`Client::connect`] takes any duplex byte stream and brings the
//! connection up:
//! 1. Build the capability registry from the manifest
//! 2. Split the stream and spawn the writer task
//! 3. Spawn the read loop feeding the frame decoder
//! 4. Route decoded frames to the correlator or the notification channel
//!
//! # Example
//!
//! ```ignore
//! use pinwire::{Arg, Client, Manifest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pinwire::PinwireError> {
//!     let manifest = Manifest::single_board("ardu1", 1);
//!     let mut client = Client::builder(manifest)
//!         .connect_serial("/dev/ttyACM0", &Default::default())
//!         .await?;
//!
//!     let mut events = client.notifications().expect("first take");
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             eprintln!("link notice: {event:?}");
//!         }
//!     });
//!
//!     client
//!         .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(11), Arg::U8(1)])
//!         .await?;
//!     client.close().await
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::capability::{Arg, CapabilityRegistry, Manifest, ResultValue};
use crate::correlator::Correlator;
use crate::error::{PinwireError, Result};
use crate::events::ProtocolEvent;
use crate::protocol::{encode_frame, Decoded, Frame, FrameBuffer};
use crate::transport::SerialConfig;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Default deadline for a correlated request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Default capacity of the notification channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Read buffer size for the read loop.
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Builder for configuring and connecting a client.
pub struct ClientBuilder {
    manifest: Manifest,
    request_timeout: Duration,
    event_capacity: usize,
    writer_config: WriterConfig,
}

impl ClientBuilder {
    /// Create a builder around a capability manifest.
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            writer_config: WriterConfig::default(),
        }
    }

    /// Set the default per-request deadline. Default: 2 seconds.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the notification channel capacity. Default: 64.
    ///
    /// When the caller falls behind, further notifications are dropped
    /// with a warning rather than stalling the read loop.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set the writer queue capacity. Default: 64.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.writer_config.channel_capacity = capacity;
        self
    }

    /// Connect over an already-open duplex byte stream.
    pub async fn connect<S>(self, stream: S) -> Result<Client>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let state = Arc::new(watch::channel(ConnectionState::Opening).0);
        let registry = Arc::new(CapabilityRegistry::from_manifest(&self.manifest));
        let correlator = Correlator::new();

        let (read_half, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half, self.writer_config);
        let (events_tx, events_rx) = mpsc::channel(self.event_capacity.max(1));

        let reader_task = tokio::spawn(read_loop(
            read_half,
            correlator.clone(),
            events_tx,
            Arc::clone(&state),
        ));

        state.send_replace(ConnectionState::Open);

        Ok(Client {
            registry,
            correlator,
            writer,
            writer_task,
            reader_task,
            state,
            events: Some(events_rx),
            request_timeout: self.request_timeout,
        })
    }

    /// Open the named serial port and connect over it.
    pub async fn connect_serial(self, port: &str, config: &SerialConfig) -> Result<Client> {
        let stream = crate::transport::serial::open(port, config)?;
        self.connect(stream).await
    }
}

/// A connected bridge client.
///
/// Any number of tasks may invoke capabilities concurrently through a
/// shared reference; each `invoke` suspends its own caller only.
pub struct Client {
    registry: Arc<CapabilityRegistry>,
    correlator: Correlator,
    writer: WriterHandle,
    writer_task: JoinHandle<Result<()>>,
    reader_task: JoinHandle<()>,
    state: Arc<watch::Sender<ConnectionState>>,
    events: Option<mpsc::Receiver<ProtocolEvent>>,
    request_timeout: Duration,
}

impl Client {
    /// Create a client builder around a capability manifest.
    pub fn builder(manifest: Manifest) -> ClientBuilder {
        ClientBuilder::new(manifest)
    }

    /// Connect with default configuration.
    pub async fn connect<S>(stream: S, manifest: Manifest) -> Result<Client>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        ClientBuilder::new(manifest).connect(stream).await
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Take the notification receiver.
    ///
    /// Yields corruption reports, unmatched responses, and unsolicited
    /// remote frames in arrival order. Returns `None` after the first
    /// take.
    pub fn notifications(&mut self) -> Option<mpsc::Receiver<ProtocolEvent>> {
        self.events.take()
    }

    /// The capability registry this client resolves paths against.
    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Invoke a capability with the default request deadline.
    pub async fn invoke(&self, path: &str, args: &[Arg]) -> Result<ResultValue> {
        self.invoke_with_timeout(path, args, self.request_timeout)
            .await
    }

    /// Invoke a capability, suspending until the correlated response
    /// arrives, the deadline elapses, or the connection closes.
    ///
    /// `UnknownCapability` and `ArgumentEncoding` are reported here
    /// before anything is sent.
    pub async fn invoke_with_timeout(
        &self,
        path: &str,
        args: &[Arg],
        deadline: Duration,
    ) -> Result<ResultValue> {
        if self.state() != ConnectionState::Open {
            return Err(PinwireError::ConnectionClosed);
        }

        let node = self.registry.resolve(path)?;
        let payload = node.encode_args(args)?;

        let ticket = self.correlator.begin().await?;
        let wire = encode_frame(&Frame::command(ticket.sequence(), payload))?;
        self.writer.send(OutboundFrame::new(wire)).await?;

        let response = ticket.wait(deadline).await?;
        node.decode_result(response)
    }

    /// Close the connection.
    ///
    /// Stops the read loop, flushes queued writes, fails every pending
    /// request with `ConnectionClosed` (oldest first), and settles the
    /// state machine at `Closed`. Completes exactly once; reconnecting
    /// means building a new client.
    pub async fn close(self) -> Result<()> {
        let Client {
            correlator,
            writer,
            writer_task,
            reader_task,
            state,
            ..
        } = self;

        state.send_replace(ConnectionState::Closing);

        // No further frames are processed past this point.
        reader_task.abort();
        let _ = reader_task.await;

        // Dropping the last handle lets the writer drain and flush.
        drop(writer);
        let flushed = match writer_task.await {
            Ok(result) => result,
            Err(_) => Ok(()),
        };

        correlator.fail_all();
        state.send_replace(ConnectionState::Closed);
        flushed
    }
}

/// Main read loop - pulls bytes, decodes frames, routes them.
async fn read_loop<R>(
    mut reader: R,
    correlator: Correlator,
    events: mpsc::Sender<ProtocolEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
) where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameBuffer::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("transport closed by peer");
                break;
            }
            Ok(n) => n,
            Err(error) => {
                tracing::error!(%error, "transport read failed");
                break;
            }
        };

        for decoded in decoder.push(&buf[..n]) {
            route_decoded(decoded, &correlator, &events);
        }
    }

    // The link is gone: fail pending calls and settle the state machine.
    correlator.fail_all();
    state.send_replace(ConnectionState::Closed);
}

/// Route one decoder output to the correlator or the notification channel.
fn route_decoded(
    decoded: Decoded,
    correlator: &Correlator,
    events: &mpsc::Sender<ProtocolEvent>,
) {
    let event = match decoded {
        Decoded::Corrupt(corruption) => {
            tracing::warn!(reason = ?corruption.reason, "corrupt frame");
            ProtocolEvent::Corruption(corruption)
        }
        Decoded::Frame(frame) => {
            if frame.is_response() && correlator.resolve(frame.sequence, frame.payload.clone()) {
                return;
            }
            if frame.is_response() {
                tracing::warn!(
                    sequence = frame.sequence,
                    "response frame matched no pending request"
                );
            }
            ProtocolEvent::from_frame(frame)
        }
    };

    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("notification queue full, dropping event");
        }
        // Listener detached; notifications are best-effort.
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_configuration() {
        let builder = Client::builder(Manifest::single_board("ardu1", 1))
            .request_timeout(Duration::from_millis(250))
            .event_capacity(8)
            .channel_capacity(16);

        assert_eq!(builder.request_timeout, Duration::from_millis(250));
        assert_eq!(builder.event_capacity, 8);
        assert_eq!(builder.writer_config.channel_capacity, 16);
    }

    #[tokio::test]
    async fn connect_reports_open_state_and_capabilities() {
        let (host, _device) = tokio::io::duplex(64);
        let mut client = Client::connect(host, Manifest::single_board("ardu1", 1))
            .await
            .unwrap();

        assert_eq!(client.state(), ConnectionState::Open);
        assert_eq!(client.capabilities().len(), 5);

        // The notification receiver can only be taken once.
        assert!(client.notifications().is_some());
        assert!(client.notifications().is_none());
    }

    #[tokio::test]
    async fn close_completes_cleanly_without_traffic() {
        let (host, _device) = tokio::io::duplex(64);
        let client = Client::connect(host, Manifest::single_board("ardu1", 1))
            .await
            .unwrap();
        client.close().await.unwrap();
    }
}
