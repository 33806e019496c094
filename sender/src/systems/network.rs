use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, BytesMut};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use log::{debug, error, info, warn};
use protocol::{Envelope, Event, Message};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::Error),
}

/// What a channel listener receives: a decoded event, or why it could not
/// be decoded.
pub type Inbound = Result<Event, TransportError>;

/// Outbound half of a message pipe keyed by channel name.
///
/// The returned future resolves once the message has been handed to the
/// underlying stream, and fails if it could not be.
pub trait Transport: Send + Sync {
    fn send(&self, channel: &str, message: &Message) -> BoxFuture<'static, Result<(), TransportError>>;
}

struct Outgoing {
    frame: Vec<u8>,
    done: oneshot::Sender<Result<(), TransportError>>,
}

type Listeners = Arc<Mutex<HashMap<String, UnboundedSender<Inbound>>>>;

/// Length-prefixed JSON envelopes over a byte stream.
///
/// Reading and writing run on their own tasks; inbound envelopes are routed
/// to the listener registered for their channel in arrival order.
#[derive(Clone)]
pub struct Connection {
    outgoing: UnboundedSender<Outgoing>,
    listeners: Listeners,
}

impl Connection {
    pub fn open<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outgoing, queue) = mpsc::unbounded_channel();
        let listeners = Listeners::default();

        tokio::spawn(Self::process_outbound(writer, queue));
        tokio::spawn(Self::process_inbound(reader, listeners.clone()));

        Self { outgoing, listeners }
    }

    /// Registers the listener for `channel`, replacing any previous one.
    pub fn add_listener(&self, channel: &str) -> UnboundedReceiver<Inbound> {
        let (sender, receiver) = mpsc::unbounded_channel();
        lock(&self.listeners).insert(channel.to_owned(), sender);
        receiver
    }

    async fn process_inbound<R>(mut reader: R, listeners: Listeners)
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = BytesMut::with_capacity(4096);

        loop {
            let consumed = match protocol::split_frame(&buffer) {
                Ok((payload, consumed)) => {
                    Self::dispatch(&listeners, payload);
                    Some(consumed)
                }
                Err(protocol::Error::InsufficientData) => None,
                Err(e) => {
                    error!("Dropping connection on malformed frame: {}", e);
                    break;
                }
            };

            match consumed {
                Some(consumed) => buffer.advance(consumed),
                None => match reader.read_buf(&mut buffer).await {
                    Ok(0) => {
                        info!("Connection closed by peer");
                        break;
                    }
                    Ok(n) => debug!("Read {} bytes", n),
                    Err(e) => {
                        error!("Connection read error: {}", e);
                        break;
                    }
                },
            }
        }

        lock(&listeners).clear();
    }

    fn dispatch(listeners: &Listeners, payload: &[u8]) {
        let envelope = match serde_json::from_slice::<Envelope<serde_json::Value>>(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping undecodable frame: {}", e);
                return;
            }
        };

        let inbound = Event::from_value(envelope.payload).map_err(TransportError::from);

        match lock(listeners).get(&envelope.channel) {
            Some(listener) => {
                if listener.send(inbound).is_err() {
                    debug!("Listener for channel {:?} is gone", envelope.channel);
                }
            }
            None => debug!("No listener for channel {:?}", envelope.channel),
        }
    }

    async fn process_outbound<W>(mut writer: W, mut queue: UnboundedReceiver<Outgoing>)
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(Outgoing { frame, done }) = queue.recv().await {
            let result = Self::write_frame(&mut writer, &frame).await;
            if let Err(e) = &result {
                warn!("Connection write error: {}", e);
            }
            done.send(result).ok();
        }
    }

    async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), TransportError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(frame).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl Transport for Connection {
    fn send(&self, channel: &str, message: &Message) -> BoxFuture<'static, Result<(), TransportError>> {
        let frame = match Envelope::new(channel, message).encode() {
            Ok(frame) => frame,
            Err(e) => return future::ready(Err(TransportError::from(e))).boxed(),
        };

        let (done, result) = oneshot::channel();
        if self.outgoing.send(Outgoing { frame, done }).is_err() {
            return future::ready(Err(TransportError::Closed)).boxed();
        }

        async move { result.await.unwrap_or(Err(TransportError::Closed)) }.boxed()
    }
}

fn lock(listeners: &Listeners) -> MutexGuard<'_, HashMap<String, UnboundedSender<Inbound>>> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}
