use std::error::Error;
use std::time::Duration;

use protocol::{ChapterChunk, Envelope, Event, Message};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Scripted stand-in for the reader app on the other end of a framed stream.
pub struct TestReceiver<T> {
    pub conn: T,
    pub channel: String,
}

impl<T> TestReceiver<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(stream: T) -> Self {
        Self {
            conn: stream,
            channel: "file".into(),
        }
    }

    pub async fn send(&mut self, event: &Event) -> Result<(), Box<dyn Error>> {
        let data = Envelope::new(self.channel.as_str(), event).encode()?;
        self.conn.write_all(&data).await?;
        self.conn.flush().await?;
        Ok(())
    }

    pub async fn receive(&mut self) -> Result<Message, Box<dyn Error>> {
        timeout(Duration::from_secs(5), self.read_message()).await?
    }

    /// Receives a data chunk and unpacks its nested chapter payload.
    pub async fn receive_chunk(&mut self) -> Result<ChapterChunk, Box<dyn Error>> {
        match self.receive().await? {
            Message::DataChunk { count, data } => {
                let chunk = ChapterChunk::decode(&data)?;
                assert_eq!(chunk.index, count);
                Ok(chunk)
            }
            other => Err(format!("expected data chunk, got {}", other.kind()).into()),
        }
    }

    async fn read_message(&mut self) -> Result<Message, Box<dyn Error>> {
        let mut header = [0u8; protocol::HEADER_SIZE];
        self.conn.read_exact(&mut header).await?;

        let payload_len = u32::from_be_bytes(header) as usize;
        let mut buffer = vec![0u8; protocol::HEADER_SIZE + payload_len];
        buffer[..protocol::HEADER_SIZE].copy_from_slice(&header);
        self.conn.read_exact(&mut buffer[protocol::HEADER_SIZE..]).await?;

        let (envelope, consumed) = Envelope::<Message>::decode(&buffer)?;
        assert_eq!(consumed, buffer.len());
        assert_eq!(envelope.channel, self.channel);
        Ok(envelope.payload)
    }
}
