#![no_std]

extern crate alloc;

mod config;
mod message;

use alloc::string::String;
use alloc::vec::Vec;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use config::{Config, Receiver};
pub use message::{ChapterChunk, Event, Message};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Insufficient data")]
    InsufficientData,
    #[error("Invalid message")]
    InvalidMessage,
    #[error("Decode error: {0}")]
    DecodeError(serde_json::Error),
    #[error("Encode error: {0}")]
    EncodeError(serde_json::Error),
}

/// A payload addressed to a named channel. One envelope per frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub channel: String,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(channel: impl Into<String>, payload: T) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }
}

impl<T: Serialize> Envelope<T> {
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let payload = serde_json::to_vec(self).map_err(Error::EncodeError)?;
        let payload_len = payload.len();

        if payload_len > MAX_FRAME_SIZE {
            return Err(Error::InvalidMessage);
        }

        let mut output = Vec::with_capacity(HEADER_SIZE + payload_len);
        output.extend_from_slice(&(payload_len as u32).to_be_bytes());
        output.extend(payload);

        Ok(output)
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    pub fn decode(data: &[u8]) -> Result<(Self, usize), Error> {
        let (payload, consumed) = split_frame(data)?;
        let envelope = serde_json::from_slice(payload).map_err(Error::DecodeError)?;
        Ok((envelope, consumed))
    }
}

pub const HEADER_SIZE: usize = 4;
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Splits the first complete frame off `data`, returning its payload and the
/// number of bytes the frame occupies.
pub fn split_frame(data: &[u8]) -> Result<(&[u8], usize), Error> {
    if data.len() < HEADER_SIZE {
        return Err(Error::InsufficientData);
    }

    let payload_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if payload_len > MAX_FRAME_SIZE {
        return Err(Error::InvalidMessage);
    }

    let total_len = HEADER_SIZE + payload_len;
    if data.len() < total_len {
        return Err(Error::InsufficientData);
    }

    Ok((&data[HEADER_SIZE..total_len], total_len))
}
