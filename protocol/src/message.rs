use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Messages sent from the sender to the receiver application.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "stat")]
pub enum Message {
    #[serde(rename = "startTransfer", rename_all = "camelCase")]
    StartTransfer {
        filename: String,
        total: u32,
        word_count: u64,
        start_from: u32,
        chapter_indices: Vec<u32>,
        has_cover: bool,
    },
    /// `data` carries an encoded [`ChapterChunk`].
    #[serde(rename = "d")]
    DataChunk { count: u32, data: String },
    #[serde(rename = "chapter_complete")]
    ChapterComplete { count: u32 },
    #[serde(rename = "transfer_complete")]
    TransferComplete,
    #[serde(rename = "cancel")]
    Cancel,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::StartTransfer { .. } => "startTransfer",
            Message::DataChunk { .. } => "d",
            Message::ChapterComplete { .. } => "chapter_complete",
            Message::TransferComplete => "transfer_complete",
            Message::Cancel => "cancel",
        }
    }
}

/// Flow-control and status events reported by the receiver.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Storage in use on the receiver, in bytes. JS numbers may carry a
    /// fraction.
    Ready {
        usage: f64,
        #[serde(default)]
        count: i64,
    },
    Error {
        #[serde(default)]
        message: String,
        #[serde(default)]
        count: i64,
    },
    Success {
        #[serde(default)]
        message: String,
        #[serde(default)]
        count: i64,
    },
    /// Receiver-chosen chapter; may be out of range and is validated by the sender.
    Next {
        #[serde(default)]
        message: String,
        count: i64,
    },
    NextChunk,
    ChapterChunkComplete,
    #[serde(rename_all = "camelCase")]
    ChapterSaved {
        count: u32,
        #[serde(default)]
        synced_count: u32,
        #[serde(default)]
        total_count: u32,
        #[serde(default)]
        progress: f64,
    },
    TransferFinished,
    Cancel,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Ready { .. } => "ready",
            Event::Error { .. } => "error",
            Event::Success { .. } => "success",
            Event::Next { .. } => "next",
            Event::NextChunk => "next_chunk",
            Event::ChapterChunkComplete => "chapter_chunk_complete",
            Event::ChapterSaved { .. } => "chapter_saved",
            Event::TransferFinished => "transfer_finished",
            Event::Cancel => "cancel",
        }
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(Error::DecodeError)
    }
}

/// One slice of a chapter, nested as JSON text inside [`Message::DataChunk`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterChunk {
    pub index: u32,
    pub name: String,
    pub content: String,
    pub word_count: u64,
    pub chunk_num: u32,
    pub total_chunks: u32,
}

impl ChapterChunk {
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(Error::EncodeError)
    }

    pub fn decode(data: &str) -> Result<Self, Error> {
        serde_json::from_str(data).map_err(Error::DecodeError)
    }
}
