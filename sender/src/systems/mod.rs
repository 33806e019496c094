mod files;
mod lifecycle;
mod network;
mod transfer;

pub use files::{DiskFiles, FileSource};
pub use lifecycle::{CommandLauncher, Launcher, LifecycleSystem};
pub use network::{Connection, Inbound, Transport, TransportError};
pub use transfer::{Reports, TransferEngine, TransferRequest};
