use alloc::sync::Arc;
use core::time::Duration;

#[derive(Debug, Clone)]
pub struct Receiver {
    pub package: Arc<str>,
    pub launch_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: Arc<str>,
    pub port: u16,
    pub channel: Arc<str>,
    pub chunk_size: usize,
    pub storage_limit: u64,
    pub receiver: Receiver,
}

impl Config {
    pub const CHUNK_SIZE: usize = 10 * 1024;
    pub const STORAGE_LIMIT: u64 = 25 * 1024 * 1024;

    pub fn new() -> Self {
        let defaults = Self::default();

        let host = option_env!("RECEIVER_HOST").map(Arc::from).unwrap_or(defaults.host.clone());
        let port = option_env!("RECEIVER_PORT")
            .and_then(|port| port.parse().ok())
            .unwrap_or(defaults.port);

        Self {
            host,
            port,
            ..defaults
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Arc::from("127.0.0.1"),
            port: 3000,
            channel: Arc::from("file"),
            chunk_size: Self::CHUNK_SIZE,
            storage_limit: Self::STORAGE_LIMIT,
            receiver: Receiver {
                package: Arc::from("Watch.BC.Reader"),
                launch_delay: Duration::from_millis(3000),
            },
        }
    }
}
