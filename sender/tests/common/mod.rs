#![allow(dead_code)]

mod mock_receiver;
mod mock_transport;

pub use mock_receiver::*;
pub use mock_transport::*;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
