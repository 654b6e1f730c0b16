// src/ct_log/mod.rs
pub mod client;
pub mod decoder;
pub mod log_list;
pub mod poller;
pub mod scheduler;
pub mod types;

pub use decoder::{LeafDecoder, RawEntry};
pub use log_list::LogDirectory;
pub use poller::LogPoller;
pub use scheduler::PollScheduler;
pub use types::{LogEntry, LogInfo, LogListV3, SignedTreeHead};
