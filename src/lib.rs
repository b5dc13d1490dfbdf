pub mod cli;
pub mod config;
pub mod poller;
pub mod remote;
pub mod sink;
pub mod source;
pub mod storage;
