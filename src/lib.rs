pub mod cli;
pub mod config;
pub mod fetch;
pub mod forward;
pub mod output;
pub mod retrieval;
pub mod storage;
