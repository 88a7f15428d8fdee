pub mod config;
pub mod logging;

pub mod checksum;
pub mod control;
pub mod lines;
pub mod query;
pub mod retry;
pub mod segmenter;
pub mod storage;
pub mod store;
pub mod timing;
pub mod transfer;
