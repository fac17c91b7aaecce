pub mod batch;
pub mod calculator;
pub mod correction;
pub mod device;
pub mod ingest;
pub mod log;
pub mod power;
pub mod production;
pub mod sweep;
