//! Domain models shared by the calculators, the services and the storage layer.

pub mod batch;
pub mod device;
pub mod power;
pub mod production;
pub mod reset;
pub mod sample;
