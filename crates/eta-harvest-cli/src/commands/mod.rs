pub mod config;
pub mod harvest;
pub mod serve;
pub mod snapshots;
