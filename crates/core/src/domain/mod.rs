pub mod contract;
pub mod prediction;
pub mod sentiment;
pub mod stock;
