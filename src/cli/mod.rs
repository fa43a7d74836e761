mod client;
pub mod start;
pub mod status;
pub mod stop;
