//! 通用工具模块

pub mod net;

pub use net::{NO_ADDRESS, client_address};
