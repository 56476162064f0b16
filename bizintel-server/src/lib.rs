pub mod gateway;
pub mod http;
pub mod router;
pub mod subsystems;
