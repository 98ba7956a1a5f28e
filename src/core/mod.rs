pub mod cache;
pub mod dispatch;
pub mod framer;
pub mod packet;
pub mod transport;
