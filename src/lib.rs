//! UartLink Library
//!
//! Packet framing, bounded history, and observer dispatch for UART-style
//! serial links carried over BLE or similar byte-stream transports.
//!
//! Raw chunks arrive from a transport adapter in arbitrary, not
//! frame-aligned boundaries. [`LineFramer`] reassembles them into
//! separator-delimited packets, [`PacketCache`] keeps a per-peer history,
//! and [`UartDispatcher`] ties both together and fans every packet out to
//! registered observers.

pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::cache::PacketCache;
pub use crate::core::dispatch::{
    DispatchStats, ObserverId, PacketObserver, SendReport, UartDispatcher,
};
pub use crate::core::framer::LineFramer;
pub use crate::core::packet::{packets_to_json, PacketDirection, PacketFilter, PeerId, UartPacket};
pub use crate::core::transport::UartTransport;
pub use crate::domain::config::{DispatchConfig, FramingConfig, LineEnding, UartLinkConfig};
pub use crate::domain::error::{UartLinkError, UartLinkResult};
