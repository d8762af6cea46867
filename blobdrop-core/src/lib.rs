//! Blobdrop delivery bridge.
//! Host-driven: no DOM or I/O here; the host capability is injected and native memory is read
//! through `LinearMemory`.

pub mod bridge;
pub mod config;
pub mod ffi;
pub mod host;
pub mod linkage;
pub mod memory;
pub mod waveform;

#[cfg(test)]
mod fake;

pub use bridge::{DeliveryArtifact, DeliveryBridge, DeliverySink, CONTENT_TYPE};
pub use config::{BridgeConfig, ConfigError};
pub use ffi::{install_sink, uninstall_sink};
pub use host::{AttachedAnchor, Host, HostError, HostStep, ObjectUrl};
pub use linkage::{Linkage, LinkError, SymbolTable};
pub use memory::{LinearMemory, MemoryImage, TransferRequest};
pub use waveform::{export_waveform, Modulation, WaveformError, WaveformParams};
