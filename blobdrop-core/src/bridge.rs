//! Delivery bridge: copy a byte range and a name out of native memory and have the host save
//! them, releasing every host resource before returning.

use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::host::{AttachedAnchor, Host, HostError, ObjectUrl};
use crate::memory::{decode_name, LinearMemory, TransferRequest};

/// Content type of every delivery. Opaque octet-stream makes hosts save instead of rendering
/// inline or navigating.
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Bytes copied out of native memory plus what the host needs to save them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryArtifact {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl DeliveryArtifact {
    /// Read the artifact for `request` out of `memory`. Both reads complete here, before any
    /// host call can hand control back to the native runtime.
    pub fn read(memory: &dyn LinearMemory, request: TransferRequest) -> Self {
        let filename = decode_name(&memory.read_c_str(request.name_address));
        let bytes = memory.copy_out(request.source_address, request.length);
        Self {
            bytes,
            filename,
            content_type: CONTENT_TYPE.to_string(),
        }
    }
}

/// Anything that can satisfy a boundary call. Object safe so a bridge over any host can sit
/// behind an exported symbol.
pub trait DeliverySink {
    /// Fire-and-forget: returns normally whether or not the host saved anything.
    fn deliver(&self, memory: &dyn LinearMemory, request: TransferRequest);
}

/// The bridge over an injected host.
pub struct DeliveryBridge<H: Host> {
    host: H,
    config: BridgeConfig,
}

impl<H: Host> DeliveryBridge<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, BridgeConfig::default())
    }

    pub fn with_config(host: H, config: BridgeConfig) -> Self {
        Self { host, config }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run the protocol, reporting which host step failed. URL and link node are released on
    /// every path, error or not.
    pub fn try_deliver(
        &self,
        memory: &dyn LinearMemory,
        request: TransferRequest,
    ) -> Result<(), HostError> {
        let artifact = DeliveryArtifact::read(memory, request);
        debug!(
            filename = %artifact.filename,
            bytes = artifact.bytes.len(),
            "delivering"
        );
        self.save(artifact)
    }

    /// Hand an already-copied artifact to the host.
    pub fn save(&self, artifact: DeliveryArtifact) -> Result<(), HostError> {
        let DeliveryArtifact {
            bytes,
            filename,
            content_type,
        } = artifact;
        let blob = self.host.create_blob(bytes, &content_type)?;
        let url = ObjectUrl::mint(&self.host, &blob)?;
        let anchor = self.host.create_anchor(url.as_str(), &filename)?;
        // Declared after `url`, so the node is detached before the URL is revoked.
        let attached = AttachedAnchor::attach(&self.host, anchor)?;
        attached.activate()
    }
}

impl<H: Host> DeliverySink for DeliveryBridge<H> {
    fn deliver(&self, memory: &dyn LinearMemory, request: TransferRequest) {
        if let Err(e) = self.try_deliver(memory, request) {
            warn!(error = %e, "delivery dropped");
        }
    }
}
