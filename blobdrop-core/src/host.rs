//! Host capability: what the bridge needs from the environment that owns the document.
//! Injected into the bridge; never reached through globals.

use std::fmt;

/// Step of the delivery protocol that a host operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostStep {
    CreateBlob,
    CreateObjectUrl,
    CreateAnchor,
    Attach,
    Activate,
}

impl HostStep {
    pub const ALL: [HostStep; 5] = [
        HostStep::CreateBlob,
        HostStep::CreateObjectUrl,
        HostStep::CreateAnchor,
        HostStep::Attach,
        HostStep::Activate,
    ];
}

impl fmt::Display for HostStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HostStep::CreateBlob => "create blob",
            HostStep::CreateObjectUrl => "create object URL",
            HostStep::CreateAnchor => "create anchor",
            HostStep::Attach => "attach anchor",
            HostStep::Activate => "activate anchor",
        };
        f.write_str(s)
    }
}

/// A host API threw. Carries the step and whatever the host said about it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("host failed to {step}: {message}")]
pub struct HostError {
    pub step: HostStep,
    pub message: String,
}

impl HostError {
    pub fn new(step: HostStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

/// Environment able to save bytes under a name: binary object, revocable URL to it, and a
/// link element that a simulated click turns into a save.
///
/// Methods take `&self`; hosts are single-threaded and use interior mutability where needed.
/// Release operations (`revoke_object_url`, `detach`) cannot fail from the bridge's point of
/// view: an implementation logs whatever the host reports and moves on.
pub trait Host {
    /// Immutable binary object handle.
    type Blob;
    /// Link element handle.
    type Anchor;

    /// Wrap already-copied bytes as one binary object tagged with `content_type`.
    fn create_blob(&self, bytes: Vec<u8>, content_type: &str) -> Result<Self::Blob, HostError>;

    /// Register `blob` with the host's URL registry.
    fn create_object_url(&self, blob: &Self::Blob) -> Result<String, HostError>;

    /// Unregister a URL returned by `create_object_url`.
    fn revoke_object_url(&self, url: &str);

    /// Create a hidden, non-interactive download link targeting `href`, suggesting `download_name`.
    fn create_anchor(&self, href: &str, download_name: &str) -> Result<Self::Anchor, HostError>;

    /// Insert the link into the live document.
    fn attach(&self, anchor: &Self::Anchor) -> Result<(), HostError>;

    /// Simulated user click.
    fn activate(&self, anchor: &Self::Anchor) -> Result<(), HostError>;

    /// Remove the link from the document.
    fn detach(&self, anchor: &Self::Anchor);
}

/// Object URL that is revoked when dropped.
pub struct ObjectUrl<'h, H: Host> {
    host: &'h H,
    url: String,
}

impl<'h, H: Host> ObjectUrl<'h, H> {
    pub fn mint(host: &'h H, blob: &H::Blob) -> Result<Self, HostError> {
        let url = host.create_object_url(blob)?;
        Ok(Self { host, url })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl<H: Host> Drop for ObjectUrl<'_, H> {
    fn drop(&mut self) {
        self.host.revoke_object_url(&self.url);
    }
}

/// Link element attached to the document; detached when dropped.
pub struct AttachedAnchor<'h, H: Host> {
    host: &'h H,
    anchor: H::Anchor,
}

impl<'h, H: Host> AttachedAnchor<'h, H> {
    /// Attach `anchor`. On failure nothing was inserted, so there is nothing to detach.
    pub fn attach(host: &'h H, anchor: H::Anchor) -> Result<Self, HostError> {
        host.attach(&anchor)?;
        Ok(Self { host, anchor })
    }

    pub fn activate(&self) -> Result<(), HostError> {
        self.host.activate(&self.anchor)
    }
}

impl<H: Host> Drop for AttachedAnchor<'_, H> {
    fn drop(&mut self) {
        self.host.detach(&self.anchor);
    }
}
