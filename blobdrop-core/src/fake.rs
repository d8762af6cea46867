//! In-memory host for tests: a document with a body, a blob-URL registry, and a log of saves.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use crate::host::{Host, HostError, HostStep};

#[derive(Debug)]
pub struct FakeBlob(u64);

#[derive(Debug)]
pub struct FakeAnchor(u64);

/// What the fake host saved when an anchor was activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
    pub url: String,
}

#[derive(Default)]
struct State {
    next_id: u64,
    blobs: HashMap<u64, (Vec<u8>, String)>,
    urls: HashMap<String, u64>,
    anchors: HashMap<u64, (String, String)>,
    attached: HashSet<u64>,
    minted: Vec<String>,
    saved: Vec<Saved>,
    detach_calls: usize,
}

pub struct FakeHost {
    state: RefCell<State>,
    fail_at: Cell<Option<HostStep>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
            fail_at: Cell::new(None),
        }
    }

    /// Host whose API throws at `step`.
    pub fn failing_at(step: HostStep) -> Self {
        let host = Self::new();
        host.fail_at.set(Some(step));
        host
    }

    pub fn set_fail_at(&self, step: Option<HostStep>) {
        self.fail_at.set(step);
    }

    /// Anchor nodes currently attached to the document.
    pub fn live_nodes(&self) -> usize {
        self.state.borrow().attached.len()
    }

    /// Object URLs currently registered.
    pub fn live_urls(&self) -> usize {
        self.state.borrow().urls.len()
    }

    pub fn minted_urls(&self) -> Vec<String> {
        self.state.borrow().minted.clone()
    }

    pub fn saved(&self) -> Vec<Saved> {
        self.state.borrow().saved.clone()
    }

    pub fn detach_calls(&self) -> usize {
        self.state.borrow().detach_calls
    }

    fn check(&self, step: HostStep) -> Result<(), HostError> {
        if self.fail_at.get() == Some(step) {
            return Err(HostError::new(step, "injected failure"));
        }
        Ok(())
    }

    fn next_id(state: &mut State) -> u64 {
        state.next_id += 1;
        state.next_id
    }
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for FakeHost {
    type Blob = FakeBlob;
    type Anchor = FakeAnchor;

    fn create_blob(&self, bytes: Vec<u8>, content_type: &str) -> Result<FakeBlob, HostError> {
        self.check(HostStep::CreateBlob)?;
        let mut state = self.state.borrow_mut();
        let id = Self::next_id(&mut state);
        state.blobs.insert(id, (bytes, content_type.to_string()));
        Ok(FakeBlob(id))
    }

    fn create_object_url(&self, blob: &FakeBlob) -> Result<String, HostError> {
        self.check(HostStep::CreateObjectUrl)?;
        let url = format!("blob:null/{}", uuid::Uuid::new_v4());
        let mut state = self.state.borrow_mut();
        state.urls.insert(url.clone(), blob.0);
        state.minted.push(url.clone());
        Ok(url)
    }

    fn revoke_object_url(&self, url: &str) {
        self.state.borrow_mut().urls.remove(url);
    }

    fn create_anchor(&self, href: &str, download_name: &str) -> Result<FakeAnchor, HostError> {
        self.check(HostStep::CreateAnchor)?;
        let mut state = self.state.borrow_mut();
        let id = Self::next_id(&mut state);
        state
            .anchors
            .insert(id, (href.to_string(), download_name.to_string()));
        Ok(FakeAnchor(id))
    }

    fn attach(&self, anchor: &FakeAnchor) -> Result<(), HostError> {
        self.check(HostStep::Attach)?;
        self.state.borrow_mut().attached.insert(anchor.0);
        Ok(())
    }

    fn activate(&self, anchor: &FakeAnchor) -> Result<(), HostError> {
        self.check(HostStep::Activate)?;
        let mut state = self.state.borrow_mut();
        if !state.attached.contains(&anchor.0) {
            return Ok(());
        }
        let Some((href, filename)) = state.anchors.get(&anchor.0).cloned() else {
            return Ok(());
        };
        // A revoked or unknown URL saves nothing, silently, as a browser would.
        let Some(blob_id) = state.urls.get(&href).copied() else {
            return Ok(());
        };
        let Some((bytes, content_type)) = state.blobs.get(&blob_id).cloned() else {
            return Ok(());
        };
        state.saved.push(Saved {
            bytes,
            filename,
            content_type,
            url: href,
        });
        Ok(())
    }

    fn detach(&self, anchor: &FakeAnchor) {
        let mut state = self.state.borrow_mut();
        state.detach_calls += 1;
        state.attached.remove(&anchor.0);
    }
}
