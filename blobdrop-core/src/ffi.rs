//! C ABI for native modules linked into the same linear memory (C/C++ built for the browser).
//! The native side calls `downloadFile` or `_downloadFile`; the page installs a sink first.

use std::cell::RefCell;
use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};
use std::rc::Rc;
use std::slice;

use tracing::warn;

use crate::bridge::DeliverySink;
use crate::linkage::Linkage;
use crate::memory::LinearMemory;

thread_local! {
    static SINK: RefCell<Option<Rc<dyn DeliverySink>>> = RefCell::new(None);
}

/// Install the sink the exported symbols deliver through. Returns the previous one.
pub fn install_sink(sink: Rc<dyn DeliverySink>) -> Option<Rc<dyn DeliverySink>> {
    SINK.with(|s| s.borrow_mut().replace(sink))
}

pub fn uninstall_sink() -> Option<Rc<dyn DeliverySink>> {
    SINK.with(|s| s.borrow_mut().take())
}

// Cloned out so the slot is not borrowed while delivering; a re-entrant call or an install
// from inside the host must not find it locked.
fn current_sink() -> Option<Rc<dyn DeliverySink>> {
    SINK.with(|s| s.borrow().clone())
}

/// The caller's own address space, read through raw pointers.
struct ProcessMemory;

impl LinearMemory for ProcessMemory {
    fn copy_out(&self, addr: usize, len: usize) -> Vec<u8> {
        if len == 0 {
            return Vec::new();
        }
        unsafe { slice::from_raw_parts(addr as *const u8, len) }.to_vec()
    }

    fn read_c_str(&self, addr: usize) -> Vec<u8> {
        if addr == 0 {
            return Vec::new();
        }
        unsafe { CStr::from_ptr(addr as *const c_char) }
            .to_bytes()
            .to_vec()
    }
}

fn dispatch(linkage: Linkage, data: *const c_void, data_size: c_int, filename: *const c_char) {
    let Some(sink) = current_sink() else {
        warn!(symbol = linkage.symbol(), "no delivery sink installed; call ignored");
        return;
    };
    (linkage.entry())(
        sink.as_ref(),
        &ProcessMemory,
        data as usize,
        i64::from(data_size),
        filename as usize,
    );
}

/// Save `data_size` bytes at `data` under the NUL-terminated UTF-8 `filename`.
/// Returns once the host has been asked; no status crosses back.
#[export_name = "downloadFile"]
pub extern "C" fn download_file(data: *const c_void, data_size: c_int, filename: *const c_char) {
    dispatch(Linkage::Direct, data, data_size, filename);
}

/// Same as `download_file`, under the reserved-prefix name.
#[export_name = "_downloadFile"]
pub extern "C" fn prefixed_download_file(
    data: *const c_void,
    data_size: c_int,
    filename: *const c_char,
) {
    dispatch(Linkage::PrefixedWithDeps, data, data_size, filename);
}
