//! Fault-source hook installation (`config.auto_setup`).
//!
//! Rust has no single canonical analogue of a host's synchronous throw
//! hook or unhandled-rejection hook. This module installs the one
//! process-wide signal that does exist — `std::panic::set_hook` — and
//! leaves everything else (async task failures, build-tool diagnostics)
//! to explicit calls into [`crate::engine::Engine::handle_fault`],
//! which a host wires up itself.
//!
//! Grounded on design note §9 ("model the engine as exclusively owned
//! by its constructor... on disposal, detach hooks before releasing
//! the sink") and `fae::host::channel`'s handler registration/teardown
//! pattern: a callback slot behind a guard, installed at most once per
//! process regardless of how many engines come and go.

use crate::fault::Fault;
use std::panic::PanicHookInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

type FaultCallback = Arc<dyn Fn(Fault) + Send + Sync>;

static PANIC_CALLBACK: OnceLock<Mutex<Option<FaultCallback>>> = OnceLock::new();
static PREVIOUS_HOOK: OnceLock<Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send>> = OnceLock::new();
static WRAPPER_INSTALLED: AtomicBool = AtomicBool::new(false);

fn callback_slot() -> &'static Mutex<Option<FaultCallback>> {
    PANIC_CALLBACK.get_or_init(|| Mutex::new(None))
}

/// RAII guard returned by [`install_panic_hook`]. Dropping it detaches
/// this engine's callback; the underlying `std::panic::set_hook`
/// wrapper is never uninstalled (doing so would risk losing another
/// crate's hook chained after ours), only the callback it forwards to.
pub struct PanicHookGuard {
    _private: (),
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        *callback_slot().lock().expect("panic hook slot poisoned") = None;
    }
}

/// Install a process-wide panic hook that forwards every panic to
/// `on_fault` as a [`Fault`]. Idempotent across repeated `auto_setup`
/// activations in the same process: the `std::panic::set_hook` wrapper
/// is installed exactly once; later calls only replace the forwarding
/// callback. The previously installed hook (default or a host's own)
/// is preserved and still runs after ours.
pub fn install_panic_hook(on_fault: impl Fn(Fault) + Send + Sync + 'static) -> PanicHookGuard {
    *callback_slot().lock().expect("panic hook slot poisoned") = Some(Arc::new(on_fault));

    if !WRAPPER_INSTALLED.swap(true, Ordering::SeqCst) {
        let previous = std::panic::take_hook();
        let _ = PREVIOUS_HOOK.set(previous);
        std::panic::set_hook(Box::new(|info| {
            if let Some(cb) = callback_slot()
                .lock()
                .expect("panic hook slot poisoned")
                .clone()
            {
                cb(Fault::from_message(info.to_string()));
            }
            if let Some(previous) = PREVIOUS_HOOK.get() {
                previous(info);
            }
        }));
    }

    PanicHookGuard { _private: () }
}

/// A host-reported fault source with no canonical Rust signal to hook
/// automatically (async task panics, compiler/build diagnostics, a
/// framework's own error boundary). Hosts implement this and drive it
/// into [`crate::engine::Engine::handle_fault`] explicitly; `auto_setup`
/// only covers [`install_panic_hook`].
pub trait FaultSource {
    /// Forward one fault from this source into the engine.
    fn report(&self, fault: Fault);
}
