//! Optional host-managed global handle.
//!
//! Design note §9 explicitly rejects a silently lazily-constructed
//! singleton ("avoid silent lazy construction, which hides lifecycle")
//! in favor of an explicit `init_global`/`shutdown_global` pair. Modeled
//! on the sparing, explicitly-initialized `OnceLock` singletons the
//! teacher crate uses for a handful of genuinely process-wide handles.

use crate::config::Config;
use crate::engine::Engine;
use crate::sink::SinkAdapter;
use std::sync::{Arc, Mutex, OnceLock};

static GLOBAL: OnceLock<Mutex<Option<Arc<Engine>>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<Arc<Engine>>> {
    GLOBAL.get_or_init(|| Mutex::new(None))
}

/// Construct the global engine and install it as the process-wide
/// handle. Replaces any previously installed handle (its hooks, if
/// any, are detached when its last strong reference is dropped).
pub fn init_global(config: Config, sink: Arc<dyn SinkAdapter>) -> Arc<Engine> {
    let engine = Engine::construct(config, sink);
    *slot().lock().expect("global engine slot poisoned") = Some(engine.clone());
    engine
}

/// The process-wide engine, if one has been installed via
/// [`init_global`]. Returns `None` rather than constructing one —
/// there is no implicit default.
pub fn global() -> Option<Arc<Engine>> {
    slot().lock().expect("global engine slot poisoned").clone()
}

/// Remove the process-wide handle. The engine itself is only dropped
/// once every other strong reference a caller may be holding is also
/// released.
pub fn shutdown_global() {
    slot().lock().expect("global engine slot poisoned").take();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;

    // GLOBAL is one process-wide slot; these two tests must not interleave
    // under the default parallel test harness.
    static LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn no_implicit_default_before_init() {
        let _guard = LOCK.lock().expect("lock");
        shutdown_global();
        assert!(global().is_none());
    }

    #[test]
    fn init_then_shutdown_round_trips() {
        let _guard = LOCK.lock().expect("lock");
        init_global(Config::default(), Arc::new(NullSink));
        assert!(global().is_some());
        shutdown_global();
        assert!(global().is_none());
    }
}
