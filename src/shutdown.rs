//! Process-wide interrupt flag
//!
//! An operator interrupt can only reach the program through a signal, so this
//! is the one piece of global state in the crate. The handler does nothing but
//! set the flag; the session loop reads it once per iteration.

use core::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Something the session loop can ask "should we stop now?"
pub trait ShutdownSignal {
    /// True once a stop has been requested
    fn is_requested(&self) -> bool;
}

/// The process-wide flag set by the interrupt handler
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessShutdown;

impl ShutdownSignal for ProcessShutdown {
    fn is_requested(&self) -> bool {
        is_requested()
    }
}

impl ShutdownSignal for AtomicBool {
    fn is_requested(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: ShutdownSignal + ?Sized> ShutdownSignal for &T {
    fn is_requested(&self) -> bool {
        (**self).is_requested()
    }
}

/// Request a stop. Async-signal-safe: a single atomic store.
pub fn request() {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Whether a stop has been requested
pub fn is_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Route SIGINT / SIGTERM to [`request`]
#[cfg(feature = "std")]
pub fn install() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(request)
}
