//! Termination signals
//!
//! SIGINT/SIGTERM/SIGHUP only set a flag; the event loops poll it and run
//! their normal teardown (restore the terminal, clear the resize lock).

use std::sync::atomic::{AtomicBool, Ordering};

static TERMINATE: AtomicBool = AtomicBool::new(false);

extern "C" fn on_terminate(_: libc::c_int) {
    // async-signal-safe: a single atomic store
    TERMINATE.store(true, Ordering::SeqCst);
}

/// Route the termination signals to the flag
pub fn install() {
    let handler = on_terminate as extern "C" fn(libc::c_int);
    for signal in [libc::SIGINT, libc::SIGTERM, libc::SIGHUP] {
        unsafe {
            libc::signal(signal, handler as libc::sighandler_t);
        }
    }
}

/// Whether a termination signal arrived
pub fn requested() -> bool {
    TERMINATE.load(Ordering::SeqCst)
}
