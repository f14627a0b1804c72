//! Interrupt handling for the binaries.
//!
//! A no-op handler is installed for SIGINT and SIGTERM without
//! `SA_RESTART`, so a blocked `poll` returns `ErrorKind::Interrupted`.
//! The engines turn that into [`Error::Interrupted`](crate::Error::Interrupted)
//! and unwind normally instead of the process dying mid-send.

use std::io;

extern "C" fn on_signal(_: libc::c_int) {}

pub fn install_interrupt_handler() -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        if libc::sigemptyset(&mut action.sa_mask) != 0 {
            return Err(io::Error::last_os_error());
        }
        for signal in [libc::SIGINT, libc::SIGTERM] {
            if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
    }
    Ok(())
}
