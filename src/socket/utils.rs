//! Utility functions for socket operations

/// Check if running as root
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        // No cheap equivalent; raw sockets need an elevated shell there
        false
    }
}
