//! Thread-local error state for parse and conversion failures.
//!
//! `spec.md` §7 asks for errno-flavoured error reporting rather than
//! exceptions: an operation returns a null/failure indication and sets an
//! integer error code that the caller inspects afterwards. This mirrors
//! `crates/runtime/src/error.rs`'s thread-local "last error" design, except
//! the payload here is an errno-style code (from `libc`) rather than a
//! free-form message, because `spec.md` names specific codes
//! (`EINVAL`, `EILSEQ`, `ENODATA`, `ENAMETOOLONG`, `EOVERFLOW`, `ERANGE`).

use std::cell::Cell;

thread_local! {
    static LAST_ERRNO: Cell<i32> = const { Cell::new(0) };
}

/// Malformed input: bad cast, unknown identifier with no hook, bad escape
/// structure that doesn't fit a more specific code below.
pub const EINVAL: i32 = libc::EINVAL;
/// Invalid byte sequence: bad `\u` escape, invalid UTF-8 continuation.
pub const EILSEQ: i32 = libc::EILSEQ;
/// Ran out of input mid-token (unterminated string, truncated number).
pub const ENODATA: i32 = libc::ENODATA;
/// An object member name exceeded 65535 bytes.
pub const ENAMETOOLONG: i32 = libc::ENAMETOOLONG;
/// A numeric literal overflowed its target representation.
pub const EOVERFLOW: i32 = libc::EOVERFLOW;
/// An integer conversion did not fit the requested width; best-effort
/// value is returned alongside this code.
pub const ERANGE: i32 = libc::ERANGE;

/// Record an error code for the current thread, replacing any previous one.
pub fn set_errno(code: i32) {
    LAST_ERRNO.with(|e| e.set(code));
}

/// Read the current thread's last error code (0 if none is pending).
pub fn errno() -> i32 {
    LAST_ERRNO.with(|e| e.get())
}

/// Clear the current thread's pending error.
pub fn clear_errno() {
    LAST_ERRNO.with(|e| e.set(0));
}

/// Run `f`, clearing any stale errno first so a caller can reliably tell
/// whether `f` itself set one.
pub fn with_clean_errno<T>(f: impl FnOnce() -> T) -> T {
    clear_errno();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_clean() {
        clear_errno();
        assert_eq!(errno(), 0);
    }

    #[test]
    fn set_and_read() {
        clear_errno();
        set_errno(EINVAL);
        assert_eq!(errno(), EINVAL);
        clear_errno();
        assert_eq!(errno(), 0);
    }

    #[test]
    fn is_thread_local() {
        set_errno(ENODATA);
        let handle = std::thread::spawn(|| {
            assert_eq!(errno(), 0);
            set_errno(ERANGE);
            errno()
        });
        assert_eq!(handle.join().unwrap(), ERANGE);
        assert_eq!(errno(), ENODATA);
        clear_errno();
    }

    #[test]
    fn with_clean_errno_resets_first() {
        set_errno(EOVERFLOW);
        let seen = with_clean_errno(errno);
        assert_eq!(seen, 0);
        clear_errno();
    }
}
