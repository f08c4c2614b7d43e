//! User interrupt (Ctrl-C) handling
//!
//! The handler never terminates the process. It raises a [`CancelFlag`] that
//! the stream engine checks before every unit and the directory walker
//! checks before every file, so the in-flight file is abandoned through the
//! normal error path and its original stays untouched.

use crate::error::{ErrorCategory, ErrorKind, HarshCryptoError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop signal, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns [`ErrorKind::Cancelled`] once the flag has been raised.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(HarshCryptoError::with_kind(
                ErrorCategory::User,
                ErrorKind::Cancelled,
                "operation canceled by the user",
            ));
        }
        Ok(())
    }
}

/// Install the process-wide Ctrl-C handler and return the flag it raises.
///
/// Can only be called once per process.
pub fn install_handler() -> Result<CancelFlag> {
    let flag = CancelFlag::new();
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        handler_flag.cancel();
    })
    .map_err(|e| {
        HarshCryptoError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "failed to install interrupt handler",
            e,
        )
    })?;
    Ok(flag)
}
