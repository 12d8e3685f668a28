//! External cancellation trigger

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{error, warn};

use crate::error::Result;

/// Cloneable handle to a write-once cancellation request.
///
/// Coordinators check it between collection steps. Once triggered it
/// stays triggered, so a handle reused for a later run cancels that run
/// immediately.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// A handle triggered by Ctrl-C (SIGINT).
    ///
    /// The first signal requests graceful cancellation; a second one exits
    /// the process with status 130.
    pub fn on_ctrl_c() -> Result<Self> {
        let interrupt = Self::new();
        let handle = interrupt.clone();

        thread::Builder::new()
            .name("parallelizer-interrupt".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(error = %e, "Failed to start signal listener");
                        return;
                    }
                };

                runtime.block_on(async move {
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                    warn!("Interrupt received, cancelling (press Ctrl-C again to abort)");
                    handle.trigger();

                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("Second interrupt received, aborting");
                        std::process::exit(130);
                    }
                });
            })?;

        Ok(interrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_shared_and_sticky() {
        let interrupt = Interrupt::new();
        let clone = interrupt.clone();
        assert!(!clone.is_triggered());

        interrupt.trigger();
        assert!(clone.is_triggered());
        interrupt.trigger();
        assert!(interrupt.is_triggered());
    }

    #[test]
    fn test_trigger_from_another_thread() {
        let interrupt = Interrupt::new();
        let remote = interrupt.clone();
        thread::spawn(move || remote.trigger()).join().unwrap();
        assert!(interrupt.is_triggered());
    }
}
