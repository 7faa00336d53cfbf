//! Keyboard interrupt handling.
//!
//! [`Interrupt::install`] spawns a watcher thread that drives a
//! current-thread tokio runtime waiting on `ctrl_c`. The first interrupt only
//! raises a flag: the dispatcher checks it between phases and actions poll it
//! through [`CommandContext::check_cancelled`](crate::actions::CommandContext::check_cancelled),
//! so the command unwinds through the normal error path. A second interrupt
//! means the command is not listening; the process exits with 130.

use crate::dispatch::EXIT_CANCELLED;
use crate::error::CommandError;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts listening for the OS interrupt signal.
    pub fn install(&self) -> io::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let interrupt = self.clone();

        std::thread::Builder::new()
            .name("interrupt-watcher".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    loop {
                        if let Err(err) = tokio::signal::ctrl_c().await {
                            tracing::warn!("Cannot listen for interrupts: {err}");
                            return;
                        }
                        if interrupt.raised.swap(true, Ordering::SeqCst) {
                            eprintln!("\n\nCommand killed by keyboard interrupt\n");
                            std::process::exit(EXIT_CANCELLED);
                        }
                        tracing::debug!("Interrupt received");
                    }
                });
            })?;

        Ok(())
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    pub fn check(&self) -> Result<(), CommandError> {
        if self.is_raised() {
            Err(CommandError::UserCancelled)
        } else {
            Ok(())
        }
    }
}
