use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::sync::Notify;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_NOTIFY: OnceLock<Notify> = OnceLock::new();
static RESTORE_HOOK: OnceLock<Box<dyn Fn() + Send + Sync>> = OnceLock::new();

#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Installs the Ctrl+C handler.
///
/// The handler only sets a flag and wakes waiters; callers decide what an
/// interrupt means (cancel a request, leave the game). A second Ctrl+C exits
/// with status 130.
///
/// # Errors
/// Returns an error if a handler is already installed.
pub fn init() -> Result<()> {
    ctrlc::set_handler(trigger_ctrl_c).context("Error setting Ctrl+C handler")
}

fn notify_waiters() {
    INTERRUPT_NOTIFY.get_or_init(Notify::new).notify_waiters();
}

/// Triggers an interrupt, force-exiting on the second one.
pub fn trigger_ctrl_c() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        // process::exit() bypasses Drop, so restore the terminal first.
        if let Some(hook) = RESTORE_HOOK.get() {
            hook();
        }
        std::process::exit(130);
    }
    notify_waiters();
}

/// Checks if an interrupt has been requested.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Waits until an interrupt is triggered.
pub async fn wait_for_interrupt() {
    loop {
        let notified = INTERRUPT_NOTIFY.get_or_init(Notify::new).notified();
        if is_interrupted() {
            return;
        }
        notified.await;
    }
}

/// Resets the interrupt flag.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Registers a restore hook called on the second Ctrl+C before exit.
///
/// The TUI uses this to leave the alternate screen.
pub fn set_restore_hook<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let _ = RESTORE_HOOK.set(Box::new(hook));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_wait_for_interrupt_wakes_on_trigger() {
        reset();
        let waiter = tokio::spawn(wait_for_interrupt());
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger_ctrl_c();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
        assert!(is_interrupted());
        reset();
        assert!(!is_interrupted());
    }
}
