//! Shutdown operations for the CrawlEventBus

use std::sync::atomic::Ordering;

use crate::crawl_events::types::{CrawlEvent, ShutdownReason};

use super::core::CrawlEventBus;

impl CrawlEventBus {
    /// Signal shutdown to all subscribers; idempotent across clones
    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        log::debug!("Event bus shutdown signaled");
    }

    /// Resolves when shutdown is signalled
    ///
    /// ```ignore
    /// tokio::select! {
    ///     Ok(event) = rx.recv() => { /* handle event */ }
    ///     _ = bus.wait_for_shutdown() => { break; }
    /// }
    /// ```
    pub async fn wait_for_shutdown(&self) {
        let notified = self.shutdown.notified();
        if self.is_shutdown() {
            return;
        }
        notified.await;
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }

    /// Publish a final `Shutdown` event, then signal shutdown
    pub async fn shutdown_with(&self, reason: ShutdownReason) {
        log::info!("Shutting down event bus: {reason:?}");
        self.emit(CrawlEvent::shutdown(reason)).await;
        self.shutdown();
    }
}
