//! Subscription operations for the CrawlEventBus

use tokio::sync::broadcast;

use crate::crawl_events::streaming::FilteredReceiver;
use crate::crawl_events::types::CrawlEvent;
use crate::session::SessionId;

use super::core::CrawlEventBus;

impl CrawlEventBus {
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let count = self.sender.receiver_count();
        if self.config.enable_metrics {
            self.metrics.record_subscribers(count);
        }
        count
    }

    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }

    pub fn subscribe_filtered<F>(&self, filter: F) -> FilteredReceiver<F>
    where
        F: Fn(&CrawlEvent) -> bool + Send + Sync + 'static,
    {
        FilteredReceiver::new(self.subscribe(), filter)
    }

    /// Events for one session, plus engine-wide shutdown
    pub fn subscribe_session(
        &self,
        session_id: SessionId,
    ) -> FilteredReceiver<impl Fn(&CrawlEvent) -> bool + Send + Sync + 'static> {
        self.subscribe_filtered(move |event| event.session_id().is_none_or(|id| id == session_id))
    }
}
