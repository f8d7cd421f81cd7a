//! Publishing operations for the CrawlEventBus

use crate::crawl_events::config::BackpressureMode;
use crate::crawl_events::errors::EventBusError;
use crate::crawl_events::types::CrawlEvent;

use super::core::CrawlEventBus;

impl CrawlEventBus {
    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers that will see the event. With no
    /// subscribers the event is discarded and `NoSubscribers` returned.
    pub async fn publish(&self, event: CrawlEvent) -> Result<usize, EventBusError> {
        if self.config.backpressure_mode == BackpressureMode::Error {
            let _guard = self.send_lock.lock().await;
            if self.sender.len() >= self.config.capacity {
                if self.config.enable_metrics {
                    self.metrics.record_rejected();
                }
                return Err(EventBusError::ChannelFull);
            }
            return self.send(event);
        }
        self.send(event)
    }

    /// Publish where losing the event is acceptable
    ///
    /// Failures are logged at trace level only.
    pub async fn emit(&self, event: CrawlEvent) {
        let kind = event.kind();
        if let Err(e) = self.publish(event).await {
            log::trace!("Event {kind} not delivered: {e}");
        }
    }

    fn send(&self, event: CrawlEvent) -> Result<usize, EventBusError> {
        match self.sender.send(event) {
            Ok(subscribers) => {
                if self.config.enable_metrics {
                    self.metrics.record_sent(subscribers);
                }
                Ok(subscribers)
            }
            Err(_) => {
                if self.config.enable_metrics {
                    self.metrics.record_rejected();
                }
                Err(EventBusError::NoSubscribers)
            }
        }
    }
}
