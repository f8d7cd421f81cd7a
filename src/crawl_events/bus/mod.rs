//! Broadcast bus carrying crawl events to subscribers

mod core;
mod impls;
mod publishing;
mod shutdown;
mod subscription;

pub use core::CrawlEventBus;
