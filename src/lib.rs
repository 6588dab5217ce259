//! In-process publish/subscribe event bus.
//!
//! Subscribers register by implementing [`Subscriber`] and declaring their
//! handlers through a [`HandlerRegistrar`]; [`EventBus::post`] dispatches an
//! event to every handler whose declared type matches the event's runtime type
//! or any type it was explicitly declared assignable to via
//! [`EventBus::register_supertype`]. Delivery runs under one of five
//! [`ThreadMode`]s, in priority order, with sticky replay and safe concurrent
//! (un)registration.
//!
//! ```
//! use event_bus::{EventBus, HandlerRegistrar, Subscriber, ThreadMode};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone)]
//! struct Tick(u32);
//!
//! struct Logger;
//!
//! impl Logger {
//!     fn on_tick(&self, tick: &Tick) {
//!         println!("tick {}", tick.0);
//!     }
//! }
//!
//! impl Subscriber for Logger {
//!     fn describe(registrar: &mut HandlerRegistrar<Self>) {
//!         registrar.on::<Tick>(ThreadMode::Posting, 0, false, Logger::on_tick);
//!     }
//! }
//!
//! let bus = EventBus::new();
//! bus.register(Arc::new(Logger)).unwrap();
//! bus.post(Tick(1));
//! ```

mod bus;
mod config;
mod descriptor;
mod error;
mod event;
mod hierarchy;
mod posting;
mod poster;
mod registry;
mod sticky;

pub use bus::EventBus;
pub use config::BusConfig;
pub use descriptor::{HandlerDescriptor, HandlerRegistrar, Subscriber, SubscriberInfoIndex, ThreadMode};
pub use error::EventBusError;
pub use event::{NoSubscriberEvent, SubscriberExceptionEvent};
pub use poster::{MainThreadSupport, ThreadPoolWorkerPool, WorkerPool};
