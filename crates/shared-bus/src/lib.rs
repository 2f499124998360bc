//! # Shared Bus - Domain Event Bus
//!
//! In-process publish/subscribe between the event-scoped unit tracker and the
//! parties that react to a finished operation (history builders, notifiers).
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Event Scope  │                    │  Subscriber  │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  handle(event, uow)
//! ```
//!
//! ## Rules
//!
//! - The registry is built once with [`BusBuilder`] and frozen; a
//!   [`DomainEventBus`] cannot gain subscribers after construction.
//! - Dispatch is synchronous, in registration order, inside the publisher's
//!   unit of work.
//! - A subscriber that returns an error or panics is logged and skipped; the
//!   remaining subscribers still run and `publish` never fails.
//! - No retry and no persistence of undelivered events.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::EventFilter;
pub use publisher::{BusBuilder, DomainEventBus, EventPublisher, PublishReport};
pub use subscriber::{EventSubscriber, FnSubscriber};
