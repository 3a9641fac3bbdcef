//! # Catalog Events
//!
//! A typed in-process publish/subscribe bus.
//!
//! Every subscriber owns a bounded queue. Publishing never blocks and never
//! fails: if a subscriber's queue is full the event is dropped for that
//! subscriber only, so a slow consumer cannot stall the publisher or its
//! peers. Unsubscribing closes the queue; a consumer still draining it will
//! observe end-of-stream once the buffered events run out.

mod bus;
mod types;

pub use bus::{EventBus, Subscription};
pub use types::{Event, PriceUpdate, ProductAdded, ProductDeleted, ProductUpdated, RateChanged};
