//! Docnum - document number reservation
//!
//! Gap-minimizing document numbering for field devices that generate
//! signed delivery and invoice documents. The core is the three-phase
//! reservation protocol (reserve → confirm | release): a sequence number
//! is provisionally claimed before the slow, fallible work of rendering
//! and handing off a document, then either confirmed as consumed or
//! released for reuse.
//!
//! The [`orchestration::Orchestrator`] drives one document's number
//! through its lifecycle, [`clients`] talk to the sequence store, and
//! [`sink`] / [`cache`] define the collaborator boundaries.

pub mod cache;
pub mod clients;
pub mod config;
pub mod orchestration;
pub mod reservation;
pub mod sink;
pub mod utils;

pub use cache::{CacheError, FallbackCache, JsonFileCache, MemoryCache};
pub use clients::http::HttpStore;
pub use clients::{SequenceStore, StoreError};
pub use orchestration::{CancelToken, FlowError, FlowOutcome, FlowState, Orchestrator};
pub use reservation::{Reservation, ReservationState};
pub use sink::{DeliveryOutcome, DeliverySink, FallbackSink};
