//! # nuana-reco
//!
//! Online part of the pipeline: the [`EventSelector`] gate chain, which writes
//! one `Cut_<Gate>` flag per evaluated gate, and the [`Interpreter`] that
//! builds the physics hypothesis of surviving events.
//!
//! ```no_run
//! use nuana_core::Event;
//! use nuana_reco::{EventSelector, SelectorConfig};
//!
//! let selector = EventSelector::with_reference_tools(SelectorConfig::default())?;
//! let record = selector.select(&Event::new(1, 1, 1));
//! assert!(!record.outcome.passed());
//! # Ok::<(), nuana_core::Error>(())
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod interpret;
pub mod selector;
pub mod tools;

pub use config::{SelectorConfig, VertexSmear};
pub use interpret::{Interpreter, Selected};
pub use selector::{EventSelector, SelectorBuilder};
