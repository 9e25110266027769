//! # bibgrab
//!
//! Fetch BibTeX records from a DBLP-style publication index.
//!
//! ## Modules
//!
//! - [`resolve`] - Turning author/conference/keyword/citation inputs into record ids
//! - [`record`] - Record retrieval and entry extraction
//! - [`aggregate`] - The resolve-then-fetch run loop
//! - [`output`] - Deduplication, field filtering and serialization
//! - [`index`] - Remote endpoint URLs and the fetch capability
//! - [`markup`] - Markup stripping
//! - [`error`] - Custom error types

pub mod aggregate;
pub mod error;
pub mod index;
pub mod markup;
pub mod output;
pub mod record;
pub mod resolve;

pub use error::{BibgrabError, Result};
