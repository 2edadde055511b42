//! Response decoder module
//!
//! Supports: Atom and RSS feeds, store query and block listings
//!
//! # Overview
//!
//! The decode module turns raw connector responses into crate types.
//! Decoders are pure; fetching lives in the connectors.

mod decoders;
mod store;
mod types;

pub use decoders::{decode_text, FeedDecoder};
pub use store::{
    decode_blocks, decode_created_id, property_text, rich_text_plain, PageDecoder,
};
pub use types::{BlockPage, FeedFormat};
