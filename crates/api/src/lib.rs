//! HTTP implementations of the engine's collaborator contracts: the catalog
//! source, the quote store, and the requisition directory/persistence, all
//! sharing one bearer-authenticated client.

pub mod catalog;
pub mod client;
pub mod quotes;
pub mod requisitions;

pub use client::{ApiClient, ApiClientError};
pub use quotes::HttpQuoteStore;
pub use requisitions::HttpRequisitionClient;
