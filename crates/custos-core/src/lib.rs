//! CUSTOS Core — domain models, collaborator contracts and the error
//! taxonomy shared across all crates.
//!
//! This crate performs no I/O. Storage lives behind the traits in
//! [`store`], external systems behind the traits in [`handler`],
//! [`plugin`] and [`flow`].

pub mod error;
pub mod flow;
pub mod handler;
pub mod models;
pub mod plugin;
pub mod registry;
pub mod store;
