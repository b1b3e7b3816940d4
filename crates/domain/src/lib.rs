//! # omnihub-domain
//!
//! Pure domain model for the omnihub unified entity system.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, timestamps
//! - Define the **canonical Entity** (the single merged representation of a
//!   device, independent of which source reports it)
//! - Define **RawEntity** (what an adapter reports before canonicalization)
//! - Define **Sources** (the enum identifying which adapter/protocol an
//!   entity or action originates from)
//! - Define **Actions** (imperative commands routed to an owning source)
//! - Define adapter lifecycle records and sync outcome reports
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod adapter;
pub mod entity;
pub mod event;
pub mod room;
pub mod source;
pub mod sync;
