//! Cartwright Core - Domain types and fulfillment rules.
//!
//! This crate provides the types and pure rules shared by all Cartwright
//! components:
//! - `api` - REST backend for carts, checkout, orders, payments, and reviews
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Every decision that the order fulfillment engine
//! makes (how much stock an adjustment really moves, whether a status change
//! returns stock, what a webhook event changes) is computed here and then
//! persisted by the `api` crate inside a single transaction.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, and status enums
//! - [`rules`] - Inventory ledger, totals, lifecycle, checkout validation,
//!   payment reconciliation, and review verification rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod rules;
pub mod types;

pub use types::*;
