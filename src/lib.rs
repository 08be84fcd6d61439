//! # Tatame Documentation
//!
//! Management portal for a martial arts school: admin dashboard (roster,
//! attendance, billing, belt exams) and a student portal (profile, dues,
//! payments).
//!
//! # General Infrastructure
//! - Frontend is an installable web app talking JSON to the Rust backend
//! - Backend composes the roster from the document store and proxies search
//! - Redis holds the active-account selections, Meilisearch the roster index
//! - Payment charges and billing recalculation are remote HTTP APIs, the
//!   backend only forwards and never retries on its own
//!
//! # Notes
//!
//! ## Who is an admin
//! Role is derived on the client from the email domain prefix (`admin...`).
//! There is no backend-issued claim. This is a known security gap, kept for
//! behavioral parity with the deployed portal, NOT a pattern to copy: a real
//! deployment must replace it with a verified claim from the auth provider.
//!
//! ## Multi-account families
//! Multiple students may carry the same email in their profile (siblings
//! under one guardian address). The portal treats this as one identity with
//! several accounts and remembers which one was chosen. See
//! [`portal`] for the chooser flow.
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run the backend locally (Redis and Meilisearch optional, the server
//! degrades to in-memory selections and no search when they are absent).
//! ```sh
//! RUST_LOG=info cargo run -p server
//! ```
//!
//! Monthly dues sweep over the last three months.
//! ```sh
//! cargo run -p process -- 3
//! ```

pub mod database;
pub mod portal;
