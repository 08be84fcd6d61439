//! # Redis
//!
//! RAM database.
//!
//! Core purpose is to remember which student account an identity picked in
//! the account chooser. One lookup at login, one write per explicit switch.
//!
//! ## Requirements
//!
//! - Fast lookups
//! - Tiny dataset, one field per identity that ever faced the chooser
//! - Values are opaque student keys, short strings
//!
//! ## Implementation
//!
//! - Redis hash: 1 big key (`active_accounts`), then identity-key pairs
//! - HGET on login, HSET on switch, nothing is ever deleted
//! - A stale selection is harmless: the resolver revalidates it against the
//!   currently matching accounts and falls back to the first match
//! - If Redis is down the server degrades to in-memory selections, the
//!   chooser just reappears on next login
