//! # Dojo
//!
//! Shared domain crate of the portal: the student model, the document store
//! seam, the live roster projection, account resolution for multi-student
//! families, role derivation, push payload handling and the remote
//! payment/billing gateways.
//!
//! The managed document database itself is an external collaborator. The
//! [`store::StudentStore`] trait is the only thing the rest of the code
//! knows about it; [`store::MemoryStore`] is the in-repo implementation used
//! by the server's default wiring, the tester bin and every test.

pub mod accounts;
pub mod model;
pub mod month;
pub mod push;
pub mod remote;
pub mod roles;
pub mod roster;
pub mod seed;
pub mod store;
