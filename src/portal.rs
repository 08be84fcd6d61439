//! # Frontend Specifications
//!
//! Client logic/relevant flows.
//!
//! ## Identity
//!
//! Headers on every backend request
//! - x-identity-uid: store-assigned key of the signed-in user
//! - x-identity-email: email of the signed-in user, may be absent
//!
//! The backend trusts these as-is. See the crate docs for why this is a
//! flagged security gap.
//!
//! ## Login / Account Resolution
//!
//! - On sign-in, call GET /accounts
//! - Response: list of matching accounts, the active key, and needs_choice
//! - Zero matches means a legacy self-keyed account, the uid doubles as the
//!   student key and the portal renders directly
//! - One match renders directly, no prompt
//! - Multiple matches with needs_choice set opens the account chooser
//! - Choosing posts /accounts/switch with the chosen key, the backend
//!   remembers it for next login
//! - Resolution happens once per session, not per render
//!
//! ## Payments
//!
//! - Student portal shows one row per month with its dues status
//! - PIX: POST /payments/pix returns the copy-paste code and a QR image,
//!   render both, then poll GET /payments/status until approved
//! - Card: POST /payments/card returns a checkout link, open it in a new
//!   window
//! - Status values: approved, pending, rejected, cancelled, in_process
//! - A failed gateway call surfaces as a dismissible toast, the user retries
//!   by tapping again, the frontend never auto-retries
//!
//! ## Push Notifications
//!
//! - Service worker intercepts raw push events and parses the JSON body
//!   itself, fields under data win over fields under notification
//! - Shown notification carries title, body, icon and a click url
//! - On click: focus the first open portal window whose URL contains the
//!   notification url, otherwise open a new one
//! - Permission is requested after first login, the messaging token is
//!   refreshed on every app start and handed to the backend
//!
//! ## Installable App
//!
//! - Standard web manifest + the same service worker used for push
//! - The install prompt is offered from the profile page, never on load
