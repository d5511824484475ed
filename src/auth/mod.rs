//! Authentication module: JWT inspection, token persistence, and the
//! session lifecycle manager.
//!
//! This module provides:
//! - `jwt`: structural payload decoding and expiry prediction
//! - `TokenStore`: the durable two-slot token storage seam
//! - `Session`: the state machine driving login, silent refresh, and logout

pub mod jwt;
pub mod session;
pub mod store;

pub use jwt::{Claims, TokenError};
pub use session::{CheckOutcome, EndReason, Session, SessionState};
pub use store::{FileTokenStore, MemoryTokenStore, TokenSlot, TokenStore};
