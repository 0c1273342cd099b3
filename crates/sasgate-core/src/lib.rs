//! Shared primitives for the sasgate workspace.
//!
//! Kept deliberately small: time, key material, and typed identifiers that
//! both the access-control core and the host binary agree on.

pub mod crypto;
pub mod error;
pub mod traits;
pub mod types;

pub use crypto::*;
pub use error::*;
pub use traits::*;
pub use types::*;
