//! Caller identity, as asserted by the upstream SSO proxy.

mod identity;

pub use identity::{Identity, resolve};
