//! Management panel client
//!
//! Typed access to the panel's REST API with bearer-token sessions. Every
//! call goes through one retry wrapper: a 401/403 triggers a single re-login
//! and a single replay of the original request.

mod client;
mod session;
mod wire;

pub use client::PanelClient;
pub use session::{Credentials, Session};
