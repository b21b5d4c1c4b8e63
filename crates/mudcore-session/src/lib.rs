//! Sessions, accounts, characters, and the router that ties them together.
//!
//! 1. **Authentication**: turning a login token into an account
//!    ([`Authenticator`])
//! 2. **Routing**: the session ↔ account ↔ character graph, puppeting
//!    under the configured [`MultisessionMode`], and outbound fan-out
//!    ([`Router`])
//!
//! # How it fits in the stack
//!
//! ```text
//! mudcore (above)          ← owns the Router behind a mutex, runs session tasks
//!     ↕
//! mudcore-session (this)   ← who is connected, who puppets what
//!     ↕
//! mudcore-lock (below)     ← `puppet` locks and accessor permission checks
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod config;
mod entities;
mod error;
mod router;
mod session;

pub use auth::Authenticator;
pub use config::{MultisessionMode, RouterConfig};
pub use entities::{Accessor, Account, Character, PuppetView};
pub use error::{PuppetDenied, SessionError};
pub use router::{InputContext, LoginOutcome, PUPPET_ACCESS, PuppetOutcome, Router};
pub use session::Session;
