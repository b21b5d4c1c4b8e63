//! # mudcore
//!
//! Permission locks and session routing for text-based multiplayer games.
//!
//! mudcore answers two questions for a game server:
//!
//! - **May this entity do that?** Lock-strings such as
//!   `"get: perm(Builder) OR holds(brass key)"` are compiled per entity and
//!   checked by a [`LockEngine`](lock::LockEngine), with a configurable
//!   permission hierarchy, quelling, and a superuser bypass.
//! - **Who is connected as whom?** A [`Router`](session::Router) owns the
//!   session ↔ account ↔ character graph under one of four multisession
//!   modes and fans outbound messages to the right connections.
//!
//! [`Core`] wires both together behind a per-session task model: the I/O
//! layer opens a [`SessionHandle`], pushes [`Inbound`](protocol::Inbound)
//! frames in, and reads [`Outbound`](protocol::Outbound) frames out.
//! Commands go to the game's [`CommandHandler`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mudcore::prelude::*;
//!
//! struct Tokens;
//!
//! impl Authenticator for Tokens {
//!     async fn authenticate(&self, token: &str) -> Result<EntityId, SessionError> {
//!         token.parse().map_err(|_| SessionError::AuthFailed("bad token".into()))
//!     }
//! }
//!
//! # async fn run() -> Result<(), MudcoreError> {
//! mudcore::init_tracing();
//! let settings = CoreSettings::from_json_file("settings.json")?;
//! let core = Core::builder().settings(settings).build(
//!     |ctx: &CommandContext, _router: &mut Router| {
//!         vec![(Target::Session(ctx.session), Payload::text(format!("You said: {}", ctx.text)))]
//!     },
//!     Tokens,
//! )?;
//!
//! let mut session = core.open_session().await;
//! session.send(Inbound::Login { token: "1".into() }).await?;
//! while let Some(frame) = session.recv().await {
//!     println!("{frame:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod handler;
mod server;
mod settings;

pub use error::{ConfigError, MudcoreError};
pub use handler::{CommandContext, CommandHandler};
pub use server::{Core, CoreBuilder, SessionHandle};
pub use settings::CoreSettings;

pub use mudcore_lock as lock;
pub use mudcore_protocol as protocol;
pub use mudcore_session as session;

/// Installs a `tracing` subscriber filtered by `RUST_LOG` (default
/// `info`). Safe to call more than once; later calls do nothing.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Common imports for building on mudcore.
pub mod prelude {
    pub use crate::{
        CommandContext, CommandHandler, ConfigError, Core, CoreBuilder, CoreSettings,
        MudcoreError, SessionHandle,
    };
    pub use mudcore_lock::{
        Entity, EntityRecord, LockEngine, LockFuncModule, LockSet, PermissionHierarchy,
    };
    pub use mudcore_protocol::{EntityId, Inbound, Outbound, Payload, SessionId, Target};
    pub use mudcore_session::{
        Account, Authenticator, Character, MultisessionMode, PuppetDenied, Router, RouterConfig,
        SessionError,
    };
}
