//! The command extension point.
//!
//! Parsing and running commands is the game's business. mudcore hands
//! each logged-in `Command` frame to a [`CommandHandler`] together with
//! mutable access to the router, then routes whatever the handler returns.

use mudcore_protocol::{EntityId, Payload, SessionId, Target};
use mudcore_session::Router;

/// Who sent a command and what they are driving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    pub session: SessionId,
    pub account: EntityId,
    /// `None` when the session is out of character.
    pub puppet: Option<EntityId>,
    pub text: String,
}

/// Runs one command.
///
/// Called with the router locked, so every command sees and mutates a
/// consistent state, and commands from one session run in arrival order.
/// The handler must not block.
///
/// Closures of the right shape implement this trait:
///
/// ```rust
/// use mudcore::{CommandContext, CommandHandler};
/// use mudcore_protocol::{Payload, Target};
/// use mudcore_session::Router;
///
/// fn echo() -> impl CommandHandler {
///     |ctx: &CommandContext, _router: &mut Router| {
///         vec![(Target::Session(ctx.session), Payload::text(ctx.text.clone()))]
///     }
/// }
/// ```
pub trait CommandHandler: Send + Sync + 'static {
    fn handle(&self, ctx: &CommandContext, router: &mut Router) -> Vec<(Target, Payload)>;
}

impl<F> CommandHandler for F
where
    F: Fn(&CommandContext, &mut Router) -> Vec<(Target, Payload)> + Send + Sync + 'static,
{
    fn handle(&self, ctx: &CommandContext, router: &mut Router) -> Vec<(Target, Payload)> {
        self(ctx, router)
    }
}
