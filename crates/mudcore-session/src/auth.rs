//! Authentication hook.
//!
//! The router does not know how accounts log in. A game supplies an
//! [`Authenticator`] that turns whatever the client sends (a password
//! hash, a signed token, an SSH key fingerprint) into the id of a
//! registered account.
//!
//! # Why a trait?
//!
//! Login is where games differ most. One game checks a bcrypt hash in a
//! database, another trusts a reverse proxy's header, and a test suite
//! just parses a number. The router only needs the answer ("this is
//! account #7"), so the question sits behind a single async method and
//! every one of those strategies plugs in without touching mudcore.
//!
//! # When it runs
//!
//! The core calls [`Authenticator::authenticate`] when a session sends a
//! `Login` frame, *before* taking the router lock. A slow database lookup
//! therefore stalls only the session that is logging in. The returned id
//! must belong to an account already registered with the router,
//! otherwise the login is refused with
//! [`SessionError::UnknownAccount`].

use mudcore_protocol::EntityId;

use crate::SessionError;

/// Validates a login token and returns the account it belongs to.
///
/// # Trait bounds
///
/// - `Send + Sync`: every session task holds the same authenticator, and
///   Tokio may poll those tasks on any worker thread.
/// - `'static`: it lives as long as the core, so it cannot borrow
///   short-lived data.
///
/// The returned future must be `Send` for the same reason. Writing the
/// method as `async fn` in an impl satisfies that as long as nothing
/// non-`Send` (an `Rc`, a `RefCell` borrow) is held across an `.await`.
///
/// # Example
///
/// ```rust
/// use mudcore_protocol::EntityId;
/// use mudcore_session::{Authenticator, SessionError};
///
/// /// Accepts `"account:<id>"`. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<EntityId, SessionError> {
///         token
///             .strip_prefix("account:")
///             .and_then(|id| id.parse().ok())
///             .ok_or_else(|| SessionError::AuthFailed("expected account:<id>".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the account id for `token`.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] with a reason the client may see.
    /// Keep it vague ("bad credentials") in production.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<EntityId, SessionError>> + Send;
}
