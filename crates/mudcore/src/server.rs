//! `Core` builder and per-session tasks.
//!
//! This ties the layers together: settings → lock engine → router →
//! session tasks. Each open session gets its own Tokio task that reads
//! [`Inbound`] frames in order and answers through the router.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mudcore_lock::{
    BUILTIN_MODULE, LockEngine, LockFuncModule, LockFuncRegistry, PermissionHierarchy,
    builtin_module,
};
use mudcore_protocol::{EntityId, FrameCodec, Inbound, Outbound, SessionId};
use mudcore_session::{Authenticator, Router, RouterConfig};
use tokio::sync::{Mutex, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::handler::{CommandContext, CommandHandler};
use crate::{ConfigError, CoreSettings, MudcoreError};

/// Frames a client may queue before `send` waits.
const INBOUND_BUFFER: usize = 64;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared by the [`Core`] handle and every session task.
pub(crate) struct CoreState<H, A> {
    pub(crate) router: Mutex<Router>,
    tasks: Mutex<HashMap<SessionId, AbortHandle>>,
    handler: H,
    auth: A,
}

impl<H, A> CoreState<H, A> {
    /// Stops the tasks of sessions the router has already dropped.
    async fn abort_tasks(&self, sessions: &[SessionId]) {
        let mut tasks = self.tasks.lock().await;
        for session in sessions {
            if let Some(task) = tasks.remove(session) {
                task.abort();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and builds a [`Core`].
///
/// ```rust,ignore
/// let core = Core::builder()
///     .settings(CoreSettings::from_json_file("settings.json")?)
///     .lock_module(game_lockfuncs())
///     .build(MyCommands, MyAuth)?;
/// ```
pub struct CoreBuilder {
    router_config: RouterConfig,
    hierarchy: PermissionHierarchy,
    modules: Vec<LockFuncModule>,
    module_order: Option<Vec<String>>,
    superuser: Option<EntityId>,
    settings_error: Option<ConfigError>,
}

impl CoreBuilder {
    pub fn new() -> Self {
        Self {
            router_config: RouterConfig::default(),
            hierarchy: PermissionHierarchy::default(),
            modules: Vec::new(),
            module_order: None,
            superuser: None,
            settings_error: None,
        }
    }

    /// Applies a settings document. Errors in it surface from
    /// [`build`](Self::build).
    pub fn settings(mut self, settings: CoreSettings) -> Self {
        match settings.router_config() {
            Ok(config) => self.router_config = config,
            Err(e) => self.settings_error = Some(e),
        }
        self.hierarchy = settings.permission_hierarchy;
        self.module_order = Some(settings.lock_func_modules);
        self.superuser = settings.superuser;
        self
    }

    pub fn router_config(mut self, config: RouterConfig) -> Self {
        self.router_config = config;
        self
    }

    pub fn hierarchy(mut self, hierarchy: PermissionHierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Provides a lock function module. Without settings, modules are
    /// registered after the built-ins in the order given here. With
    /// settings, the `lock_func_modules` list sets the order and any
    /// provided module it leaves out is appended with a warning.
    pub fn lock_module(mut self, module: LockFuncModule) -> Self {
        self.modules.push(module);
        self
    }

    pub fn superuser(mut self, superuser: Option<EntityId>) -> Self {
        self.superuser = superuser;
        self
    }

    /// Builds the lock engine and router.
    pub fn build<H, A>(self, handler: H, auth: A) -> Result<Core<H, A>, MudcoreError>
    where
        H: CommandHandler,
        A: Authenticator,
    {
        if let Some(e) = self.settings_error {
            return Err(e.into());
        }

        let mut available: HashMap<String, LockFuncModule> = self
            .modules
            .iter()
            .map(|m| (m.name().to_string(), m.clone()))
            .collect();
        available
            .entry(BUILTIN_MODULE.to_string())
            .or_insert_with(builtin_module);

        let provided = self
            .modules
            .iter()
            .map(|m| m.name().to_string())
            .filter(|name| name != BUILTIN_MODULE);
        let order = match self.module_order {
            Some(mut order) => {
                // Provided modules the settings forgot still register,
                // after everything listed.
                for name in provided {
                    if !order.contains(&name) {
                        warn!(module = %name, "lock module not listed in settings, appending");
                        order.push(name);
                    }
                }
                order
            }
            None => std::iter::once(BUILTIN_MODULE.to_string())
                .chain(provided)
                .collect(),
        };

        let mut registry = LockFuncRegistry::new();
        for name in &order {
            let module = available
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownLockModule(name.clone()))?;
            registry.register_module(module);
        }

        let engine = LockEngine::new(registry, self.hierarchy).with_superuser(self.superuser);
        info!(
            modules = ?order,
            functions = engine.registry().len(),
            mode = %self.router_config.multisession_mode,
            superuser = ?self.superuser,
            "mudcore built"
        );

        Ok(Core {
            state: Arc::new(CoreState {
                router: Mutex::new(Router::new(self.router_config, Arc::new(engine))),
                tasks: Mutex::new(HashMap::new()),
                handler,
                auth,
            }),
        })
    }
}

impl Default for CoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

/// A running core: the router plus one task per open session.
///
/// Cheap to clone; clones share the same state.
pub struct Core<H, A> {
    state: Arc<CoreState<H, A>>,
}

impl<H, A> Clone for Core<H, A> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl Core<(), ()> {
    pub fn builder() -> CoreBuilder {
        CoreBuilder::new()
    }
}

impl<H, A> Core<H, A>
where
    H: CommandHandler,
    A: Authenticator,
{
    /// Runs `f` with the router locked, e.g. to register accounts and
    /// characters loaded from storage.
    pub async fn with_router<R>(&self, f: impl FnOnce(&mut Router) -> R) -> R {
        let mut router = self.state.router.lock().await;
        f(&mut router)
    }

    /// Opens a session and spawns the task that serves it.
    pub async fn open_session(&self) -> SessionHandle {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(INBOUND_BUFFER);
        let id = self.state.router.lock().await.session_connected(out_tx);

        // Hold the task table while spawning so the task's own cleanup
        // cannot run before its entry exists.
        let mut tasks = self.state.tasks.lock().await;
        let task: JoinHandle<()> = tokio::spawn(run_session(id, in_rx, Arc::clone(&self.state)));
        tasks.insert(id, task.abort_handle());

        SessionHandle {
            id,
            inbound: in_tx,
            outbound: out_rx,
        }
    }

    /// Closes a session from the server side.
    ///
    /// Sends a `Disconnect` frame, drops the session from the router and
    /// stops its task, cancelling any command still in flight for it.
    /// Sibling sessions are untouched. Returns `false` if the session was
    /// already gone.
    pub async fn disconnect(&self, session: SessionId, reason: &str) -> bool {
        let removed = {
            let mut router = self.state.router.lock().await;
            if let Some(s) = router.session(session) {
                s.deliver(Outbound::Disconnect {
                    reason: reason.to_string(),
                });
            }
            router.session_disconnected(session)
        };
        self.state.abort_tasks(&[session]).await;
        if removed.is_some() {
            info!(%session, reason, "session closed by server");
        }
        removed.is_some()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.state.router.lock().await.session_count()
    }

    /// Spawns a task that disconnects idle sessions every `period`.
    ///
    /// Does nothing useful unless the router has an `idle_timeout`.
    pub fn spawn_idle_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let core = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let idle = {
                    let router = core.state.router.lock().await;
                    router.idle_sessions(tokio::time::Instant::now())
                };
                for session in idle {
                    core.disconnect(session, "idle timeout").await;
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// The I/O side of one session: push [`Inbound`] frames in, read
/// [`Outbound`] frames out.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    inbound: mpsc::Sender<Inbound>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queues a frame for the session task.
    pub async fn send(&self, frame: Inbound) -> Result<(), MudcoreError> {
        self.inbound
            .send(frame)
            .await
            .map_err(|_| MudcoreError::SessionClosed(self.id))
    }

    /// Decodes raw bytes with `codec` and queues the frame.
    pub async fn send_bytes(
        &self,
        codec: &(impl FrameCodec + ?Sized),
        data: &[u8],
    ) -> Result<(), MudcoreError> {
        let frame = codec.decode_inbound(data)?;
        self.send(frame).await
    }

    /// Next frame for the client. `None` once the session is closed and
    /// everything queued has been read.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Next frame, encoded with `codec`.
    pub async fn recv_bytes(
        &mut self,
        codec: &(impl FrameCodec + ?Sized),
    ) -> Option<Result<Vec<u8>, MudcoreError>> {
        let frame = self.outbound.recv().await?;
        Some(codec.encode_outbound(&frame).map_err(MudcoreError::from))
    }

    /// Splits into the raw channel ends for an I/O layer that drives
    /// them from separate tasks.
    pub fn into_parts(
        self,
    ) -> (
        SessionId,
        mpsc::Sender<Inbound>,
        mpsc::UnboundedReceiver<Outbound>,
    ) {
        (self.id, self.inbound, self.outbound)
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

/// Releases a session's router state however its task ends: client
/// hangup, `Quit`, server disconnect, or abort.
///
/// # Why a guard?
///
/// An aborted task never reaches the code after its loop, so cleanup
/// written there would be skipped exactly when a session is cancelled.
/// Dropping the guard runs on every exit path, panics included. Cleanup
/// through [`Router::session_disconnected`] is idempotent, so it is fine
/// when `disconnect` or `Quit` already removed the session.
///
/// `Drop` is synchronous, so the async cleanup runs in a spawned task.
struct SessionGuard<H: Send + Sync + 'static, A: Send + Sync + 'static> {
    session: SessionId,
    state: Arc<CoreState<H, A>>,
}

impl<H: Send + Sync + 'static, A: Send + Sync + 'static> Drop for SessionGuard<H, A> {
    fn drop(&mut self) {
        let session = self.session;
        let state = Arc::clone(&self.state);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            state.tasks.lock().await.remove(&session);
            state.router.lock().await.session_disconnected(session);
        });
    }
}

enum Flow {
    Continue,
    Close,
}

async fn run_session<H, A>(
    session: SessionId,
    mut inbound: mpsc::Receiver<Inbound>,
    state: Arc<CoreState<H, A>>,
) where
    H: CommandHandler,
    A: Authenticator,
{
    let _guard = SessionGuard {
        session,
        state: Arc::clone(&state),
    };
    debug!(%session, "session task started");

    while let Some(frame) = inbound.recv().await {
        match dispatch(session, frame, &state).await {
            Flow::Continue => {}
            Flow::Close => break,
        }
    }

    debug!(%session, "session task finished");
    // _guard drops here → router cleanup fires.
}

async fn dispatch<H, A>(session: SessionId, frame: Inbound, state: &CoreState<H, A>) -> Flow
where
    H: CommandHandler,
    A: Authenticator,
{
    if !state.router.lock().await.touch(session) {
        // Dropped by the router (evicted or disconnected) but the task
        // was not aborted yet.
        return Flow::Close;
    }

    match frame {
        Inbound::Login { token } => {
            // Authenticate without holding the router lock.
            let account = match state.auth.authenticate(&token).await {
                Ok(account) => account,
                Err(e) => {
                    debug!(%session, error = %e, "login rejected");
                    send_error(state, session, 401, &e.to_string()).await;
                    return Flow::Continue;
                }
            };
            let result = state
                .router
                .lock()
                .await
                .session_authenticated(session, account);
            match result {
                Ok(outcome) => state.abort_tasks(&outcome.evicted).await,
                Err(e) => send_error(state, session, 409, &e.to_string()).await,
            }
        }

        Inbound::Puppet { character } => {
            let result = state.router.lock().await.puppet(session, character);
            if let Err(denied) = result {
                let message = format!("{}: {denied}", denied.code());
                send_error(state, session, 403, &message).await;
            }
        }

        Inbound::Unpuppet => {
            let result = state.router.lock().await.unpuppet(session);
            if let Err(denied) = result {
                let message = format!("{}: {denied}", denied.code());
                send_error(state, session, 403, &message).await;
            }
        }

        Inbound::Command { text } => {
            let mut router = state.router.lock().await;
            let input = match router.resolve_input(session) {
                Ok(input) => input,
                Err(_) => return Flow::Close,
            };
            let Some(account) = input.account else {
                if let Some(s) = router.session(session) {
                    s.deliver(Outbound::Error {
                        code: 401,
                        message: "log in first".into(),
                    });
                }
                return Flow::Continue;
            };
            let ctx = CommandContext {
                session,
                account,
                puppet: input.puppet,
                text,
            };
            let replies = state.handler.handle(&ctx, &mut router);
            for (target, payload) in replies {
                router.route(target, payload, None);
            }
        }

        Inbound::Quit => {
            let mut router = state.router.lock().await;
            if let Some(s) = router.session(session) {
                s.deliver(Outbound::Disconnect {
                    reason: "quit".into(),
                });
            }
            router.session_disconnected(session);
            return Flow::Close;
        }
    }

    Flow::Continue
}

async fn send_error<H, A>(state: &CoreState<H, A>, session: SessionId, code: u16, message: &str) {
    let router = state.router.lock().await;
    match router.session(session) {
        Some(s) => {
            s.deliver(Outbound::Error {
                code,
                message: message.to_string(),
            });
        }
        None => warn!(%session, code, "error for a session that is gone"),
    }
}
