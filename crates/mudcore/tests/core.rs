//! Integration tests for the core: session tasks, login, puppeting,
//! command dispatch, disconnects and idle sweeping.

use std::time::Duration;

use mudcore::prelude::*;
use mudcore::protocol::JsonCodec;

// =========================================================================
// Mock game and authenticator
// =========================================================================

const ANN: EntityId = EntityId(1);
const BOB: EntityId = EntityId(2);
const HERO: EntityId = EntityId(10);
const CHEST: EntityId = EntityId(50);

/// Accepts any numeric token as an account id.
struct TestAuth;

impl Authenticator for TestAuth {
    async fn authenticate(&self, token: &str) -> Result<EntityId, SessionError> {
        token
            .parse()
            .map_err(|_| SessionError::AuthFailed("not a number".into()))
    }
}

fn commands() -> impl CommandHandler {
    |ctx: &CommandContext, router: &mut Router| -> Vec<(Target, Payload)> {
        let reply = |text: &str| vec![(Target::Session(ctx.session), Payload::text(text))];
        let (verb, rest) = ctx.text.split_once(' ').unwrap_or((ctx.text.as_str(), ""));
        match verb {
            "say" => vec![(Target::Account(ctx.account), Payload::text(rest))],
            "emote" => match ctx.puppet {
                Some(character) => vec![(Target::Character(character), Payload::text(rest))],
                None => reply("You are not in character."),
            },
            "quell" => {
                let _ = router.set_quelled(ctx.account, true);
                reply("Quelled.")
            }
            "open" => {
                let allowed = router
                    .character(CHEST)
                    .is_some_and(|chest| router.check_access(ctx.session, chest, "open"));
                reply(if allowed { "The chest opens." } else { "It is locked." })
            }
            _ => reply(&format!("You said: {}", ctx.text)),
        }
    }
}

async fn core_with(builder: CoreBuilder) -> Core<impl CommandHandler, TestAuth> {
    let core = builder.build(commands(), TestAuth).unwrap();
    core.with_router(|r| {
        r.register_account(Account::new(ANN, "ann").with_permission("Builder"));
        r.register_account(Account::new(BOB, "bob"));
        r.register_character(Character::owned_by(HERO, "Hero", ANN));
        r.register_character(Character::new(CHEST, "chest").with_locks("open: perm(Builder)"));
    })
    .await;
    core
}

async fn core(mode: MultisessionMode) -> Core<impl CommandHandler, TestAuth> {
    core_with(Core::builder().router_config(RouterConfig {
        multisession_mode: mode,
        max_puppets: 2,
        ..RouterConfig::default()
    }))
    .await
}

async fn next(handle: &mut SessionHandle) -> Outbound {
    tokio::time::timeout(Duration::from_secs(2), handle.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("session closed")
}

async fn next_text(handle: &mut SessionHandle) -> String {
    loop {
        if let Outbound::Message {
            payload: Payload::Text { text },
        } = next(handle).await
        {
            return text;
        }
    }
}

async fn next_error(handle: &mut SessionHandle) -> (u16, String) {
    loop {
        if let Outbound::Error { code, message } = next(handle).await {
            return (code, message);
        }
    }
}

async fn login(core: &Core<impl CommandHandler, TestAuth>, account: EntityId) -> SessionHandle {
    let mut handle = core.open_session().await;
    handle
        .send(Inbound::Login {
            token: account.0.to_string(),
        })
        .await
        .unwrap();
    loop {
        if let Outbound::LoggedIn { account: got, .. } = next(&mut handle).await {
            assert_eq!(got, account);
            return handle;
        }
    }
}

// =========================================================================
// Login and commands
// =========================================================================

#[tokio::test]
async fn login_then_command_replies_to_the_session() {
    let core = core(MultisessionMode::Single).await;
    let mut ann = login(&core, ANN).await;

    ann.send(Inbound::Command { text: "look".into() }).await.unwrap();
    assert_eq!(next_text(&mut ann).await, "You said: look");
}

#[tokio::test]
async fn bad_token_is_rejected_with_401() {
    let core = core(MultisessionMode::Single).await;
    let mut handle = core.open_session().await;
    handle
        .send(Inbound::Login { token: "nope".into() })
        .await
        .unwrap();
    let (code, message) = next_error(&mut handle).await;
    assert_eq!(code, 401);
    assert!(message.contains("not a number"));
}

#[tokio::test]
async fn command_before_login_is_refused() {
    let core = core(MultisessionMode::Single).await;
    let mut handle = core.open_session().await;
    handle
        .send(Inbound::Command { text: "look".into() })
        .await
        .unwrap();
    assert_eq!(next_error(&mut handle).await.0, 401);
}

#[tokio::test]
async fn frames_round_trip_through_a_codec() {
    let core = core(MultisessionMode::Single).await;
    let mut handle = core.open_session().await;
    handle
        .send_bytes(&JsonCodec, br#"{"type":"Login","token":"1"}"#)
        .await
        .unwrap();
    let bytes = tokio::time::timeout(Duration::from_secs(2), handle.recv_bytes(&JsonCodec))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let json = String::from_utf8(bytes).unwrap();
    assert!(json.contains(r#""type":"LoggedIn""#), "{json}");

    assert!(matches!(
        handle.send_bytes(&JsonCodec, b"not json").await,
        Err(MudcoreError::Protocol(_))
    ));
}

// =========================================================================
// Puppeting
// =========================================================================

#[tokio::test]
async fn puppet_and_emote_reach_the_character() {
    let core = core(MultisessionMode::Shared).await;
    let mut a = login(&core, ANN).await;
    let mut b = login(&core, ANN).await;

    a.send(Inbound::Puppet { character: HERO }).await.unwrap();
    assert_eq!(next(&mut a).await, Outbound::Puppeted { character: HERO });
    assert_eq!(next(&mut b).await, Outbound::Puppeted { character: HERO });

    b.send(Inbound::Command { text: "emote waves".into() }).await.unwrap();
    assert_eq!(next_text(&mut a).await, "waves");
    assert_eq!(next_text(&mut b).await, "waves");
}

#[tokio::test]
async fn puppet_denial_carries_the_reason_code() {
    let core = core(MultisessionMode::PerSession).await;
    let mut bob = login(&core, BOB).await;
    bob.send(Inbound::Puppet { character: HERO }).await.unwrap();
    let (code, message) = next_error(&mut bob).await;
    assert_eq!(code, 403);
    assert!(message.starts_with("LOCK_DENIED"), "{message}");
}

#[tokio::test]
async fn quelling_drops_to_the_puppet_permissions() {
    let core = core(MultisessionMode::Single).await;
    let mut ann = login(&core, ANN).await;
    ann.send(Inbound::Puppet { character: HERO }).await.unwrap();
    ann.send(Inbound::Command { text: "open".into() }).await.unwrap();
    assert_eq!(next_text(&mut ann).await, "The chest opens.");

    ann.send(Inbound::Command { text: "quell".into() }).await.unwrap();
    ann.send(Inbound::Command { text: "open".into() }).await.unwrap();
    assert_eq!(next_text(&mut ann).await, "Quelled.");
    assert_eq!(next_text(&mut ann).await, "It is locked.");
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn mode0_second_login_disconnects_the_first() {
    let core = core(MultisessionMode::Single).await;
    let mut first = login(&core, ANN).await;
    let _second = login(&core, ANN).await;

    loop {
        match next(&mut first).await {
            Outbound::Disconnect { .. } => break,
            _ => continue,
        }
    }
    let closed = tokio::time::timeout(Duration::from_secs(2), first.recv())
        .await
        .unwrap();
    assert_eq!(closed, None);
    assert_eq!(core.session_count().await, 1);
}

#[tokio::test]
async fn quit_closes_only_that_session() {
    let core = core(MultisessionMode::Shared).await;
    let mut a = login(&core, ANN).await;
    let mut b = login(&core, ANN).await;

    a.send(Inbound::Quit).await.unwrap();
    assert_eq!(
        next(&mut a).await,
        Outbound::Disconnect {
            reason: "quit".into()
        }
    );
    assert_eq!(core.session_count().await, 1);

    b.send(Inbound::Command { text: "say still here".into() }).await.unwrap();
    assert_eq!(next_text(&mut b).await, "still here");
}

#[tokio::test]
async fn server_disconnect_is_idempotent() {
    let core = core(MultisessionMode::Shared).await;
    let mut a = login(&core, ANN).await;
    let id = a.id();

    assert!(core.disconnect(id, "maintenance").await);
    assert!(!core.disconnect(id, "maintenance").await);
    assert_eq!(
        next(&mut a).await,
        Outbound::Disconnect {
            reason: "maintenance".into()
        }
    );
    assert_eq!(core.session_count().await, 0);
}

#[tokio::test]
async fn dropping_the_client_end_releases_the_puppet() {
    let core = core(MultisessionMode::Single).await;
    let mut ann = login(&core, ANN).await;
    ann.send(Inbound::Puppet { character: HERO }).await.unwrap();
    assert_eq!(next(&mut ann).await, Outbound::Puppeted { character: HERO });
    drop(ann);

    for _ in 0..50 {
        if core.session_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(core.session_count().await, 0);
    assert_eq!(core.with_router(|r| r.puppeteer_of(HERO)).await, None);
}

#[tokio::test(start_paused = true)]
async fn idle_sweeper_disconnects_quiet_sessions() {
    let core = core_with(Core::builder().router_config(RouterConfig {
        idle_timeout: Some(Duration::from_secs(60)),
        ..RouterConfig::default()
    }))
    .await;
    let mut ann = login(&core, ANN).await;
    let sweeper = core.spawn_idle_sweeper(Duration::from_secs(10));

    let reason = loop {
        match ann.recv().await {
            Some(Outbound::Disconnect { reason }) => break reason,
            Some(_) => continue,
            None => panic!("closed without a disconnect frame"),
        }
    };
    assert_eq!(reason, "idle timeout");
    sweeper.abort();
}

// =========================================================================
// Settings and lock modules
// =========================================================================

#[tokio::test]
async fn settings_select_and_order_lock_modules() {
    let settings = CoreSettings::from_json_str(
        r#"{
            "multisession_mode": 1,
            "lock_func_modules": ["mudcore.lockfuncs", "game.lockfuncs"]
        }"#,
    )
    .unwrap();
    let game = LockFuncModule::new("game.lockfuncs").function("perm", 1..=1, |_| false);
    let core = core_with(Core::builder().settings(settings).lock_module(game)).await;

    // The game module's `perm` overrides the built-in one.
    let mut ann = login(&core, ANN).await;
    ann.send(Inbound::Command { text: "open".into() }).await.unwrap();
    assert_eq!(next_text(&mut ann).await, "It is locked.");
}

#[tokio::test]
async fn provided_module_missing_from_settings_still_registers() {
    let settings = CoreSettings::from_json_str("{}").unwrap();
    let game = LockFuncModule::new("game.lockfuncs").function("perm", 1..=1, |_| false);
    let core = core_with(Core::builder().settings(settings).lock_module(game)).await;

    let mut ann = login(&core, ANN).await;
    ann.send(Inbound::Command { text: "open".into() }).await.unwrap();
    assert_eq!(next_text(&mut ann).await, "It is locked.");
}

#[tokio::test]
async fn unknown_lock_module_fails_the_build() {
    let settings = CoreSettings {
        lock_func_modules: vec!["mudcore.lockfuncs".into(), "missing.lockfuncs".into()],
        ..CoreSettings::default()
    };
    let result = Core::builder().settings(settings).build(commands(), TestAuth);
    assert!(matches!(
        result,
        Err(MudcoreError::Config(ConfigError::UnknownLockModule(ref name))) if name == "missing.lockfuncs"
    ));
}

#[tokio::test]
async fn superuser_from_settings_bypasses_locks() {
    let settings = CoreSettings {
        superuser: Some(BOB),
        ..CoreSettings::default()
    };
    let core = core_with(Core::builder().settings(settings)).await;
    let mut bob = login(&core, BOB).await;
    bob.send(Inbound::Command { text: "open".into() }).await.unwrap();
    assert_eq!(next_text(&mut bob).await, "The chest opens.");
}
