//! Integration tests for the router across the four multisession modes.

use std::sync::Arc;
use std::time::Duration;

use mudcore_lock::LockEngine;
use mudcore_protocol::{EntityId, Outbound, Payload, SessionId, Target};
use mudcore_session::{
    Account, Character, MultisessionMode, PuppetDenied, Router, RouterConfig,
};
use tokio::sync::mpsc;

// =========================================================================
// Fixtures
// =========================================================================

const ANN: EntityId = EntityId(1);
const BOB: EntityId = EntityId(2);
const HERO: EntityId = EntityId(10);
const MAGE: EntityId = EntityId(11);

struct Client {
    id: SessionId,
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Client {
    fn drain(&mut self) -> Vec<Outbound> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn texts(&mut self) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|f| match f {
                Outbound::Message {
                    payload: Payload::Text { text },
                } => Some(text),
                _ => None,
            })
            .collect()
    }
}

fn router_with(config: RouterConfig) -> Router {
    let mut router = Router::new(config, Arc::new(LockEngine::default()));
    router.register_account(Account::new(ANN, "ann"));
    router.register_account(Account::new(BOB, "bob"));
    router.register_character(Character::owned_by(HERO, "Hero", ANN));
    router.register_character(Character::owned_by(MAGE, "Mage", ANN));
    router
}

fn router(mode: MultisessionMode, max_puppets: usize) -> Router {
    router_with(RouterConfig {
        multisession_mode: mode,
        max_puppets,
        ..RouterConfig::default()
    })
}

fn login(router: &mut Router, account: EntityId) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = router.session_connected(tx);
    router.session_authenticated(id, account).unwrap();
    Client { id, rx }
}

// =========================================================================
// Mode 0
// =========================================================================

#[test]
fn mode0_second_login_evicts_first_session() {
    let mut r = router(MultisessionMode::Single, 1);
    let mut first = login(&mut r, ANN);
    r.puppet(first.id, HERO).unwrap();

    let second = login(&mut r, ANN);
    assert_eq!(r.sessions_of_account(ANN), vec![second.id]);
    assert_eq!(r.sessions_of_character(HERO), vec![second.id]);
    assert!(
        first
            .drain()
            .iter()
            .any(|f| matches!(f, Outbound::Disconnect { .. }))
    );
}

// =========================================================================
// Mode 1
// =========================================================================

#[test]
fn mode1_account_message_reaches_every_session() {
    let mut r = router(MultisessionMode::Shared, 1);
    let mut clients: Vec<Client> = (0..3).map(|_| login(&mut r, ANN)).collect();

    let sent = r.route(Target::Account(ANN), Payload::text("tick"), None);
    assert_eq!(sent, 3);
    for client in &mut clients {
        assert_eq!(client.texts(), vec!["tick".to_string()]);
    }
}

#[test]
fn mode1_sessions_share_the_puppet() {
    let mut r = router(MultisessionMode::Shared, 1);
    let mut a = login(&mut r, ANN);
    let mut b = login(&mut r, ANN);
    r.puppet(b.id, HERO).unwrap();

    assert_eq!(r.puppet_of(a.id), Some(HERO));
    a.drain();
    b.drain();
    assert_eq!(r.route(Target::Character(HERO), Payload::text("ouch"), None), 2);
    assert_eq!(a.texts(), vec!["ouch".to_string()]);
    assert_eq!(b.texts(), vec!["ouch".to_string()]);

    // A third session joins the shared puppet on login.
    let c = login(&mut r, ANN);
    assert_eq!(r.puppet_of(c.id), Some(HERO));
}

// =========================================================================
// Mode 2
// =========================================================================

#[test]
fn mode2_puppeting_from_second_session_unbinds_first() {
    let mut r = router(MultisessionMode::PerSession, 2);
    let mut first = login(&mut r, ANN);
    let second = login(&mut r, ANN);
    r.puppet(first.id, HERO).unwrap();
    first.drain();

    let outcome = r.puppet(second.id, HERO).unwrap();
    assert_eq!(outcome.unbound, vec![first.id]);
    assert_eq!(r.puppet_of(first.id), None);
    assert!(
        first
            .drain()
            .contains(&Outbound::Unpuppeted { character: HERO })
    );
}

#[test]
fn mode2_character_output_goes_only_to_bound_session() {
    let mut r = router(MultisessionMode::PerSession, 2);
    let mut a = login(&mut r, ANN);
    let mut b = login(&mut r, ANN);
    r.puppet(a.id, HERO).unwrap();
    r.puppet(b.id, MAGE).unwrap();
    a.drain();
    b.drain();

    r.route(Target::Character(MAGE), Payload::text("zap"), None);
    assert!(a.texts().is_empty());
    assert_eq!(b.texts(), vec!["zap".to_string()]);
}

#[test]
fn mode2_max_puppets_is_enforced_across_sessions() {
    let mut r = router(MultisessionMode::PerSession, 1);
    let a = login(&mut r, ANN);
    let b = login(&mut r, ANN);
    r.puppet(a.id, HERO).unwrap();
    assert_eq!(r.puppet(b.id, MAGE), Err(PuppetDenied::MaxExceeded { max: 1 }));
}

// =========================================================================
// Mode 3
// =========================================================================

#[test]
fn mode3_co_puppeting_fans_out_to_all_bound_sessions() {
    let mut r = router(MultisessionMode::CoPuppet, 1);
    let mut a = login(&mut r, ANN);
    let mut b = login(&mut r, ANN);
    r.puppet(a.id, HERO).unwrap();
    r.puppet(b.id, HERO).unwrap();
    a.drain();
    b.drain();

    assert_eq!(r.sessions_of_character(HERO), vec![a.id, b.id]);
    assert_eq!(r.route(Target::Character(HERO), Payload::text("hi"), None), 2);
    assert_eq!(a.texts(), vec!["hi".to_string()]);
    assert_eq!(b.texts(), vec!["hi".to_string()]);
}

// =========================================================================
// Invariants shared by every mode
// =========================================================================

#[test]
fn character_is_never_puppeted_by_two_accounts() {
    for mode in [
        MultisessionMode::Single,
        MultisessionMode::Shared,
        MultisessionMode::PerSession,
        MultisessionMode::CoPuppet,
    ] {
        let mut r = router(mode, 2);
        r.character_mut(HERO).unwrap().record.locks.add("puppet: true()");
        let ann = login(&mut r, ANN);
        let bob = login(&mut r, BOB);
        r.puppet(ann.id, HERO).unwrap();
        assert_eq!(
            r.puppet(bob.id, HERO),
            Err(PuppetDenied::AlreadyPuppeted { character: HERO, by: ANN }),
            "mode {mode}"
        );
    }
}

#[test]
fn sole_session_disconnect_leaves_character_idle_and_unroutable() {
    let mut r = router(MultisessionMode::PerSession, 2);
    let a = login(&mut r, ANN);
    r.puppet(a.id, HERO).unwrap();
    r.session_disconnected(a.id);

    assert_eq!(r.puppeteer_of(HERO), None);
    assert!(r.character(HERO).is_some());
    assert_eq!(r.route(Target::Character(HERO), Payload::text("echo"), None), 0);
}

#[test]
fn disconnecting_one_session_spares_its_siblings() {
    let mut r = router(MultisessionMode::Shared, 1);
    let a = login(&mut r, ANN);
    let mut b = login(&mut r, ANN);
    r.puppet(a.id, HERO).unwrap();
    b.drain();

    r.session_disconnected(a.id);
    r.session_disconnected(a.id);
    assert_eq!(r.puppet_of(b.id), Some(HERO));
    assert_eq!(r.route(Target::Character(HERO), Payload::text("still here"), None), 1);
    assert_eq!(b.texts(), vec!["still here".to_string()]);
}

// =========================================================================
// Idle tracking
// =========================================================================

#[tokio::test(start_paused = true)]
async fn idle_sessions_reports_only_quiet_sessions() {
    let mut r = router_with(RouterConfig {
        multisession_mode: MultisessionMode::Shared,
        idle_timeout: Some(Duration::from_secs(60)),
        ..RouterConfig::default()
    });
    let quiet = login(&mut r, ANN);
    let busy = login(&mut r, ANN);

    tokio::time::advance(Duration::from_secs(45)).await;
    r.touch(busy.id);
    tokio::time::advance(Duration::from_secs(30)).await;

    assert_eq!(r.idle_sessions(tokio::time::Instant::now()), vec![quiet.id]);
}

#[tokio::test(start_paused = true)]
async fn idle_sessions_is_empty_without_timeout() {
    let mut r = router(MultisessionMode::Shared, 1);
    let _a = login(&mut r, ANN);
    tokio::time::advance(Duration::from_secs(3600)).await;
    assert!(r.idle_sessions(tokio::time::Instant::now()).is_empty());
}
