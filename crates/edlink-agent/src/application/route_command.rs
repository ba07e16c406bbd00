//! CommandRouter: turns inbound bus commands into key presses in the game.
//!
//! Every inbound message runs through the same fixed sequence of checks and
//! stops at the first one that fails:
//!
//! ```text
//!   topic ──► keymap lookup ──► game in foreground? ──► rate limit ──► press key
//!               miss: Unmapped     no: NotForeground      too soon:      ok: Dispatched
//!                                                         RateLimited    err: DispatchFailed
//! ```
//!
//! The foreground check is a hard safety gate: a key press must never land in
//! whatever other window the user happens to be typing into.  It cannot be
//! disabled and the router never tries to bring the game to the front.
//!
//! # Architecture
//!
//! The router depends only on the [`PlatformInput`] trait.  The Windows
//! implementation lives in the infrastructure layer; tests inject fakes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use edlink_core::{KeyCode, Keymap};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default global command rate, in accepted commands per second per topic.
pub const DEFAULT_RATE_LIMIT_HZ: f64 = 5.0;

/// Default time a key is held down.
pub const DEFAULT_KEY_HOLD: Duration = Duration::from_millis(80);

/// Default foreground process the safety gate checks for.
pub const DEFAULT_PROCESS_NAME: &str = "EliteDangerous64.exe";

/// Error type for OS key injection.
#[derive(Debug, Error)]
pub enum EmulationError {
    #[error("platform error: {0}")]
    Platform(String),
    #[error("key {0} has no scan code on this keyboard layout")]
    UnmappableKey(KeyCode),
    #[error("key injection is not available on this platform")]
    Unsupported,
}

/// OS input port used by the router.
pub trait PlatformInput: Send + Sync {
    /// Presses `key`, holds it for `hold`, then releases it.  Blocks for the
    /// duration of the hold.
    fn press_key(&self, key: KeyCode, hold: Duration) -> Result<(), EmulationError>;

    /// Whether the foreground window belongs to a process whose executable
    /// name equals `process_name` (case-insensitive).
    fn is_foreground(&self, process_name: &str) -> bool;
}

/// Why a command was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Unmapped,
    NotForeground,
    RateLimited,
}

/// Result of handling one inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Dispatched(KeyCode),
    DispatchFailed(KeyCode),
    Rejected(RejectReason),
}

// ── Rate limiter ──────────────────────────────────────────────────────────────

/// Per-topic minimum-interval limiter.
///
/// Only accepted commands update the stored instant, so over any window of
/// `T` seconds at most `floor(T * rate) + 1` commands pass per topic.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_accepted: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks and records a command on `topic` at `now`.
    ///
    /// A rate that is not a positive finite number means "unlimited".
    pub fn check_at(&self, topic: &str, rate_hz: f64, now: Instant) -> bool {
        if !(rate_hz.is_finite() && rate_hz > 0.0) {
            return true;
        }
        // A rate too small to express as an interval admits one command ever.
        let min_interval = Duration::try_from_secs_f64(1.0 / rate_hz).unwrap_or(Duration::MAX);

        let mut last = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match last.get(topic) {
            Some(prev) if now.saturating_duration_since(*prev) < min_interval => false,
            _ => {
                last.insert(topic.to_string(), now);
                true
            }
        }
    }

    pub fn check(&self, topic: &str, rate_hz: f64) -> bool {
        self.check_at(topic, rate_hz, Instant::now())
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Static router settings taken from configuration.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Executable name the safety gate requires in the foreground.
    pub process_name: String,
    /// Rate applied to topics without an override.
    pub default_rate_hz: f64,
    /// Per-topic rate overrides.
    pub topic_rate_hz: HashMap<String, f64>,
    pub key_hold: Duration,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            default_rate_hz: DEFAULT_RATE_LIMIT_HZ,
            topic_rate_hz: HashMap::new(),
            key_hold: DEFAULT_KEY_HOLD,
        }
    }
}

impl RouterSettings {
    fn rate_for(&self, topic: &str) -> f64 {
        self.topic_rate_hz
            .get(topic)
            .copied()
            .unwrap_or(self.default_rate_hz)
    }
}

/// The inbound command use case.
pub struct CommandRouter {
    keymap: RwLock<Arc<Keymap>>,
    input: Arc<dyn PlatformInput>,
    limiter: RateLimiter,
    settings: RouterSettings,
}

impl CommandRouter {
    pub fn new(keymap: Keymap, input: Arc<dyn PlatformInput>, settings: RouterSettings) -> Self {
        Self {
            keymap: RwLock::new(Arc::new(keymap)),
            input,
            limiter: RateLimiter::new(),
            settings,
        }
    }

    /// Replaces the keymap.  In-flight commands finish with the map they
    /// started with.
    pub fn reload_keymap(&self, keymap: Keymap) {
        let count = keymap.len();
        *self.keymap.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(keymap);
        info!(entries = count, "keymap reloaded");
    }

    /// Snapshot of the current keymap.
    pub fn keymap(&self) -> Arc<Keymap> {
        Arc::clone(&self.keymap.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Handles one inbound message.  Blocks while a key is held.
    pub fn handle(&self, topic: &str, payload: &[u8]) -> CommandOutcome {
        self.handle_at(topic, payload, Instant::now())
    }

    /// Like [`handle`](Self::handle) with an explicit arrival time.
    pub fn handle_at(&self, topic: &str, payload: &[u8], now: Instant) -> CommandOutcome {
        debug!(topic, payload = %describe_payload(payload), "command received");

        let Some(key) = self.keymap().resolve(topic) else {
            warn!(topic, "no keymap entry for command topic");
            return CommandOutcome::Rejected(RejectReason::Unmapped);
        };

        if !self.input.is_foreground(&self.settings.process_name) {
            info!(
                topic,
                process = %self.settings.process_name,
                "game is not in the foreground; command ignored"
            );
            return CommandOutcome::Rejected(RejectReason::NotForeground);
        }

        if !self.limiter.check_at(topic, self.settings.rate_for(topic), now) {
            debug!(topic, "command rate limited");
            return CommandOutcome::Rejected(RejectReason::RateLimited);
        }

        match self.input.press_key(key, self.settings.key_hold) {
            Ok(()) => {
                info!(topic, %key, "key pressed");
                CommandOutcome::Dispatched(key)
            }
            Err(e) => {
                warn!(topic, %key, "key injection failed: {e}");
                CommandOutcome::DispatchFailed(key)
            }
        }
    }
}

/// Renders an inbound payload for logging: compact JSON when it parses,
/// otherwise the trimmed text.
pub fn describe_payload(payload: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(payload) {
        Ok(value) => value.to_string(),
        Err(_) => String::from_utf8_lossy(payload).trim().to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    // ── Fake platform ─────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeInput {
        foreground: AtomicBool,
        should_fail: bool,
        pressed: Mutex<Vec<(KeyCode, Duration)>>,
        foreground_checks: Mutex<Vec<String>>,
    }

    impl FakeInput {
        fn in_game() -> Self {
            let input = Self::default();
            input.foreground.store(true, Ordering::SeqCst);
            input
        }
    }

    impl PlatformInput for FakeInput {
        fn press_key(&self, key: KeyCode, hold: Duration) -> Result<(), EmulationError> {
            self.pressed.lock().unwrap().push((key, hold));
            if self.should_fail {
                return Err(EmulationError::Platform("injected failure".to_string()));
            }
            Ok(())
        }

        fn is_foreground(&self, process_name: &str) -> bool {
            self.foreground_checks
                .lock()
                .unwrap()
                .push(process_name.to_string());
            self.foreground.load(Ordering::SeqCst)
        }
    }

    fn keymap(entries: &[(&str, &str)]) -> Keymap {
        Keymap::from_entries(entries.iter().copied()).0
    }

    fn make_router(input: FakeInput) -> (CommandRouter, Arc<FakeInput>) {
        let input = Arc::new(input);
        let router = CommandRouter::new(
            keymap(&[("elite/cmd/lights", "l"), ("elite/cmd/gear", "g")]),
            Arc::clone(&input) as Arc<dyn PlatformInput>,
            RouterSettings::default(),
        );
        (router, input)
    }

    // ── Rate limiter ──────────────────────────────────────────────────────────

    #[test]
    fn test_rate_limiter_admits_floor_t_times_r_plus_one() {
        // Arrange: one message every 10 ms for 1 s at 5 Hz
        let limiter = RateLimiter::new();
        let start = Instant::now();

        // Act
        let accepted = (0..=100)
            .filter(|i| limiter.check_at("t", 5.0, start + Duration::from_millis(i * 10)))
            .count();

        // Assert: floor(1.0 * 5) + 1
        assert_eq!(accepted, 6);
    }

    #[test]
    fn test_rate_limiter_tracks_topics_independently() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        assert!(limiter.check_at("a", 5.0, now));
        assert!(limiter.check_at("b", 5.0, now));
        assert!(!limiter.check_at("a", 5.0, now + Duration::from_millis(50)));
    }

    #[test]
    fn test_non_positive_rate_is_unlimited() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        assert!((0..10).all(|_| limiter.check_at("t", 0.0, now)));
        assert!((0..10).all(|_| limiter.check_at("t", -1.0, now)));
    }

    #[test]
    fn test_vanishingly_small_rate_admits_first_command_only() {
        // Arrange: 1 / 1e-320 overflows to infinity, 1 / 1e-20 overflows Duration
        let limiter = RateLimiter::new();
        let start = Instant::now();
        let later = start + Duration::from_secs(24 * 3600);

        // Act / Assert
        for rate in [1e-20, 1e-320] {
            let topic = format!("elite/cmd/{rate}");
            assert!(limiter.check_at(&topic, rate, start));
            assert!(!limiter.check_at(&topic, rate, start + Duration::from_millis(1)));
            assert!(!limiter.check_at(&topic, rate, later));
        }
    }

    #[test]
    fn test_same_instant_race_on_one_topic_admits_exactly_one() {
        // Arrange
        let limiter = Arc::new(RateLimiter::new());
        let now = Instant::now();
        let barrier = Arc::new(std::sync::Barrier::new(16));

        // Act
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    (0..50)
                        .filter(|_| limiter.check_at("elite/cmd/boost", 5.0, now))
                        .count()
                })
            })
            .collect();
        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // Assert
        assert_eq!(accepted, 1);
    }

    // ── Router decision order ─────────────────────────────────────────────────

    #[test]
    fn test_mapped_command_in_foreground_presses_key_with_hold() {
        // Arrange
        let (router, input) = make_router(FakeInput::in_game());

        // Act
        let outcome = router.handle("elite/cmd/lights", b"1");

        // Assert
        assert_eq!(outcome, CommandOutcome::Dispatched(KeyCode::Letter('l')));
        assert_eq!(
            *input.pressed.lock().unwrap(),
            vec![(KeyCode::Letter('l'), DEFAULT_KEY_HOLD)]
        );
    }

    #[test]
    fn test_unmapped_topic_touches_nothing() {
        // Arrange
        let (router, input) = make_router(FakeInput::in_game());

        // Act
        let outcome = router.handle("elite/cmd/unknown", b"");

        // Assert: no foreground query, no key, no rate state
        assert_eq!(outcome, CommandOutcome::Rejected(RejectReason::Unmapped));
        assert!(input.foreground_checks.lock().unwrap().is_empty());
        assert!(input.pressed.lock().unwrap().is_empty());
        assert!(router.limiter.last_accepted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_background_game_rejects_every_command() {
        // Arrange
        let (router, input) = make_router(FakeInput::default());

        // Act
        let outcomes: Vec<_> = (0..5).map(|_| router.handle("elite/cmd/gear", b"")).collect();

        // Assert
        assert!(outcomes
            .iter()
            .all(|o| *o == CommandOutcome::Rejected(RejectReason::NotForeground)));
        assert!(input.pressed.lock().unwrap().is_empty());
        assert_eq!(
            input.foreground_checks.lock().unwrap()[0],
            DEFAULT_PROCESS_NAME
        );
    }

    #[test]
    fn test_not_foreground_does_not_consume_rate_budget() {
        let (router, input) = make_router(FakeInput::default());
        let now = Instant::now();

        router.handle_at("elite/cmd/gear", b"", now);
        input.foreground.store(true, Ordering::SeqCst);
        let outcome = router.handle_at("elite/cmd/gear", b"", now + Duration::from_millis(1));

        assert_eq!(outcome, CommandOutcome::Dispatched(KeyCode::Letter('g')));
    }

    #[test]
    fn test_ten_messages_in_100ms_dispatch_once() {
        // Arrange
        let (router, input) = make_router(FakeInput::in_game());
        let start = Instant::now();

        // Act
        let outcomes: Vec<_> = (0..10)
            .map(|i| router.handle_at("elite/cmd/lights", b"", start + Duration::from_millis(i * 10)))
            .collect();

        // Assert
        assert_eq!(outcomes[0], CommandOutcome::Dispatched(KeyCode::Letter('l')));
        assert!(outcomes[1..]
            .iter()
            .all(|o| *o == CommandOutcome::Rejected(RejectReason::RateLimited)));
        assert_eq!(input.pressed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_topic_override_rate_applies() {
        // Arrange
        let input = Arc::new(FakeInput::in_game());
        let mut settings = RouterSettings::default();
        settings.topic_rate_hz.insert("elite/cmd/lights".to_string(), 0.0);
        let router = CommandRouter::new(
            keymap(&[("elite/cmd/lights", "l")]),
            Arc::clone(&input) as Arc<dyn PlatformInput>,
            settings,
        );
        let now = Instant::now();

        // Act
        let dispatched = (0..4)
            .filter(|_| matches!(router.handle_at("elite/cmd/lights", b"", now), CommandOutcome::Dispatched(_)))
            .count();

        // Assert
        assert_eq!(dispatched, 4);
    }

    #[test]
    fn test_injection_failure_is_reported_not_retried() {
        let input = FakeInput {
            should_fail: true,
            ..FakeInput::in_game()
        };
        let (router, input) = make_router(input);

        let outcome = router.handle("elite/cmd/lights", b"");

        assert_eq!(outcome, CommandOutcome::DispatchFailed(KeyCode::Letter('l')));
        assert_eq!(input.pressed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_reload_keymap_swaps_mapping() {
        let (router, _input) = make_router(FakeInput::in_game());

        router.reload_keymap(keymap(&[("elite/cmd/boost", "tab")]));

        assert_eq!(
            router.handle("elite/cmd/lights", b""),
            CommandOutcome::Rejected(RejectReason::Unmapped)
        );
        assert_eq!(
            router.handle("elite/cmd/boost", b""),
            CommandOutcome::Dispatched(KeyCode::Tab)
        );
    }

    #[test]
    fn test_describe_payload_prefers_json() {
        assert_eq!(describe_payload(br#"{ "on": true }"#), r#"{"on":true}"#);
        assert_eq!(describe_payload(b"  toggle \n"), "toggle");
        assert_eq!(describe_payload(b""), "");
    }
}
