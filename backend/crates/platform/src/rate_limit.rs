//! Rate Limiting Infrastructure
//!
//! Fixed-window request counters with independent budgets per protected
//! operation class. Keys combine the network origin with the identity
//! once it is known, so one client cannot drain another identity's
//! budget and vice versa.
//!
//! State is process-local and best-effort: a restart resets all
//! counters. The guarantee is "bounded attempts per unit time", not a
//! globally exact count, so instances do not need to share state.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

/// Protected operation classes, each with its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    PasswordLogin,
    TotpCheck,
    Api,
    Upload,
    Export,
    OutboundEmail,
}

impl OperationClass {
    /// Stable short code, used as the counter key prefix.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationClass::PasswordLogin => "login",
            OperationClass::TotpCheck => "totp",
            OperationClass::Api => "api",
            OperationClass::Upload => "upload",
            OperationClass::Export => "export",
            OperationClass::OutboundEmail => "email",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate limit configuration for one operation class.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

/// Per-class budgets for the whole API surface.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub password_login: RateLimitConfig,
    pub totp_check: RateLimitConfig,
    pub api: RateLimitConfig,
    pub upload: RateLimitConfig,
    pub export: RateLimitConfig,
    pub outbound_email: RateLimitConfig,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            password_login: RateLimitConfig::new(5, 300),
            totp_check: RateLimitConfig::new(5, 300),
            api: RateLimitConfig::new(120, 60),
            upload: RateLimitConfig::new(20, 3600),
            export: RateLimitConfig::new(10, 3600),
            outbound_email: RateLimitConfig::new(50, 86_400),
        }
    }
}

impl RateLimitPolicy {
    pub fn class(&self, class: OperationClass) -> &RateLimitConfig {
        match class {
            OperationClass::PasswordLogin => &self.password_login,
            OperationClass::TotpCheck => &self.totp_check,
            OperationClass::Api => &self.api,
            OperationClass::Upload => &self.upload,
            OperationClass::Export => &self.export,
            OperationClass::OutboundEmail => &self.outbound_email,
        }
    }
}

/// Counter key: network origin, optionally scoped to an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    /// Origin-only key, for pre-authentication checks.
    pub fn origin(ip: Option<IpAddr>) -> Self {
        match ip {
            Some(ip) => Self(format!("ip:{ip}")),
            None => Self("ip:unknown".to_string()),
        }
    }

    /// Origin plus identity, once the identity is known.
    pub fn origin_identity(ip: Option<IpAddr>, identity: &str) -> Self {
        let mut key = Self::origin(ip).0;
        key.push_str("|id:");
        key.push_str(identity);
        Self(key)
    }

    fn scoped(&self, class: OperationClass) -> String {
        format!("{}:{}", class.as_str(), self.0)
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rate limit check result
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after: Duration,
}

/// Time source, injected so window arithmetic is testable.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock time source.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Read-only budget check; does not consume.
    async fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult;

    /// Consume one unit of budget and report the outcome.
    async fn increment(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult;
}

struct WindowEntry {
    count: u32,
    window_start_ms: i64,
}

/// Process-local fixed-window counter store.
pub struct InMemoryRateLimitStore {
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, WindowEntry>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn window_expired(entry: &WindowEntry, config: &RateLimitConfig, now_ms: i64) -> bool {
        now_ms >= entry.window_start_ms + config.window_ms()
    }

    fn retry_after(entry: &WindowEntry, config: &RateLimitConfig, now_ms: i64) -> Duration {
        let remaining_ms = (entry.window_start_ms + config.window_ms() - now_ms).max(0);
        Duration::from_millis(remaining_ms as u64)
    }
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    async fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        let now_ms = self.clock.now_ms();
        let windows = self.windows.lock().await;

        match windows.get(key) {
            Some(entry) if !Self::window_expired(entry, config, now_ms) => {
                if entry.count >= config.max_requests {
                    RateLimitResult {
                        allowed: false,
                        remaining: 0,
                        retry_after: Self::retry_after(entry, config, now_ms),
                    }
                } else {
                    RateLimitResult {
                        allowed: true,
                        remaining: config.max_requests - entry.count,
                        retry_after: Duration::ZERO,
                    }
                }
            }
            _ => RateLimitResult {
                allowed: true,
                remaining: config.max_requests,
                retry_after: Duration::ZERO,
            },
        }
    }

    async fn increment(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        let now_ms = self.clock.now_ms();
        let mut windows = self.windows.lock().await;

        let entry = windows.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            window_start_ms: now_ms,
        });

        if Self::window_expired(entry, config, now_ms) {
            entry.count = 0;
            entry.window_start_ms = now_ms;
        }

        entry.count += 1;

        if entry.count > config.max_requests {
            RateLimitResult {
                allowed: false,
                remaining: 0,
                retry_after: Self::retry_after(entry, config, now_ms),
            }
        } else {
            RateLimitResult {
                allowed: true,
                remaining: config.max_requests - entry.count,
                retry_after: Duration::ZERO,
            }
        }
    }
}

/// Rate limiting service: a counter store plus the per-class policy.
///
/// Credential-guarded classes use `check` before the credential work and
/// `penalize` after a failure, so successful attempts never consume
/// budget. Everything else goes through `hit`, which counts every
/// request.
pub struct RateLimiter<S> {
    store: S,
    policy: RateLimitPolicy,
}

impl<S> RateLimiter<S>
where
    S: RateLimitStore + Sync,
{
    pub fn new(store: S, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    /// Reject with the remaining wait time if the key's budget is spent.
    /// Does not consume budget.
    pub async fn check(
        &self,
        class: OperationClass,
        key: &RateLimitKey,
    ) -> Result<(), Duration> {
        let config = self.policy.class(class);
        let result = self.store.check(&key.scoped(class), config).await;
        if result.allowed {
            Ok(())
        } else {
            Err(result.retry_after)
        }
    }

    /// Consume one unit of budget. Called after a failed credential
    /// attempt.
    pub async fn penalize(&self, class: OperationClass, key: &RateLimitKey) {
        let config = self.policy.class(class);
        let result = self.store.increment(&key.scoped(class), config).await;
        if !result.allowed {
            tracing::warn!(
                class = %class,
                key = %key,
                "rate limit budget exhausted"
            );
        }
    }

    /// Check-and-consume, for classes where every request counts.
    pub async fn hit(&self, class: OperationClass, key: &RateLimitKey) -> Result<(), Duration> {
        let config = self.policy.class(class);
        let result = self.store.increment(&key.scoped(class), config).await;
        if result.allowed {
            Ok(())
        } else {
            Err(result.retry_after)
        }
    }
}
