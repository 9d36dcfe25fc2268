//! Token bucket rate limiting with named limiter groups.
//!
//! Each [`LimiterGroup`] owns an independent map of per-key buckets sharing one
//! (capacity, refill rate, key source) policy, so stricter limits for expensive
//! endpoints and relaxed limits for generic traffic are configuration, not
//! parallel code paths. Buckets refill continuously: a key accrues
//! `elapsed_seconds * refill_rate` tokens up to `capacity`, and every admitted
//! request consumes exactly one token.
//!
//! Concurrency: group maps are locked only for lookup/insert; token accounting
//! happens under the individual bucket's mutex. No lock is held across I/O.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a single admission check.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    /// Bucket capacity, reported in `X-RateLimit-Limit`.
    pub limit: u32,
    /// Whole tokens left after this check.
    pub remaining: u32,
    /// Time until the bucket is full again (allowed) or until the next
    /// token becomes available (rejected).
    pub reset_after: Duration,
}

impl Decision {
    /// Suggested `Retry-After` value in whole seconds, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_after.as_secs_f64().ceil() as u64
    }
}

/// Which request attribute keys a group's buckets.
///
/// IP-only limiting under-counts clients behind shared NAT; session-only
/// limiting is bypassed by clearing cookies. [`KeySource::SessionAndIp`]
/// applies the more restrictive of the two and is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    ClientIp,
    SessionId,
    SessionAndIp,
}

impl KeySource {
    /// Parses a configuration string, falling back to [`KeySource::SessionAndIp`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ip" | "client-ip" => Self::ClientIp,
            "session" | "session-id" => Self::SessionId,
            _ => Self::SessionAndIp,
        }
    }
}

/// Policy for one limiter group, as produced by configuration.
#[derive(Debug, Clone)]
pub struct GroupPolicy {
    pub name: String,
    /// Maximum burst size (bucket capacity).
    pub burst: u32,
    /// Refill rate in tokens per second.
    pub rate_per_sec: f64,
    pub key_source: KeySource,
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(capacity),
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, capacity: u32, rate: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(f64::from(capacity));
        self.last_refill = now;
        self.last_seen = now;
    }

    fn try_consume(&mut self, capacity: u32, rate: f64, now: Instant) -> Decision {
        self.refill(capacity, rate, now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Decision {
                allowed: true,
                limit: capacity,
                remaining: self.tokens.floor() as u32,
                reset_after: Duration::from_secs_f64(
                    (f64::from(capacity) - self.tokens).max(0.0) / rate,
                ),
            }
        } else {
            Decision {
                allowed: false,
                limit: capacity,
                remaining: 0,
                reset_after: Duration::from_secs_f64((1.0 - self.tokens).max(0.0) / rate),
            }
        }
    }

    fn refund(&mut self, capacity: u32) {
        self.tokens = (self.tokens + 1.0).min(f64::from(capacity));
    }
}

/// A named collection of token buckets sharing one admission policy.
pub struct LimiterGroup {
    policy: GroupPolicy,
    buckets: Mutex<HashMap<String, Arc<Mutex<TokenBucket>>>>,
}

impl LimiterGroup {
    pub fn new(policy: GroupPolicy) -> Self {
        Self {
            policy,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.policy.name
    }

    pub fn burst(&self) -> u32 {
        self.policy.burst
    }

    /// Admission check for a request identified by client IP and (optional)
    /// session ID, applying the group's key source.
    ///
    /// With [`KeySource::SessionAndIp`], both buckets must admit. The session
    /// bucket is checked first; if the shared IP bucket then rejects (typical
    /// for congested NAT), the session token is refunded so the client's
    /// personal budget is not drained by rejected attempts.
    pub fn admit(&self, client_ip: &str, session_id: Option<&str>) -> Decision {
        self.admit_at(client_ip, session_id, Instant::now())
    }

    pub(crate) fn admit_at(
        &self,
        client_ip: &str,
        session_id: Option<&str>,
        now: Instant,
    ) -> Decision {
        match self.policy.key_source {
            KeySource::ClientIp => self.allow_at(&ip_key(client_ip), now),
            KeySource::SessionId => match session_id {
                Some(sid) => self.allow_at(&session_key(sid), now),
                // No session yet (e.g. session stage disabled): fall back to IP
                // so anonymous traffic is still bounded.
                None => self.allow_at(&ip_key(client_ip), now),
            },
            KeySource::SessionAndIp => {
                let Some(sid) = session_id else {
                    return self.allow_at(&ip_key(client_ip), now);
                };

                let session_decision = self.allow_at(&session_key(sid), now);
                if !session_decision.allowed {
                    return session_decision;
                }

                let ip_decision = self.allow_at(&ip_key(client_ip), now);
                if !ip_decision.allowed {
                    self.refund(&session_key(sid));
                    return ip_decision;
                }

                Decision {
                    allowed: true,
                    limit: self.policy.burst,
                    remaining: ip_decision.remaining.min(session_decision.remaining),
                    reset_after: ip_decision.reset_after.max(session_decision.reset_after),
                }
            }
        }
    }

    /// Checks and consumes one token for `key`. Buckets are created at full
    /// capacity on first use.
    pub fn allow(&self, key: &str) -> Decision {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> Decision {
        let bucket = {
            let mut buckets = self.buckets.lock();
            buckets
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::full(self.policy.burst, now))))
                .clone()
        };

        let mut bucket = bucket.lock();
        bucket.try_consume(self.policy.burst, self.policy.rate_per_sec, now)
    }

    fn refund(&self, key: &str) {
        let bucket = self.buckets.lock().get(key).cloned();
        if let Some(bucket) = bucket {
            bucket.lock().refund(self.policy.burst);
        }
    }

    /// Removes buckets idle for longer than `idle_timeout`. Returns the number
    /// of evicted buckets.
    pub fn sweep(&self, idle_timeout: Duration) -> usize {
        self.sweep_at(idle_timeout, Instant::now())
    }

    fn sweep_at(&self, idle_timeout: Duration, now: Instant) -> usize {
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            now.saturating_duration_since(bucket.lock().last_seen) <= idle_timeout
        });
        before - buckets.len()
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }
}

fn ip_key(ip: &str) -> String {
    format!("ip:{ip}")
}

fn session_key(sid: &str) -> String {
    format!("session:{sid}")
}

/// All limiter groups plus the global disable switch.
///
/// Explicitly owned and constructor-injected (never a global) so tests can run
/// with isolated registries.
pub struct LimiterRegistry {
    groups: HashMap<String, Arc<LimiterGroup>>,
    disabled: bool,
}

impl LimiterRegistry {
    pub fn new(policies: Vec<GroupPolicy>, disabled: bool) -> Self {
        let groups = policies
            .into_iter()
            .map(|p| (p.name.clone(), Arc::new(LimiterGroup::new(p))))
            .collect();
        Self { groups, disabled }
    }

    /// When true, every admission check passes unconditionally.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn group(&self, name: &str) -> Option<&Arc<LimiterGroup>> {
        self.groups.get(name)
    }

    /// Runs an admission check against the named group.
    ///
    /// Returns `None` when limiting is disabled or the group is unknown, in
    /// which case the caller must let the request through untouched.
    pub fn check(&self, group: &str, client_ip: &str, session_id: Option<&str>) -> Option<Decision> {
        if self.disabled {
            return None;
        }
        self.groups.get(group).map(|g| g.admit(client_ip, session_id))
    }

    /// Evicts idle buckets across every group.
    pub fn sweep(&self, idle_timeout: Duration) -> usize {
        self.groups.values().map(|g| g.sweep(idle_timeout)).sum()
    }
}
