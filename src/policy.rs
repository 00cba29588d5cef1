//! Decides `admit | drop` for a candidate utterance given cooldown,
//! filter, and frequency state. See spec.md §4.3.

use crate::classifier::FinalClassification;
use crate::config::Config;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Ledger aging multiple from spec.md §3: entries older than
/// `cooldown_ms * LEDGER_AGE_MULTIPLIER` may be pruned. Chosen wide
/// enough to never collide with the 5x escalation ceiling in §4.3.
const LEDGER_AGE_MULTIPLIER: u32 = 20;

/// Escalation ceiling from spec.md §4.3: the effective per-key cooldown
/// is `cooldown_ms * min(admit_count + 1, ESCALATION_CEILING)`.
const ESCALATION_CEILING: u32 = 5;

#[derive(Debug, Clone, Copy)]
struct LedgerEntry {
    last_admitted_at: Instant,
    admit_count: u32,
}

/// Per-key admission bookkeeping, keyed by [`FinalClassification::stable_key`],
/// plus a single global timestamp. Invariant: `admit_count >= 1` for every
/// present entry; absence means never admitted.
#[derive(Debug, Default)]
pub struct PolicyLedger {
    entries: HashMap<u64, LedgerEntry>,
    global_last_admitted_at: Option<Instant>,
}

impl PolicyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked (for `get_status` diagnostics).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn admit_count(&self, key: u64) -> u32 {
        self.entries.get(&key).map_or(0, |e| e.admit_count)
    }

    fn elapsed_since_key(&self, key: u64, now: Instant) -> Option<Duration> {
        self.entries
            .get(&key)
            .map(|e| now.saturating_duration_since(e.last_admitted_at))
    }

    fn elapsed_since_global(&self, now: Instant) -> Option<Duration> {
        self.global_last_admitted_at
            .map(|t| now.saturating_duration_since(t))
    }

    /// Record an admission: set the global timestamp, bump this key's
    /// timestamp and count. Only ever called after every other check has
    /// passed.
    fn record_admit(&mut self, key: u64, now: Instant) {
        self.global_last_admitted_at = Some(now);
        self.entries
            .entry(key)
            .and_modify(|e| {
                e.last_admitted_at = now;
                e.admit_count += 1;
            })
            .or_insert(LedgerEntry {
                last_admitted_at: now,
                admit_count: 1,
            });
    }

    /// Drop ledger entries older than `cooldown_ms * LEDGER_AGE_MULTIPLIER`.
    /// A supplemental bound beyond spec.md's required semantics (§3
    /// explicitly permits it) so long-running hosts don't grow the ledger
    /// without limit.
    pub fn age_out(&mut self, now: Instant, cooldown_ms: u64) {
        let max_age = Duration::from_millis(cooldown_ms.saturating_mul(u64::from(LEDGER_AGE_MULTIPLIER)));
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.last_admitted_at) <= max_age);
    }
}

/// A candidate utterance as seen by Policy: just enough to run the
/// ordered checks in §4.3 without pulling in the full `Utterance` type.
pub struct Candidate<'a> {
    pub text: &'a str,
    pub classification: &'a FinalClassification,
}

/// Why a candidate was dropped. Used only for `debug`-level tracing
/// (§7: "Reported only via debug trace").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drop {
    Disabled,
    QueueDuplicate,
    GlobalCooldown,
    KeyCooldown,
    IgnorePattern,
    KindFilter,
    NotOnAllowlist,
}

/// Run the ordered admission checks in spec.md §4.3. `pending_texts`
/// must be the text of every utterance currently sitting in the queue
/// (§4.3 check 2 dedups against pending, not in-flight-or-delivered
/// utterances). On `Ok(())`, the ledger has already been updated; on
/// `Err(_)`, the ledger is untouched.
pub fn admit(
    candidate: &Candidate<'_>,
    now: Instant,
    ledger: &mut PolicyLedger,
    config: &Config,
    pending_texts: &[String],
) -> Result<(), Drop> {
    if !config.enabled {
        return Err(Drop::Disabled);
    }

    if pending_texts.iter().any(|t| t == candidate.text) {
        return Err(Drop::QueueDuplicate);
    }

    if let Some(elapsed) = ledger.elapsed_since_global(now) {
        if elapsed.as_millis() < u128::from(config.cooldown_ms) {
            return Err(Drop::GlobalCooldown);
        }
    }

    let key = candidate.classification.stable_key;
    let n = ledger.admit_count(key);
    // spec.md §4.3's prose gives `min(n + 1, 5)`, but its own worked
    // scenario (§8, "per-key escalation") and the §8 cooldown-monotonicity
    // invariant ("gaps >= cooldownMs * min(admitCount, 5)") both compute
    // this without the `+1`; an entry only exists once `n >= 1`, so we
    // follow the worked numbers here.
    let effective_cooldown_ms = config.cooldown_ms.saturating_mul(u64::from(n.min(ESCALATION_CEILING)));
    if let Some(elapsed) = ledger.elapsed_since_key(key, now) {
        if elapsed.as_millis() < u128::from(effective_cooldown_ms) {
            return Err(Drop::KeyCooldown);
        }
    }

    let lower_text = candidate.text.to_lowercase();

    if config
        .filters
        .ignore_patterns
        .iter()
        .any(|p| lower_text.contains(&p.to_lowercase()))
    {
        return Err(Drop::IgnorePattern);
    }

    if !config.filters.error_kinds.is_empty()
        && !config
            .filters
            .error_kinds
            .iter()
            .any(|k| k == &candidate.classification.kind)
    {
        return Err(Drop::KindFilter);
    }

    if !config.filters.only_patterns.is_empty()
        && !config
            .filters
            .only_patterns
            .iter()
            .any(|p| lower_text.contains(&p.to_lowercase()))
    {
        return Err(Drop::NotOnAllowlist);
    }

    ledger.record_admit(key, now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Severity;

    fn classification(key: u64, kind: &str) -> FinalClassification {
        FinalClassification {
            kind: kind.to_string(),
            severity: Severity::Normal,
            stable_key: key,
        }
    }

    #[test]
    fn disabled_config_drops_without_mutating_ledger() {
        let mut ledger = PolicyLedger::new();
        let mut config = Config::default();
        config.enabled = false;
        let fc = classification(1, "Error");
        let candidate = Candidate {
            text: "hello",
            classification: &fc,
        };
        let now = Instant::now();
        assert_eq!(admit(&candidate, now, &mut ledger, &config, &[]), Err(Drop::Disabled));
        assert!(ledger.is_empty());
    }

    #[test]
    fn queue_dedup_blocks_identical_pending_text() {
        let mut ledger = PolicyLedger::new();
        let config = Config::default();
        let fc = classification(1, "Error");
        let candidate = Candidate {
            text: "hello",
            classification: &fc,
        };
        let now = Instant::now();
        let pending = vec!["hello".to_string()];
        assert_eq!(
            admit(&candidate, now, &mut ledger, &config, &pending),
            Err(Drop::QueueDuplicate)
        );
    }

    #[test]
    fn first_admission_always_succeeds() {
        let mut ledger = PolicyLedger::new();
        let config = Config::default();
        let fc = classification(1, "Error");
        let candidate = Candidate {
            text: "hello",
            classification: &fc,
        };
        let now = Instant::now();
        assert_eq!(admit(&candidate, now, &mut ledger, &config, &[]), Ok(()));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn global_cooldown_blocks_distinct_fault_shortly_after() {
        let mut ledger = PolicyLedger::new();
        let config = Config::default(); // cooldown_ms = 5000
        let fc_a = classification(1, "Error");
        let fc_b = classification(2, "Error");
        let t0 = Instant::now();
        admit(
            &Candidate {
                text: "a",
                classification: &fc_a,
            },
            t0,
            &mut ledger,
            &config,
            &[],
        )
        .unwrap();

        let t1 = t0 + Duration::from_millis(100);
        assert_eq!(
            admit(
                &Candidate {
                    text: "b",
                    classification: &fc_b,
                },
                t1,
                &mut ledger,
                &config,
                &[],
            ),
            Err(Drop::GlobalCooldown)
        );

        let t2 = t0 + Duration::from_millis(5001);
        assert_eq!(
            admit(
                &Candidate {
                    text: "b",
                    classification: &fc_b,
                },
                t2,
                &mut ledger,
                &config,
                &[],
            ),
            Ok(())
        );
    }

    #[test]
    fn per_key_escalation_matches_scenario_3() {
        let mut ledger = PolicyLedger::new();
        let config = Config::default(); // cooldown_ms = 5000
        let fc = classification(1, "Error");
        let candidate = Candidate {
            text: "same",
            classification: &fc,
        };
        let t0 = Instant::now();
        admit(&candidate, t0, &mut ledger, &config, &[]).unwrap(); // admitCount 0 -> 1, no prior cooldown to check
        let t1 = t0 + Duration::from_millis(5100);
        admit(&candidate, t1, &mut ledger, &config, &[]).unwrap(); // needed >= 5000*min(1,5)=5000, elapsed 5100: ok
        let t2 = t1 + Duration::from_millis(10100);
        admit(&candidate, t2, &mut ledger, &config, &[]).unwrap(); // needed >= 5000*min(2,5)=10000, elapsed 10100: ok
        let t3 = t2 + Duration::from_millis(15100);
        admit(&candidate, t3, &mut ledger, &config, &[]).unwrap(); // needed >= 5000*min(3,5)=15000, elapsed 15100: ok

        let t4 = t3 + Duration::from_millis(15100);
        // needed >= 5000*min(4,5)=20000, elapsed only 15100: dropped
        assert_eq!(
            admit(&candidate, t4, &mut ledger, &config, &[]),
            Err(Drop::KeyCooldown)
        );
    }

    #[test]
    fn ignore_pattern_blocks_regardless_of_cooldowns() {
        let mut ledger = PolicyLedger::new();
        let mut config = Config::default();
        config.filters.ignore_patterns = vec!["noisy".to_string()];
        let fc = classification(1, "Error");
        let candidate = Candidate {
            text: "this is Noisy output",
            classification: &fc,
        };
        assert_eq!(
            admit(&candidate, Instant::now(), &mut ledger, &config, &[]),
            Err(Drop::IgnorePattern)
        );
    }

    #[test]
    fn kind_filter_requires_membership() {
        let mut ledger = PolicyLedger::new();
        let mut config = Config::default();
        config.filters.error_kinds = vec!["TypeError".to_string()];
        let fc = classification(1, "RangeError");
        let candidate = Candidate {
            text: "out of range",
            classification: &fc,
        };
        assert_eq!(
            admit(&candidate, Instant::now(), &mut ledger, &config, &[]),
            Err(Drop::KindFilter)
        );
    }

    #[test]
    fn allowlist_requires_at_least_one_match() {
        let mut ledger = PolicyLedger::new();
        let mut config = Config::default();
        config.filters.only_patterns = vec!["payment".to_string()];
        let fc = classification(1, "Error");
        let candidate = Candidate {
            text: "unrelated failure",
            classification: &fc,
        };
        assert_eq!(
            admit(&candidate, Instant::now(), &mut ledger, &config, &[]),
            Err(Drop::NotOnAllowlist)
        );
    }

    #[test]
    fn ledger_aging_prunes_stale_entries() {
        let mut ledger = PolicyLedger::new();
        let config = Config::default();
        let fc = classification(1, "Error");
        let t0 = Instant::now();
        admit(
            &Candidate {
                text: "x",
                classification: &fc,
            },
            t0,
            &mut ledger,
            &config,
            &[],
        )
        .unwrap();
        assert_eq!(ledger.len(), 1);
        let far_future = t0 + Duration::from_millis(config.cooldown_ms * (LEDGER_AGE_MULTIPLIER as u64 + 1));
        ledger.age_out(far_future, config.cooldown_ms);
        assert_eq!(ledger.len(), 0);
    }
}
