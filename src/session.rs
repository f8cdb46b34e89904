//! Per-process session reference registry (§4.5). Not persisted: lifetime
//! is one client process, matching the teacher's in-memory-only
//! `sync_kv`-adjacent bookkeeping pattern but kept entirely off the
//! database since these references never need to survive a restart.

use std::collections::HashMap;

/// Maps ephemeral `L1 .. Lk` references to entry ids, assigned in rank
/// order by the most recent query.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    refs: Vec<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh query result set, replacing any previous mapping.
    /// Returns the assigned references in order (`L1`, `L2`, ...).
    pub fn record(&mut self, ids: impl IntoIterator<Item = String>) -> Vec<String> {
        self.refs = ids.into_iter().collect();
        (1..=self.refs.len()).map(|n| format!("L{n}")).collect()
    }

    /// Resolve a caller-supplied reference. Accepts `Ln` session
    /// references or passes through anything else unchanged (a raw id is
    /// resolved by the caller against the store directly).
    pub fn resolve(&self, reference: &str) -> Option<&str> {
        let n: usize = reference.strip_prefix('L')?.parse().ok()?;
        if n == 0 {
            return None;
        }
        self.refs.get(n - 1).map(String::as_str)
    }

    /// `true` if `reference` has the `Ln` shape, whether or not it
    /// currently resolves to a live entry.
    pub fn is_session_ref(reference: &str) -> bool {
        reference
            .strip_prefix('L')
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Case-insensitive substring match of caller-supplied strings against
/// entry content, for batch-mode feedback that references content
/// prefixes instead of ids or session references. Returns `(matched ids,
/// unmatched inputs)`.
pub fn fuzzy_resolve<'a>(
    queries: &'a [String],
    entries: &[(String, String)], // (id, content)
) -> (Vec<String>, Vec<&'a str>) {
    let mut matched = Vec::new();
    let mut not_found = Vec::new();
    for q in queries {
        let needle = q.to_lowercase();
        match entries
            .iter()
            .find(|(_, content)| content.to_lowercase().contains(&needle))
        {
            Some((id, _)) => matched.push(id.clone()),
            None => not_found.push(q.as_str()),
        }
    }
    (matched, not_found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_sequential_references_in_rank_order() {
        let mut reg = SessionRegistry::new();
        let refs = reg.record(vec!["id-a".into(), "id-b".into(), "id-c".into()]);
        assert_eq!(refs, vec!["L1", "L2", "L3"]);
        assert_eq!(reg.resolve("L1"), Some("id-a"));
        assert_eq!(reg.resolve("L3"), Some("id-c"));
    }

    #[test]
    fn resolve_rejects_out_of_range_or_malformed_refs() {
        let mut reg = SessionRegistry::new();
        reg.record(vec!["id-a".into()]);
        assert_eq!(reg.resolve("L2"), None);
        assert_eq!(reg.resolve("L0"), None);
        assert_eq!(reg.resolve("not-a-ref"), None);
    }

    #[test]
    fn new_query_replaces_previous_mapping() {
        let mut reg = SessionRegistry::new();
        reg.record(vec!["old".into()]);
        reg.record(vec!["new-a".into(), "new-b".into()]);
        assert_eq!(reg.resolve("L1"), Some("new-a"));
    }

    #[test]
    fn is_session_ref_matches_ln_shape_only() {
        assert!(SessionRegistry::is_session_ref("L1"));
        assert!(SessionRegistry::is_session_ref("L42"));
        assert!(!SessionRegistry::is_session_ref("L"));
        assert!(!SessionRegistry::is_session_ref("La"));
        assert!(!SessionRegistry::is_session_ref("01ARZ3NDEKTSV4RRFFQ69G5FAV"));
    }

    #[test]
    fn fuzzy_resolve_matches_case_insensitive_substrings() {
        let entries = vec![
            ("id-1".to_string(), "ORM N+1 without eager loading".to_string()),
            ("id-2".to_string(), "Connection pool exhaustion".to_string()),
        ];
        let queries = vec!["orm n+1".to_string(), "nonexistent".to_string()];
        let (matched, not_found) = fuzzy_resolve(&queries, &entries);
        assert_eq!(matched, vec!["id-1".to_string()]);
        assert_eq!(not_found, vec!["nonexistent"]);
    }
}
