use async_trait::async_trait;
use dashmap::DashMap;
use jiff::{SignedDuration, Timestamp};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use waypoint_core::{
    MatchType, NotFoundId, NotFoundObservation, NotFoundQuery, NotFoundRecord, NotFoundSort,
    NotFoundStats, NotFoundStatus, NotFoundStore, Page, ReadRuleStore, RedirectRule,
    RedirectType, Result, RuleId, RuleQuery, RuleSort, RuleStats, RuleStatus, RuleStore,
    SortOrder, StorageError, ValidatedRule,
};

/// In-memory implementation of the rule and 404 stores using DashMap.
///
/// DashMap shards its locks, so hit counters and 404 upserts on different
/// keys proceed in parallel while updates to the same key are serialized by
/// the shard lock. That makes `increment_hits` and `upsert_not_found` atomic
/// without a read-then-write round trip.
#[derive(Debug)]
pub struct InMemoryStore {
    rules: DashMap<RuleId, RedirectRule>,
    next_rule_id: AtomicU64,
    // keyed by url so the upsert can use the entry API
    not_found: DashMap<String, NotFoundRecord>,
    next_not_found_id: AtomicU64,
}

impl InMemoryStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self {
            rules: DashMap::new(),
            next_rule_id: AtomicU64::new(1),
            not_found: DashMap::new(),
            next_not_found_id: AtomicU64::new(1),
        }
    }

    fn allocate_rule_id(&self) -> RuleId {
        RuleId(self.next_rule_id.fetch_add(1, AtomicOrdering::Relaxed))
    }

    fn allocate_not_found_id(&self) -> NotFoundId {
        NotFoundId(self.next_not_found_id.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn paginate<T>(mut items: Vec<T>, page: waypoint_core::Pagination) -> Page<T> {
    let total = items.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);

    let items = if offset >= items.len() {
        Vec::new()
    } else {
        items.drain(offset..).take(limit).collect()
    };

    Page {
        items,
        total,
        page: page.page,
        per_page: page.per_page,
    }
}

#[async_trait]
impl ReadRuleStore for InMemoryStore {
    async fn active_rules(&self, match_type: MatchType) -> Result<Vec<RedirectRule>> {
        let mut rules: Vec<RedirectRule> = self
            .rules
            .iter()
            .filter(|r| r.is_active() && r.match_type == match_type)
            .map(|r| r.value().clone())
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn get_rule(&self, id: RuleId) -> Result<Option<RedirectRule>> {
        Ok(self.rules.get(&id).map(|r| r.value().clone()))
    }

    async fn increment_hits(&self, id: RuleId) -> Result<bool> {
        match self.rules.get_mut(&id) {
            Some(mut rule) => {
                rule.hit_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RuleStore for InMemoryStore {
    async fn insert_rule(&self, rule: ValidatedRule) -> Result<RedirectRule> {
        let now = Timestamp::now();
        let record = RedirectRule {
            id: self.allocate_rule_id(),
            source: rule.source().to_string(),
            destination: rule.destination().to_string(),
            match_type: rule.match_type(),
            redirect_type: rule.redirect_type(),
            hit_count: 0,
            status: rule.status(),
            created_at: now,
            updated_at: now,
        };
        self.rules.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_rule(&self, id: RuleId, rule: ValidatedRule) -> Result<Option<RedirectRule>> {
        let Some(mut existing) = self.rules.get_mut(&id) else {
            return Ok(None);
        };

        existing.source = rule.source().to_string();
        existing.destination = rule.destination().to_string();
        existing.match_type = rule.match_type();
        existing.redirect_type = rule.redirect_type();
        existing.status = rule.status();
        existing.updated_at = Timestamp::now();

        Ok(Some(existing.clone()))
    }

    async fn delete_rule(&self, id: RuleId) -> Result<Option<RedirectRule>> {
        Ok(self.rules.remove(&id).map(|(_, rule)| rule))
    }

    async fn set_rule_status(&self, ids: &[RuleId], status: RuleStatus) -> Result<u64> {
        let now = Timestamp::now();
        let mut found = 0;
        for id in ids {
            if let Some(mut rule) = self.rules.get_mut(id) {
                if rule.status != status {
                    rule.status = status;
                    rule.updated_at = now;
                }
                found += 1;
            }
        }
        Ok(found)
    }

    async fn list_rules(&self, query: &RuleQuery) -> Result<Page<RedirectRule>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut rules: Vec<RedirectRule> = self
            .rules
            .iter()
            .filter(|r| query.status.is_none_or(|s| r.status == s))
            .filter(|r| query.match_type.is_none_or(|m| r.match_type == m))
            .filter(|r| {
                search.as_deref().is_none_or(|needle| {
                    contains_ignore_case(&r.source, needle)
                        || contains_ignore_case(&r.destination, needle)
                })
            })
            .map(|r| r.value().clone())
            .collect();

        rules.sort_by(|a, b| {
            let primary = match query.sort {
                RuleSort::Source => a.source.cmp(&b.source),
                RuleSort::HitCount => a.hit_count.cmp(&b.hit_count),
                RuleSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                RuleSort::CreatedAt => a.id.cmp(&b.id),
            };
            directed(primary.then_with(|| a.id.cmp(&b.id)), query.order)
        });

        Ok(paginate(rules, query.pagination()))
    }

    async fn rule_stats(&self) -> Result<RuleStats> {
        let mut stats = RuleStats::default();
        for rule in self.rules.iter() {
            stats.total += 1;
            stats.total_hits += rule.hit_count;
            if rule.is_active() {
                stats.active += 1;
                if rule.redirect_type == RedirectType::Permanent {
                    stats.saved_visits += rule.hit_count;
                }
            } else {
                stats.inactive += 1;
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl NotFoundStore for InMemoryStore {
    async fn upsert_not_found(&self, observation: NotFoundObservation) -> Result<()> {
        let NotFoundObservation {
            url,
            referrer,
            user_agent,
            ip_hash,
            seen_at,
        } = observation;

        self.not_found
            .entry(url.clone())
            .and_modify(|record| {
                record.hit_count += 1;
                record.last_seen = seen_at;
                record.referrer = referrer.clone();
                record.user_agent = user_agent.clone();
                record.ip_hash = ip_hash.clone();
            })
            .or_insert_with(|| NotFoundRecord {
                id: self.allocate_not_found_id(),
                url,
                referrer,
                user_agent,
                ip_hash,
                hit_count: 1,
                first_seen: seen_at,
                last_seen: seen_at,
                status: NotFoundStatus::New,
            });

        Ok(())
    }

    async fn get_not_found(&self, id: NotFoundId) -> Result<Option<NotFoundRecord>> {
        Ok(self
            .not_found
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.value().clone()))
    }

    async fn find_not_found_by_url(&self, url: &str) -> Result<Option<NotFoundRecord>> {
        Ok(self.not_found.get(url).map(|r| r.value().clone()))
    }

    async fn list_not_found(&self, query: &NotFoundQuery) -> Result<Page<NotFoundRecord>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut records: Vec<NotFoundRecord> = self
            .not_found
            .iter()
            .filter(|r| query.status.is_none_or(|s| r.status == s))
            .filter(|r| {
                search.as_deref().is_none_or(|needle| {
                    contains_ignore_case(&r.url, needle)
                        || r
                            .referrer
                            .as_deref()
                            .is_some_and(|referrer| contains_ignore_case(referrer, needle))
                })
            })
            .map(|r| r.value().clone())
            .collect();

        records.sort_by(|a, b| {
            let primary = match query.sort {
                NotFoundSort::Url => a.url.cmp(&b.url),
                NotFoundSort::HitCount => a.hit_count.cmp(&b.hit_count),
                NotFoundSort::FirstSeen => a.first_seen.cmp(&b.first_seen),
                NotFoundSort::LastSeen => a.last_seen.cmp(&b.last_seen),
            };
            directed(primary.then_with(|| a.id.cmp(&b.id)), query.order)
        });

        Ok(paginate(records, query.pagination()))
    }

    async fn set_not_found_status(
        &self,
        ids: &[NotFoundId],
        status: NotFoundStatus,
    ) -> Result<u64> {
        let mut found = 0;
        for mut record in self.not_found.iter_mut() {
            if ids.contains(&record.id) {
                record.status = status;
                found += 1;
            }
        }
        Ok(found)
    }

    async fn reset_redirected(&self, urls: &[String]) -> Result<u64> {
        let mut reset = 0;
        for url in urls {
            if let Some(mut record) = self.not_found.get_mut(url) {
                if record.status == NotFoundStatus::Redirected {
                    record.status = NotFoundStatus::New;
                    reset += 1;
                }
            }
        }
        Ok(reset)
    }

    async fn delete_not_found(&self, ids: &[NotFoundId]) -> Result<u64> {
        let mut deleted = 0;
        self.not_found.retain(|_, record| {
            let keep = !ids.contains(&record.id);
            if !keep {
                deleted += 1;
            }
            keep
        });
        Ok(deleted)
    }

    async fn delete_ignored_older_than(&self, days: u32) -> Result<u64> {
        let cutoff = Timestamp::now()
            .checked_sub(SignedDuration::from_hours(i64::from(days) * 24))
            .map_err(|e| StorageError::Operation(format!("invalid retention window: {e}")))?;

        let mut deleted = 0;
        self.not_found.retain(|_, record| {
            let expired = record.status == NotFoundStatus::Ignored && record.last_seen < cutoff;
            if expired {
                deleted += 1;
            }
            !expired
        });
        Ok(deleted)
    }

    async fn not_found_stats(&self) -> Result<NotFoundStats> {
        let mut stats = NotFoundStats::default();
        for record in self.not_found.iter() {
            stats.total += 1;
            stats.total_hits += record.hit_count;
            match record.status {
                NotFoundStatus::New => {
                    stats.new += 1;
                    stats.unhandled_hits += record.hit_count;
                }
                NotFoundStatus::Ignored => stats.ignored += 1,
                NotFoundStatus::Redirected => stats.redirected += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use waypoint_core::{validate_rule, RuleDraft};

    fn rule(source: &str, destination: &str, match_type: MatchType, active: bool) -> ValidatedRule {
        validate_rule(&RuleDraft {
            source: source.to_string(),
            destination: destination.to_string(),
            match_type: Some(match_type),
            redirect_type: Some(301),
            active,
        })
        .unwrap()
    }

    fn observation(url: &str, seen_at: Timestamp) -> NotFoundObservation {
        NotFoundObservation {
            url: url.to_string(),
            referrer: None,
            user_agent: None,
            ip_hash: None,
            seen_at,
        }
    }

    #[tokio::test]
    async fn insert_and_get_rule() {
        let store = InMemoryStore::new();
        let inserted = store
            .insert_rule(rule("/old", "/new", MatchType::Exact, true))
            .await
            .unwrap();

        let got = store.get_rule(inserted.id).await.unwrap().unwrap();
        assert_eq!(got.source, "/old");
        assert_eq!(got.hit_count, 0);
        assert_eq!(got.created_at, got.updated_at);
    }

    #[tokio::test]
    async fn active_rules_filter_by_type_and_status_in_creation_order() {
        let store = InMemoryStore::new();
        let a = store
            .insert_rule(rule("^/a", "/x", MatchType::Regex, true))
            .await
            .unwrap();
        store
            .insert_rule(rule("/exact", "/x", MatchType::Exact, true))
            .await
            .unwrap();
        store
            .insert_rule(rule("^/off", "/x", MatchType::Regex, false))
            .await
            .unwrap();
        let b = store
            .insert_rule(rule("^/b", "/x", MatchType::Regex, true))
            .await
            .unwrap();

        let ids: Vec<RuleId> = store
            .active_rules(MatchType::Regex)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn update_keeps_hit_count() {
        let store = InMemoryStore::new();
        let inserted = store
            .insert_rule(rule("/old", "/new", MatchType::Exact, true))
            .await
            .unwrap();
        store.increment_hits(inserted.id).await.unwrap();

        let updated = store
            .update_rule(inserted.id, rule("/old", "/newer", MatchType::Exact, true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.destination, "/newer");
        assert_eq!(updated.hit_count, 1);
        assert!(updated.updated_at >= inserted.updated_at);
    }

    #[tokio::test]
    async fn update_missing_rule_returns_none() {
        let store = InMemoryStore::new();
        let result = store
            .update_rule(RuleId(99), rule("/a", "/b", MatchType::Exact, true))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn concurrent_hit_increments_are_not_lost() {
        let store = Arc::new(InMemoryStore::new());
        let inserted = store
            .insert_rule(rule("/old", "/new", MatchType::Exact, true))
            .await
            .unwrap();

        let mut handles = vec![];
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.increment_hits(inserted.id).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let got = store.get_rule(inserted.id).await.unwrap().unwrap();
        assert_eq!(got.hit_count, 50);
    }

    #[tokio::test]
    async fn list_rules_searches_sorts_and_paginates() {
        let store = InMemoryStore::new();
        for (source, hits) in [("/alpha", 3), ("/beta", 1), ("/gamma", 2), ("/other", 9)] {
            let r = store
                .insert_rule(rule(source, "/target-page", MatchType::Exact, true))
                .await
                .unwrap();
            for _ in 0..hits {
                store.increment_hits(r.id).await.unwrap();
            }
        }

        let page = store
            .list_rules(&RuleQuery {
                search: Some("A".to_string()),
                sort: RuleSort::HitCount,
                order: SortOrder::Desc,
                page: 1,
                per_page: 2,
                ..RuleQuery::default()
            })
            .await
            .unwrap();

        // every destination contains "a", so all four match
        assert_eq!(page.total, 4);
        let sources: Vec<&str> = page.items.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["/other", "/alpha"]);
    }

    #[tokio::test]
    async fn upsert_inserts_then_increments() {
        let store = InMemoryStore::new();
        let first = Timestamp::from_second(1_700_000_000).unwrap();
        let second = Timestamp::from_second(1_700_000_100).unwrap();

        store
            .upsert_not_found(observation("/missing", first))
            .await
            .unwrap();
        store
            .upsert_not_found(NotFoundObservation {
                referrer: Some("https://ref.example".to_string()),
                ..observation("/missing", second)
            })
            .await
            .unwrap();

        let record = store
            .find_not_found_by_url("/missing")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.hit_count, 2);
        assert_eq!(record.first_seen, first);
        assert_eq!(record.last_seen, second);
        assert_eq!(record.referrer.as_deref(), Some("https://ref.example"));
        assert_eq!(record.status, NotFoundStatus::New);
    }

    #[tokio::test]
    async fn concurrent_upserts_produce_one_record() {
        let store = Arc::new(InMemoryStore::new());
        let mut handles = vec![];
        for _ in 0..64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .upsert_not_found(observation("/race", Timestamp::now()))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let page = store
            .list_not_found(&NotFoundQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].hit_count, 64);
    }

    #[tokio::test]
    async fn retention_deletes_only_old_ignored_records() {
        let store = InMemoryStore::new();
        let old = Timestamp::now() - SignedDuration::from_hours(24 * 45);
        let recent = Timestamp::now() - SignedDuration::from_hours(24 * 5);

        for url in ["/old-ignored", "/old-new", "/old-redirected"] {
            store.upsert_not_found(observation(url, old)).await.unwrap();
        }
        store
            .upsert_not_found(observation("/recent-ignored", recent))
            .await
            .unwrap();

        let mut ids = vec![];
        for url in ["/old-ignored", "/recent-ignored", "/old-redirected"] {
            ids.push(store.find_not_found_by_url(url).await.unwrap().unwrap().id);
        }
        let (old_ignored, recent_ignored, old_redirected) = (ids[0], ids[1], ids[2]);

        store
            .set_not_found_status(&[old_ignored, recent_ignored], NotFoundStatus::Ignored)
            .await
            .unwrap();
        store
            .set_not_found_status(&[old_redirected], NotFoundStatus::Redirected)
            .await
            .unwrap();

        let deleted = store.delete_ignored_older_than(30).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get_not_found(old_ignored).await.unwrap().is_none());
        assert!(store.get_not_found(recent_ignored).await.unwrap().is_some());
        assert!(store.find_not_found_by_url("/old-new").await.unwrap().is_some());
        assert!(store.get_not_found(old_redirected).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reset_redirected_only_touches_redirected() {
        let store = InMemoryStore::new();
        store
            .upsert_not_found(observation("/a", Timestamp::now()))
            .await
            .unwrap();
        store
            .upsert_not_found(observation("/b", Timestamp::now()))
            .await
            .unwrap();
        let a = store.find_not_found_by_url("/a").await.unwrap().unwrap();
        let b = store.find_not_found_by_url("/b").await.unwrap().unwrap();
        store
            .set_not_found_status(&[a.id], NotFoundStatus::Redirected)
            .await
            .unwrap();
        store
            .set_not_found_status(&[b.id], NotFoundStatus::Ignored)
            .await
            .unwrap();

        let reset = store
            .reset_redirected(&["/a".to_string(), "/b".to_string()])
            .await
            .unwrap();
        assert_eq!(reset, 1);
        assert_eq!(
            store.get_not_found(a.id).await.unwrap().unwrap().status,
            NotFoundStatus::New
        );
        assert_eq!(
            store.get_not_found(b.id).await.unwrap().unwrap().status,
            NotFoundStatus::Ignored
        );
    }

    #[tokio::test]
    async fn stats_aggregate_counts_and_hits() {
        let store = InMemoryStore::new();
        let active = store
            .insert_rule(rule("/a", "/b", MatchType::Exact, true))
            .await
            .unwrap();
        store
            .insert_rule(rule("/c", "/d", MatchType::Exact, false))
            .await
            .unwrap();
        store.increment_hits(active.id).await.unwrap();
        store.increment_hits(active.id).await.unwrap();

        let stats = store.rule_stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.inactive, 1);
        assert_eq!(stats.total_hits, 2);
        assert_eq!(stats.saved_visits, 2);

        store
            .upsert_not_found(observation("/x", Timestamp::now()))
            .await
            .unwrap();
        store
            .upsert_not_found(observation("/x", Timestamp::now()))
            .await
            .unwrap();
        let nf = store.not_found_stats().await.unwrap();
        assert_eq!(nf.total, 1);
        assert_eq!(nf.new, 1);
        assert_eq!(nf.total_hits, 2);
        assert_eq!(nf.unhandled_hits, 2);
    }
}
