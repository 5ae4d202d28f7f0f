use async_trait::async_trait;
use jiff::Timestamp;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};
use waypoint_core::{
    MatchType, NotFoundId, NotFoundObservation, NotFoundQuery, NotFoundRecord, NotFoundSort,
    NotFoundStats, NotFoundStatus, NotFoundStore, Page, ReadRuleStore, RedirectRule,
    RedirectType, Result, RuleId, RuleQuery, RuleSort, RuleStats, RuleStatus, RuleStore,
    SortOrder, StorageError, ValidatedRule,
};

const RULE_COLUMNS: &str = "id, source, destination, match_type, redirect_type, hit_count, \
                            status, created_at, updated_at";

const NOT_FOUND_COLUMNS: &str =
    "id, url, referrer, user_agent, ip_hash, hit_count, first_seen, last_seen, status";

/// MySQL implementation of the rule and 404 stores.
///
/// Timestamps are stored as unix seconds. 404 records are unique by a
/// stored SHA-256 of the url, which lets `upsert_not_found` run as a single
/// `INSERT ... ON DUPLICATE KEY UPDATE`.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates both tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        for ddl in [
            include_str!("../ddl/mysql/redirect_rules.sql"),
            include_str!("../ddl/mysql/not_found_records.sql"),
        ] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        tracing::debug!("redirect schema is in place");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn now_unix_seconds() -> i64 {
    Timestamp::now().as_second()
}

fn parse_timestamp(column: &str, seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{seconds}': {e}"))
    })
}

fn parse_column<T>(column: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| StorageError::InvalidData(format!("invalid {column}: {e}")))
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ if is_unique_violation(&err) => StorageError::Conflict(message),
        _ => StorageError::Query(message),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn rule_from_row(row: &MySqlRow) -> Result<RedirectRule> {
    let match_type: String = row.try_get("match_type").map_err(map_sqlx_error)?;
    let status: String = row.try_get("status").map_err(map_sqlx_error)?;
    let redirect_type: u16 = row.try_get("redirect_type").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let updated_at: i64 = row.try_get("updated_at").map_err(map_sqlx_error)?;

    Ok(RedirectRule {
        id: RuleId(row.try_get("id").map_err(map_sqlx_error)?),
        source: row.try_get("source").map_err(map_sqlx_error)?,
        destination: row.try_get("destination").map_err(map_sqlx_error)?,
        match_type: parse_column("match_type", &match_type)?,
        redirect_type: RedirectType::try_from(redirect_type)
            .map_err(|e| StorageError::InvalidData(format!("invalid redirect_type: {e}")))?,
        hit_count: row.try_get("hit_count").map_err(map_sqlx_error)?,
        status: parse_column("status", &status)?,
        created_at: parse_timestamp("created_at", created_at)?,
        updated_at: parse_timestamp("updated_at", updated_at)?,
    })
}

fn not_found_from_row(row: &MySqlRow) -> Result<NotFoundRecord> {
    let status: String = row.try_get("status").map_err(map_sqlx_error)?;
    let first_seen: i64 = row.try_get("first_seen").map_err(map_sqlx_error)?;
    let last_seen: i64 = row.try_get("last_seen").map_err(map_sqlx_error)?;

    Ok(NotFoundRecord {
        id: NotFoundId(row.try_get("id").map_err(map_sqlx_error)?),
        url: row.try_get("url").map_err(map_sqlx_error)?,
        referrer: row.try_get("referrer").map_err(map_sqlx_error)?,
        user_agent: row.try_get("user_agent").map_err(map_sqlx_error)?,
        ip_hash: row.try_get("ip_hash").map_err(map_sqlx_error)?,
        hit_count: row.try_get("hit_count").map_err(map_sqlx_error)?,
        first_seen: parse_timestamp("first_seen", first_seen)?,
        last_seen: parse_timestamp("last_seen", last_seen)?,
        status: parse_column("status", &status)?,
    })
}

/// Builds a `LIKE` operand matching `search` anywhere, or `None` for a blank search.
fn like_pattern(search: Option<&str>) -> Option<String> {
    let needle = search.map(str::trim).filter(|s| !s.is_empty())?;
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    Some(escaped)
}

fn direction(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

fn push_rule_filters(builder: &mut QueryBuilder<'_, MySql>, query: &RuleQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(match_type) = query.match_type {
        builder.push(" AND match_type = ").push_bind(match_type.as_str());
    }
    if let Some(pattern) = like_pattern(query.search.as_deref()) {
        builder
            .push(" AND (LOWER(source) LIKE LOWER(")
            .push_bind(pattern.clone())
            .push(") OR LOWER(destination) LIKE LOWER(")
            .push_bind(pattern)
            .push("))");
    }
}

fn push_not_found_filters(builder: &mut QueryBuilder<'_, MySql>, query: &NotFoundQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(pattern) = like_pattern(query.search.as_deref()) {
        builder
            .push(" AND (LOWER(url) LIKE LOWER(")
            .push_bind(pattern.clone())
            .push(") OR LOWER(COALESCE(referrer, '')) LIKE LOWER(")
            .push_bind(pattern)
            .push("))");
    }
}

fn push_id_list<T>(builder: &mut QueryBuilder<'_, MySql>, ids: impl IntoIterator<Item = T>)
where
    T: for<'q> sqlx::Encode<'q, MySql> + sqlx::Type<MySql> + Send + 'static,
{
    builder.push(" IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl ReadRuleStore for MySqlStore {
    async fn active_rules(&self, match_type: MatchType) -> Result<Vec<RedirectRule>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM redirect_rules
            WHERE status = 'active'
              AND match_type = ?
            ORDER BY id ASC
            "#
        ))
        .bind(match_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(rule_from_row).collect()
    }

    async fn get_rule(&self, id: RuleId) -> Result<Option<RedirectRule>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM redirect_rules
            WHERE id = ?
            LIMIT 1
            "#
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(rule_from_row).transpose()
    }

    async fn increment_hits(&self, id: RuleId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE redirect_rules
            SET hit_count = hit_count + 1
            WHERE id = ?
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RuleStore for MySqlStore {
    async fn insert_rule(&self, rule: ValidatedRule) -> Result<RedirectRule> {
        let now = now_unix_seconds();

        let result = sqlx::query(
            r#"
            INSERT INTO redirect_rules
                (source, destination, match_type, redirect_type, hit_count, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(rule.source())
        .bind(rule.destination())
        .bind(rule.match_type().as_str())
        .bind(rule.redirect_type().status_code())
        .bind(rule.status().as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let created_at = parse_timestamp("created_at", now)?;
        Ok(RedirectRule {
            id: RuleId(result.last_insert_id()),
            source: rule.source().to_string(),
            destination: rule.destination().to_string(),
            match_type: rule.match_type(),
            redirect_type: rule.redirect_type(),
            hit_count: 0,
            status: rule.status(),
            created_at,
            updated_at: created_at,
        })
    }

    async fn update_rule(&self, id: RuleId, rule: ValidatedRule) -> Result<Option<RedirectRule>> {
        sqlx::query(
            r#"
            UPDATE redirect_rules
            SET source = ?,
                destination = ?,
                match_type = ?,
                redirect_type = ?,
                status = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(rule.source())
        .bind(rule.destination())
        .bind(rule.match_type().as_str())
        .bind(rule.redirect_type().status_code())
        .bind(rule.status().as_str())
        .bind(now_unix_seconds())
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        self.get_rule(id).await
    }

    async fn delete_rule(&self, id: RuleId) -> Result<Option<RedirectRule>> {
        let Some(existing) = self.get_rule(id).await? else {
            return Ok(None);
        };

        let result = sqlx::query("DELETE FROM redirect_rules WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok((result.rows_affected() > 0).then_some(existing))
    }

    async fn set_rule_status(&self, ids: &[RuleId], status: RuleStatus) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<MySql>::new("UPDATE redirect_rules SET updated_at = IF(status = ");
        builder
            .push_bind(status.as_str())
            .push(", updated_at, ")
            .push_bind(now_unix_seconds())
            .push("), status = ")
            .push_bind(status.as_str())
            .push(" WHERE id");
        push_id_list(&mut builder, ids.iter().map(|id| id.0));

        // sqlx connects with CLIENT_FOUND_ROWS, so this counts matched rows
        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn list_rules(&self, query: &RuleQuery) -> Result<Page<RedirectRule>> {
        let pagination = query.pagination();

        let mut count =
            QueryBuilder::<MySql>::new("SELECT CAST(COUNT(*) AS UNSIGNED) FROM redirect_rules");
        push_rule_filters(&mut count, query);
        let total: u64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let column = match query.sort {
            RuleSort::Source => "source",
            RuleSort::HitCount => "hit_count",
            RuleSort::UpdatedAt => "updated_at",
            RuleSort::CreatedAt => "id",
        };
        let order = direction(query.order);

        let mut select = QueryBuilder::<MySql>::new(format!("SELECT {RULE_COLUMNS} FROM redirect_rules"));
        push_rule_filters(&mut select, query);
        select
            .push(format!(" ORDER BY {column} {order}, id {order} LIMIT "))
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let items = rows.iter().map(rule_from_row).collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }

    async fn rule_stats(&self) -> Result<RuleStats> {
        let row = sqlx::query(
            r#"
            SELECT
                CAST(COUNT(*) AS UNSIGNED) AS total,
                CAST(COALESCE(SUM(status = 'active'), 0) AS UNSIGNED) AS active,
                CAST(COALESCE(SUM(status <> 'active'), 0) AS UNSIGNED) AS inactive,
                CAST(COALESCE(SUM(hit_count), 0) AS UNSIGNED) AS total_hits,
                CAST(COALESCE(SUM(CASE WHEN status = 'active' AND redirect_type = 301
                                       THEN hit_count ELSE 0 END), 0) AS UNSIGNED) AS saved_visits
            FROM redirect_rules
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(RuleStats {
            total: row.try_get("total").map_err(map_sqlx_error)?,
            active: row.try_get("active").map_err(map_sqlx_error)?,
            inactive: row.try_get("inactive").map_err(map_sqlx_error)?,
            total_hits: row.try_get("total_hits").map_err(map_sqlx_error)?,
            saved_visits: row.try_get("saved_visits").map_err(map_sqlx_error)?,
        })
    }
}

#[async_trait]
impl NotFoundStore for MySqlStore {
    async fn upsert_not_found(&self, observation: NotFoundObservation) -> Result<()> {
        let seen_at = observation.seen_at.as_second();

        sqlx::query(
            r#"
            INSERT INTO not_found_records
                (url, referrer, user_agent, ip_hash, hit_count, first_seen, last_seen, status)
            VALUES (?, ?, ?, ?, 1, ?, ?, 'new') AS incoming
            ON DUPLICATE KEY UPDATE
                hit_count = not_found_records.hit_count + 1,
                last_seen = incoming.last_seen,
                referrer = incoming.referrer,
                user_agent = incoming.user_agent,
                ip_hash = incoming.ip_hash
            "#,
        )
        .bind(observation.url)
        .bind(observation.referrer)
        .bind(observation.user_agent)
        .bind(observation.ip_hash)
        .bind(seen_at)
        .bind(seen_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_not_found(&self, id: NotFoundId) -> Result<Option<NotFoundRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {NOT_FOUND_COLUMNS}
            FROM not_found_records
            WHERE id = ?
            LIMIT 1
            "#
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(not_found_from_row).transpose()
    }

    async fn find_not_found_by_url(&self, url: &str) -> Result<Option<NotFoundRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {NOT_FOUND_COLUMNS}
            FROM not_found_records
            WHERE url_hash = UNHEX(SHA2(?, 256))
            LIMIT 1
            "#
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(not_found_from_row).transpose()
    }

    async fn list_not_found(&self, query: &NotFoundQuery) -> Result<Page<NotFoundRecord>> {
        let pagination = query.pagination();

        let mut count =
            QueryBuilder::<MySql>::new("SELECT CAST(COUNT(*) AS UNSIGNED) FROM not_found_records");
        push_not_found_filters(&mut count, query);
        let total: u64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let column = match query.sort {
            NotFoundSort::Url => "url",
            NotFoundSort::HitCount => "hit_count",
            NotFoundSort::FirstSeen => "first_seen",
            NotFoundSort::LastSeen => "last_seen",
        };
        let order = direction(query.order);

        let mut select =
            QueryBuilder::<MySql>::new(format!("SELECT {NOT_FOUND_COLUMNS} FROM not_found_records"));
        push_not_found_filters(&mut select, query);
        select
            .push(format!(" ORDER BY {column} {order}, id {order} LIMIT "))
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let items = rows
            .iter()
            .map(not_found_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }

    async fn set_not_found_status(
        &self,
        ids: &[NotFoundId],
        status: NotFoundStatus,
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<MySql>::new("UPDATE not_found_records SET status = ");
        builder.push_bind(status.as_str()).push(" WHERE id");
        push_id_list(&mut builder, ids.iter().map(|id| id.0));

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn reset_redirected(&self, urls: &[String]) -> Result<u64> {
        if urls.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<MySql>::new(
            "UPDATE not_found_records SET status = 'new' WHERE status = 'redirected' AND url",
        );
        push_id_list(&mut builder, urls.to_vec());

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_not_found(&self, ids: &[NotFoundId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<MySql>::new("DELETE FROM not_found_records WHERE id");
        push_id_list(&mut builder, ids.iter().map(|id| id.0));

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_ignored_older_than(&self, days: u32) -> Result<u64> {
        let cutoff = now_unix_seconds() - i64::from(days) * 86_400;

        let result = sqlx::query(
            r#"
            DELETE FROM not_found_records
            WHERE status = 'ignored'
              AND last_seen < ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn not_found_stats(&self) -> Result<NotFoundStats> {
        let row = sqlx::query(
            r#"
            SELECT
                CAST(COUNT(*) AS UNSIGNED) AS total,
                CAST(COALESCE(SUM(status = 'new'), 0) AS UNSIGNED) AS new_count,
                CAST(COALESCE(SUM(status = 'ignored'), 0) AS UNSIGNED) AS ignored,
                CAST(COALESCE(SUM(status = 'redirected'), 0) AS UNSIGNED) AS redirected,
                CAST(COALESCE(SUM(hit_count), 0) AS UNSIGNED) AS total_hits,
                CAST(COALESCE(SUM(CASE WHEN status = 'new' THEN hit_count ELSE 0 END), 0)
                     AS UNSIGNED) AS unhandled_hits
            FROM not_found_records
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(NotFoundStats {
            total: row.try_get("total").map_err(map_sqlx_error)?,
            new: row.try_get("new_count").map_err(map_sqlx_error)?,
            ignored: row.try_get("ignored").map_err(map_sqlx_error)?,
            redirected: row.try_get("redirected").map_err(map_sqlx_error)?,
            total_hits: row.try_get("total_hits").map_err(map_sqlx_error)?,
            unhandled_hits: row.try_get("unhandled_hits").map_err(map_sqlx_error)?,
        })
    }
}
