//! PostgreSQL storage backend

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rsvp_core::{day_bucket, Event, EventInfo, Group, GroupTopic, Rsvp, TopkEvent, Venue};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, Transaction};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{Result, StorageError};
use crate::store::RsvpStore;

const INSERT_VENUE: &str = r#"
    INSERT INTO venues (id, name, lat, lon)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (id) DO NOTHING
"#;

const INSERT_GROUP: &str = r#"
    INSERT INTO groups (id, name, country, state, city, lat, lon, urlname, topics)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    ON CONFLICT (id) DO NOTHING
"#;

const INSERT_MEMBER: &str = r#"
    INSERT INTO members (id, name, photo)
    VALUES ($1, $2, $3)
    ON CONFLICT (id) DO NOTHING
"#;

const INSERT_EVENT: &str = r#"
    INSERT INTO events (id, name, url, time, venue_id, group_id, member_id)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (id) DO NOTHING
"#;

const INSERT_RSVP: &str = r#"
    INSERT INTO rsvps (id, mtime, guests, response, visibility, event_id, venue_id, group_id, member_id)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
"#;

const UPSERT_DAILY_COUNTER: &str = r#"
    INSERT INTO event_daily_rsvps (day, event_id, confirmed)
    VALUES ($1, $2, 1)
    ON CONFLICT (day, event_id)
    DO UPDATE SET confirmed = event_daily_rsvps.confirmed + 1
"#;

const SELECT_TOPK: &str = r#"
    SELECT e.id, e.name, e.url, e.time, d.confirmed
    FROM event_daily_rsvps d
    JOIN events e ON e.id = d.event_id
    WHERE d.day = $1
    ORDER BY d.confirmed DESC, d.event_id ASC
    LIMIT $2
"#;

const SELECT_EVENT_INFO: &str = r#"
    SELECT
        g.id AS group_id, g.name AS group_name, g.country AS group_country, g.state AS group_state,
        g.city AS group_city, g.lat AS group_lat, g.lon AS group_lon, g.urlname AS group_urlname,
        g.topics AS group_topics,
        v.id AS venue_id, v.name AS venue_name, v.lat AS venue_lat, v.lon AS venue_lon,
        COALESCE((SELECT SUM(d.confirmed) FROM event_daily_rsvps d WHERE d.event_id = e.id), 0)::BIGINT
            AS confirmed
    FROM events e
    JOIN groups g ON g.id = e.group_id
    JOIN venues v ON v.id = e.venue_id
    WHERE e.id = $1
"#;

/// Storage backend on a pooled PostgreSQL connection
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct TopkRow {
    id: String,
    name: String,
    url: String,
    time: DateTime<Utc>,
    confirmed: i64,
}

#[derive(FromRow)]
struct EventInfoRow {
    group_id: i64,
    group_name: String,
    group_country: String,
    group_state: Option<String>,
    group_city: String,
    group_lat: f64,
    group_lon: f64,
    group_urlname: String,
    group_topics: Json<Vec<GroupTopic>>,
    venue_id: i64,
    venue_name: String,
    venue_lat: f64,
    venue_lon: f64,
    confirmed: i64,
}

impl PostgresStore {
    /// Open the pool, verify connectivity and apply pending migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!(max_connections = config.max_connections, "Connected to PostgreSQL, migrations applied");

        Ok(Self { pool })
    }

    /// Wrap an existing pool; the schema is assumed to be in place
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_reference_rows(tx: &mut Transaction<'_, Postgres>, rsvp: &Rsvp) -> Result<()> {
        let venue = &rsvp.venue;
        sqlx::query(INSERT_VENUE)
            .bind(venue.id)
            .bind(&venue.name)
            .bind(venue.lat)
            .bind(venue.lon)
            .execute(&mut **tx)
            .await?;

        let group = &rsvp.group;
        sqlx::query(INSERT_GROUP)
            .bind(group.id)
            .bind(&group.name)
            .bind(&group.country)
            .bind(group.state_opt())
            .bind(&group.city)
            .bind(group.lat)
            .bind(group.lon)
            .bind(&group.urlname)
            .bind(Json(&group.topics))
            .execute(&mut **tx)
            .await?;

        let member = &rsvp.member;
        sqlx::query(INSERT_MEMBER)
            .bind(member.id)
            .bind(&member.name)
            .bind(&member.photo)
            .execute(&mut **tx)
            .await?;

        let event = &rsvp.event;
        sqlx::query(INSERT_EVENT)
            .bind(&event.id)
            .bind(&event.name)
            .bind(&event.url)
            .bind(event.time_utc()?)
            .bind(venue.id)
            .bind(group.id)
            .bind(member.id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn insert_rsvp(tx: &mut Transaction<'_, Postgres>, rsvp: &Rsvp, mtime: DateTime<Utc>) -> Result<()> {
        sqlx::query(INSERT_RSVP)
            .bind(rsvp.id)
            .bind(mtime)
            .bind(i64::from(rsvp.guests))
            .bind(&rsvp.response)
            .bind(&rsvp.visibility)
            .bind(&rsvp.event.id)
            .bind(rsvp.venue.id)
            .bind(rsvp.group.id)
            .bind(rsvp.member.id)
            .execute(&mut **tx)
            .await
            .map_err(|e| duplicate_or_database(e, rsvp.id))?;

        Ok(())
    }

    async fn bump_daily_counter(tx: &mut Transaction<'_, Postgres>, day: NaiveDate, event_id: &str) -> Result<()> {
        sqlx::query(UPSERT_DAILY_COUNTER).bind(day).bind(event_id).execute(&mut **tx).await?;
        Ok(())
    }
}

#[async_trait]
impl RsvpStore for PostgresStore {
    async fn save_rsvp(&self, rsvp: &Rsvp) -> Result<()> {
        let mtime = rsvp.mtime_utc()?;
        let day = day_bucket(mtime);

        // Dropping `tx` without commit rolls everything back
        let mut tx = self.pool.begin().await?;

        Self::insert_reference_rows(&mut tx, rsvp).await?;
        Self::insert_rsvp(&mut tx, rsvp, mtime).await?;

        if rsvp.is_confirmed() {
            Self::bump_daily_counter(&mut tx, day, &rsvp.event.id).await?;
        }

        tx.commit().await?;

        debug!(rsvp_id = rsvp.id, event_id = %rsvp.event.id, %day, "RSVP saved");
        Ok(())
    }

    async fn topk_events(&self, date: DateTime<Utc>, k: u32) -> Result<Vec<TopkEvent>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<TopkRow> =
            sqlx::query_as(SELECT_TOPK).bind(day_bucket(date)).bind(i64::from(k)).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(TopkRow::into_topk_event).collect())
    }

    async fn get_event_info(&self, event_id: &str) -> Result<EventInfo> {
        let row: Option<EventInfoRow> =
            sqlx::query_as(SELECT_EVENT_INFO).bind(event_id).fetch_optional(&self.pool).await?;

        row.map(EventInfoRow::into_event_info).ok_or_else(|| StorageError::not_found(event_id))
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

impl TopkRow {
    fn into_topk_event(self) -> TopkEvent {
        TopkEvent {
            event: Event { id: self.id, name: self.name, url: self.url, time: self.time.timestamp_millis() },
            confirmed_rsvps: self.confirmed,
        }
    }
}

impl EventInfoRow {
    fn into_event_info(self) -> EventInfo {
        EventInfo {
            group: Group {
                id: self.group_id,
                name: self.group_name,
                country: self.group_country,
                state: self.group_state.unwrap_or_default(),
                city: self.group_city,
                lat: self.group_lat,
                lon: self.group_lon,
                urlname: self.group_urlname,
                topics: self.group_topics.0,
            },
            venue: Venue { id: self.venue_id, name: self.venue_name, lat: self.venue_lat, lon: self.venue_lon },
            confirmed_rsvps: Some(self.confirmed),
        }
    }
}

fn duplicate_or_database(err: sqlx::Error, rsvp_id: i64) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::DuplicateRsvp { rsvp_id },
        _ => StorageError::Database(err),
    }
}

/// These tests need a live PostgreSQL instance; run them with
/// `RSVP_E2E_DATABASE_URL=postgres://... cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rsvp_core::Member;
    use std::sync::Arc;

    const DAY1_MS: i64 = 1677933050000; // 2023-03-04 12:30:50 UTC
    const DAY2_MS: i64 = DAY1_MS + 24 * 60 * 60 * 1000;

    async fn setup() -> PostgresStore {
        let url = std::env::var("RSVP_E2E_DATABASE_URL").expect("RSVP_E2E_DATABASE_URL must be set");
        let config = DatabaseConfig { url, ..Default::default() };
        let store = PostgresStore::connect(&config).await.unwrap();

        sqlx::query("TRUNCATE event_daily_rsvps, rsvps, events, members, groups, venues")
            .execute(store.pool())
            .await
            .unwrap();

        store
    }

    fn rsvp(id: i64, event_id: &str, response: &str, mtime: i64) -> Rsvp {
        Rsvp {
            id,
            mtime,
            guests: 0,
            visibility: "public".to_string(),
            response: response.to_string(),
            venue: Venue { id: 2001, name: "venue_name1".to_string(), lat: 21.0, lon: 22.0 },
            member: Member { id: 3000 + id, name: format!("member_name{id}"), photo: String::new() },
            event: Event {
                id: event_id.to_string(),
                name: format!("{event_id}_name"),
                url: format!("https://example.com/{event_id}"),
                time: DAY2_MS,
            },
            group: Group {
                id: 5001,
                name: "group_name1".to_string(),
                country: "us".to_string(),
                state: String::new(),
                city: "group_city1".to_string(),
                lat: 51.0,
                lon: 52.0,
                urlname: "group_urlname1".to_string(),
                topics: vec![GroupTopic { urlkey: "rust".to_string(), topic_name: "Rust".to_string() }],
            },
        }
    }

    async fn save_many(store: &PostgresStore, next_id: &mut i64, event_id: &str, count: usize, mtime: i64) {
        for _ in 0..count {
            *next_id += 1;
            store.save_rsvp(&rsvp(*next_id, event_id, "yes", mtime)).await.unwrap();
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_save_and_load_event_info() {
        let store = setup().await;

        store.save_rsvp(&rsvp(1, "event_id1", "yes", DAY1_MS)).await.unwrap();
        store.save_rsvp(&rsvp(2, "event_id1", "no", DAY1_MS)).await.unwrap();

        let info = store.get_event_info("event_id1").await.unwrap();
        assert_eq!(info.venue.name, "venue_name1");
        assert_eq!(info.group.state, "");
        assert_eq!(info.group.topics.len(), 1);
        assert_eq!(info.confirmed_rsvps, Some(1));

        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM groups WHERE id = 5001").fetch_one(store.pool()).await.unwrap();
        assert_eq!(state, None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_reference_rows_are_write_once() {
        let store = setup().await;

        store.save_rsvp(&rsvp(1, "event_id1", "yes", DAY1_MS)).await.unwrap();

        let mut renamed = rsvp(2, "event_id1", "yes", DAY1_MS);
        renamed.venue.name = "renamed".to_string();
        store.save_rsvp(&renamed).await.unwrap();

        let info = store.get_event_info("event_id1").await.unwrap();
        assert_eq!(info.venue.name, "venue_name1");
    }

    #[tokio::test]
    #[ignore]
    async fn test_duplicate_rsvp_rolls_back() {
        let store = setup().await;

        store.save_rsvp(&rsvp(1, "event_id1", "yes", DAY1_MS)).await.unwrap();
        let err = store.save_rsvp(&rsvp(1, "event_id1", "yes", DAY1_MS)).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateRsvp { rsvp_id: 1 }));

        let top = store.topk_events(Utc.timestamp_millis_opt(DAY1_MS).unwrap(), 10).await.unwrap();
        assert_eq!(top[0].confirmed_rsvps, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_topk_per_day() {
        let store = setup().await;
        let mut next_id = 0;

        save_many(&store, &mut next_id, "event_id1", 10, DAY1_MS).await;
        save_many(&store, &mut next_id, "event_id2", 20, DAY2_MS).await;
        save_many(&store, &mut next_id, "event_id3", 21, DAY1_MS).await;
        save_many(&store, &mut next_id, "event_id4", 30, DAY2_MS).await;
        save_many(&store, &mut next_id, "event_id5", 31, DAY1_MS).await;
        save_many(&store, &mut next_id, "event_id6", 40, DAY2_MS).await;
        save_many(&store, &mut next_id, "event_id7", 41, DAY1_MS).await;

        let day1 = Utc.timestamp_millis_opt(DAY1_MS).unwrap();
        let top = store.topk_events(day1, 2).await.unwrap();
        let ranked: Vec<_> = top.iter().map(|t| (t.event.id.as_str(), t.confirmed_rsvps)).collect();
        assert_eq!(ranked, vec![("event_id7", 41), ("event_id5", 31)]);
        assert_eq!(top[0].event.time, DAY2_MS);

        let day2 = Utc.timestamp_millis_opt(DAY2_MS).unwrap();
        let top = store.topk_events(day2, 2).await.unwrap();
        let ranked: Vec<_> = top.iter().map(|t| (t.event.id.as_str(), t.confirmed_rsvps)).collect();
        assert_eq!(ranked, vec![("event_id6", 40), ("event_id4", 30)]);

        assert!(store.topk_events(day1, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore]
    async fn test_concurrent_saves_lose_no_updates() {
        let store = Arc::new(setup().await);
        store.save_rsvp(&rsvp(1, "event_id1", "yes", DAY1_MS)).await.unwrap();

        let handles: Vec<_> = (2..=51)
            .map(|id| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.save_rsvp(&rsvp(id, "event_id1", "yes", DAY1_MS)).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let top = store.topk_events(Utc.timestamp_millis_opt(DAY1_MS).unwrap(), 1).await.unwrap();
        assert_eq!(top[0].confirmed_rsvps, 51);
    }

    #[tokio::test]
    #[ignore]
    async fn test_unknown_event_is_not_found() {
        let store = setup().await;
        let err = store.get_event_info("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
