// Postgres persistence for geotagged records.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;

use trendmap_common::{valid_coordinates, GeoRecord, TopicName};

use crate::error::{Result, StoreError};

pub struct GeoStore {
    pool: PgPool,
}

/// A row from the geo_records table. The topic column holds canonical topic
/// names, so conversion back to `TopicName` should never fail in practice.
#[derive(Debug, Clone, sqlx::FromRow)]
struct GeoRecordRow {
    id: String,
    topic: String,
    text: String,
    author: String,
    latitude: f64,
    longitude: f64,
    created_at: DateTime<Utc>,
}

impl GeoRecordRow {
    fn into_record(self) -> Option<GeoRecord> {
        let topic = TopicName::canonicalize(&self.topic)?;
        Some(GeoRecord {
            id: self.id,
            topic,
            text: self.text,
            author: self.author,
            latitude: self.latitude,
            longitude: self.longitude,
            created_at: self.created_at,
        })
    }
}

impl GeoStore {
    /// Connect to Postgres and run the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }

    /// Insert a record unless its id is already present. Returns whether a
    /// row was actually written. Out-of-range or null-island coordinates are
    /// rejected before touching the database.
    pub async fn upsert(&self, record: &GeoRecord) -> Result<bool> {
        if !valid_coordinates(record.latitude, record.longitude) {
            return Err(StoreError::InvalidCoordinates {
                id: record.id.clone(),
                latitude: record.latitude,
                longitude: record.longitude,
            });
        }

        let result = sqlx::query(
            r#"
            INSERT INTO geo_records (id, topic, text, author, latitude, longitude, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(record.topic.as_str())
        .bind(&record.text)
        .bind(&record.author)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// All records for a topic, newest first.
    pub async fn records_for_topic(&self, topic: &TopicName) -> Result<Vec<GeoRecord>> {
        let rows = sqlx::query_as::<_, GeoRecordRow>(
            r#"
            SELECT id, topic, text, author, latitude, longitude, created_at
            FROM geo_records
            WHERE topic = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(topic.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows_to_records(rows))
    }

    /// Every stored record across all topics, newest first.
    pub async fn all_records(&self) -> Result<Vec<GeoRecord>> {
        let rows = sqlx::query_as::<_, GeoRecordRow>(
            r#"
            SELECT id, topic, text, author, latitude, longitude, created_at
            FROM geo_records
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows_to_records(rows))
    }

    /// Delete every record for a topic in one statement. Returns the number
    /// of rows removed.
    pub async fn purge_topic(&self, topic: &TopicName) -> Result<u64> {
        let result = sqlx::query("DELETE FROM geo_records WHERE topic = $1")
            .bind(topic.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Distinct topics that currently have stored records.
    pub async fn topics(&self) -> Result<Vec<TopicName>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT topic FROM geo_records ORDER BY topic",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(names
            .iter()
            .filter_map(|name| TopicName::canonicalize(name))
            .collect())
    }

    /// Delete records created before the cutoff. Returns the number of rows
    /// removed.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM geo_records WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn rows_to_records(rows: Vec<GeoRecordRow>) -> Vec<GeoRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            let record = row.into_record();
            if record.is_none() {
                warn!(id = %id, "Dropping row with non-canonical topic");
            }
            record
        })
        .collect()
}
