use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;
use tourline_booking::{Booking, BookingRepository, InstanceRepository, TourCatalog};
use tourline_catalog::{Tour, TourInstance};
use tourline_core::{StoreError, Versioned};

/// Postgres-backed document store.
///
/// Each aggregate is kept whole in a JSONB `document` column; the few fields
/// queried on are duplicated into indexed columns on every write.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    document: Json<serde_json::Value>,
    revision: i64,
}

impl DocumentRow {
    fn decode<T: DeserializeOwned>(self) -> Result<Versioned<T>, StoreError> {
        let value = serde_json::from_value(self.document.0)?;
        Ok(Versioned::new(self.revision as u64, value))
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Json<serde_json::Value>, StoreError> {
    Ok(Json(serde_json::to_value(value)?))
}

fn decode_all<T: DeserializeOwned>(rows: Vec<DocumentRow>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| row.decode().map(|doc: Versioned<T>| doc.value))
        .collect()
}

fn backend(err: sqlx::Error) -> StoreError {
    error!("Database error: {}", err);
    StoreError::Backend(err.to_string())
}

fn insert_error(err: sqlx::Error, id: Uuid) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::AlreadyExists(id.to_string());
        }
    }
    backend(err)
}

impl PgStore {
    /// Tell a missing row apart from a lost race after an UPDATE matched nothing
    async fn missed_update(&self, table: &str, id: Uuid, expected_revision: u64) -> StoreError {
        let query = format!("SELECT 1 FROM {} WHERE id = $1", table);
        match sqlx::query(&query).bind(id).fetch_optional(&self.pool).await {
            Ok(Some(_)) => StoreError::RevisionConflict {
                id: id.to_string(),
                expected: expected_revision,
            },
            Ok(None) => StoreError::NotFound(id.to_string()),
            Err(e) => backend(e),
        }
    }
}

#[async_trait]
impl TourCatalog for PgStore {
    async fn save_tour(&self, tour: &Tour) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tours (id, provider_id, document, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET provider_id = EXCLUDED.provider_id,
                    document = EXCLUDED.document,
                    updated_at = NOW()
            "#,
        )
        .bind(tour.id)
        .bind(&tour.provider_id)
        .bind(encode(tour)?)
        .bind(tour.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn get_tour(&self, id: Uuid) -> Result<Option<Tour>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT document, 1::BIGINT AS revision FROM tours WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|r| r.decode().map(|doc: Versioned<Tour>| doc.value))
            .transpose()
    }

    async fn list_tours(&self, provider_id: &str) -> Result<Vec<Tour>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT document, 1::BIGINT AS revision FROM tours WHERE provider_id = $1 ORDER BY created_at",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        decode_all(rows)
    }
}

#[async_trait]
impl InstanceRepository for PgStore {
    async fn insert_instance(&self, instance: &TourInstance) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tour_instances (id, tour_id, status, departure_at, revision, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 1, $5, $6, $7)
            "#,
        )
        .bind(instance.id)
        .bind(instance.tour_id)
        .bind(instance.status.as_str())
        .bind(instance.departure_at())
        .bind(encode(instance)?)
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, instance.id))?;

        Ok(())
    }

    async fn get_instance(&self, id: Uuid) -> Result<Option<Versioned<TourInstance>>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT document, revision FROM tour_instances WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(DocumentRow::decode).transpose()
    }

    async fn update_instance(
        &self,
        instance: &TourInstance,
        expected_revision: u64,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tour_instances
            SET status = $3, document = $4, revision = revision + 1, updated_at = $5
            WHERE id = $1 AND revision = $2
            "#,
        )
        .bind(instance.id)
        .bind(expected_revision as i64)
        .bind(instance.status.as_str())
        .bind(encode(instance)?)
        .bind(instance.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(self
                .missed_update("tour_instances", instance.id, expected_revision)
                .await);
        }
        Ok(expected_revision + 1)
    }

    async fn list_instances_by_tour(&self, tour_id: Uuid) -> Result<Vec<TourInstance>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT document, revision FROM tour_instances WHERE tour_id = $1 ORDER BY departure_at",
        )
        .bind(tour_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        decode_all(rows)
    }

    async fn list_open_instances(&self) -> Result<Vec<TourInstance>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, revision FROM tour_instances
            WHERE status NOT IN ('completed', 'cancelled')
            ORDER BY departure_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        decode_all(rows)
    }

    async fn list_cancelled_holding_seats(&self) -> Result<Vec<TourInstance>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, revision FROM tour_instances
            WHERE status = 'cancelled' AND document->'seat_holds' <> '{}'::jsonb
            ORDER BY departure_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        decode_all(rows)
    }
}

#[async_trait]
impl BookingRepository for PgStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, tour_instance_id, customer_id, status, revision, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 1, $5, $6, $7)
            "#,
        )
        .bind(booking.id)
        .bind(booking.tour_instance_id)
        .bind(&booking.customer_id)
        .bind(booking.status.as_str())
        .bind(encode(booking)?)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, booking.id))?;

        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Versioned<Booking>>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT document, revision FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(DocumentRow::decode).transpose()
    }

    async fn update_booking(
        &self,
        booking: &Booking,
        expected_revision: u64,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $3, document = $4, revision = revision + 1, updated_at = $5
            WHERE id = $1 AND revision = $2
            "#,
        )
        .bind(booking.id)
        .bind(expected_revision as i64)
        .bind(booking.status.as_str())
        .bind(encode(booking)?)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(self
                .missed_update("bookings", booking.id, expected_revision)
                .await);
        }
        Ok(expected_revision + 1)
    }

    async fn list_bookings_by_instance(&self, instance_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT document, revision FROM bookings WHERE tour_instance_id = $1 ORDER BY created_at",
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        decode_all(rows)
    }

    async fn list_bookings_by_customer(&self, customer_id: &str) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT document, revision FROM bookings WHERE customer_id = $1 ORDER BY created_at",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        decode_all(rows)
    }
}
