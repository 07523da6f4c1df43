//! Booking models, overlap validation and lifecycle queries.
//!
//! Two bookings of the same property overlap when either one's start or end
//! falls inside the other's range, or one contains the other. Bounds are
//! inclusive: a stay ending on the 5th blocks a stay starting on the 5th.
//!
//! The overlap check and the insert share one transaction, and the
//! `bookings_no_overlap` trigger enforces the same rule inside the database,
//! so concurrent requests cannot double-book a property.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::common::{display_date, format_date};
use super::property::Property;
use crate::db::error::{is_overlap_violation, DbError, DbResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub property_id: i64,
    pub guest_username: String,
    #[serde(with = "display_date")]
    pub start_date: NaiveDate,
    #[serde(with = "display_date")]
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub property_id: i64,
    pub guest_username: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub property_id: i64,
    /// Defaults to the authenticated user
    #[serde(default)]
    pub guest_username: Option<String>,
    #[serde(with = "display_date")]
    pub start_date: NaiveDate,
    #[serde(with = "display_date")]
    pub end_date: NaiveDate,
}

const BOOKING_COLUMNS: &str = "id, property_id, guest_username, start_date, end_date";

impl Booking {
    /// Fail with `Conflict` if `[start_date, end_date]` overlaps an existing
    /// booking of `property_id`. Only the first conflicting booking is reported.
    pub async fn validate(
        conn: &mut SqliteConnection,
        property_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> DbResult<()> {
        let conflict = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE property_id = $1
              AND ((start_date BETWEEN $2 AND $3)
                OR (end_date BETWEEN $2 AND $3)
                OR (start_date <= $2 AND end_date >= $3))
            ORDER BY id
            LIMIT 1
            "#,
            BOOKING_COLUMNS
        ))
        .bind(property_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(&mut *conn)
        .await?;

        match conflict {
            Some(existing) => {
                debug!(
                    property_id,
                    conflicting_booking = existing.id,
                    "Booking request overlaps an existing booking"
                );
                Err(already_booked(&existing.start_date, &existing.end_date))
            }
            None => Ok(()),
        }
    }

    /// Validate and insert a booking.
    pub async fn create(db: &SqlitePool, new: &NewBooking) -> DbResult<Booking> {
        if new.end_date < new.start_date {
            return Err(DbError::BadRequest(
                "End date cannot be before start date".to_string(),
            ));
        }

        if Property::find(db, new.property_id).await?.is_none() {
            return Err(DbError::NotFound(format!(
                "No property: {}",
                new.property_id
            )));
        }

        // Write lock before the overlap check, so concurrent creates queue
        // instead of failing with SQLITE_BUSY_SNAPSHOT at the insert
        let mut tx = db.begin_with("BEGIN IMMEDIATE").await?;

        Self::validate(&mut tx, new.property_id, new.start_date, new.end_date).await?;

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings (property_id, guest_username, start_date, end_date)
            VALUES (?, ?, ?, ?)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(new.property_id)
        .bind(&new.guest_username)
        .bind(new.start_date)
        .bind(new.end_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_overlap_violation(&e) {
                DbError::Conflict(
                    "Property is already booked for some of these dates. \
                     Please select different dates to book."
                        .to_string(),
                )
            } else {
                DbError::Database(e)
            }
        })?;

        tx.commit().await?;

        info!(
            booking_id = booking.id,
            property_id = booking.property_id,
            guest = %booking.guest_username,
            "Booking created"
        );
        Ok(booking)
    }

    /// All bookings ordered by id
    pub async fn list(db: &SqlitePool) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings ORDER BY id",
            BOOKING_COLUMNS
        ))
        .fetch_all(db)
        .await?;

        Ok(bookings)
    }

    /// Bookings made by one guest, ordered by id
    pub async fn list_for_guest(db: &SqlitePool, username: &str) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE guest_username = ? ORDER BY id",
            BOOKING_COLUMNS
        ))
        .bind(username)
        .fetch_all(db)
        .await?;

        Ok(bookings)
    }

    pub async fn get(db: &SqlitePool, id: i64) -> DbResult<Booking> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = ?",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| not_found(id))
    }

    pub async fn remove(db: &SqlitePool, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}

fn already_booked(start: &NaiveDate, end: &NaiveDate) -> DbError {
    DbError::Conflict(format!(
        "Property is already booked from {} to {}. Please select different dates to book.",
        format_date(start),
        format_date(end)
    ))
}

fn not_found(id: i64) -> DbError {
    DbError::NotFound(format!("No booking: {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;
    use crate::db::models::property::Property;
    use crate::db::models::user::User;
    use crate::db::test_support::{file_pool, new_property, register_request};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(property_id: i64, start: NaiveDate, end: NaiveDate) -> NewBooking {
        NewBooking {
            property_id,
            guest_username: "guest".to_string(),
            start_date: start,
            end_date: end,
        }
    }

    async fn setup() -> (SqlitePool, i64) {
        let db = init_memory().await.unwrap();
        User::register(&db, &register_request("host"), false).await.unwrap();
        User::register(&db, &register_request("guest"), false).await.unwrap();
        let property = Property::create(&db, &new_property("Cottage", "10 Brook Ln", 95, "host"))
            .await
            .unwrap();
        (db, property.id)
    }

    #[tokio::test]
    async fn test_overlapping_booking_conflicts() {
        let (db, property_id) = setup().await;

        Booking::create(&db, &booking(property_id, date(2024, 6, 1), date(2024, 6, 5)))
            .await
            .unwrap();

        let err = Booking::create(&db, &booking(property_id, date(2024, 6, 3), date(2024, 6, 10)))
            .await
            .unwrap_err();
        match err {
            DbError::Conflict(message) => {
                assert!(message.contains("2024/06/01"));
                assert!(message.contains("2024/06/05"));
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        let ok = Booking::create(&db, &booking(property_id, date(2024, 6, 6), date(2024, 6, 8)))
            .await
            .unwrap();
        assert_eq!(ok.start_date, date(2024, 6, 6));
    }

    #[tokio::test]
    async fn test_boundaries_are_inclusive() {
        let (db, property_id) = setup().await;
        Booking::create(&db, &booking(property_id, date(2024, 7, 10), date(2024, 7, 15)))
            .await
            .unwrap();

        // Starts on the existing end day
        let err = Booking::create(&db, &booking(property_id, date(2024, 7, 15), date(2024, 7, 20)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        // Ends on the existing start day
        let err = Booking::create(&db, &booking(property_id, date(2024, 7, 5), date(2024, 7, 10)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_containment_conflicts_both_ways() {
        let (db, property_id) = setup().await;
        Booking::create(&db, &booking(property_id, date(2024, 8, 10), date(2024, 8, 20)))
            .await
            .unwrap();

        // New range inside the existing one
        let err = Booking::create(&db, &booking(property_id, date(2024, 8, 12), date(2024, 8, 14)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        // New range around the existing one
        let err = Booking::create(&db, &booking(property_id, date(2024, 8, 1), date(2024, 8, 31)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_only_first_conflict_is_reported() {
        let (db, property_id) = setup().await;
        Booking::create(&db, &booking(property_id, date(2024, 9, 1), date(2024, 9, 3)))
            .await
            .unwrap();
        Booking::create(&db, &booking(property_id, date(2024, 9, 10), date(2024, 9, 12)))
            .await
            .unwrap();

        let mut conn = db.acquire().await.unwrap();
        let err = Booking::validate(&mut conn, property_id, date(2024, 8, 30), date(2024, 9, 30))
            .await
            .unwrap_err();
        match err {
            DbError::Conflict(message) => {
                assert!(message.contains("2024/09/01 to 2024/09/03"));
                assert!(!message.contains("2024/09/10"));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_properties_do_not_conflict() {
        let (db, property_id) = setup().await;
        let other = Property::create(&db, &new_property("Barn", "11 Brook Ln", 50, "host"))
            .await
            .unwrap();

        Booking::create(&db, &booking(property_id, date(2024, 6, 1), date(2024, 6, 5)))
            .await
            .unwrap();
        Booking::create(&db, &booking(other.id, date(2024, 6, 1), date(2024, 6, 5)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let (db, property_id) = setup().await;
        let err = Booking::create(&db, &booking(property_id, date(2024, 6, 5), date(2024, 6, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_property_is_not_found() {
        let (db, _) = setup().await;
        let err = Booking::create(&db, &booking(31337, date(2024, 6, 1), date(2024, 6, 2)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_trigger_rejects_overlap_that_skips_validation() {
        let (db, property_id) = setup().await;
        Booking::create(&db, &booking(property_id, date(2024, 6, 1), date(2024, 6, 5)))
            .await
            .unwrap();

        let err = sqlx::query(
            "INSERT INTO bookings (property_id, guest_username, start_date, end_date) VALUES (?, ?, ?, ?)",
        )
        .bind(property_id)
        .bind("guest")
        .bind(date(2024, 6, 4))
        .bind(date(2024, 6, 9))
        .execute(&db)
        .await
        .unwrap_err();
        assert!(is_overlap_violation(&err));
    }

    #[tokio::test]
    async fn test_get_list_and_remove() {
        let (db, property_id) = setup().await;
        let first = Booking::create(&db, &booking(property_id, date(2024, 1, 1), date(2024, 1, 2)))
            .await
            .unwrap();
        let second = Booking::create(&db, &booking(property_id, date(2024, 2, 1), date(2024, 2, 2)))
            .await
            .unwrap();

        let fetched = Booking::get(&db, first.id).await.unwrap();
        assert_eq!(fetched, first);

        let ids: Vec<i64> = Booking::list(&db).await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);

        let mine = Booking::list_for_guest(&db, "guest").await.unwrap();
        assert_eq!(mine.len(), 2);

        Booking::remove(&db, first.id).await.unwrap();
        assert!(matches!(
            Booking::get(&db, first.id).await.unwrap_err(),
            DbError::NotFound(_)
        ));
        assert!(matches!(
            Booking::remove(&db, first.id).await.unwrap_err(),
            DbError::NotFound(_)
        ));
    }

    #[test]
    fn test_booking_serializes_display_dates() {
        let booking = Booking {
            id: 1,
            property_id: 2,
            guest_username: "guest".to_string(),
            start_date: date(2024, 6, 1),
            end_date: date(2024, 6, 5),
        };
        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(json["startDate"], "2024/06/01");
        assert_eq!(json["endDate"], "2024/06/05");
        assert_eq!(json["guestUsername"], "guest");

        let back: Booking = serde_json::from_value(json).unwrap();
        assert_eq!(back, booking);
    }

    #[test]
    fn test_create_request_accepts_iso_dates() {
        let req: CreateBookingRequest = serde_json::from_str(
            r#"{"propertyId": 3, "startDate": "2024-06-01", "endDate": "2024/06/05"}"#,
        )
        .unwrap();
        assert_eq!(req.property_id, 3);
        assert!(req.guest_username.is_none());
        assert_eq!(req.start_date, date(2024, 6, 1));
        assert_eq!(req.end_date, date(2024, 6, 5));
    }

    /// File-backed pool with several connections, a host, a guest and
    /// `count` properties.
    async fn setup_concurrent(label: &str, count: usize) -> (SqlitePool, Vec<i64>, std::path::PathBuf) {
        let (db, dir) = file_pool(label, 8).await;
        User::register(&db, &register_request("host"), false).await.unwrap();
        User::register(&db, &register_request("guest"), false).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..count {
            let property = Property::create(
                &db,
                &new_property(&format!("Home {}", i), &format!("{} Oak St", i), 100, "host"),
            )
            .await
            .unwrap();
            ids.push(property.id);
        }
        (db, ids, dir)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_disjoint_bookings_all_succeed() {
        let (db, ids, dir) = setup_concurrent("disjoint", 8).await;

        for round in 0..5u64 {
            let start = date(2024, 1, 1) + chrono::Days::new(round * 3);
            let end = start + chrono::Days::new(1);

            let handles: Vec<_> = ids
                .iter()
                .map(|&property_id| {
                    let db = db.clone();
                    tokio::spawn(async move {
                        Booking::create(&db, &booking(property_id, start, end)).await
                    })
                })
                .collect();

            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        }

        assert_eq!(Booking::list(&db).await.unwrap().len(), 40);
        db.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_bookings_admit_exactly_one() {
        let (db, ids, dir) = setup_concurrent("overlap", 1).await;
        let property_id = ids[0];

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    Booking::create(
                        &db,
                        &booking(property_id, date(2024, 6, 1), date(2024, 6, 5)),
                    )
                    .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(DbError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(Booking::list(&db).await.unwrap().len(), 1);
        db.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}
