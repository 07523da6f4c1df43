//! Property models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::image::Image;
use crate::db::error::{is_unique_violation, DbError, DbResult};
use crate::db::sql::{partial_update, PropertyFilter, SqlValue};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: i64,
    pub title: String,
    pub address: String,
    pub description: String,
    /// Price per night in whole currency units
    pub price: i64,
    pub owner: String,
}

/// A property and the storage keys of its images, ordered by key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetail {
    pub id: i64,
    pub title: String,
    pub address: String,
    pub description: String,
    pub price: i64,
    pub owner: String,
    pub images: Vec<String>,
}

impl PropertyDetail {
    pub fn new(property: Property, images: Vec<String>) -> Self {
        Self {
            id: property.id,
            title: property.title,
            address: property.address,
            description: property.description,
            price: property.price,
            owner: property.owner,
            images,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProperty {
    pub title: String,
    pub address: String,
    pub description: String,
    pub price: i64,
    pub owner: String,
}

/// Partial update; only fields that are present are changed
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePropertyRequest {
    pub title: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
}

/// One row of the properties/images outer join
#[derive(Debug, FromRow)]
struct PropertyImageRow {
    id: i64,
    title: String,
    address: String,
    description: String,
    price: i64,
    owner: String,
    image_key: Option<String>,
}

const PROPERTY_COLUMNS: &str = "id, title, address, description, price, owner";

impl Property {
    /// Insert a new property.
    ///
    /// Fails with `Conflict` if a property already exists at the address.
    pub async fn create(db: &SqlitePool, new: &NewProperty) -> DbResult<PropertyDetail> {
        let duplicate: Option<(String,)> =
            sqlx::query_as("SELECT address FROM properties WHERE address = ?")
                .bind(&new.address)
                .fetch_optional(db)
                .await?;

        if duplicate.is_some() {
            return Err(duplicate_address(&new.address));
        }

        let property = sqlx::query_as::<_, Property>(&format!(
            r#"
            INSERT INTO properties (title, address, description, price, owner)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            PROPERTY_COLUMNS
        ))
        .bind(&new.title)
        .bind(&new.address)
        .bind(&new.description)
        .bind(new.price)
        .bind(&new.owner)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_address(&new.address)
            } else {
                DbError::Database(e)
            }
        })?;

        Ok(PropertyDetail::new(property, Vec::new()))
    }

    /// List properties matching `filter`, each with its image keys, ordered by title.
    pub async fn find_all(
        db: &SqlitePool,
        filter: &PropertyFilter,
    ) -> DbResult<Vec<PropertyDetail>> {
        let predicate = filter.build()?;

        let sql = format!(
            r#"
            SELECT p.id, p.title, p.address, p.description, p.price, p.owner,
                   i.key AS image_key
            FROM properties AS p
            LEFT JOIN images AS i ON i.property_id = p.id
            {}
            ORDER BY p.title, p.id, i.key
            "#,
            predicate.clause
        );

        let mut query = sqlx::query_as::<_, PropertyImageRow>(&sql);
        for value in &predicate.values {
            query = match value {
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::Text(s) => query.bind(s.clone()),
            };
        }

        let rows = query.fetch_all(db).await?;
        Ok(group_rows(rows))
    }

    /// Properties owned by `owner`, ordered by title
    pub async fn list_for_owner(db: &SqlitePool, owner: &str) -> DbResult<Vec<Property>> {
        let properties = sqlx::query_as::<_, Property>(&format!(
            "SELECT {} FROM properties WHERE owner = ? ORDER BY title, id",
            PROPERTY_COLUMNS
        ))
        .bind(owner)
        .fetch_all(db)
        .await?;

        Ok(properties)
    }

    pub async fn find(db: &SqlitePool, id: i64) -> DbResult<Option<Property>> {
        let property = sqlx::query_as::<_, Property>(&format!(
            "SELECT {} FROM properties WHERE id = ?",
            PROPERTY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;

        Ok(property)
    }

    /// Get a property with its image keys, failing with `NotFound`.
    pub async fn get(db: &SqlitePool, id: i64) -> DbResult<PropertyDetail> {
        let property = Self::find(db, id).await?.ok_or_else(|| not_found(id))?;
        let images = Image::keys_for_property(db, id).await?;

        Ok(PropertyDetail::new(property, images))
    }

    /// Apply a partial update and return the full updated record.
    pub async fn update(
        db: &SqlitePool,
        id: i64,
        req: &UpdatePropertyRequest,
    ) -> DbResult<PropertyDetail> {
        let mut fields = Vec::new();
        if let Some(title) = &req.title {
            fields.push(("title", SqlValue::Text(title.clone())));
        }
        if let Some(address) = &req.address {
            fields.push(("address", SqlValue::Text(address.clone())));
        }
        if let Some(description) = &req.description {
            fields.push(("description", SqlValue::Text(description.clone())));
        }
        if let Some(price) = req.price {
            fields.push(("price", SqlValue::Int(price)));
        }

        let (set_clause, values) = partial_update(fields)?;
        let sql = format!(
            "UPDATE properties SET {} WHERE id = ${} RETURNING {}",
            set_clause,
            values.len() + 1,
            PROPERTY_COLUMNS
        );

        let mut query = sqlx::query_as::<_, Property>(&sql);
        for value in &values {
            query = match value {
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::Text(s) => query.bind(s.clone()),
            };
        }

        let property = query
            .bind(id)
            .fetch_optional(db)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DbError::Conflict(format!(
                        "Duplicate property: {}",
                        req.address.as_deref().unwrap_or_default()
                    ))
                } else {
                    DbError::Database(e)
                }
            })?
            .ok_or_else(|| not_found(id))?;

        let images = Image::keys_for_property(db, id).await?;
        Ok(PropertyDetail::new(property, images))
    }

    /// Delete a property; its images and bookings go with it.
    pub async fn remove(db: &SqlitePool, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM properties WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}

/// Collapse joined rows (ordered by property) into one entry per property.
fn group_rows(rows: Vec<PropertyImageRow>) -> Vec<PropertyDetail> {
    let mut properties: Vec<PropertyDetail> = Vec::new();

    for row in rows {
        match properties.last_mut() {
            Some(last) if last.id == row.id => {
                if let Some(key) = row.image_key {
                    last.images.push(key);
                }
            }
            _ => properties.push(PropertyDetail {
                id: row.id,
                title: row.title,
                address: row.address,
                description: row.description,
                price: row.price,
                owner: row.owner,
                images: row.image_key.into_iter().collect(),
            }),
        }
    }

    properties
}

fn not_found(id: i64) -> DbError {
    DbError::NotFound(format!("No property: {}", id))
}

fn duplicate_address(address: &str) -> DbError {
    DbError::Conflict(format!("Duplicate property: {}", address))
}
