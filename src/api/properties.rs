//! Property endpoints: multipart creation with image upload, filtered
//! listing, lookup, partial update and deletion.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{parse_price, validate_property_fields, validate_property_update};
use crate::db::{
    Image, NewProperty, Property, PropertyDetail, PropertyFilter, UpdatePropertyRequest, User,
};
use crate::storage::{content_type_for, image_key, ObjectStore};
use crate::AppState;

/// Multipart field carrying image files
const IMAGES_FIELD: &str = "images";

/// A property as returned by the API: the stored record plus a public URL
/// for each image key, in the same order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResponse {
    #[serde(flatten)]
    pub property: PropertyDetail,
    pub image_urls: Vec<String>,
}

impl PropertyResponse {
    fn new(property: PropertyDetail, store: &dyn ObjectStore) -> Self {
        let image_urls = property.images.iter().map(|key| store.public_url(key)).collect();
        Self {
            property,
            image_urls,
        }
    }
}

#[derive(Debug)]
struct UploadedImage {
    filename: String,
    content_type: Option<String>,
    body: Bytes,
}

/// Raw multipart fields of a create request
#[derive(Debug, Default)]
struct PropertyForm {
    title: Option<String>,
    address: Option<String>,
    description: Option<String>,
    price: Option<String>,
    images: Vec<UploadedImage>,
}

impl PropertyForm {
    async fn read(multipart: &mut Multipart, max_images: usize) -> Result<Self, ApiError> {
        let mut form = PropertyForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = Some(field.text().await?),
                "address" => form.address = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                "price" => form.price = Some(field.text().await?),
                IMAGES_FIELD => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let body = field.bytes().await?;

                    // Browsers send an empty part when no file was picked
                    if filename.is_empty() && body.is_empty() {
                        continue;
                    }
                    if form.images.len() == max_images {
                        return Err(ApiError::bad_request(format!(
                            "Too many images (max {})",
                            max_images
                        )));
                    }
                    form.images.push(UploadedImage {
                        filename,
                        content_type,
                        body,
                    });
                }
                other => {
                    return Err(ApiError::bad_request(format!("Unexpected field: {}", other)));
                }
            }
        }

        Ok(form)
    }

    fn into_new_property(self, owner: &str) -> Result<(NewProperty, Vec<UploadedImage>), ApiError> {
        let title = self.title.unwrap_or_default().trim().to_string();
        let address = self.address.unwrap_or_default().trim().to_string();
        let description = self.description.unwrap_or_default().trim().to_string();

        let mut errors = ValidationErrorBuilder::new();
        validate_property_fields(&mut errors, &title, &address, &description);

        let price = match self.price.as_deref().map(parse_price) {
            Some(Ok(price)) => Some(price),
            Some(Err(e)) => {
                errors.add("price", e);
                None
            }
            None => {
                errors.add("price", "Price is required");
                None
            }
        };
        errors.finish()?;
        let price = price.ok_or_else(|| ApiError::validation_field("price", "Price is required"))?;

        let property = NewProperty {
            title,
            address,
            description,
            price,
            owner: owner.to_string(),
        };
        Ok((property, self.images))
    }
}

/// Reserve a key for one image, then upload it.
///
/// The key is reserved in the database before anything is written to the
/// bucket, so a colliding key never overwrites another property's object.
/// Any failure is logged and yields `None`, and a reservation whose upload
/// failed is released. The property keeps the images that made it.
async fn store_image(
    state: &AppState,
    property_id: i64,
    timestamp_ms: i64,
    index: usize,
    image: UploadedImage,
) -> Option<String> {
    let key = image_key(&image.filename, timestamp_ms, index);

    if let Err(e) = Image::create(&state.db, &key, property_id).await {
        warn!(property_id, key = %key, "Image key unavailable, skipping: {}", e);
        return None;
    }

    let content_type = content_type_for(&image.filename, image.content_type.as_deref());
    if let Err(e) = state.storage.put_object(&key, image.body, &content_type).await {
        warn!(property_id, key = %key, "Image upload failed, skipping: {}", e);
        if let Err(e) = Image::remove(&state.db, &key).await {
            warn!(property_id, key = %key, "Failed to release image key: {}", e);
        }
        return None;
    }

    Some(key)
}

/// Store all images of one upload concurrently and return how many made it.
async fn attach_images(
    state: &AppState,
    property_id: i64,
    timestamp_ms: i64,
    images: Vec<UploadedImage>,
) -> usize {
    join_all(
        images
            .into_iter()
            .enumerate()
            .map(|(index, image)| store_image(state, property_id, timestamp_ms, index, image)),
    )
    .await
    .into_iter()
    .flatten()
    .count()
}

/// POST /properties
pub async fn create_property(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let form = PropertyForm::read(&mut multipart, state.config.storage.max_images).await?;
    let (new_property, images) = form.into_new_property(&auth.username)?;

    // The token may outlive the account
    User::get(&state.db, &auth.username).await?;

    let created = Property::create(&state.db, &new_property).await?;
    let submitted = images.len();

    let timestamp_ms = chrono::Utc::now().timestamp_millis();
    let stored = attach_images(&state, created.id, timestamp_ms, images).await;

    let property = Property::get(&state.db, created.id).await?;
    info!(
        property_id = property.id,
        owner = %property.owner,
        images = stored,
        submitted,
        "Property created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "property": PropertyResponse::new(property, state.storage.as_ref()) })),
    ))
}

/// GET /properties?minPrice=&maxPrice=&titleLike=
pub async fn list_properties(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PropertyFilter>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(filter) = query?;

    let properties: Vec<PropertyResponse> = Property::find_all(&state.db, &filter)
        .await?
        .into_iter()
        .map(|p| PropertyResponse::new(p, state.storage.as_ref()))
        .collect();

    Ok(Json(json!({ "properties": properties })))
}

/// GET /properties/:id
pub async fn get_property(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = path?;
    let property = Property::get(&state.db, id).await?;
    Ok(Json(json!({ "property": PropertyResponse::new(property, state.storage.as_ref()) })))
}

/// PATCH /properties/:id
pub async fn update_property(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdatePropertyRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = path?;
    let Json(req) = payload?;

    let existing = Property::get(&state.db, id).await?;
    auth.ensure_self_or_admin(&existing.owner)?;
    validate_property_update(&req)?;

    let property = Property::update(&state.db, id, &req).await?;
    info!(property_id = id, by = %auth.username, "Property updated");

    Ok(Json(json!({ "property": PropertyResponse::new(property, state.storage.as_ref()) })))
}

/// DELETE /properties/:id
///
/// Stored image objects are left in the bucket.
pub async fn delete_property(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = path?;
    let existing = Property::get(&state.db, id).await?;
    auth.ensure_self_or_admin(&existing.owner)?;

    Property::remove(&state.db, id).await?;
    info!(property_id = id, by = %auth.username, "Property deleted");

    Ok(Json(json!({ "deleted": id })))
}
