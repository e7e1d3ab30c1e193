//! Vending-machine handlers: list, detail, create (multipart), edit.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Serialize;
use vendmap_core::{decode_items, serialize_items, Coordinates, DecodedItems, MachineUpdate};
use vendmap_db::{MachineRow, NewMachineRow};

use crate::middleware::RequestId;
use crate::storage::StorageError;

use super::{map_db_error, ApiError, AppState};

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Wire shape of a machine. Coordinates are emitted as decimal strings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct MachineResponse {
    pub id: i64,
    pub lat: Decimal,
    pub lon: Decimal,
    pub location: String,
    pub desc: String,
    pub available: bool,
    pub items: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MachineRow> for MachineResponse {
    fn from(row: MachineRow) -> Self {
        Self {
            id: row.id,
            lat: row.lat,
            lon: row.lon,
            location: row.location,
            desc: row.description,
            available: row.available,
            items: row.items,
            image_url: row.image_url,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Multipart form
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CreateMachineForm {
    lat: Option<String>,
    lon: Option<String>,
    location: Option<String>,
    desc: Option<String>,
    available: Option<String>,
    items: Option<String>,
    image: Option<(Option<String>, Bytes)>,
}

/// Validated create payload, still holding the raw image part.
#[derive(Debug)]
struct ValidatedCreate {
    lat: Decimal,
    lon: Decimal,
    location: String,
    desc: String,
    available: bool,
    items: String,
    image: Option<(Option<String>, Bytes)>,
}

async fn read_form(rid: &str, mut multipart: Multipart) -> Result<CreateMachineForm, ApiError> {
    let mut form = CreateMachineForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::new(rid, "bad_request", format!("invalid multipart body: {e}"))
    })? {
        let name = field.name().unwrap_or_default().to_owned();

        if name == "image" {
            let file_name = field.file_name().map(ToOwned::to_owned);
            let data = field.bytes().await.map_err(|e| {
                ApiError::new(rid, "bad_request", format!("failed to read image: {e}"))
            })?;
            // Browsers send an empty part when the file input is left blank.
            if !data.is_empty() {
                form.image = Some((file_name, data));
            }
            continue;
        }

        let value = field.text().await.map_err(|e| {
            ApiError::new(rid, "bad_request", format!("failed to read field '{name}': {e}"))
        })?;
        let slot = match name.as_str() {
            "lat" => &mut form.lat,
            "lon" => &mut form.lon,
            "location" => &mut form.location,
            "desc" => &mut form.desc,
            "available" => &mut form.available,
            "items" => &mut form.items,
            other => {
                tracing::debug!(field = %other, "ignoring unknown multipart field");
                continue;
            }
        };
        *slot = Some(value);
    }

    Ok(form)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_coordinate(rid: &str, field: &str, raw: &str) -> Result<Decimal, ApiError> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|_| ApiError::new(rid, "validation_error", format!("{field} must be a number")))
}

fn parse_available(rid: &str, raw: Option<&str>) -> Result<bool, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("on") => {
            Ok(true)
        }
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" || v.eq_ignore_ascii_case("off") => {
            Ok(false)
        }
        Some(v) => Err(ApiError::new(
            rid,
            "validation_error",
            format!("available must be true or false, got '{v}'"),
        )),
    }
}

fn validate_form(rid: &str, form: CreateMachineForm) -> Result<ValidatedCreate, ApiError> {
    let (Some(lat), Some(lon), Some(location), Some(desc), Some(items)) = (
        non_blank(form.lat),
        non_blank(form.lon),
        non_blank(form.location),
        non_blank(form.desc),
        non_blank(form.items),
    ) else {
        return Err(ApiError::new(rid, "bad_request", "Missing required fields"));
    };

    let lat = parse_coordinate(rid, "lat", &lat)?;
    let lon = parse_coordinate(rid, "lon", &lon)?;
    let in_range = Coordinates::new(
        lat.to_f64().unwrap_or(f64::NAN),
        lon.to_f64().unwrap_or(f64::NAN),
    )
    .is_in_range();
    if !in_range {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("coordinates out of range: ({lat}, {lon})"),
        ));
    }

    let available = parse_available(rid, form.available.as_deref())?;

    Ok(ValidatedCreate {
        lat,
        lon,
        location: location.trim().to_owned(),
        desc: desc.trim().to_owned(),
        available,
        items,
        image: form.image,
    })
}

fn map_storage_error(rid: &str, error: &StorageError) -> ApiError {
    match error {
        StorageError::TooLarge { .. } => ApiError::new(rid, "payload_too_large", error.to_string()),
        StorageError::Empty | StorageError::UnsupportedFormat(_) => {
            ApiError::new(rid, "validation_error", error.to_string())
        }
        StorageError::Io(e) => {
            tracing::error!(error = %e, "failed to store image");
            ApiError::internal(rid)
        }
    }
}

fn parse_id(rid: &str, raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::new(rid, "bad_request", "Invalid ID"))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/vending-machine: every machine, ordered by id.
pub(in crate::api) async fn list_machines(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<MachineResponse>>, ApiError> {
    let rows = vendmap_db::list_machines(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0, &e))?;

    Ok(Json(rows.into_iter().map(MachineResponse::from).collect()))
}

/// GET /api/vending-machine/{id}
pub(in crate::api) async fn get_machine(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<MachineResponse>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = vendmap_db::get_machine(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "Not found"))?;

    Ok(Json(MachineResponse::from(row)))
}

/// POST /api/vending-machine: multipart create with an optional `image` part.
pub(in crate::api) async fn create_machine(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MachineResponse>), ApiError> {
    let rid = &req_id.0;
    let form = read_form(rid, multipart).await?;
    let create = validate_form(rid, form)?;

    if matches!(decode_items(&create.items), DecodedItems::Unparseable) {
        tracing::warn!(
            location = %create.location,
            "storing machine with undecodable items payload"
        );
    }

    let stored = match &create.image {
        Some((file_name, data)) => Some(
            state
                .images
                .store(file_name.as_deref(), data)
                .await
                .map_err(|e| map_storage_error(rid, &e))?,
        ),
        None => None,
    };

    let inserted = vendmap_db::create_machine(
        &state.pool,
        &NewMachineRow {
            lat: create.lat,
            lon: create.lon,
            location: &create.location,
            description: &create.desc,
            available: create.available,
            items: &create.items,
            image_url: stored.as_ref().map(|image| image.url.as_str()),
        },
    )
    .await;
    let row = match inserted {
        Ok(row) => row,
        Err(e) => {
            if let Some(image) = &stored {
                if let Err(cleanup) = state.images.discard(image).await {
                    tracing::warn!(
                        file = %image.file_name,
                        error = %cleanup,
                        "failed to remove image for unsaved machine"
                    );
                }
            }
            return Err(map_db_error(rid.clone(), &e));
        }
    };

    tracing::info!(id = row.id, location = %row.location, "vending machine created");
    Ok((StatusCode::CREATED, Json(MachineResponse::from(row))))
}

/// PATCH /api/vending-machine/{id}: replace `items` and/or `available`.
pub(in crate::api) async fn update_machine(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<Json<MachineUpdate>, JsonRejection>,
) -> Result<Json<MachineResponse>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;
    let Json(update) = body.map_err(|e| ApiError::new(rid, "bad_request", e.body_text()))?;

    if update.is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "at least one of items or available is required",
        ));
    }

    let items = update.items.as_deref().map(serialize_items);
    let row = vendmap_db::update_machine(&state.pool, id, items.as_deref(), update.available)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "Not found"))?;

    tracing::info!(id = row.id, "vending machine updated");
    Ok(Json(MachineResponse::from(row)))
}
