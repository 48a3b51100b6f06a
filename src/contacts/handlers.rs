use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::CurrentUser,
    contacts::{
        birthdays::{self, MAX_WINDOW_DAYS},
        dto::{ContactModel, ContactResponse, ContactSearch, Pagination},
        repo_types::Contact,
    },
    error::{is_unique_violation, ApiError, ApiResult},
    rate_limit::{limited, RateLimit},
    state::AppState,
};

const NOT_FOUND: &str = "Contact not found";
const DUPLICATE: &str = "The contact's email and/or phone already exist";

pub fn router(state: &AppState) -> Router<AppState> {
    use RateLimit as L;

    Router::new()
        .route(
            "/contacts",
            limited(get(list_contacts), state, "contacts:list", L::ONE_PER_SECOND),
        )
        .route(
            "/contacts",
            limited(post(create_contact), state, "contacts:create", L::TWO_PER_FIVE_SECONDS),
        )
        .route(
            "/contacts/birthdays/:n",
            limited(get(upcoming_birthdays), state, "contacts:birthdays", L::ONE_PER_SECOND),
        )
        .route(
            "/contacts/:id",
            limited(get(read_contact), state, "contacts:read", L::ONE_PER_SECOND),
        )
        .route(
            "/contacts/:id",
            limited(put(update_contact), state, "contacts:update", L::TWO_PER_FIVE_SECONDS),
        )
        .route(
            "/contacts/:id",
            limited(delete(delete_contact), state, "contacts:delete", L::TWO_PER_FIVE_SECONDS),
        )
}

fn duplicate_or_internal(e: anyhow::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::conflict(DUPLICATE)
    } else {
        ApiError::Internal(e)
    }
}

fn responses(contacts: Vec<Contact>) -> Json<Vec<ContactResponse>> {
    Json(contacts.into_iter().map(ContactResponse::from).collect())
}

/// GET /contacts?offset&limit&first_name&last_name&email
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_contacts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(search): Query<ContactSearch>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let page = search.pagination();
    page.validate()?;
    let contacts = Contact::search(&state.db, user.id, &search.filter(), page.offset, page.limit).await?;
    Ok(responses(contacts))
}

/// GET /contacts/birthdays/:n?offset&limit
#[instrument(skip_all, fields(user_id = %user.id, %n))]
pub async fn upcoming_birthdays(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(n): Path<i64>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let window = u16::try_from(n)
        .ok()
        .filter(|n| (1..=MAX_WINDOW_DAYS).contains(n))
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "Number of days must be between 1 and {}",
                MAX_WINDOW_DAYS
            ))
        })?;
    page.validate()?;

    let contacts = Contact::list_all(&state.db, user.id).await?;
    let today = OffsetDateTime::now_utc().date();
    let ranked = birthdays::upcoming(contacts, |c| c.birthday, today, window);
    let found = birthdays::paginate(ranked, page.offset as usize, page.limit as usize);
    Ok(responses(found))
}

#[instrument(skip_all, fields(user_id = %user.id, %id))]
pub async fn read_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContactResponse>> {
    let contact = Contact::find(&state.db, user.id, id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Json(contact.into()))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ContactModel>,
) -> ApiResult<(StatusCode, Json<ContactResponse>)> {
    let fields = payload.into_fields()?;
    let contact = Contact::create(&state.db, user.id, &fields)
        .await
        .map_err(duplicate_or_internal)?;
    info!(contact_id = %contact.id, "contact created");
    Ok((StatusCode::CREATED, Json(contact.into())))
}

#[instrument(skip_all, fields(user_id = %user.id, %id))]
pub async fn update_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ContactModel>,
) -> ApiResult<Json<ContactResponse>> {
    let fields = payload.into_fields()?;
    let contact = Contact::update(&state.db, user.id, id, &fields)
        .await
        .map_err(duplicate_or_internal)?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    info!("contact updated");
    Ok(Json(contact.into()))
}

#[instrument(skip_all, fields(user_id = %user.id, %id))]
pub async fn delete_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContactResponse>> {
    let contact = Contact::delete(&state.db, user.id, id).await?.ok_or_else(|| {
        warn!("delete of missing contact");
        ApiError::not_found(NOT_FOUND)
    })?;
    info!("contact deleted");
    Ok(Json(contact.into()))
}
