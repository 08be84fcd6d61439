use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

use dojo::model::{AccountSummary, Profile, StudentKey, StudentRecord};
use dojo::month::Month;
use dojo::remote::{CardCheckout, PaymentStatus, PixCharge};

use crate::{
    error::AppError,
    search::{self, MeiliStudent},
    state::AppState,
    utils::{identity_from_headers, require_admin, require_known_student},
};

pub async fn roster_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<StudentRecord>>, AppError> {
    require_admin(&headers)?;

    Ok(Json(state.roster.read().unwrap().clone()))
}

#[derive(Deserialize)]
pub struct SearchParams {
    q: String,
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<MeiliStudent>>, AppError> {
    require_admin(&headers)?;

    let Some(meili_client) = &state.meili_client else {
        return Ok(Json(Vec::new()));
    };

    let hits = search::search_students(meili_client, &params.q)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    // the index is upsert-only; drop hits that have left the roster
    let roster = state.roster.read().unwrap();
    let hits = hits
        .into_iter()
        .filter(|hit| roster.iter().any(|r| r.key.as_str() == hit.key))
        .collect();

    Ok(Json(hits))
}

#[derive(Serialize)]
pub struct AccountsResponse {
    pub accounts: Vec<AccountSummary>,
    pub active: StudentKey,
    pub needs_choice: bool,
}

pub async fn accounts_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AccountsResponse>, AppError> {
    let identity = identity_from_headers(&headers)?;

    let session = state.resolver.resolve(&identity).await;

    Ok(Json(AccountsResponse {
        accounts: session.accounts,
        active: session.active,
        needs_choice: session.needs_choice,
    }))
}

#[derive(Deserialize)]
pub struct SwitchRequest {
    key: StudentKey,
}

pub async fn switch_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SwitchRequest>,
) -> Result<Json<AccountsResponse>, AppError> {
    let identity = identity_from_headers(&headers)?;

    let mut session = state.resolver.resolve(&identity).await;
    state
        .resolver
        .switch(&mut session, payload.key)
        .await
        .map_err(|_| AppError::UnknownStudent)?;

    Ok(Json(AccountsResponse {
        accounts: session.accounts,
        active: session.active,
        needs_choice: session.needs_choice,
    }))
}

pub async fn create_student_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(profile): Json<Profile>,
) -> Result<Json<StudentKey>, AppError> {
    require_admin(&headers)?;

    if profile.full_name.trim().is_empty() {
        return Err(AppError::MalformedPayload);
    }

    Ok(Json(state.store.create_student(profile)))
}

pub async fn upsert_profile_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(profile): Json<Profile>,
) -> Result<StatusCode, AppError> {
    require_admin(&headers)?;

    if profile.full_name.trim().is_empty() {
        return Err(AppError::MalformedPayload);
    }

    let key = StudentKey::new(key);
    require_known_student(&state, &key)?;
    state.store.put_profile(key, profile);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_student_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    require_admin(&headers)?;

    let key = StudentKey::new(key);
    require_known_student(&state, &key)?;
    state.store.remove_profile(&key);
    state.store.remove_student(&key);

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ChargeParams {
    student: StudentKey,
    month: Month,
}

pub async fn pix_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(params): Json<ChargeParams>,
) -> Result<Json<PixCharge>, AppError> {
    identity_from_headers(&headers)?;
    require_known_student(&state, &params.student)?;

    state
        .payments
        .create_pix(&params.student, params.month)
        .await
        .map(Json)
        .map_err(|e| AppError::Upstream(e.to_string()))
}

pub async fn card_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(params): Json<ChargeParams>,
) -> Result<Json<CardCheckout>, AppError> {
    identity_from_headers(&headers)?;
    require_known_student(&state, &params.student)?;

    state
        .payments
        .create_card(&params.student, params.month)
        .await
        .map(Json)
        .map_err(|e| AppError::Upstream(e.to_string()))
}

#[derive(Serialize)]
pub struct StatusBody {
    pub status: PaymentStatus,
}

pub async fn payment_status_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ChargeParams>,
) -> Result<Json<StatusBody>, AppError> {
    identity_from_headers(&headers)?;
    require_known_student(&state, &params.student)?;

    let status = state
        .payments
        .status(&params.student, params.month)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    Ok(Json(StatusBody { status }))
}

#[derive(Deserialize)]
pub struct RecalculateParams {
    from: Month,
}

#[derive(Serialize)]
pub struct RecalculateBody {
    pub updated: u64,
}

pub async fn recalculate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(params): Json<RecalculateParams>,
) -> Result<Json<RecalculateBody>, AppError> {
    require_admin(&headers)?;

    let updated = state
        .billing
        .recalculate_from(params.from)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    Ok(Json(RecalculateBody { updated }))
}
