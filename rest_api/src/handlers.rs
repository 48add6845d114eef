// rest_api/src/handlers.rs

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use lib::Caller;
use models::medical::{Login, NewFacility, NewPatient, NewStaff, Patient, PatientUpdate, PublicPatient, UserView};
use models::{PatientId, PortalError};
use security::{Claims, CurrentUser, Permission};

use crate::{AppState, RestApiError};

type ApiResult<T> = Result<T, RestApiError>;

fn caller(claims: &Claims) -> Caller {
    Caller { user_id: claims.sub, role: claims.role, facility_id: claims.facility_id }
}

// Unparseable ids cannot name a stored record, so they read as absent.
fn record_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| PortalError::not_found(what).into())
}

fn patient_id(raw: String) -> ApiResult<PatientId> {
    PatientId::new(raw).map_err(|_| PortalError::not_found("Patient").into())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Login>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(login) = payload?;
    let user = state.db.authenticate(login).await?;
    let token = state.keys.issue(&user)?;
    Ok(Json(json!({ "user": user.view(), "token": token })))
}

// --- admin ---

pub async fn register_facility(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    payload: Result<Json<NewFacility>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    state.roles.authorize(&claims, Permission::RegisterFacility)?;
    let Json(form) = payload?;
    let (facility, admin) = state.db.register_facility(form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "facility": facility,
            "admin": { "id": admin.id, "email": admin.email, "username": admin.username },
        })),
    ))
}

pub async fn list_facilities(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> ApiResult<Json<Value>> {
    state.roles.authorize(&claims, Permission::ListFacilities)?;
    let facilities = state.db.list_facilities().await?;
    Ok(Json(json!(facilities)))
}

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> ApiResult<Json<Vec<UserView>>> {
    state.roles.authorize(&claims, Permission::ListUsers)?;
    Ok(Json(state.db.list_users().await?))
}

pub async fn delete_facility(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.roles.authorize(&claims, Permission::DeleteFacility)?;
    let removed = state.db.delete_facility(record_id(&id, "Facility")?).await?;
    Ok(Json(json!({
        "message": "Facility and associated users deleted",
        "deletedUsers": removed.len(),
    })))
}

// --- facility ---

pub async fn get_facility(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.roles.authorize(&claims, Permission::ViewFacility)?;
    let facility = state.db.get_facility(&caller(&claims), record_id(&id, "Facility")?).await?;
    Ok(Json(json!({ "facility": facility })))
}

pub async fn list_staff(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(facility_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.roles.authorize(&claims, Permission::ListStaff)?;
    let staff = state.db.list_staff(&caller(&claims), record_id(&facility_id, "Facility")?).await?;
    Ok(Json(json!({ "staff": staff })))
}

pub async fn register_staff(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    payload: Result<Json<NewStaff>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    state.roles.authorize(&claims, Permission::RegisterStaff)?;
    let Json(form) = payload?;
    let staff = state.db.register_staff(&caller(&claims), form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Staff registered successfully", "staff": staff.view() })),
    ))
}

pub async fn delete_staff(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.roles.authorize(&claims, Permission::DeleteStaff)?;
    let removed = state.db.delete_staff(&caller(&claims), record_id(&id, "Staff member")?).await?;
    Ok(Json(json!({ "message": "Staff deleted", "staff": removed.view() })))
}

// --- patients ---

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    search: Option<String>,
}

pub async fn register_patient(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    payload: Result<Json<NewPatient>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    state.roles.authorize(&claims, Permission::RegisterPatient)?;
    let Json(form) = payload?;
    let patient = state.db.register_patient(&caller(&claims), form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Patient registered successfully", "patient": patient })),
    ))
}

pub async fn search_patients(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Patient>>> {
    state.roles.authorize(&claims, Permission::SearchPatients)?;
    let term = params.search.unwrap_or_default();
    Ok(Json(state.db.search_patients(&term).await?))
}

pub async fn get_patient(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Patient>> {
    state.roles.authorize(&claims, Permission::ViewPatient)?;
    Ok(Json(state.db.get_patient(&patient_id(id)?).await?))
}

pub async fn update_patient(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<PatientUpdate>, JsonRejection>,
) -> ApiResult<Json<Patient>> {
    state.roles.authorize(&claims, Permission::UpdatePatient)?;
    let Json(update) = payload?;
    Ok(Json(state.db.update_patient(&patient_id(id)?, update).await?))
}

pub async fn dispense_medication(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path((id, med_name)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    state.roles.authorize(&claims, Permission::DispenseMedication)?;
    let medication = state.db.dispense_medication(&patient_id(id)?, &med_name).await?;
    Ok(Json(json!({ "message": "Medication dispensed", "medication": medication })))
}

/// The QR-code card. Needs no token.
pub async fn public_patient(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<PublicPatient>> {
    Ok(Json(state.db.public_patient(&patient_id(id)?).await?))
}
