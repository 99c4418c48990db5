//! Route handlers. Each one is a thin call into `coursemap_core::query`.

use std::collections::HashSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Deserialize;

use coursemap_core::query;
use coursemap_core::{CourseDetail, MajorRequirements};
use coursemap_shared::{CourseMapError, Major};
use coursemap_storage::Storage;

use crate::error::ApiError;

pub(crate) type AppState = Arc<Storage>;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

pub(crate) async fn list_majors(State(storage): State<AppState>) -> ApiResult<Vec<Major>> {
    Ok(Json(query::list_majors(&storage).await?))
}

/// Non-numeric ids are treated like unknown ones.
pub(crate) async fn major_requirements(
    State(storage): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<MajorRequirements> {
    let id: i64 = id
        .parse()
        .map_err(|_| CourseMapError::not_found("Major"))?;
    Ok(Json(query::get_major_requirements(&storage, id).await?))
}

pub(crate) async fn list_courses(State(storage): State<AppState>) -> ApiResult<Vec<CourseDetail>> {
    Ok(Json(query::list_courses(&storage).await?))
}

pub(crate) async fn get_course(
    State(storage): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<CourseDetail> {
    Ok(Json(query::get_course(&storage, &code).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct EligibleRequest {
    #[serde(default)]
    completed: Vec<String>,
}

/// Body rejections are answered as JSON like every other error.
pub(crate) async fn eligible_courses(
    State(storage): State<AppState>,
    body: std::result::Result<Json<EligibleRequest>, JsonRejection>,
) -> ApiResult<Vec<CourseDetail>> {
    let Json(body) = body?;
    let completed: HashSet<String> = body.completed.into_iter().collect();
    Ok(Json(query::get_eligible_courses(&storage, &completed).await?))
}
