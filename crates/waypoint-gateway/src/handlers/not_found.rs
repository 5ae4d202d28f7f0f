use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use waypoint_admin::{AdminError, Conversion};
use waypoint_core::{NotFoundId, NotFoundQuery, NotFoundRecord, NotFoundStatus, Page};

use crate::error::Result;
use crate::model::{BulkResponse, ConvertRequest, NotFoundBulkAction, NotFoundBulkRequest};
use crate::state::{AppState, Store};

pub async fn list_not_found_handler<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<NotFoundQuery>,
) -> Result<Json<Page<NotFoundRecord>>> {
    Ok(Json(state.admin().list_not_found(&query).await?))
}

pub async fn get_not_found_handler<S: Store>(
    Path(id): Path<NotFoundId>,
    State(state): State<AppState<S>>,
) -> Result<Json<NotFoundRecord>> {
    Ok(Json(state.admin().get_not_found(id).await?))
}

pub async fn delete_not_found_handler<S: Store>(
    Path(id): Path<NotFoundId>,
    State(state): State<AppState<S>>,
) -> Result<StatusCode> {
    if state.admin().delete_not_found(&[id]).await? == 0 {
        return Err(AdminError::NotFound(format!("404 record {id}")).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn convert_not_found_handler<S: Store>(
    Path(id): Path<NotFoundId>,
    State(state): State<AppState<S>>,
    Json(request): Json<ConvertRequest>,
) -> Result<(StatusCode, Json<Conversion>)> {
    let conversion = state
        .admin()
        .convert_not_found(id, request.destination)
        .await?;
    Ok((StatusCode::CREATED, Json(conversion)))
}

pub async fn bulk_not_found_handler<S: Store>(
    State(state): State<AppState<S>>,
    Json(request): Json<NotFoundBulkRequest>,
) -> Result<Json<BulkResponse>> {
    let admin = state.admin();
    let affected = match request.action {
        NotFoundBulkAction::Ignore => admin.ignore_not_found(&request.ids).await?,
        NotFoundBulkAction::Restore => {
            admin
                .set_not_found_status(&request.ids, NotFoundStatus::New)
                .await?
        }
        NotFoundBulkAction::Delete => admin.delete_not_found(&request.ids).await?,
    };
    Ok(Json(BulkResponse { affected }))
}
