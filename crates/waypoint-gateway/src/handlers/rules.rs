use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use waypoint_core::{Page, RedirectRule, RuleDraft, RuleId, RuleQuery, RuleStatus};

use crate::error::Result;
use crate::model::{BulkResponse, RuleBulkAction, RuleBulkRequest};
use crate::state::{AppState, Store};

pub async fn list_rules_handler<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<RuleQuery>,
) -> Result<Json<Page<RedirectRule>>> {
    Ok(Json(state.admin().list_rules(&query).await?))
}

pub async fn create_rule_handler<S: Store>(
    State(state): State<AppState<S>>,
    Json(draft): Json<RuleDraft>,
) -> Result<(StatusCode, Json<RedirectRule>)> {
    let rule = state.admin().create_rule(draft).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn get_rule_handler<S: Store>(
    Path(id): Path<RuleId>,
    State(state): State<AppState<S>>,
) -> Result<Json<RedirectRule>> {
    Ok(Json(state.admin().get_rule(id).await?))
}

pub async fn update_rule_handler<S: Store>(
    Path(id): Path<RuleId>,
    State(state): State<AppState<S>>,
    Json(draft): Json<RuleDraft>,
) -> Result<Json<RedirectRule>> {
    Ok(Json(state.admin().update_rule(id, draft).await?))
}

pub async fn delete_rule_handler<S: Store>(
    Path(id): Path<RuleId>,
    State(state): State<AppState<S>>,
) -> Result<Json<RedirectRule>> {
    Ok(Json(state.admin().delete_rule(id).await?))
}

pub async fn toggle_rule_handler<S: Store>(
    Path(id): Path<RuleId>,
    State(state): State<AppState<S>>,
) -> Result<Json<RedirectRule>> {
    Ok(Json(state.admin().toggle_rule(id).await?))
}

pub async fn bulk_rules_handler<S: Store>(
    State(state): State<AppState<S>>,
    Json(request): Json<RuleBulkRequest>,
) -> Result<Json<BulkResponse>> {
    let admin = state.admin();
    let affected = match request.action {
        RuleBulkAction::Activate => admin.set_rule_status(&request.ids, RuleStatus::Active).await?,
        RuleBulkAction::Deactivate => {
            admin
                .set_rule_status(&request.ids, RuleStatus::Inactive)
                .await?
        }
        RuleBulkAction::Delete => admin.delete_rules(&request.ids).await?,
    };
    Ok(Json(BulkResponse { affected }))
}
