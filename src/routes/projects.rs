use axum::{
    extract::{Json, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::authz::{authorize, MANAGER_OR_ADMIN};
use crate::models::organization::Organization;
use crate::responses::JsonResponse;
use crate::routes::auth::session::AuthSession;
use crate::state::AppState;
use crate::tenancy::{resolve_organization, AuthContext};

const MAX_PROJECT_NAME_LENGTH: usize = 200;

/// Resolve the tenant and confirm the caller belongs to it. Non-members get
/// the same 403 whether the org exists or not, so slugs don't leak.
async fn require_member_org(
    state: &AppState,
    headers: &HeaderMap,
    auth: &AuthContext,
) -> Result<Organization, Response> {
    let org = match resolve_organization(state.orgs.as_ref(), headers, Some(auth)).await {
        Ok(Some(org)) => org,
        Ok(None) => return Err(JsonResponse::not_found("Organization not found").into_response()),
        Err(err) => {
            tracing::error!("projects: tenant resolution failed: {:?}", err);
            return Err(JsonResponse::server_error("Database error").into_response());
        }
    };

    match state.orgs.find_membership(auth.user_id, org.id).await {
        Ok(Some(_)) => Ok(org),
        Ok(None) => {
            Err(JsonResponse::forbidden("Not a member of this organization").into_response())
        }
        Err(err) => {
            tracing::error!("projects: membership lookup failed: {:?}", err);
            Err(JsonResponse::server_error("Database error").into_response())
        }
    }
}

pub async fn handle_list_projects(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
) -> Response {
    let auth = match session.auth_context() {
        Ok(auth) => auth,
        Err(status) => return status.into_response(),
    };
    let org = match require_member_org(&state, &headers, &auth).await {
        Ok(org) => org,
        Err(response) => return response,
    };

    match state.projects.list_projects(org.id).await {
        Ok(projects) => Json(json!({ "success": true, "projects": projects })).into_response(),
        Err(err) => {
            tracing::error!("projects: list failed: {:?}", err);
            JsonResponse::server_error("Database error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct CreateProjectPayload {
    pub name: String,
}

pub async fn handle_create_project(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Json(payload): Json<CreateProjectPayload>,
) -> Response {
    let auth = match session.auth_context() {
        Ok(auth) => auth,
        Err(status) => return status.into_response(),
    };
    let org = match require_member_org(&state, &headers, &auth).await {
        Ok(org) => org,
        Err(response) => return response,
    };

    match authorize(state.orgs.as_ref(), auth.user_id, org.id, MANAGER_OR_ADMIN).await {
        Ok(true) => {}
        Ok(false) => {
            return JsonResponse::forbidden("Only managers and admins can create projects")
                .into_response()
        }
        Err(err) => {
            tracing::error!("projects: role lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return JsonResponse::validation_error(
            "Validation failed",
            json!({ "name": "This field is required" }),
        )
        .into_response();
    }
    if name.len() > MAX_PROJECT_NAME_LENGTH {
        return JsonResponse::validation_error(
            "Validation failed",
            json!({ "name": format!("Must be {} characters or fewer", MAX_PROJECT_NAME_LENGTH) }),
        )
        .into_response();
    }

    match state.projects.create_project(org.id, name).await {
        Ok(project) => JsonResponse::created(&format!("Project {} created", project.name))
            .into_response(),
        Err(err) => {
            tracing::error!("projects: create failed: {:?}", err);
            JsonResponse::server_error("Could not create project").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct AddProjectMemberPayload {
    pub user_id: Uuid,
}

/// Attach an existing org member to a project. Membership in the org is a
/// precondition; project membership carries the member's org role.
pub async fn handle_add_project_member(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<AddProjectMemberPayload>,
) -> Response {
    let auth = match session.auth_context() {
        Ok(auth) => auth,
        Err(status) => return status.into_response(),
    };
    let org = match require_member_org(&state, &headers, &auth).await {
        Ok(org) => org,
        Err(response) => return response,
    };

    match authorize(state.orgs.as_ref(), auth.user_id, org.id, MANAGER_OR_ADMIN).await {
        Ok(true) => {}
        Ok(false) => {
            return JsonResponse::forbidden("Only managers and admins can manage project members")
                .into_response()
        }
        Err(err) => {
            tracing::error!("projects: role lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    }

    let project = match state.projects.find_project(org.id, project_id).await {
        Ok(Some(project)) => project,
        Ok(None) => return JsonResponse::not_found("Project not found").into_response(),
        Err(err) => {
            tracing::error!("projects: lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    };

    let membership = match state.orgs.find_membership(payload.user_id, org.id).await {
        Ok(Some(membership)) => membership,
        Ok(None) => {
            return JsonResponse::bad_request("User is not a member of this organization")
                .into_response()
        }
        Err(err) => {
            tracing::error!("projects: target membership lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    };

    if let Err(err) = state
        .projects
        .add_project_member(org.id, project.id, payload.user_id, membership.role)
        .await
    {
        tracing::error!("projects: member insert failed: {:?}", err);
        return JsonResponse::server_error("Could not add project member").into_response();
    }

    JsonResponse::created("Project member added").into_response()
}
