use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::AppState;
use crate::error::FacadeError;
use crate::k8s::{DeploymentSummary, PodSummary, ServiceSummary};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pods", get(list_pods))
        .route("/deployments", get(list_deployments))
        .route("/services", get(list_services))
        .route("/namespaces", get(list_namespaces))
        .route(
            "/describe/:resource_type/:namespace/:resource_name",
            get(describe_resource),
        )
        .route("/logs/:namespace/:pod_name", get(pod_logs))
        .route("/create", post(create_resource))
        .route("/deletePod", post(delete_pod))
        .route("/deleteDeployment", post(delete_deployment))
        .route("/:namespace/pods", get(list_namespace_pods))
        .route("/:namespace/deployments", get(list_namespace_deployments))
        .route("/:namespace/services", get(list_namespace_services))
        .route("/:namespace/:pod_name", get(pod_details))
}

#[derive(Deserialize, ToSchema)]
pub struct DeletePodRequest {
    pub namespace: String,
    pub pod_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct DeleteDeploymentRequest {
    pub namespace: String,
    pub deployment_id: String,
}

#[utoipa::path(
    get,
    path = "/k8s/pods",
    responses((status = 200, description = "Pods across all namespaces", body = Vec<PodSummary>))
)]
pub async fn list_pods(State(state): State<AppState>) -> Result<Json<Vec<PodSummary>>, FacadeError> {
    Ok(Json(state.k8s.list_pods(None).await?))
}

#[utoipa::path(
    get,
    path = "/k8s/deployments",
    responses((status = 200, description = "Deployments across all namespaces", body = Vec<DeploymentSummary>))
)]
pub async fn list_deployments(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeploymentSummary>>, FacadeError> {
    Ok(Json(state.k8s.list_deployments(None).await?))
}

#[utoipa::path(
    get,
    path = "/k8s/services",
    responses((status = 200, description = "Services across all namespaces", body = Vec<ServiceSummary>))
)]
pub async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceSummary>>, FacadeError> {
    Ok(Json(state.k8s.list_services(None).await?))
}

#[utoipa::path(
    get,
    path = "/k8s/namespaces",
    responses((status = 200, description = "Namespace names", body = Vec<String>))
)]
pub async fn list_namespaces(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, FacadeError> {
    Ok(Json(state.k8s.list_namespaces().await?))
}

#[utoipa::path(
    get,
    path = "/k8s/{namespace}/pods",
    responses((status = 200, description = "Pods in one namespace", body = Vec<PodSummary>)),
    params(("namespace" = String, Path, description = "Namespace"))
)]
pub async fn list_namespace_pods(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<PodSummary>>, FacadeError> {
    Ok(Json(state.k8s.list_pods(Some(&namespace)).await?))
}

#[utoipa::path(
    get,
    path = "/k8s/{namespace}/deployments",
    responses((status = 200, description = "Deployments in one namespace", body = Vec<DeploymentSummary>)),
    params(("namespace" = String, Path, description = "Namespace"))
)]
pub async fn list_namespace_deployments(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<DeploymentSummary>>, FacadeError> {
    Ok(Json(state.k8s.list_deployments(Some(&namespace)).await?))
}

#[utoipa::path(
    get,
    path = "/k8s/{namespace}/services",
    responses((status = 200, description = "Services in one namespace", body = Vec<ServiceSummary>)),
    params(("namespace" = String, Path, description = "Namespace"))
)]
pub async fn list_namespace_services(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<ServiceSummary>>, FacadeError> {
    Ok(Json(state.k8s.list_services(Some(&namespace)).await?))
}

#[utoipa::path(
    get,
    path = "/k8s/{namespace}/{pod_name}",
    responses((status = 200, description = "Raw pod document")),
    params(
        ("namespace" = String, Path, description = "Namespace"),
        ("pod_name" = String, Path, description = "Pod name")
    )
)]
pub async fn pod_details(
    State(state): State<AppState>,
    Path((namespace, pod_name)): Path<(String, String)>,
) -> Result<Json<Value>, FacadeError> {
    Ok(Json(state.k8s.pod_details(&namespace, &pod_name).await?))
}

#[utoipa::path(
    get,
    path = "/k8s/describe/{resource_type}/{namespace}/{resource_name}",
    responses(
        (status = 200, description = "Raw resource document"),
        (status = 400, description = "Unknown resource type")
    ),
    params(
        ("resource_type" = String, Path, description = "pod, deployment or service"),
        ("namespace" = String, Path, description = "Namespace"),
        ("resource_name" = String, Path, description = "Resource name")
    )
)]
pub async fn describe_resource(
    State(state): State<AppState>,
    Path((resource_type, namespace, resource_name)): Path<(String, String, String)>,
) -> Result<Json<Value>, FacadeError> {
    Ok(Json(
        state
            .k8s
            .describe(&resource_type, &namespace, &resource_name)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/k8s/logs/{namespace}/{pod_name}",
    responses((status = 200, description = "Pod logs")),
    params(
        ("namespace" = String, Path, description = "Namespace"),
        ("pod_name" = String, Path, description = "Pod name")
    )
)]
pub async fn pod_logs(
    State(state): State<AppState>,
    Path((namespace, pod_name)): Path<(String, String)>,
) -> Result<Json<Value>, FacadeError> {
    let logs = state.k8s.pod_logs(&namespace, &pod_name).await?;
    Ok(Json(json!({ "logs": logs })))
}

#[utoipa::path(
    post,
    path = "/k8s/create",
    request_body(content = String, content_type = "application/yaml"),
    responses(
        (status = 201, description = "Resource created"),
        (status = 400, description = "Invalid YAML or unsupported kind")
    )
)]
pub async fn create_resource(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<Value>), FacadeError> {
    let resource: Value = serde_yaml::from_str(&body)
        .map_err(|_| FacadeError::BadRequest("Invalid YAML".to_string()))?;
    if resource.is_null() {
        return Err(FacadeError::BadRequest("Invalid YAML".to_string()));
    }
    let created = state.k8s.create_resource(&resource).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    post,
    path = "/k8s/deletePod",
    request_body = DeletePodRequest,
    responses((status = 200, description = "Pod deleted"))
)]
pub async fn delete_pod(
    State(state): State<AppState>,
    Json(request): Json<DeletePodRequest>,
) -> Result<Json<Value>, FacadeError> {
    state
        .k8s
        .delete_pod(&request.namespace, &request.pod_id)
        .await?;
    Ok(Json(json!({ "message": "Pod deleted successfully." })))
}

#[utoipa::path(
    post,
    path = "/k8s/deleteDeployment",
    request_body = DeleteDeploymentRequest,
    responses((status = 200, description = "Deployment deleted"))
)]
pub async fn delete_deployment(
    State(state): State<AppState>,
    Json(request): Json<DeleteDeploymentRequest>,
) -> Result<Json<Value>, FacadeError> {
    state
        .k8s
        .delete_deployment(&request.namespace, &request.deployment_id)
        .await?;
    Ok(Json(json!({ "message": "Deployment deleted successfully." })))
}
