use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::AppState;
use crate::docker::{ContainerSummary, CreateContainerRequest, ImageSummary};
use crate::error::FacadeError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/containers", get(list_containers))
        .route("/images", get(list_images))
        .route("/images/download", post(download_image))
        .route("/start/:container_id", post(start_container))
        .route("/stop/:container_id", post(stop_container))
        .route("/restart/:container_id", post(restart_container))
        .route("/health/:container_id", get(container_health))
        .route("/logs/:container_id", get(container_logs))
        .route("/delete/:container_id", delete(delete_container))
        .route("/deleteImg/:image_id", delete(delete_image))
        .route("/networks", get(list_networks))
        .route("/create", post(create_container))
        .route("/addImg", post(add_image))
        .route("/:container_id", get(container_details))
}

#[derive(Deserialize, ToSchema)]
pub struct DownloadImageRequest {
    pub image_id: String,
    pub tar_name: Option<String>,
}

#[utoipa::path(
    get,
    path = "/docker/containers",
    responses((status = 200, description = "All containers, running and stopped", body = Vec<ContainerSummary>))
)]
pub async fn list_containers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContainerSummary>>, FacadeError> {
    Ok(Json(state.docker.list_containers().await?))
}

#[utoipa::path(
    get,
    path = "/docker/images",
    responses((status = 200, description = "Images flattened per repo tag", body = Vec<ImageSummary>))
)]
pub async fn list_images(
    State(state): State<AppState>,
) -> Result<Json<Vec<ImageSummary>>, FacadeError> {
    Ok(Json(state.docker.list_images().await?))
}

#[utoipa::path(
    post,
    path = "/docker/start/{container_id}",
    responses((status = 200, description = "Container started")),
    params(("container_id" = String, Path, description = "Container id or name"))
)]
pub async fn start_container(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
) -> Result<Json<Value>, FacadeError> {
    state.docker.start_container(&container_id).await?;
    Ok(Json(json!({ "message": "Container started successfully" })))
}

#[utoipa::path(
    post,
    path = "/docker/stop/{container_id}",
    responses((status = 200, description = "Container stopped")),
    params(("container_id" = String, Path, description = "Container id or name"))
)]
pub async fn stop_container(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
) -> Result<Json<Value>, FacadeError> {
    state.docker.stop_container(&container_id).await?;
    Ok(Json(json!({ "message": "Container stopped successfully" })))
}

#[utoipa::path(
    post,
    path = "/docker/restart/{container_id}",
    responses((status = 200, description = "Container restarted")),
    params(("container_id" = String, Path, description = "Container id or name"))
)]
pub async fn restart_container(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
) -> Result<Json<Value>, FacadeError> {
    state.docker.restart_container(&container_id).await?;
    Ok(Json(json!({ "message": "Container restarted successfully" })))
}

#[utoipa::path(
    get,
    path = "/docker/{container_id}",
    responses((status = 200, description = "Raw inspect document")),
    params(("container_id" = String, Path, description = "Container id or name"))
)]
pub async fn container_details(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
) -> Result<Json<Value>, FacadeError> {
    Ok(Json(state.docker.inspect_container(&container_id).await?))
}

#[utoipa::path(
    get,
    path = "/docker/health/{container_id}",
    responses((status = 200, description = "One-shot stats snapshot")),
    params(("container_id" = String, Path, description = "Container id or name"))
)]
pub async fn container_health(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
) -> Result<Json<Value>, FacadeError> {
    Ok(Json(state.docker.container_stats(&container_id).await?))
}

#[utoipa::path(
    get,
    path = "/docker/logs/{container_id}",
    responses((status = 200, description = "Container logs as plain text")),
    params(("container_id" = String, Path, description = "Container id or name"))
)]
pub async fn container_logs(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
) -> Result<String, FacadeError> {
    state.docker.container_logs(&container_id).await
}

#[utoipa::path(
    delete,
    path = "/docker/delete/{container_id}",
    responses((status = 200, description = "Container removed")),
    params(("container_id" = String, Path, description = "Container id or name"))
)]
pub async fn delete_container(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
) -> Result<Json<Value>, FacadeError> {
    state.docker.remove_container(&container_id).await?;
    Ok(Json(json!({ "message": "Container deleted successfully" })))
}

#[utoipa::path(
    get,
    path = "/docker/networks",
    responses((status = 200, description = "Raw network list"))
)]
pub async fn list_networks(State(state): State<AppState>) -> Result<Json<Value>, FacadeError> {
    Ok(Json(state.docker.list_networks().await?))
}

#[utoipa::path(
    post,
    path = "/docker/create",
    request_body = CreateContainerRequest,
    responses((status = 200, description = "Container created and started"))
)]
pub async fn create_container(
    State(state): State<AppState>,
    Json(request): Json<CreateContainerRequest>,
) -> Result<Json<Value>, FacadeError> {
    let id = state.docker.create_container(&request).await?;
    Ok(Json(
        json!({ "message": "Container created successfully", "id": id }),
    ))
}

#[utoipa::path(
    delete,
    path = "/docker/deleteImg/{image_id}",
    responses(
        (status = 200, description = "Image removed"),
        (status = 404, description = "Image not found")
    ),
    params(("image_id" = String, Path, description = "Image id"))
)]
pub async fn delete_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<Value>, FacadeError> {
    state.docker.remove_image(&image_id).await?;
    Ok(Json(json!({ "message": "Image deleted successfully" })))
}

#[utoipa::path(
    post,
    path = "/docker/images/download",
    request_body = DownloadImageRequest,
    responses(
        (status = 200, description = "Image tarball", content_type = "application/x-tar"),
        (status = 404, description = "Image not found")
    )
)]
pub async fn download_image(
    State(state): State<AppState>,
    Json(request): Json<DownloadImageRequest>,
) -> Result<impl IntoResponse, FacadeError> {
    if request.image_id.is_empty() {
        return Err(FacadeError::BadRequest("Image ID is required".to_string()));
    }
    let tar = state.docker.export_image(&request.image_id).await?;
    let file_name = request.tar_name.unwrap_or_else(|| "image".to_string());
    let headers = [
        (header::CONTENT_TYPE, "application/x-tar".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}.tar\""),
        ),
    ];
    Ok((headers, tar))
}

#[utoipa::path(
    post,
    path = "/docker/addImg",
    responses(
        (status = 200, description = "Image tarball imported"),
        (status = 400, description = "Missing tar file or container name")
    )
)]
pub async fn add_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), FacadeError> {
    let mut tar = None;
    let mut container_name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FacadeError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("tar_file") => {
                tar = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| FacadeError::BadRequest(e.to_string()))?,
                );
            }
            Some("container_name") => {
                container_name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| FacadeError::BadRequest(e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let (Some(tar), Some(_container_name)) = (tar, container_name) else {
        return Err(FacadeError::BadRequest(
            "No tar file or container name provided".to_string(),
        ));
    };

    state.docker.load_image(tar).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Container added successfully" })),
    ))
}
