use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::error::{FacadeError, check_upstream};

/// Passthrough client for the Docker Engine REST API.
#[derive(Clone)]
pub struct DockerApi {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub command: Option<String>,
    /// Creation time, unix seconds
    pub created: i64,
    pub status: String,
    #[schema(value_type = Object)]
    pub ports: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageSummary {
    pub repository: String,
    pub tag: String,
    pub image_id: String,
    pub created: i64,
    pub size: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateContainerRequest {
    #[schema(example = "web")]
    pub name: String,
    #[schema(example = "nginx:latest")]
    pub image: String,
    pub command: Option<String>,
    /// Container port, e.g. `80` or `80/tcp`
    pub port: Option<String>,
    /// Host port the container port maps to
    pub mapping: Option<String>,
    #[serde(rename = "environmentVariables")]
    pub environment_variables: Option<HashMap<String, String>>,
}

impl DockerApi {
    pub fn new(base_url: &str) -> Self {
        // DOCKER_HOST is conventionally tcp://; the engine speaks HTTP on it
        let base_url = base_url
            .replacen("tcp://", "http://", 1)
            .trim_end_matches('/')
            .to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>, FacadeError> {
        let response = self
            .http
            .get(self.url("/containers/json"))
            .query(&[("all", "true")])
            .send()
            .await?;
        let raw: Vec<Value> = check_upstream(response).await?.json().await?;
        Ok(raw.iter().map(container_summary).collect())
    }

    pub async fn list_images(&self) -> Result<Vec<ImageSummary>, FacadeError> {
        let response = self.http.get(self.url("/images/json")).send().await?;
        let raw: Vec<Value> = check_upstream(response).await?.json().await?;
        Ok(raw.iter().flat_map(image_summaries).collect())
    }

    pub async fn start_container(&self, id: &str) -> Result<(), FacadeError> {
        self.lifecycle(id, "start").await
    }

    pub async fn stop_container(&self, id: &str) -> Result<(), FacadeError> {
        self.lifecycle(id, "stop").await
    }

    pub async fn restart_container(&self, id: &str) -> Result<(), FacadeError> {
        self.lifecycle(id, "restart").await
    }

    async fn lifecycle(&self, id: &str, action: &str) -> Result<(), FacadeError> {
        let response = self
            .http
            .post(self.url(&format!("/containers/{id}/{action}")))
            .send()
            .await?;
        check_upstream(response).await?;
        Ok(())
    }

    pub async fn inspect_container(&self, id: &str) -> Result<Value, FacadeError> {
        let response = self
            .http
            .get(self.url(&format!("/containers/{id}/json")))
            .send()
            .await?;
        Ok(check_upstream(response).await?.json().await?)
    }

    /// One-shot stats snapshot, the engine-side view of container health.
    pub async fn container_stats(&self, id: &str) -> Result<Value, FacadeError> {
        let response = self
            .http
            .get(self.url(&format!("/containers/{id}/stats")))
            .query(&[("stream", "false")])
            .send()
            .await?;
        Ok(check_upstream(response).await?.json().await?)
    }

    pub async fn container_logs(&self, id: &str) -> Result<String, FacadeError> {
        let response = self
            .http
            .get(self.url(&format!("/containers/{id}/logs")))
            .query(&[("stdout", "true"), ("stderr", "true")])
            .send()
            .await?;
        let raw = check_upstream(response).await?.bytes().await?;
        Ok(demux_logs(&raw))
    }

    pub async fn remove_container(&self, id: &str) -> Result<(), FacadeError> {
        let response = self
            .http
            .delete(self.url(&format!("/containers/{id}")))
            .send()
            .await?;
        check_upstream(response).await?;
        Ok(())
    }

    pub async fn list_networks(&self) -> Result<Value, FacadeError> {
        let response = self.http.get(self.url("/networks")).send().await?;
        Ok(check_upstream(response).await?.json().await?)
    }

    /// Creates the container, binds the single requested port and starts it.
    /// Returns the new container id.
    pub async fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> Result<String, FacadeError> {
        let mut body = json!({ "Image": request.image });

        if let Some(command) = &request.command {
            body["Cmd"] = json!(command.split_whitespace().collect::<Vec<_>>());
        }
        if let Some(env) = &request.environment_variables {
            body["Env"] = json!(
                env.iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
            );
        }
        if let Some(port) = &request.port {
            let container_port = if port.contains('/') {
                port.clone()
            } else {
                format!("{port}/tcp")
            };
            body["ExposedPorts"] = json!({ (container_port.clone()): {} });
            if let Some(mapping) = &request.mapping {
                body["HostConfig"] =
                    json!({ "PortBindings": { (container_port.clone()): [{ "HostPort": mapping }] } });
            }
        }

        let response = self
            .http
            .post(self.url("/containers/create"))
            .query(&[("name", request.name.as_str())])
            .json(&body)
            .send()
            .await?;
        let created: Value = check_upstream(response).await?.json().await?;
        let id = created["Id"].as_str().unwrap_or_default().to_string();

        self.start_container(&id).await?;
        Ok(id)
    }

    /// Removes an image, force-removing any container still using it first.
    pub async fn remove_image(&self, image_id: &str) -> Result<(), FacadeError> {
        let response = self
            .http
            .get(self.url("/containers/json"))
            .query(&[("all", "true")])
            .send()
            .await?;
        let containers: Vec<Value> = check_upstream(response).await?.json().await?;

        for container in &containers {
            if container["ImageID"].as_str() == Some(image_id) {
                let id = container["Id"].as_str().unwrap_or_default();
                let response = self
                    .http
                    .delete(self.url(&format!("/containers/{id}")))
                    .query(&[("force", "true")])
                    .send()
                    .await?;
                check_upstream(response).await?;
            }
        }

        let response = self
            .http
            .delete(self.url(&format!("/images/{image_id}")))
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Err(FacadeError::NotFound("Image not found".to_string()));
        }
        check_upstream(response).await?;
        Ok(())
    }

    /// Imports an image from a tarball produced by `docker save`.
    pub async fn load_image(&self, tar: Bytes) -> Result<(), FacadeError> {
        let response = self
            .http
            .post(self.url("/images/load"))
            .header("content-type", "application/x-tar")
            .body(tar)
            .send()
            .await?;
        check_upstream(response).await?;
        Ok(())
    }

    /// Exports an image as a tarball.
    pub async fn export_image(&self, image_id: &str) -> Result<Bytes, FacadeError> {
        let response = self
            .http
            .get(self.url(&format!("/images/{image_id}/get")))
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Err(FacadeError::NotFound("Image not found".to_string()));
        }
        Ok(check_upstream(response).await?.bytes().await?)
    }
}

fn container_summary(raw: &Value) -> ContainerSummary {
    ContainerSummary {
        id: raw["Id"].as_str().unwrap_or_default().to_string(),
        name: raw["Names"]
            .as_array()
            .and_then(|names| names.first())
            .and_then(|name| name.as_str())
            .map(|name| name.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        image: raw["Image"].as_str().unwrap_or("<none>").to_string(),
        command: raw["Command"].as_str().map(String::from),
        created: raw["Created"].as_i64().unwrap_or_default(),
        status: raw["State"].as_str().unwrap_or_default().to_string(),
        ports: raw["Ports"].clone(),
    }
}

/// One entry per repo tag; untagged images get a single `<none>` entry.
fn image_summaries(raw: &Value) -> Vec<ImageSummary> {
    let image_id = raw["Id"].as_str().unwrap_or_default().to_string();
    let created = raw["Created"].as_i64().unwrap_or_default();
    let size = raw["Size"].as_i64().unwrap_or_default();

    let tags: Vec<&str> = raw["RepoTags"]
        .as_array()
        .map(|tags| tags.iter().filter_map(|t| t.as_str()).collect())
        .unwrap_or_default();

    if tags.is_empty() {
        return vec![ImageSummary {
            repository: "<none>".to_string(),
            tag: "<none>".to_string(),
            image_id,
            created,
            size,
        }];
    }

    tags.iter()
        .map(|full| {
            let (repository, tag) = full
                .rsplit_once(':')
                .map(|(r, t)| (r.to_string(), t.to_string()))
                .unwrap_or_else(|| (full.to_string(), "<none>".to_string()));
            ImageSummary {
                repository,
                tag,
                image_id: image_id.clone(),
                created,
                size,
            }
        })
        .collect()
}

/// Containers started without a TTY hand back logs as a multiplexed stream:
/// 8-byte frames of `[stream, 0, 0, 0, len_be32]` followed by the payload.
/// Anything that does not parse as frames is returned as-is.
fn demux_logs(raw: &[u8]) -> String {
    let mut out = Vec::new();
    let mut rest = raw;
    while rest.len() >= 8 {
        let stream = rest[0];
        if stream > 2 || rest[1] != 0 || rest[2] != 0 || rest[3] != 0 {
            return String::from_utf8_lossy(raw).into_owned();
        }
        let len = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        if rest.len() < 8 + len {
            return String::from_utf8_lossy(raw).into_owned();
        }
        out.extend_from_slice(&rest[8..8 + len]);
        rest = &rest[8 + len..];
    }
    if !rest.is_empty() {
        return String::from_utf8_lossy(raw).into_owned();
    }
    String::from_utf8_lossy(&out).into_owned()
}
