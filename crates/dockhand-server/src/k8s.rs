use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{FacadeError, check_upstream};

/// Passthrough client for the Kubernetes API server.
#[derive(Clone)]
pub struct KubernetesApi {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PodSummary {
    pub namespace: String,
    pub name: String,
    /// Ready containers over total, e.g. `1/2`
    pub ready: String,
    pub status: String,
    pub restarts: u64,
    pub age: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeploymentSummary {
    pub namespace: String,
    pub name: String,
    pub ready: String,
    pub up_to_date: u64,
    pub available: u64,
    pub age: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceSummary {
    pub namespace: String,
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub cluster_ip: String,
    pub ports: Vec<ServicePortSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServicePortSummary {
    pub port: u64,
    pub protocol: String,
}

impl KubernetesApi {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        insecure_tls: bool,
    ) -> Result<Self, FacadeError> {
        let mut builder = reqwest::Client::builder();
        if insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorized(self.http.get(format!("{}{}", self.base_url, path)))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn fetch_items(&self, path: &str) -> Result<Vec<Value>, FacadeError> {
        let response = self.get(path).send().await?;
        let list: Value = check_upstream(response).await?.json().await?;
        Ok(list["items"].as_array().cloned().unwrap_or_default())
    }

    pub async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<PodSummary>, FacadeError> {
        let path = match namespace {
            Some(ns) => format!("/api/v1/namespaces/{ns}/pods"),
            None => "/api/v1/pods".to_string(),
        };
        let items = self.fetch_items(&path).await?;
        Ok(items.iter().map(pod_summary).collect())
    }

    pub async fn list_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<DeploymentSummary>, FacadeError> {
        let path = match namespace {
            Some(ns) => format!("/apis/apps/v1/namespaces/{ns}/deployments"),
            None => "/apis/apps/v1/deployments".to_string(),
        };
        let items = self.fetch_items(&path).await?;
        Ok(items.iter().map(deployment_summary).collect())
    }

    pub async fn list_services(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ServiceSummary>, FacadeError> {
        let path = match namespace {
            Some(ns) => format!("/api/v1/namespaces/{ns}/services"),
            None => "/api/v1/services".to_string(),
        };
        let items = self.fetch_items(&path).await?;
        Ok(items.iter().map(service_summary).collect())
    }

    pub async fn list_namespaces(&self) -> Result<Vec<String>, FacadeError> {
        let items = self.fetch_items("/api/v1/namespaces").await?;
        Ok(items
            .iter()
            .filter_map(|ns| ns["metadata"]["name"].as_str().map(String::from))
            .collect())
    }

    pub async fn pod_details(&self, namespace: &str, name: &str) -> Result<Value, FacadeError> {
        let response = self
            .get(&format!("/api/v1/namespaces/{namespace}/pods/{name}"))
            .send()
            .await?;
        Ok(check_upstream(response).await?.json().await?)
    }

    pub async fn describe(
        &self,
        resource_type: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Value, FacadeError> {
        let path = match resource_type {
            "pod" => format!("/api/v1/namespaces/{namespace}/pods/{name}"),
            "deployment" => format!("/apis/apps/v1/namespaces/{namespace}/deployments/{name}"),
            "service" => format!("/api/v1/namespaces/{namespace}/services/{name}"),
            _ => return Err(FacadeError::BadRequest("Invalid resource type".to_string())),
        };
        let response = self.get(&path).send().await?;
        Ok(check_upstream(response).await?.json().await?)
    }

    pub async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String, FacadeError> {
        let response = self
            .get(&format!("/api/v1/namespaces/{namespace}/pods/{name}/log"))
            .send()
            .await?;
        Ok(check_upstream(response).await?.text().await?)
    }

    /// Dispatches a manifest to the collection endpoint matching its `kind`.
    pub async fn create_resource(&self, resource: &Value) -> Result<Value, FacadeError> {
        let namespace = resource["metadata"]["namespace"]
            .as_str()
            .unwrap_or("default");
        let path = match resource["kind"].as_str() {
            Some("Pod") => format!("/api/v1/namespaces/{namespace}/pods"),
            Some("Deployment") => format!("/apis/apps/v1/namespaces/{namespace}/deployments"),
            Some("Service") => format!("/api/v1/namespaces/{namespace}/services"),
            _ => {
                return Err(FacadeError::BadRequest(
                    "Unsupported resource type".to_string(),
                ));
            }
        };
        let response = self
            .authorized(self.http.post(format!("{}{}", self.base_url, path)))
            .json(resource)
            .send()
            .await?;
        Ok(check_upstream(response).await?.json().await?)
    }

    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), FacadeError> {
        self.delete(&format!("/api/v1/namespaces/{namespace}/pods/{name}"))
            .await
    }

    pub async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), FacadeError> {
        self.delete(&format!(
            "/apis/apps/v1/namespaces/{namespace}/deployments/{name}"
        ))
        .await
    }

    async fn delete(&self, path: &str) -> Result<(), FacadeError> {
        let response = self
            .authorized(self.http.delete(format!("{}{}", self.base_url, path)))
            .send()
            .await?;
        check_upstream(response).await?;
        Ok(())
    }
}

fn pod_summary(raw: &Value) -> PodSummary {
    let statuses = raw["status"]["containerStatuses"].as_array();
    let total = statuses.map(|s| s.len()).unwrap_or(0);
    let ready = statuses
        .map(|s| {
            s.iter()
                .filter(|c| c["ready"].as_bool().unwrap_or(false))
                .count()
        })
        .unwrap_or(0);
    let restarts = statuses
        .map(|s| {
            s.iter()
                .map(|c| c["restartCount"].as_u64().unwrap_or(0))
                .sum()
        })
        .unwrap_or(0);

    PodSummary {
        namespace: raw["metadata"]["namespace"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        name: raw["metadata"]["name"].as_str().unwrap_or_default().to_string(),
        ready: format!("{ready}/{total}"),
        status: raw["status"]["phase"].as_str().unwrap_or("Unknown").to_string(),
        restarts,
        age: format_age(raw["metadata"]["creationTimestamp"].as_str()),
    }
}

fn deployment_summary(raw: &Value) -> DeploymentSummary {
    let ready = raw["status"]["readyReplicas"].as_u64().unwrap_or(0);
    let wanted = raw["spec"]["replicas"].as_u64().unwrap_or(0);

    DeploymentSummary {
        namespace: raw["metadata"]["namespace"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        name: raw["metadata"]["name"].as_str().unwrap_or_default().to_string(),
        ready: format!("{ready}/{wanted}"),
        up_to_date: raw["status"]["updatedReplicas"].as_u64().unwrap_or(0),
        available: raw["status"]["availableReplicas"].as_u64().unwrap_or(0),
        age: format_age(raw["metadata"]["creationTimestamp"].as_str()),
    }
}

fn service_summary(raw: &Value) -> ServiceSummary {
    ServiceSummary {
        namespace: raw["metadata"]["namespace"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        name: raw["metadata"]["name"].as_str().unwrap_or_default().to_string(),
        service_type: raw["spec"]["type"].as_str().unwrap_or_default().to_string(),
        cluster_ip: raw["spec"]["clusterIP"].as_str().unwrap_or_default().to_string(),
        ports: raw["spec"]["ports"]
            .as_array()
            .map(|ports| {
                ports
                    .iter()
                    .map(|p| ServicePortSummary {
                        port: p["port"].as_u64().unwrap_or(0),
                        protocol: p["protocol"].as_str().unwrap_or("TCP").to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Creation timestamps come back RFC 3339; render them the way the rest of
/// the dashboard shows times.
fn format_age(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn pod_summary_counts_ready_containers_and_restarts() {
        let raw = json!({
            "metadata": {
                "namespace": "default",
                "name": "web-7f9",
                "creationTimestamp": "2024-03-01T10:30:00Z"
            },
            "status": {
                "phase": "Running",
                "containerStatuses": [
                    { "ready": true, "restartCount": 2 },
                    { "ready": false, "restartCount": 1 }
                ]
            }
        });

        let summary = pod_summary(&raw);
        assert_eq!(summary.namespace, "default");
        assert_eq!(summary.name, "web-7f9");
        assert_eq!(summary.ready, "1/2");
        assert_eq!(summary.status, "Running");
        assert_eq!(summary.restarts, 3);
        assert_eq!(summary.age, "2024-03-01 10:30:00");
    }

    #[test]
    fn pod_summary_tolerates_missing_container_statuses() {
        let raw = json!({
            "metadata": { "namespace": "default", "name": "pending-pod" },
            "status": { "phase": "Pending" }
        });

        let summary = pod_summary(&raw);
        assert_eq!(summary.ready, "0/0");
        assert_eq!(summary.restarts, 0);
        assert_eq!(summary.age, "");
    }

    #[test]
    fn deployment_summary_reports_replica_counts() {
        let raw = json!({
            "metadata": {
                "namespace": "prod",
                "name": "api",
                "creationTimestamp": "2024-01-15T08:00:00Z"
            },
            "spec": { "replicas": 3 },
            "status": { "readyReplicas": 2, "updatedReplicas": 3, "availableReplicas": 2 }
        });

        let summary = deployment_summary(&raw);
        assert_eq!(summary.ready, "2/3");
        assert_eq!(summary.up_to_date, 3);
        assert_eq!(summary.available, 2);
    }

    #[test]
    fn service_summary_flattens_ports() {
        let raw = json!({
            "metadata": { "namespace": "default", "name": "web" },
            "spec": {
                "type": "ClusterIP",
                "clusterIP": "10.96.0.10",
                "ports": [
                    { "port": 80, "protocol": "TCP" },
                    { "port": 443, "protocol": "TCP" }
                ]
            }
        });

        let summary = service_summary(&raw);
        assert_eq!(summary.service_type, "ClusterIP");
        assert_eq!(summary.cluster_ip, "10.96.0.10");
        assert_eq!(summary.ports.len(), 2);
        assert_eq!(summary.ports[1].port, 443);
    }
}
