use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use dockhand_registry::{
    CredentialManager, Heartbeat, HttpRegistry, register_instance, shutdown_channel,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod docker;
mod error;
mod k8s;
mod routes;

use config::ServerConfig;
use docker::DockerApi;
use k8s::KubernetesApi;

#[derive(Clone)]
pub struct AppState {
    pub docker: DockerApi,
    pub k8s: KubernetesApi,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::docker::list_containers,
        routes::docker::list_images,
        routes::docker::start_container,
        routes::docker::stop_container,
        routes::docker::restart_container,
        routes::docker::container_details,
        routes::docker::container_health,
        routes::docker::container_logs,
        routes::docker::delete_container,
        routes::docker::list_networks,
        routes::docker::create_container,
        routes::docker::delete_image,
        routes::docker::download_image,
        routes::docker::add_image,
        routes::k8s::list_pods,
        routes::k8s::list_deployments,
        routes::k8s::list_services,
        routes::k8s::list_namespaces,
        routes::k8s::list_namespace_pods,
        routes::k8s::list_namespace_deployments,
        routes::k8s::list_namespace_services,
        routes::k8s::pod_details,
        routes::k8s::describe_resource,
        routes::k8s::pod_logs,
        routes::k8s::create_resource,
        routes::k8s::delete_pod,
        routes::k8s::delete_deployment,
    ),
    components(
        schemas(
            docker::ContainerSummary,
            docker::ImageSummary,
            docker::CreateContainerRequest,
            routes::docker::DownloadImageRequest,
            k8s::PodSummary,
            k8s::DeploymentSummary,
            k8s::ServiceSummary,
            k8s::ServicePortSummary,
            routes::k8s::DeletePodRequest,
            routes::k8s::DeleteDeploymentRequest,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize metrics
    let recorder = PrometheusBuilder::new().build_recorder();
    let metrics_handle = recorder.handle();
    metrics::set_global_recorder(recorder).ok();

    let config = ServerConfig::parse();

    let docker = DockerApi::new(&config.docker_host);
    let k8s = KubernetesApi::new(
        &config.kube_api_server,
        config.kube_token.clone(),
        config.kube_insecure_tls,
    )
    .expect("Failed to build kubernetes client");

    // Register with the service registry before taking traffic, then keep the
    // registration alive from a background task. Neither step may take the
    // facade down with it.
    let registry_config = config.registry_config();
    let instance = config.instance_descriptor();
    let heartbeat = match HttpRegistry::new(&registry_config) {
        Ok(transport) => {
            let transport = Arc::new(transport);
            let credentials = Arc::new(CredentialManager::new(
                transport.clone(),
                &registry_config,
            ));
            if let Err(e) = register_instance(transport.as_ref(), &credentials, &instance).await {
                tracing::warn!("registration failed, heartbeats will keep trying: {e}");
            }
            let (handle, receiver) = shutdown_channel();
            let beats = Heartbeat::new(
                transport,
                credentials,
                instance,
                registry_config.beat_interval,
            );
            tokio::spawn(beats.run(receiver));
            Some(handle)
        }
        Err(e) => {
            tracing::error!("could not build registry transport, running unregistered: {e}");
            None
        }
    };

    let state = AppState { docker, k8s };

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(welcome))
        .route("/health", get(health_check))
        .route(
            "/metrics",
            get(move || {
                let rendered = metrics_handle.render();
                async move { rendered }
            }),
        )
        .nest("/docker", routes::docker::router())
        .nest("/k8s", routes::k8s::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {}", addr);

    let server = axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!("server error: {}", e);
    }

    if let Some(heartbeat) = heartbeat {
        heartbeat.stop();
    }
}

async fn welcome() -> impl IntoResponse {
    Json(json!({
        "service": "dockhand",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/swagger-ui"
    }))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}
