use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use http::{header, Method};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::Pahe;

pub async fn serve(pahe: Pahe, port: u16) -> color_eyre::eyre::Result<()> {
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("Listening on port:{port}");
    axum::serve(listener, router(pahe)).await?;
    Ok(())
}

pub fn router(pahe: Pahe) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(vec![
            header::ACCEPT,
            header::ACCEPT_LANGUAGE,
            header::CONTENT_LANGUAGE,
            header::CONTENT_TYPE,
        ])
        .allow_methods(vec![Method::GET, Method::HEAD, Method::OPTIONS])
        // allow requests from any origin
        .allow_origin(Any);

    Router::new()
        .route("/", any(|| async { "pahe-stream" }))
        .route("/search", get(search))
        .route("/episodes", get(episodes))
        .route("/sources", get(sources))
        .layer(cors)
        .with_state(pahe)
}

#[derive(Serialize)]
struct ApiResponse {
    message: String,
}

fn to_resp(status: StatusCode, message: String) -> Response {
    (status, Json(ApiResponse { message })).into_response()
}

fn found<T: Serialize>(maybe: Option<T>, what: &str) -> Response {
    match maybe {
        Some(value) => (StatusCode::OK, Json(value)).into_response(),
        None => to_resp(StatusCode::NOT_FOUND, format!("{what} not found")),
    }
}

async fn search(
    State(pahe): State<Pahe>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match params.get("q") {
        Some(q) => found(pahe.search(q).await, "search result"),
        None => to_resp(StatusCode::BAD_REQUEST, "missing q".to_string()),
    }
}

async fn episodes(
    State(pahe): State<Pahe>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match params.get("id") {
        Some(id) => (StatusCode::OK, Json(pahe.episodes(id).await)).into_response(),
        None => to_resp(StatusCode::BAD_REQUEST, "missing id".to_string()),
    }
}

async fn sources(
    State(pahe): State<Pahe>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match params.get("episode") {
        Some(episode) => found(pahe.sources(episode).await, "player page"),
        None => to_resp(StatusCode::BAD_REQUEST, "missing episode".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::*;
    use crate::{episode::release_url, fetch::testing::FakeFetcher, search::search_url};

    const ORIGIN: &str = "https://animepahe.ru";

    /// Bind the router to an ephemeral port and return its address.
    async fn spawn(fetcher: FakeFetcher) -> String {
        let pahe = Pahe::new(Arc::new(fetcher), ORIGIN, None);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(pahe)).await });
        format!("http://{addr}")
    }

    async fn get(url: &str) -> (StatusCode, Value) {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let resp = client.get(url).send().await.unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_routes() {
        let envelope = json!({ "data": [{ "title": "Frieren", "session": "5a0c" }] });
        let fetcher = FakeFetcher::default()
            .with(
                search_url(ORIGIN, "frieren").unwrap().as_str(),
                &envelope.to_string(),
            )
            .with(
                release_url(ORIGIN, "5a0c", 1).unwrap().as_str(),
                r#"{"last_page":1,"data":[{"episode":1,"session":"e1"}]}"#,
            )
            .with("https://animepahe.ru/play/5a0c/e1", "<html></html>");
        let base = spawn(fetcher).await;

        assert_eq!(
            get(&format!("{base}/search?q=frieren")).await,
            (StatusCode::OK, envelope)
        );
        assert_eq!(
            get(&format!("{base}/episodes?id=5a0c")).await,
            (StatusCode::OK, json!([{ "episode": 1, "session": "e1" }]))
        );
        assert_eq!(
            get(&format!("{base}/sources?episode=5a0c/e1")).await,
            (StatusCode::OK, json!({ "native": {} }))
        );
    }

    #[tokio::test]
    async fn test_absent_and_bad_requests() {
        let base = spawn(FakeFetcher::default()).await;
        assert_eq!(
            get(&format!("{base}/search?q=none")).await,
            (
                StatusCode::NOT_FOUND,
                json!({ "message": "search result not found" })
            )
        );
        assert_eq!(
            get(&format!("{base}/episodes?id=none")).await,
            (StatusCode::OK, json!([]))
        );
        assert_eq!(
            get(&format!("{base}/sources?episode=none")).await.0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get(&format!("{base}/sources")).await,
            (
                StatusCode::BAD_REQUEST,
                json!({ "message": "missing episode" })
            )
        );
    }
}
