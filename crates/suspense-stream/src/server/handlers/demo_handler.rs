use async_stream::stream;
use axum::{
    Extension, Json,
    body::Body,
    extract::{Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::StreamError;
use crate::server::types::ServerState;
use crate::suspense::{BoundaryId, BoundaryResolver, SuspenseCoordinator};

const SHELL_HEAD: &str = concat!(
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
    "<title>suspense-stream</title></head><body><h1>Suspense streaming demo</h1>",
);
const SHELL_TAIL: &str = "</body></html>";
const SHELL_CHUNK_DELAY: Duration = Duration::from_millis(20);

struct DemoBoundary {
    id: u64,
    title: &'static str,
    delay_ms: u64,
}

const DEMO_BOUNDARIES: &[DemoBoundary] = &[
    DemoBoundary { id: 1, title: "Profile", delay_ms: 300 },
    DemoBoundary { id: 2, title: "Recommendations", delay_ms: 150 },
    DemoBoundary { id: 3, title: "Activity", delay_ms: 450 },
];

#[derive(Debug, Default, Deserialize)]
pub struct DemoQuery {
    /// Boundary to fail on purpose.
    pub fail: Option<u64>,
}

fn fallback_markup(boundary: &DemoBoundary) -> String {
    format!(
        "<section {}><p>Loading {}...</p></section>",
        BoundaryId::from(boundary.id).fallback_attribute(),
        boundary.title
    )
}

pub async fn demo_page(
    State(state): State<ServerState>,
    Extension(coordinator): Extension<SuspenseCoordinator>,
    Query(query): Query<DemoQuery>,
) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let mut resolver = BoundaryResolver::new(coordinator);
    if let Some(timeout) = state.config.streaming.boundary_timeout() {
        resolver = resolver.with_timeout(timeout);
    }

    for boundary in DEMO_BOUNDARIES {
        let should_fail = query.fail == Some(boundary.id);
        let delay = Duration::from_millis(boundary.delay_ms);
        let title = boundary.title;

        resolver.suspend(boundary.id, async move {
            tokio::time::sleep(delay).await;
            if should_fail {
                return Err(StreamError::boundary(format!("{title} failed to render")));
            }
            Ok(format!(
                "<section><h2>{title}</h2><p>Rendered after {}ms</p></section>",
                delay.as_millis()
            ))
        });
    }
    resolver.finish();

    let shell = stream! {
        yield Ok::<_, std::io::Error>(Bytes::from_static(SHELL_HEAD.as_bytes()));
        for boundary in DEMO_BOUNDARIES {
            tokio::time::sleep(SHELL_CHUNK_DELAY).await;
            yield Ok(Bytes::from(fallback_markup(boundary)));
        }
        yield Ok(Bytes::from_static(SHELL_TAIL.as_bytes()));
    };

    ([(CONTENT_TYPE, "text/html; charset=utf-8")], Body::from_stream(shell)).into_response()
}

pub async fn health(State(state): State<ServerState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "mode": state.config.mode.to_string(),
        "requests": state.request_count.load(Ordering::Relaxed),
        "uptime_ms": state.start_time.elapsed().as_millis() as u64,
    }))
}
