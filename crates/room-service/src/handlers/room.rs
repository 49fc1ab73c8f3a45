//! Room page handler.
//!
//! `GET /:slug` either redirects to the active meeting or serves the
//! waiting-room page, which opens the event stream and follows the
//! `active` event.

use crate::errors::RoomError;
use crate::middleware::SessionIdentity;
use crate::models::RoomDecision;
use crate::routes::AppState;
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    Extension,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Handler for GET /:slug
#[instrument(skip_all, fields(slug = %slug))]
pub async fn open_room(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Extension(identity): Extension<SessionIdentity>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Response, RoomError> {
    match state.rooms.check_or_wait(&slug, identity.owner_id).await? {
        RoomDecision::Redirect(join_url) => Ok(Redirect::to(&join_url).into_response()),
        RoomDecision::EnterWaitingRoom => {
            let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
            let user_agent = headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            if let Err(e) = state
                .waiting_sessions
                .record_waiting_session(&slug, ip, user_agent)
                .await
            {
                warn!(target: "room.handlers.room", error = %e, "Failed to record waiting session");
            }

            Ok((
                [(header::CACHE_CONTROL, "no-store")],
                Html(waiting_room_page(&slug)),
            )
                .into_response())
        }
    }
}

/// First `X-Forwarded-For` hop, else the peer address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Waiting-room page. `slug` has already passed the shape check.
fn waiting_room_page(slug: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Waiting for {slug}</title>
</head>
<body>
<main>
<h1>Waiting for the host</h1>
<p id="status">This page will join the meeting as soon as {slug} opens the room.</p>
</main>
<script>
(function () {{
  var status = document.getElementById("status");
  var source = new EventSource("/api/wait/{slug}/stream");
  source.addEventListener("active", function (e) {{
    source.close();
    var data = JSON.parse(e.data);
    window.location.replace(data.meetUrl);
  }});
  source.addEventListener("error", function (e) {{
    if (!e.data) {{ return; }}
    source.close();
    status.textContent = "This room is unavailable (" + JSON.parse(e.data).message + ").";
  }});
}})();
</script>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let peer: Option<SocketAddr> = "127.0.0.1:5000".parse().ok();

        assert_eq!(client_ip(&headers, peer), Some("203.0.113.7".to_string()));
        assert_eq!(
            client_ip(&HeaderMap::new(), peer),
            Some("127.0.0.1".to_string())
        );
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_waiting_room_page_subscribes_to_stream() {
        let page = waiting_room_page("alice");
        assert!(page.contains(r#"new EventSource("/api/wait/alice/stream")"#));
        assert!(page.contains("data.meetUrl"));
    }
}
