//! Local stand-in for a provider HTTP API.

use crate::client::ProviderKind;
use crate::credentials::Credentials;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(usize, &Value) -> (StatusCode, Value) + Send + Sync>;

struct Recorded {
    path: String,
    headers: HeaderMap,
    body: Value,
}

struct FakeState {
    respond: Responder,
    recorded: Mutex<Vec<Recorded>>,
}

pub(crate) struct FakeProvider {
    addr: SocketAddr,
    state: Arc<FakeState>,
    task: tokio::task::JoinHandle<()>,
}

impl FakeProvider {
    /// Answers every POST with `status` and `respond(request_body)`.
    pub(crate) async fn start<F>(status: StatusCode, respond: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self::start_with(move |_, body| (status, respond(body))).await
    }

    /// Answers the `n`th POST (zero-based) with `respond(n, request_body)`.
    pub(crate) async fn start_with<F>(respond: F) -> Self
    where
        F: Fn(usize, &Value) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        let state = Arc::new(FakeState {
            respond: Box::new(respond),
            recorded: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .fallback(axum::routing::post(handle))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake provider");
        let addr = listener.local_addr().expect("fake provider addr");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state, task }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn requests(&self) -> Vec<Value> {
        self.state
            .recorded
            .lock()
            .expect("recorded lock")
            .iter()
            .map(|r| r.body.clone())
            .collect()
    }

    pub(crate) fn last_path(&self) -> Option<String> {
        let recorded = self.state.recorded.lock().expect("recorded lock");
        recorded.last().map(|r| r.path.clone())
    }

    pub(crate) fn last_header(&self, name: &str) -> Option<String> {
        let recorded = self.state.recorded.lock().expect("recorded lock");
        recorded
            .last()
            .and_then(|r| r.headers.get(name))
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

impl Drop for FakeProvider {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut recorded = state.recorded.lock().expect("recorded lock");
    let (status, reply) = (state.respond)(recorded.len(), &body);
    recorded.push(Recorded {
        path: uri.path().to_string(),
        headers,
        body,
    });
    (status, Json(reply))
}

/// Credentials holding `key-<provider>` for `provider` only.
pub(crate) fn creds_for(provider: ProviderKind) -> Credentials {
    let mut creds = Credentials::default();
    creds.set(provider, format!("key-{provider}"));
    creds
}
