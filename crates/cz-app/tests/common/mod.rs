#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use cz_app::error::ChallengeError;
use cz_app::generator::backend::config::StudioConfig;
use cz_app::generator::backend::StudioClient;
use cz_app::generator::captcha::ChallengeSolver;

pub const FAST_RETRY: Duration = Duration::from_millis(10);

/// Bind `app` on an ephemeral port. Returns `http://127.0.0.1:<port>`.
pub async fn serve(app: Router) -> (String, oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .ok();
    });

    (format!("http://{}", addr), shutdown_tx)
}

/// Solver that hands out a fixed token, or fails when `token` is `None`
pub struct StubSolver {
    token: Option<String>,
    pub calls: AtomicUsize,
}

impl StubSolver {
    pub fn token(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Some(token.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            token: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeSolver for StubSolver {
    async fn solve(&self, _site_key: &str, _page_url: &str) -> Result<String, ChallengeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.clone().ok_or(ChallengeError::Rejected("ERROR_CAPTCHA_UNSOLVABLE".into()))
    }
}

pub fn studio_client(base_url: &str, solver: Arc<dyn ChallengeSolver>) -> StudioClient {
    let config = StudioConfig::new("token-zero", "token-one")
        .with_base_url(base_url)
        .with_retry(3, FAST_RETRY);
    StudioClient::new(config, solver).unwrap()
}

/// How the fake service behaves
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub tracks_per_request: usize,
    /// Number of status polls an id stays unfinished for
    pub finish_after: HashMap<String, usize>,
    /// 1-based generation call from which every call is rejected, with the status to send
    pub reject_generation: Option<(usize, u16)>,
    /// Ids whose audio download returns 404
    pub missing_audio: HashSet<String>,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            tracks_per_request: 2,
            finish_after: HashMap::new(),
            reject_generation: None,
            missing_audio: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub body: Value,
    pub challenge_token: Option<String>,
    pub cookie: Option<String>,
}

pub struct StudioState {
    origin: String,
    behaviour: Behaviour,
    pub generate_calls: Mutex<Vec<GenerateCall>>,
    pub status_queries: AtomicUsize,
    polls: Mutex<HashMap<String, usize>>,
}

impl StudioState {
    pub fn generate_calls(&self) -> Vec<GenerateCall> {
        self.generate_calls.lock().unwrap().clone()
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }
}

/// In-process stand-in for the generation service
pub struct FakeStudio {
    pub origin: String,
    pub api_url: String,
    pub state: Arc<StudioState>,
    _shutdown: oneshot::Sender<()>,
}

impl FakeStudio {
    pub async fn start(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());

        let state = Arc::new(StudioState {
            origin: origin.clone(),
            behaviour,
            generate_calls: Mutex::new(Vec::new()),
            status_queries: AtomicUsize::new(0),
            polls: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/api/generate-proxy", post(generate))
            .route("/api/songs", get(songs))
            .route("/audio/{file}", get(audio))
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        Self {
            api_url: format!("{}/api", origin),
            origin,
            state,
            _shutdown: shutdown_tx,
        }
    }
}

async fn generate(
    State(state): State<Arc<StudioState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);

    let call_no = {
        let mut calls = state.generate_calls.lock().unwrap();
        calls.push(GenerateCall {
            body,
            challenge_token: header("h-captcha-token"),
            cookie: header("cookie"),
        });
        calls.len()
    };

    if let Some((reject_on, status)) = state.behaviour.reject_generation {
        if call_no >= reject_on {
            let status = StatusCode::from_u16(status).unwrap();
            return (status, Json(json!({"error": "rejected"}))).into_response();
        }
    }

    let track_ids: Vec<String> = (0..state.behaviour.tracks_per_request)
        .map(|k| format!("s{call_no}-{k}"))
        .collect();

    Json(json!({ "track_ids": track_ids })).into_response()
}

async fn songs(
    State(state): State<Arc<StudioState>>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.status_queries.fetch_add(1, Ordering::SeqCst);

    let ids = query.get("songIds").cloned().unwrap_or_default();
    let mut polls = state.polls.lock().unwrap();

    let songs: Vec<Value> = ids
        .split(',')
        .filter(|id| !id.is_empty())
        .map(|id| {
            let seen = polls.entry(id.to_string()).or_insert(0);
            *seen += 1;
            let threshold = state.behaviour.finish_after.get(id).copied().unwrap_or(0);
            let finished = *seen > threshold;

            json!({
                "id": id,
                "finished": finished,
                "song_path": if finished { format!("{}/audio/{}.mp3", state.origin, id) } else { String::new() },
                "title": format!("Song {id}"),
            })
        })
        .collect();

    Json(json!({ "songs": songs }))
}

async fn audio(State(state): State<Arc<StudioState>>, Path(file): Path<String>) -> impl IntoResponse {
    let id = file.trim_end_matches(".mp3").to_string();

    if state.behaviour.missing_audio.contains(&id) {
        return StatusCode::NOT_FOUND.into_response();
    }

    format!("audio:{id}").into_bytes().into_response()
}
