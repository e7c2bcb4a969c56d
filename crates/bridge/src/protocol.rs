//! Line-delimited JSON protocol between an out-of-process host and the backend.
//!
//! Requests look like `{"id": 1, "method": "save_review", "params": {...}}`
//! and each produces exactly one response line carrying the same `id`.

use anyhow::{anyhow, bail, Context, Result};
use review_notes_core::{models::normalize_app_id, Backend, Host};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct AppIdParams {
    app_id: Value,
}

#[derive(Debug, Deserialize)]
struct SaveParams {
    app_id: Value,
    review_data: String,
}

#[derive(Debug, Default, Deserialize)]
struct RatingsParams {
    #[serde(default)]
    show_all_games: bool,
    #[serde(default)]
    selected_year: Value,
}

#[derive(Debug, Deserialize)]
struct ImageParams {
    app_id: Value,
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct LogParams {
    message: String,
}

/// Host stand-in that turns asset registrations into event lines.
#[derive(Debug, Default)]
pub struct BridgeHost {
    events: Vec<Value>,
}

impl BridgeHost {
    /// Take the events queued during plugin startup.
    pub fn drain(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.events)
    }
}

impl Host for BridgeHost {
    fn add_browser_css(&mut self, file_name: &str) {
        self.events
            .push(json!({"event": "add_browser_css", "file": file_name}));
    }

    fn add_browser_js(&mut self, file_name: &str) {
        self.events
            .push(json!({"event": "add_browser_js", "file": file_name}));
    }

    fn ready(&mut self) {
        self.events.push(json!({"event": "ready"}));
    }
}

/// Decode one request line, run it, and encode the response.
pub fn handle_line(backend: &Backend, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            warn!("rejecting malformed request: {err}");
            return json!({"id": Value::Null, "error": format!("malformed request: {err}")});
        }
    };
    match dispatch(backend, &request.method, request.params) {
        Ok(result) => json!({"id": request.id, "result": result}),
        Err(err) => {
            warn!("{} failed: {err:#}", request.method);
            json!({"id": request.id, "error": format!("{err:#}")})
        }
    }
}

fn dispatch(backend: &Backend, method: &str, params: Value) -> Result<Value> {
    let result = match method {
        "get_review" => {
            let params: AppIdParams = decode(params)?;
            backend.get_review(&app_id(&params.app_id)?)
        }
        "save_review" => {
            let params: SaveParams = decode(params)?;
            json!(backend.save_review(&app_id(&params.app_id)?, params.review_data))
        }
        "delete_review" => {
            let params: AppIdParams = decode(params)?;
            json!(backend.delete_review(&app_id(&params.app_id)?))
        }
        "has_review" => {
            let params: AppIdParams = decode(params)?;
            json!(backend.has_review(&app_id(&params.app_id)?))
        }
        "get_all_reviews" => backend.get_all_reviews(),
        "get_game_ratings" => {
            let params: RatingsParams = if params.is_null() {
                RatingsParams::default()
            } else {
                decode(params)?
            };
            let year = match &params.selected_year {
                Value::Null => None,
                Value::String(year) => Some(year.clone()),
                other => Some(other.to_string()),
            };
            let report = backend.get_game_ratings(params.show_all_games, year.as_deref());
            serde_json::to_value(report).context("failed to encode ratings report")?
        }
        "get_game_image_base64" => {
            let params: ImageParams = decode(params)?;
            json!(backend.get_game_image_base64(&app_id(&params.app_id)?, &params.file_name))
        }
        "debug_log" => {
            let params: LogParams = decode(params)?;
            json!(backend.debug_log(&params.message))
        }
        "get_config" => backend.get_config(),
        other => bail!("unknown method {other}"),
    };
    Ok(result)
}

fn decode<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T> {
    serde_json::from_value(params).context("invalid params")
}

fn app_id(raw: &Value) -> Result<String> {
    normalize_app_id(raw).ok_or_else(|| anyhow!("invalid app_id {raw}"))
}
