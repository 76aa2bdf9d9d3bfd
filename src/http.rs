//! HTTP surface for the prediction service.
//!
//! - `POST /predict` with a JSON record: `200 {"predicted_price": ...}` or
//!   `400 {"error": ...}`
//! - `GET /health`: `200 OK`
//! - `GET /`: the bundled prediction form (`index.html` from the asset
//!   directory); `GET /static/...` serves the rest of that directory
//!
//! When artifacts failed to load at startup the routes stay up and
//! `/predict` answers `503` with the load error.
//!
//! Non-finite features are not rejected: a zero count (e.g. `households: 0`)
//! makes a ratio infinite, the model output follows, and the response is
//! `200 {"predicted_price": null}` because JSON has no infinity or NaN.

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::service::PredictionService;

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// What the server can do after startup.
#[derive(Debug, Clone)]
pub enum ServingState {
    Ready(PredictionService),
    /// Artifacts could not be loaded; holds the reason.
    Unavailable(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_price: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// All routes, with rejections turned into JSON error bodies. `assets` holds
/// `index.html` and its scripts.
pub fn routes(
    state: Arc<ServingState>,
    assets: &Path,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let predict = warp::path("predict")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state))
        .map(|body: Value, state: Arc<ServingState>| handle_predict(&state, &body));

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let index = warp::path::end()
        .and(warp::get())
        .and(warp::fs::file(assets.join("index.html")));

    let files = warp::path("static").and(warp::get()).and(warp::fs::dir(assets.to_path_buf()));

    predict.or(health).or(index).or(files).recover(handle_rejection)
}

fn with_state(
    state: Arc<ServingState>,
) -> impl Filter<Extract = (Arc<ServingState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn handle_predict(state: &ServingState, body: &Value) -> warp::reply::WithStatus<warp::reply::Json> {
    let service = match state {
        ServingState::Ready(service) => service,
        ServingState::Unavailable(reason) => {
            return error_reply(StatusCode::SERVICE_UNAVAILABLE, reason.clone());
        }
    };

    match service.predict_json(body) {
        Ok(predicted_price) => {
            debug!(predicted_price, "prediction served");
            warp::reply::with_status(
                warp::reply::json(&PredictionResponse { predicted_price }),
                StatusCode::OK,
            )
        }
        Err(e) if e.is_client_error() => {
            debug!(error = %e, "rejected prediction request");
            error_reply(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            warn!(error = %e, "prediction failed");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn error_reply(status: StatusCode, error: String) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&ErrorResponse { error }), status)
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("invalid request: {e}"))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "request body too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "content-length header required".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "expected a JSON body".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        warn!(?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };

    Ok(error_reply(status, message))
}
