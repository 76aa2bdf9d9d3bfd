//! HTTP routes exercised through warp's in-process test client.

use std::path::Path;
use std::sync::Arc;

use house_price_predictor::features::FeatureTransformer;
use house_price_predictor::http::{routes, ErrorResponse, PredictionResponse, ServingState};
use house_price_predictor::models::{ModelConfig, ModelKind, Regressor};
use house_price_predictor::testing::synthetic_housing;
use house_price_predictor::{PredictionService, ServingContext};
use ndarray::ArrayView1;
use serde_json::{json, Value};
use warp::http::StatusCode;

fn ready_state() -> Arc<ServingState> {
    let (records, labels) = synthetic_housing(150, 17);
    let (x, transformer) = FeatureTransformer::default().fit_transform(&records).unwrap();
    let mut model = ModelKind::Linear.build(&ModelConfig::default());
    model.fit(x.view(), ArrayView1::from(labels.as_slice())).unwrap();
    let context = ServingContext::new(transformer, model).unwrap();
    Arc::new(ServingState::Ready(PredictionService::new(Arc::new(context))))
}

fn assets() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static"))
}

fn request_body() -> Value {
    json!({
        "longitude": -122.23,
        "latitude": 37.88,
        "housing_median_age": 41,
        "total_rooms": 880,
        "total_bedrooms": 129,
        "population": 322,
        "households": 126,
        "median_income": 8.3252
    })
}

#[tokio::test]
async fn predict_returns_rounded_price() {
    let api = routes(ready_state(), assets());
    let resp = warp::test::request()
        .method("POST")
        .path("/predict")
        .json(&request_body())
        .reply(&api)
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: PredictionResponse = serde_json::from_slice(resp.body()).unwrap();
    let cents = body.predicted_price * 100.0;
    assert!((cents - cents.round()).abs() < 1e-6);
}

#[tokio::test]
async fn missing_field_is_bad_request_and_server_keeps_serving() {
    let api = routes(ready_state(), assets());

    let mut body = request_body();
    body.as_object_mut().unwrap().remove("median_income");
    let resp = warp::test::request()
        .method("POST")
        .path("/predict")
        .json(&body)
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: ErrorResponse = serde_json::from_slice(resp.body()).unwrap();
    assert!(err.error.contains("median_income"), "{}", err.error);

    let resp = warp::test::request()
        .method("POST")
        .path("/predict")
        .json(&request_body())
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_numeric_field_is_bad_request() {
    let api = routes(ready_state(), assets());
    let mut body = request_body();
    body["households"] = json!("many");
    let resp = warp::test::request()
        .method("POST")
        .path("/predict")
        .json(&body)
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let api = routes(ready_state(), assets());
    let resp = warp::test::request()
        .method("POST")
        .path("/predict")
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unavailable_model_answers_503() {
    let api = routes(
        Arc::new(ServingState::Unavailable("corrupt artifact: model.json".into())),
        assets(),
    );
    let resp = warp::test::request()
        .method("POST")
        .path("/predict")
        .json(&request_body())
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let err: ErrorResponse = serde_json::from_slice(resp.body()).unwrap();
    assert!(err.error.contains("model.json"));

    let resp = warp::test::request().path("/health").reply(&api).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let api = routes(ready_state(), assets());
    let resp = warp::test::request().path("/nope").reply(&api).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn zero_households_predicts_null_price() {
    let api = routes(ready_state(), assets());
    let mut body = request_body();
    body["households"] = json!(0);
    let resp = warp::test::request()
        .method("POST")
        .path("/predict")
        .json(&body)
        .reply(&api)
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert!(body["predicted_price"].is_null(), "{body}");
}

#[tokio::test]
async fn root_serves_prediction_form() {
    let api = routes(ready_state(), assets());
    let resp = warp::test::request().path("/").reply(&api).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = String::from_utf8_lossy(resp.body());
    assert!(page.contains("predictForm"));
    assert!(page.contains("/static/script.js"));

    let resp = warp::test::request().path("/static/script.js").reply(&api).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(String::from_utf8_lossy(resp.body()).contains("/predict"));
}

#[tokio::test]
async fn form_is_served_while_model_is_unavailable() {
    let api = routes(Arc::new(ServingState::Unavailable("missing".into())), assets());
    let resp = warp::test::request().path("/").reply(&api).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = warp::test::request().path("/static/missing.js").reply(&api).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
