//! End-to-end serve-handler scenarios, driven through the primitive
//! request/response interface.

use inngest_core::{FunctionConfig, FunctionError, Json, PlannedStep, Trigger};
use inngest_sdk::{
    headers, signature, Config, HttpMethod, Inngest, ServableFunction, ServeHandler,
    ServeRequest,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SHA1_FETCH: &str = "ad8cee67138e73009d4e22831ec6eb3b7f9e60da";
const SIGNING_KEY: &str = "signkey-test-f00df00df00df00df00df00df00df00df00df00d";

fn dev_handler(functions: Vec<ServableFunction>) -> ServeHandler {
    let config = Config::builder().dev(true).build_with(&HashMap::<String, String>::new());
    let client = Inngest::with_config("my-app", config).unwrap();
    ServeHandler::new(client, functions).unwrap()
}

fn cloud_handler(functions: Vec<ServableFunction>) -> ServeHandler {
    let config = Config::builder()
        .dev(false)
        .signing_key(SIGNING_KEY)
        .event_key("test-event-key")
        .build_with(&HashMap::<String, String>::new());
    let client = Inngest::with_config("my-app", config).unwrap();
    ServeHandler::new(client, functions).unwrap()
}

fn call_request(fn_id: &str, envelope: Json) -> ServeRequest {
    ServeRequest::new(HttpMethod::Post, "/api/inngest")
        .query("fnId", fn_id)
        .query("stepId", "step")
        .body(envelope.to_string())
}

fn empty_envelope() -> Json {
    json!({
        "event": {"name": "test.event", "data": {}},
        "ctx": {"run_id": "run_1", "attempt": 0},
        "steps": {}
    })
}

fn body_json(body: &str) -> Json {
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn test_first_attempt_single_run_completes() {
    // S1: a run-only handler completes in one attempt.
    let fetch = ServableFunction::new(
        FunctionConfig::new("fetch-value").trigger(Trigger::event("test.event")),
        |ctx| async move { ctx.step.run("fetch", || async { Ok(json!(42)) }).await },
    )
    .unwrap();
    let handler = dev_handler(vec![fetch]);

    let response = handler
        .handle(call_request("my-app-fetch-value", empty_envelope()))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(body_json(&response.body), json!(42));
    assert_eq!(
        response.header_value(headers::REQ_VERSION),
        Some("1")
    );
}

#[tokio::test]
async fn test_replay_of_completed_run_skips_thunk() {
    // S2: a memoized run returns the recorded value without executing.
    let executed = Arc::new(AtomicBool::new(false));
    let flag = executed.clone();
    let fetch = ServableFunction::new(
        FunctionConfig::new("fetch-value").trigger(Trigger::event("test.event")),
        move |ctx| {
            let flag = flag.clone();
            async move {
                ctx.step
                    .run("fetch", || async move {
                        flag.store(true, Ordering::SeqCst);
                        Ok(json!(0))
                    })
                    .await
            }
        },
    )
    .unwrap();
    let handler = dev_handler(vec![fetch]);

    let envelope = json!({
        "event": {"name": "test.event", "data": {}},
        "ctx": {"run_id": "run_1", "attempt": 1},
        "steps": {SHA1_FETCH: {"data": 42}}
    });
    let response = handler
        .handle(call_request("my-app-fetch-value", envelope))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(body_json(&response.body), json!(42));
    assert!(!executed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_sleep_defers_attempt() {
    // S3: a sleep miss reports the plan with 206.
    let pause = ServableFunction::new(
        FunctionConfig::new("pause-then-work").trigger(Trigger::event("test.event")),
        |ctx| async move {
            ctx.step.sleep("pause", 300u64)?;
            ctx.step.run("x", || async { Ok(json!("later")) }).await
        },
    )
    .unwrap();
    let handler = dev_handler(vec![pause]);

    let response = handler
        .handle(call_request("my-app-pause-then-work", empty_envelope()))
        .await;

    assert_eq!(response.status, 206);
    let plan: Vec<PlannedStep> = serde_json::from_str(&response.body).unwrap();
    assert_eq!(plan[0].op, inngest_core::StepOp::Sleep);
    assert_eq!(plan[0].display_name, "pause");
    assert_eq!(
        plan[0].opts.as_ref().unwrap()["duration"],
        json!("300s")
    );
}

#[tokio::test]
async fn test_duplicate_step_ids_emit_distinct_hashes() {
    // S4: three runs with the same id plan under distinct, stable hash-ids.
    let sha1_s = "a0f1490a20d0211c997b44bc357e1972deab8ae3";
    let sha1_s_0 = "1c63645f69e635bc29502512afa835d8b7d020d2";

    // Memoize the first two occurrences so the response stays a 200 while
    // the third still derives its id from the occurrence counter.
    let triple = ServableFunction::new(
        FunctionConfig::new("triple").trigger(Trigger::event("test.event")),
        |ctx| async move {
            let mut total = 0_i64;
            for _ in 0..3 {
                let value: i64 = ctx.step.run("s", || async { Ok(7) }).await?;
                total += value;
            }
            Ok(json!(total))
        },
    )
    .unwrap();
    let handler = dev_handler(vec![triple]);

    let envelope = json!({
        "event": {"name": "test.event", "data": {}},
        "ctx": {"run_id": "run_1", "attempt": 1},
        "steps": {
            sha1_s: {"data": 1},
            sha1_s_0: {"data": 2},
        }
    });
    let response = handler.handle(call_request("my-app-triple", envelope)).await;

    // First two came from the memo (1 + 2), the third executed (7).
    assert_eq!(response.status, 200);
    assert_eq!(body_json(&response.body), json!(10));
}

#[tokio::test]
async fn test_memo_idempotence_reports_return_value() {
    // Full memo: empty plan, handler return reported verbatim.
    let done = ServableFunction::new(
        FunctionConfig::new("done").trigger(Trigger::event("test.event")),
        |ctx| async move {
            let value: i64 = ctx.step.run("fetch", || async { Ok(0) }).await?;
            Ok(json!({"value": value, "finished": true}))
        },
    )
    .unwrap();
    let handler = dev_handler(vec![done]);

    let envelope = json!({
        "event": {"name": "test.event", "data": {}},
        "ctx": {"run_id": "run_1", "attempt": 3},
        "steps": {SHA1_FETCH: {"data": 42}}
    });
    let response = handler.handle(call_request("my-app-done", envelope)).await;

    assert_eq!(response.status, 200);
    assert_eq!(
        body_json(&response.body),
        json!({"value": 42, "finished": true})
    );
}

#[tokio::test]
async fn test_signed_call_verifies_and_reformatted_body_passes() {
    // S5: a cloud-mode call with a valid signature, plus canonicalization
    // equivalence for a reformatted body.
    let echo = ServableFunction::new(
        FunctionConfig::new("echo").trigger(Trigger::event("test.event")),
        |ctx| async move { Ok(json!(ctx.event.name)) },
    )
    .unwrap();
    let handler = cloud_handler(vec![echo]);

    let body = r#"{"event":{"name":"test.event","data":{}},"ctx":{"run_id":"run_1","attempt":0},"steps":{}}"#;
    let header = signature::sign(body.as_bytes(), SIGNING_KEY).unwrap();

    let response = handler
        .handle(
            ServeRequest::new(HttpMethod::Post, "/api/inngest")
                .query("fnId", "my-app-echo")
                .header(headers::SIGNATURE, header.clone())
                .body(body),
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(body_json(&response.body), json!("test.event"));

    // Same signature, whitespace-shuffled body.
    let reformatted = r#"{ "steps": {}, "ctx": {"attempt": 0, "run_id": "run_1"}, "event": {"data": {}, "name": "test.event"} }"#;
    let response = handler
        .handle(
            ServeRequest::new(HttpMethod::Post, "/api/inngest")
                .query("fnId", "my-app-echo")
                .header(headers::SIGNATURE, header)
                .body(reformatted),
        )
        .await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_unsigned_cloud_call_is_rejected_without_invoking() {
    let invoked = Arc::new(AtomicBool::new(false));
    let flag = invoked.clone();
    let echo = ServableFunction::new(
        FunctionConfig::new("echo").trigger(Trigger::event("test.event")),
        move |_ctx| {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(json!(null))
            }
        },
    )
    .unwrap();
    let handler = cloud_handler(vec![echo]);

    let response = handler
        .handle(call_request("my-app-echo", empty_envelope()))
        .await;

    assert_eq!(response.status, 500);
    let body = body_json(&response.body);
    assert_eq!(body["name"], "MissingSignatureError");
    assert!(!invoked.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_non_retriable_error_maps_to_400() {
    // S6: NonRetriable propagates with the no-retry header.
    let strict = ServableFunction::new(
        FunctionConfig::new("strict").trigger(Trigger::event("test.event")),
        |_ctx| async move {
            Err::<Json, _>(FunctionError::non_retriable("bad input"))
        },
    )
    .unwrap();
    let handler = dev_handler(vec![strict]);

    let response = handler
        .handle(call_request("my-app-strict", empty_envelope()))
        .await;

    assert_eq!(response.status, 400);
    assert_eq!(response.header_value(headers::NO_RETRY), Some("true"));
    let body = body_json(&response.body);
    assert_eq!(body["name"], "NonRetriableError");
    assert_eq!(body["message"], "bad input");
}

#[tokio::test]
async fn test_retry_after_error_maps_to_500_with_header() {
    let limited = ServableFunction::new(
        FunctionConfig::new("limited").trigger(Trigger::event("test.event")),
        |_ctx| async move {
            Err::<Json, _>(FunctionError::retry_after_secs("rate limited", 120))
        },
    )
    .unwrap();
    let handler = dev_handler(vec![limited]);

    let response = handler
        .handle(call_request("my-app-limited", empty_envelope()))
        .await;

    assert_eq!(response.status, 500);
    assert_eq!(response.header_value(headers::RETRY_AFTER), Some("120"));
    assert_eq!(response.header_value(headers::NO_RETRY), Some("false"));
}

#[tokio::test]
async fn test_memoized_step_error_replays_as_400() {
    let failing = ServableFunction::new(
        FunctionConfig::new("failing").trigger(Trigger::event("test.event")),
        |ctx| async move {
            ctx.step
                .run("fetch", || async { Ok(json!("unreachable")) })
                .await
        },
    )
    .unwrap();
    let handler = dev_handler(vec![failing]);

    let envelope = json!({
        "event": {"name": "test.event", "data": {}},
        "ctx": {"run_id": "run_1", "attempt": 1},
        "steps": {SHA1_FETCH: {"error": {"name": "TypeError", "message": "boom"}}}
    });
    let response = handler.handle(call_request("my-app-failing", envelope)).await;

    assert_eq!(response.status, 400);
    assert_eq!(response.header_value(headers::NO_RETRY), Some("true"));
    let body = body_json(&response.body);
    assert_eq!(body["name"], "StepError");
    assert_eq!(body["message"], "boom");
}

#[tokio::test]
async fn test_batch_events_are_passed_through() {
    let batch = ServableFunction::new(
        FunctionConfig::new("batch").trigger(Trigger::event("test.event")),
        |ctx| async move { Ok(json!(ctx.events.len())) },
    )
    .unwrap();
    let handler = dev_handler(vec![batch]);

    let envelope = json!({
        "event": {"name": "test.event", "data": {}},
        "events": [
            {"name": "test.event", "data": {"n": 1}},
            {"name": "test.event", "data": {"n": 2}},
            {"name": "test.event", "data": {"n": 3}}
        ],
        "ctx": {"run_id": "run_1", "attempt": 0},
        "steps": {}
    });
    let response = handler.handle(call_request("my-app-batch", envelope)).await;

    assert_eq!(response.status, 200);
    assert_eq!(body_json(&response.body), json!(3));
}

#[tokio::test]
async fn test_introspection_basic_fields() {
    let handler = cloud_handler(vec![]);
    let response = handler
        .handle(ServeRequest::new(HttpMethod::Get, "/api/inngest"))
        .await;

    assert_eq!(response.status, 200);
    let body = body_json(&response.body);
    assert_eq!(body["authentication_succeeded"], json!(false));
    assert_eq!(body["function_count"], json!(0));
    assert_eq!(body["has_event_key"], json!(true));
    assert_eq!(body["has_signing_key"], json!(true));
    assert_eq!(body["has_signing_key_fallback"], json!(false));
    assert_eq!(body["mode"], json!("cloud"));
    // Unauthenticated introspection stays minimal.
    assert!(body.get("app_id").is_none());
    assert!(body.get("signing_key_hash").is_none());
}

#[tokio::test]
async fn test_introspection_extended_fields_with_valid_signature() {
    let handler = cloud_handler(vec![]);
    let header = signature::sign(b"", SIGNING_KEY).unwrap();
    let response = handler
        .handle(
            ServeRequest::new(HttpMethod::Get, "/api/inngest")
                .header(headers::SIGNATURE, header),
        )
        .await;

    assert_eq!(response.status, 200);
    let body = body_json(&response.body);
    assert_eq!(body["authentication_succeeded"], json!(true));
    assert_eq!(body["app_id"], json!("my-app"));
    assert_eq!(body["sdk_language"], json!("rust"));
    assert_eq!(body["api_origin"], json!("https://api.inngest.com"));
    assert_eq!(body["event_api_origin"], json!("https://inn.gs"));
    assert!(body["signing_key_hash"]
        .as_str()
        .unwrap()
        .starts_with("signkey-test-"));
    assert!(body["event_key_hash"].is_string());
    assert_eq!(body["signing_key_fallback_hash"], json!(null));
}

#[tokio::test]
async fn test_wait_for_event_round_trip() {
    let approval = ServableFunction::new(
        FunctionConfig::new("approval").trigger(Trigger::event("invoice.created")),
        |ctx| async move {
            let approved =
                ctx.step
                    .wait_for_event("approval", "invoice.approved", "24h", None)?;
            match approved {
                Some(event) => Ok(json!({"approved_by": event.data.get("actor")})),
                None => Ok(json!({"approved_by": null})),
            }
        },
    )
    .unwrap();
    let handler = dev_handler(vec![approval]);

    // First attempt: the wait is planned.
    let response = handler
        .handle(call_request("my-app-approval", empty_envelope()))
        .await;
    assert_eq!(response.status, 206);
    let plan: Vec<PlannedStep> = serde_json::from_str(&response.body).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].op, inngest_core::StepOp::WaitForEvent);

    // Replay with the matched event memoized under the planned hash-id.
    let hashed = plan[0].id.clone();
    let envelope = json!({
        "event": {"name": "invoice.created", "data": {}},
        "ctx": {"run_id": "run_1", "attempt": 0},
        "steps": {hashed: {"data": {"name": "invoice.approved", "data": {"actor": "ada"}}}}
    });
    let response = handler.handle(call_request("my-app-approval", envelope)).await;
    assert_eq!(response.status, 200);
    assert_eq!(body_json(&response.body), json!({"approved_by": "ada"}));
}
