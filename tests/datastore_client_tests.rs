use ds2bq::{Credentials, DatastoreAdminClient, DatastoreError, Ds2BqError, ExportEntities, ExportRequest, NamespaceScope, WaitOptions};
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

const OUTPUT_URL: &str = "gs://gcs_bucket_name/2023-06-24T19:21:06_77248/2023-06-24T19:21:06_77248.overall_export_metadata";

fn client(url: &str) -> DatastoreAdminClient {
    DatastoreAdminClient::with_endpoint(url, Credentials::Static("test-token".into()))
}

fn request() -> ExportRequest {
    ExportRequest::new("gcp-project-id", "ds_kind", "gcs_bucket_name", &NamespaceScope::All)
}

fn fast_wait() -> WaitOptions {
    WaitOptions::unbounded().with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn test_export_polls_until_done() {
    let mut server = mockito::Server::new_async().await;

    let start = server
        .mock("POST", "/v1/projects/gcp-project-id:export")
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::Json(json!({
            "outputUrlPrefix": "gs://gcs_bucket_name",
            "entityFilter": {"kinds": ["ds_kind"]}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "projects/gcp-project-id/operations/op1"}"#)
        .create_async()
        .await;

    let poll = server
        .mock("GET", "/v1/projects/gcp-project-id/operations/op1")
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "name": "projects/gcp-project-id/operations/op1",
                "done": true,
                "response": {
                    "@type": "type.googleapis.com/google.datastore.admin.v1.ExportEntitiesResponse",
                    "outputUrl": OUTPUT_URL
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let response = client(&server.url())
        .export_entities(&request(), &fast_wait())
        .await
        .unwrap();

    start.assert_async().await;
    poll.assert_async().await;
    assert_eq!(response.operation, "projects/gcp-project-id/operations/op1");
    assert_eq!(response.output_url, OUTPUT_URL);
}

#[tokio::test]
async fn test_operation_error_is_fatal() {
    let mut server = mockito::Server::new_async().await;

    let _start = server
        .mock("POST", "/v1/projects/gcp-project-id:export")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "name": "projects/gcp-project-id/operations/op2",
                "done": true,
                "error": {"code": 9, "message": "bucket is in a different location"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = client(&server.url())
        .export_entities(&request(), &fast_wait())
        .await
        .unwrap_err();

    match err {
        Ds2BqError::Datastore(DatastoreError::OperationFailed { operation, code, message }) => {
            assert_eq!(operation, "projects/gcp-project-id/operations/op2");
            assert_eq!(code, 9);
            assert!(message.contains("different location"));
        }
        other => panic!("expected OperationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_body_is_parsed() {
    let mut server = mockito::Server::new_async().await;

    let _start = server
        .mock("POST", "/v1/projects/gcp-project-id:export")
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "error": {
                    "code": 403,
                    "message": "The caller does not have permission",
                    "status": "PERMISSION_DENIED"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = client(&server.url())
        .export_entities(&request(), &fast_wait())
        .await
        .unwrap_err();

    match err {
        Ds2BqError::Datastore(DatastoreError::Http { status, code, message }) => {
            assert_eq!(status, 403);
            assert_eq!(code.as_deref(), Some("PERMISSION_DENIED"));
            assert_eq!(message, "The caller does not have permission");
        }
        other => panic!("expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_export_wait_is_bounded_by_caller() {
    let mut server = mockito::Server::new_async().await;

    let _start = server
        .mock("POST", "/v1/projects/gcp-project-id:export")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "projects/gcp-project-id/operations/op3"}"#)
        .create_async()
        .await;

    let _poll = server
        .mock("GET", "/v1/projects/gcp-project-id/operations/op3")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "projects/gcp-project-id/operations/op3", "done": false}"#)
        .expect_at_least(1)
        .create_async()
        .await;

    let client = client(&server.url());
    let req = request();
    let wait = fast_wait();
    let err = ds2bq::bounded(
        "export",
        Some(Duration::from_millis(100)),
        client.export_entities(&req, &wait),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Ds2BqError::Timeout { .. }));
}
