use async_trait::async_trait;
use ds2bq::{
    BigQueryError, DeleteOutcome, DeleteTable, Ds2BqError, ExportEntities, ExportRequest,
    ExportResponse, LoadFromUri, LoadOutcome, LoadRequest, Pipeline, PipelineConfig, Plan,
    WaitConfig, WaitOptions,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const OUTPUT_URL: &str = "gs://gcs_bucket_name/2023-06-24T19:21:06_77248/2023-06-24T19:21:06_77248.overall_export_metadata";
const SOURCE_URI: &str = "gs://gcs_bucket_name/2023-06-24T19:21:06_77248/all_namespaces/kind_bq_table_id/all_namespaces_kind_bq_table_id.export_metadata";

type CallLog = Arc<Mutex<Vec<String>>>;

struct FakeExporter {
    calls: CallLog,
    output_url: String,
    delay: Duration,
}

#[async_trait]
impl ExportEntities for FakeExporter {
    async fn export_entities(&self, request: &ExportRequest, _wait: &WaitOptions) -> ds2bq::Result<ExportResponse> {
        self.calls.lock().unwrap().push(format!(
            "export {} {} {}",
            request.project_id, request.entity_filter.kinds.join(","), request.output_url_prefix
        ));
        tokio::time::sleep(self.delay).await;
        Ok(ExportResponse {
            operation: "projects/gcp-project-id/operations/op1".to_string(),
            output_url: self.output_url.clone(),
        })
    }
}

enum DeleteBehaviour {
    Succeed,
    TableNotFound,
    AccessDenied,
}

struct FakeDeleter {
    calls: CallLog,
    behaviour: DeleteBehaviour,
}

#[async_trait]
impl DeleteTable for FakeDeleter {
    async fn delete_table(&self, dataset_id: &str, table_id: &str) -> ds2bq::Result<()> {
        self.calls.lock().unwrap().push(format!("delete {}.{}", dataset_id, table_id));
        match self.behaviour {
            DeleteBehaviour::Succeed => Ok(()),
            DeleteBehaviour::TableNotFound => Err(Ds2BqError::BigQuery(BigQueryError::TableNotFound {
                project: "gcp-project-id".into(),
                dataset: dataset_id.into(),
                table: table_id.into(),
            })),
            DeleteBehaviour::AccessDenied => Err(Ds2BqError::BigQuery(BigQueryError::AccessDenied {
                resource: format!("{}.{}", dataset_id, table_id),
                required_permission: Some("bigquery.tables.delete".into()),
            })),
        }
    }
}

struct FakeLoader {
    calls: CallLog,
    requests: Arc<Mutex<Vec<LoadRequest>>>,
    fail: bool,
    delay: Duration,
}

#[async_trait]
impl LoadFromUri for FakeLoader {
    async fn load_from_uri(&self, request: &LoadRequest, _wait: &WaitOptions) -> ds2bq::Result<LoadOutcome> {
        self.calls.lock().unwrap().push(format!("load {}", request.source_uri));
        self.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(Ds2BqError::BigQuery(BigQueryError::LoadFailed {
                job_id: "ds2bq_load_test".into(),
                reason: Some("invalid".into()),
                message: "Error while reading data".into(),
                location: None,
            }));
        }
        Ok(LoadOutcome {
            job_id: "ds2bq_load_test".into(),
            source_uri: request.source_uri.clone(),
            destination: request.destination(),
        })
    }
}

struct Harness {
    calls: CallLog,
    requests: Arc<Mutex<Vec<LoadRequest>>>,
    pipeline: Pipeline<FakeExporter, FakeDeleter, FakeLoader>,
}

fn config() -> PipelineConfig {
    PipelineConfig::new("gcp-project-id", "ds_kind", "gcs_bucket_name", "bq_dataset_id", "bq_table_id")
}

fn harness(config: PipelineConfig, output_url: &str, delay: Duration, delete: DeleteBehaviour, load_fails: bool) -> Harness {
    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new(
        config,
        FakeExporter { calls: calls.clone(), output_url: output_url.to_string(), delay },
        FakeDeleter { calls: calls.clone(), behaviour: delete },
        FakeLoader { calls: calls.clone(), requests: requests.clone(), fail: load_fails, delay: Duration::ZERO },
    );
    Harness { calls, requests, pipeline }
}

fn step_names(calls: &CallLog) -> Vec<String> {
    calls
        .lock()
        .unwrap()
        .iter()
        .map(|c| c.split_whitespace().next().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let h = harness(config(), OUTPUT_URL, Duration::ZERO, DeleteBehaviour::Succeed, false);

    let report = h.pipeline.run().await.unwrap();

    assert_eq!(step_names(&h.calls), vec!["export", "delete", "load"]);
    assert_eq!(report.timestamp.as_str(), "2023-06-24T19:21:06_77248");
    assert_eq!(report.delete, DeleteOutcome::Deleted);
    assert_eq!(report.load.source_uri, SOURCE_URI);
    assert_eq!(report.load.destination, "gcp-project-id.bq_dataset_id.bq_table_id");

    let calls = h.calls.lock().unwrap();
    assert_eq!(calls[0], "export gcp-project-id ds_kind gs://gcs_bucket_name");
    assert_eq!(calls[1], "delete bq_dataset_id.bq_table_id");

    let requests = h.requests.lock().unwrap();
    assert_eq!(requests[0].source_format.as_str(), "DATASTORE_BACKUP");
}

#[tokio::test]
async fn test_table_not_found_is_non_fatal() {
    let h = harness(config(), OUTPUT_URL, Duration::ZERO, DeleteBehaviour::TableNotFound, false);

    let report = h.pipeline.run().await.unwrap();

    assert!(matches!(report.delete, DeleteOutcome::Absent(_)));
    assert_eq!(step_names(&h.calls), vec!["export", "delete", "load"]);
}

#[tokio::test]
async fn test_other_delete_errors_are_non_fatal() {
    let h = harness(config(), OUTPUT_URL, Duration::ZERO, DeleteBehaviour::AccessDenied, false);

    let outcome = h.pipeline.delete_destination().await;
    match outcome {
        DeleteOutcome::Failed(reason) => assert!(reason.contains("bq_dataset_id.bq_table_id")),
        other => panic!("expected Failed, got {:?}", other),
    }

    let report = h.pipeline.run().await.unwrap();
    assert_eq!(report.load.source_uri, SOURCE_URI);
}

#[tokio::test]
async fn test_export_timeout_stops_before_delete_and_load() {
    let mut cfg = config();
    cfg.export_wait = WaitConfig { timeout_secs: None, poll_interval_secs: 1 };
    let h = harness(cfg, OUTPUT_URL, Duration::from_secs(30), DeleteBehaviour::Succeed, false);

    // drive the export step through the pipeline with a tight bound
    let err = ds2bq::bounded("export", Some(Duration::from_millis(50)), h.pipeline.run())
        .await
        .unwrap_err();

    assert!(matches!(err, Ds2BqError::Timeout { .. }));
    assert_eq!(step_names(&h.calls), vec!["export"]);
}

#[tokio::test]
async fn test_configured_export_timeout() {
    let mut cfg = config();
    cfg.export_wait = WaitConfig { timeout_secs: Some(1), poll_interval_secs: 1 };
    let h = harness(cfg, OUTPUT_URL, Duration::from_secs(30), DeleteBehaviour::Succeed, false);

    let err = h.pipeline.run().await.unwrap_err();

    match err {
        Ds2BqError::Timeout { operation, duration } => {
            assert_eq!(operation, "export");
            assert_eq!(duration, Duration::from_secs(1));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert_eq!(step_names(&h.calls), vec!["export"]);
}

#[tokio::test]
async fn test_configured_load_timeout() {
    let mut cfg = config();
    cfg.load_wait = WaitConfig { timeout_secs: Some(1), poll_interval_secs: 1 };
    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new(
        cfg,
        FakeExporter { calls: calls.clone(), output_url: OUTPUT_URL.to_string(), delay: Duration::ZERO },
        FakeDeleter { calls: calls.clone(), behaviour: DeleteBehaviour::Succeed },
        FakeLoader {
            calls: calls.clone(),
            requests: Arc::new(Mutex::new(Vec::new())),
            fail: false,
            delay: Duration::from_secs(30),
        },
    );

    let err = pipeline.run().await.unwrap_err();

    match err {
        Ds2BqError::Timeout { operation, duration } => {
            assert_eq!(operation, "load");
            assert_eq!(duration, Duration::from_secs(1));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert_eq!(step_names(&calls), vec!["export", "delete", "load"]);
}

#[tokio::test]
async fn test_malformed_output_url_is_fatal_after_delete() {
    let h = harness(config(), "gs://gcs_bucket_name", Duration::ZERO, DeleteBehaviour::Succeed, false);

    let err = h.pipeline.run().await.unwrap_err();

    assert!(matches!(err, Ds2BqError::MalformedExportUrl { .. }));
    assert_eq!(step_names(&h.calls), vec!["export", "delete"]);
}

#[tokio::test]
async fn test_load_failure_is_fatal() {
    let h = harness(config(), OUTPUT_URL, Duration::ZERO, DeleteBehaviour::Succeed, true);

    let err = h.pipeline.run().await.unwrap_err();

    match err {
        Ds2BqError::BigQuery(e) => assert_eq!(e.error_code(), "LOAD_FAILED"),
        other => panic!("expected BigQuery error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_source_uri_is_deterministic() {
    let h = harness(config(), OUTPUT_URL, Duration::ZERO, DeleteBehaviour::Succeed, false);
    let ts = ds2bq::ExportTimestamp::from_output_url(OUTPUT_URL).unwrap();

    let first = h.pipeline.load_request(&ts);
    let second = h.pipeline.load_request(&ts);
    assert_eq!(first, second);
    assert_eq!(first.source_uri, SOURCE_URI);
}

#[test]
fn test_report_rows() {
    let report = ds2bq::PipelineReport {
        export: ExportResponse { operation: "op".into(), output_url: OUTPUT_URL.into() },
        timestamp: ds2bq::ExportTimestamp::new("2023-06-24T19:21:06_77248"),
        delete: DeleteOutcome::Deleted,
        load: LoadOutcome {
            job_id: "job".into(),
            source_uri: SOURCE_URI.into(),
            destination: "p.d.t".into(),
        },
        timings: ds2bq::StepTimings::default(),
    };
    let rows = report.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].result, "deleted");
    assert_eq!(rows[2].result, "job job");
}

#[test]
fn test_plan_with_output_url() {
    let plan = Plan::new(&config(), Some(OUTPUT_URL)).unwrap();
    assert_eq!(plan.timestamp.as_deref(), Some("2023-06-24T19:21:06_77248"));
    assert_eq!(plan.load_source_uri.as_deref(), Some(SOURCE_URI));
    assert_eq!(plan.output_url_prefix, "gs://gcs_bucket_name");
    assert_eq!(plan.export_timeout_secs, Some(300));

    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["source_format"], "DATASTORE_BACKUP");
}

#[test]
fn test_plan_without_output_url() {
    let plan = Plan::new(&config(), None).unwrap();
    assert!(plan.load_source_uri.is_none());
    let json = serde_json::to_value(&plan).unwrap();
    assert!(json.get("load_source_uri").is_none());
}
