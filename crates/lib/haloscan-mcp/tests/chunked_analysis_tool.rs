use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use haloscan_core::testing::{ScriptedApi, competitor_payload, keyword_payload, overview_payload};
use haloscan_core::{AnalysisControlPlane, ClientError, ControlConfig, Payload, SeoApi};
use haloscan_mcp::HaloscanMcp;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ClientRequest, ProgressNotificationParam, Request,
    ServerResult,
};
use rmcp::service::{NotificationContext, PeerRequestOptions, RunningService};
use rmcp::{ClientHandler, RoleClient, ServiceExt};
use serde_json::json;

/// Client that records every progress notification it receives.
#[derive(Clone, Default)]
struct ProgressLog {
    events: Arc<Mutex<Vec<ProgressNotificationParam>>>,
}

impl ProgressLog {
    fn snapshot(&self) -> Vec<ProgressNotificationParam> {
        self.events.lock().expect("progress log").clone()
    }

    async fn wait_for(&self, count: usize) -> Vec<ProgressNotificationParam> {
        for _ in 0..100 {
            let events = self.snapshot();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.snapshot()
    }
}

impl ClientHandler for ProgressLog {
    async fn on_progress(
        &self,
        params: ProgressNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        self.events.lock().expect("progress log").push(params);
    }
}

/// Answers every call with the overview payload after a fixed delay.
#[derive(Default)]
struct SlowApi {
    calls: AtomicUsize,
}

impl SeoApi for SlowApi {
    fn call<'a>(
        &'a self,
        _endpoint: &'a str,
        _params: Option<&'a Payload>,
    ) -> BoxFuture<'a, Result<Payload, ClientError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(overview_payload())
        })
    }
}

async fn connect<A: SeoApi>(
    api: Arc<A>,
    log: ProgressLog,
) -> RunningService<RoleClient, ProgressLog> {
    let control = AnalysisControlPlane::from_arc(api, ControlConfig::default());
    let server = HaloscanMcp::new(control);
    let (server_io, client_io) = tokio::io::duplex(4096);
    tokio::spawn(async move {
        if let Ok(service) = server.serve(server_io).await {
            let _ = service.waiting().await;
        }
    });
    log.serve(client_io).await.expect("client handshake")
}

fn analysis_call(target: &str) -> CallToolRequestParams {
    CallToolRequestParams {
        meta: None,
        name: "run_chunked_analysis".into(),
        arguments: json!({ "target": target }).as_object().cloned(),
        task: None,
    }
}

fn first_text(result: &CallToolResult) -> String {
    result
        .content
        .first()
        .and_then(|content| content.as_text())
        .map(|text| text.text.clone())
        .expect("text content")
}

#[tokio::test]
async fn each_step_is_forwarded_as_progress() {
    let api = Arc::new(ScriptedApi::new(vec![
        Ok(overview_payload()),
        Ok(competitor_payload(&["rival.com"])),
        Ok(keyword_payload(&["alpha", "beta"])),
        Ok(keyword_payload(&["beta", "gamma"])),
        Ok(keyword_payload(&["delta"])),
    ]));
    let log = ProgressLog::default();
    let client = connect(api, log.clone()).await;

    let handle = client
        .send_cancellable_request(
            ClientRequest::CallToolRequest(Request::new(analysis_call("example.com"))),
            PeerRequestOptions::no_options(),
        )
        .await
        .expect("request sent");
    let response = handle.await_response().await.expect("response");
    let ServerResult::CallToolResult(result) = response else {
        panic!("expected a tool result");
    };
    assert_ne!(result.is_error, Some(true));
    assert!(first_text(&result).contains("alpha"));

    let events = log.wait_for(5).await;
    let progress: Vec<_> = events.iter().map(|event| event.progress).collect();
    assert_eq!(progress, [1.0, 2.0, 3.0, 4.0, 5.0]);
    assert!(events.iter().all(|event| event.total == Some(5.0)));
    assert_eq!(
        events[0].message.as_deref(),
        Some("step 1/5 domain overview done")
    );

    client.cancel().await.expect("client shutdown");
}

#[tokio::test]
async fn all_failed_steps_become_a_tool_error() {
    let log = ProgressLog::default();
    let client = connect(Arc::new(ScriptedApi::default()), log).await;

    let result = client
        .call_tool(analysis_call("example.com"))
        .await
        .expect("tool call");
    assert_eq!(result.is_error, Some(true));
    assert!(first_text(&result).contains("unavailable"));

    client.cancel().await.expect("client shutdown");
}

#[tokio::test]
async fn cancelling_the_request_stops_the_run() {
    let api = Arc::new(SlowApi::default());
    let log = ProgressLog::default();
    let client = connect(Arc::clone(&api), log.clone()).await;

    let handle = client
        .send_cancellable_request(
            ClientRequest::CallToolRequest(Request::new(analysis_call("example.com"))),
            PeerRequestOptions::no_options(),
        )
        .await
        .expect("request sent");
    assert!(!log.wait_for(1).await.is_empty(), "first step should report");
    handle.cancel(None).await.expect("cancel sent");

    // long enough for all five steps of an uncancelled run
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(api.calls.load(Ordering::SeqCst) < 5);

    client.cancel().await.expect("client shutdown");
}
