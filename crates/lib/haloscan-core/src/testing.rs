//! Scripted `SeoApi` double and payload builders for tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use futures::future::{self, BoxFuture};
use serde_json::{Value, json};

use crate::client::{ClientError, Payload, SeoApi};

/// One recorded upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: String,
    pub params: Option<Payload>,
}

/// Replies with scripted results in call order, regardless of endpoint.
///
/// Once the script is exhausted every call fails with an upstream 404.
#[derive(Debug, Default)]
pub struct ScriptedApi {
    script: Mutex<VecDeque<Result<Payload, ClientError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedApi {
    #[must_use]
    pub fn new(script: Vec<Result<Payload, ClientError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SeoApi for ScriptedApi {
    fn call<'a>(
        &'a self,
        endpoint: &'a str,
        params: Option<&'a Payload>,
    ) -> BoxFuture<'a, Result<Payload, ClientError>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                endpoint: endpoint.to_string(),
                params: params.cloned(),
            });
        let reply = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(ClientError::Upstream {
                    status: 404,
                    message: format!("no scripted reply for {endpoint}"),
                })
            });
        Box::pin(future::ready(reply))
    }
}

fn object(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// Positions-style payload with one row per keyword, ranked in order.
#[must_use]
pub fn keyword_payload(keywords: &[&str]) -> Payload {
    let rows: Vec<Value> = keywords
        .iter()
        .enumerate()
        .map(|(rank, keyword)| {
            json!({
                "keyword": keyword,
                "position": rank + 1,
                "volume": 1000 * (rank + 1),
                "traffic": 50 + rank,
                "cpc": 1.5,
                "competition": 0.4,
                "url": format!("https://example.com/{rank}"),
            })
        })
        .collect();
    object(json!({
        "response_time": "0.12s",
        "total_result_count": rows.len(),
        "results": rows,
    }))
}

#[must_use]
pub fn competitor_payload(domains: &[&str]) -> Payload {
    let rows: Vec<Value> = domains
        .iter()
        .enumerate()
        .map(|(rank, domain)| {
            json!({
                "root_domain": domain,
                "common_keywords": 100_usize.saturating_sub(rank),
                "total_traffic": 2500.0,
            })
        })
        .collect();
    object(json!({ "results": rows }))
}

#[must_use]
pub fn overview_payload() -> Payload {
    object(json!({
        "failure_reason": null,
        "metrics": { "stats": { "total_keyword_count": 4210, "total_traffic": 15000 } },
    }))
}
