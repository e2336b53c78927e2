//! Mock collaborators and helpers shared by the dispatch tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cidwatch_core::Identifier;
use cidwatch_dispatch::{Dispatcher, FetchResponse, GatewayFetcher, PinResponse, PinService};
use cidwatch_logging::{EventLog, MemoryLog};
use cidwatch_settings::{FetchStrategy, GatewaySettings, PinSettings};

pub const LOCAL: &str = "http://local.test/ipfs/{cid}";
pub const GATEWAY_A: &str = "https://a.test/ipfs/{cid}";
pub const GATEWAY_B: &str = "https://b.test/ipfs/{cid}";

/// Pin service that answers after a delay.
pub struct MockPin {
    pub status: u16,
    pub delay: Duration,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl MockPin {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            status: 200,
            delay: Duration::from_millis(30),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PinService for MockPin {
    async fn pin(&self, cid: &Identifier, credential: &str, _timeout: Duration) -> PinResponse {
        self.calls
            .lock()
            .unwrap()
            .push((cid.to_string(), credential.to_string()));
        tokio::time::sleep(self.delay).await;
        PinResponse {
            status: self.status,
            body: Some(serde_json::json!({"data": {"cid": cid}})),
            error: None,
        }
    }

    fn endpoint(&self) -> &str {
        "https://pin.test/pin_by_cid"
    }
}

/// How a mock gateway behaves for URLs with a given prefix.
#[derive(Clone, Copy)]
pub struct Plan {
    pub delay_ms: u64,
    pub status: u16,
    pub size_bytes: u64,
}

impl Plan {
    pub fn ok(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            status: 200,
            size_bytes: 512,
        }
    }

    pub fn fail(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            status: 0,
            size_bytes: 0,
        }
    }
}

/// Gateway fetcher scripted by URL prefix.
#[derive(Default)]
pub struct MockFetcher {
    plans: Vec<(String, Plan)>,
    pub calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new(plans: &[(&str, Plan)]) -> Arc<Self> {
        Arc::new(Self {
            plans: plans
                .iter()
                .map(|(template, plan)| (template.replace("{cid}", ""), *plan))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayFetcher for MockFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> FetchResponse {
        self.calls.lock().unwrap().push(url.to_string());
        let plan = self
            .plans
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map_or(Plan::ok(1), |(_, plan)| *plan);
        tokio::time::sleep(Duration::from_millis(plan.delay_ms)).await;
        FetchResponse {
            status: plan.status,
            size_bytes: plan.size_bytes,
            error: (plan.status == 0).then(|| "timed out".to_string()),
        }
    }
}

pub fn pin_settings(jwt: Option<&str>) -> PinSettings {
    PinSettings {
        jwt: jwt.map(str::to_owned),
        ..PinSettings::default()
    }
}

pub fn gateway_settings(strategy: FetchStrategy) -> GatewaySettings {
    GatewaySettings {
        templates: vec![GATEWAY_A.to_string(), GATEWAY_B.to_string()],
        strategy,
        local_gateway: LOCAL.to_string(),
        fallback_threshold_ms: 200,
        ..GatewaySettings::default()
    }
}

pub fn dispatcher(
    pin: Arc<MockPin>,
    fetcher: Arc<MockFetcher>,
    pin_settings: PinSettings,
    gateway: GatewaySettings,
) -> (Dispatcher, MemoryLog) {
    let (events, log) = EventLog::memory();
    (Dispatcher::new(pin, fetcher, pin_settings, gateway, events), log)
}

pub fn url(template: &str, cid: &str) -> String {
    template.replace("{cid}", cid)
}
