#![allow(dead_code)]

use async_trait::async_trait;
use fbconnect::core::config::{TEST_API_KEY, TEST_APP_SECRET};
use fbconnect::core::kernel::Transport;
use fbconnect::{ClientConfig, ClientError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const TEST_SESSION_KEY: &str = "360d81e8f278c89328c86084-219770";
pub const TEST_SESSION_SECRET: &str = "93d6e352a907feb53461d711312491d3";
pub const NAME_QUERY: &str = "SELECT name FROM user WHERE uid = 1160";
pub const NAME_RESULT: &str = r#"[{"name": "Charlie Cheever"}]"#;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn my_name() -> Value {
    json!([{ "name": "Charlie Cheever" }])
}

/// App-secret config pointed at `domain`
pub fn app_config(domain: String) -> ClientConfig {
    ClientConfig::new(TEST_API_KEY.to_string(), TEST_APP_SECRET.to_string()).domain(domain)
}

/// Poll `condition` until it holds, failing the test after [`TEST_TIMEOUT`]
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(TEST_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached before timeout");
}

#[derive(Debug, Default)]
pub struct GateState {
    pub entered: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub finished: AtomicUsize,
}

/// Transport whose fetches block until the test releases them
#[derive(Debug, Clone)]
pub struct GatedTransport {
    pub state: Arc<GateState>,
    release: Arc<Semaphore>,
    response: Result<Value, i64>,
}

impl GatedTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(GateState::default()),
            release: Arc::new(Semaphore::new(0)),
            response: Ok(my_name()),
        }
    }

    /// Every fetch fails with an API error carrying `code`
    pub fn failing(code: i64) -> Self {
        Self {
            response: Err(code),
            ..Self::new()
        }
    }

    /// Let `n` blocked (or future) fetches complete
    pub fn release(&self, n: usize) {
        self.release.add_permits(n);
    }

    pub fn entered(&self) -> usize {
        self.state.entered.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.state.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn fetch(&self, _url: &str) -> Result<Value, ClientError> {
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(now, Ordering::SeqCst);
        self.state.entered.fetch_add(1, Ordering::SeqCst);

        self.release
            .acquire()
            .await
            .expect("release gate closed")
            .forget();

        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state.finished.fetch_add(1, Ordering::SeqCst);

        match &self.response {
            Ok(value) => Ok(value.clone()),
            Err(code) => Err(fbconnect::core::kernel::decode_body(
                &json!({ "error_code": code, "error_msg": "gated failure" }).to_string(),
            )
            .expect_err("error_code bodies always fail")),
        }
    }
}
