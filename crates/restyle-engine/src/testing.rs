//! Scripted transport and instant sleeper shared by the engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::clock::Sleeper;
use crate::transport::{HttpReply, HttpTransport, TransportFailure};

pub const BASE: &str = "https://provider.test/api";
pub const UPLOAD_ENDPOINT: &str = "https://provider.test/api/v2/uploadImageUrl";
pub const STATUS_ENDPOINT: &str = "https://provider.test/api/v1/order-status";

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

type Scripted = Result<HttpReply, TransportFailure>;

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Scripted>>,
    sticky: HashMap<String, Scripted>,
}

/// Replies from per-URL queues, then from a sticky reply, and records
/// every call in order.
#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<RecordedCall>>,
    script: Mutex<Script>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, reply: Scripted) -> &Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn respond_json(&self, url: &str, status: u16, body: Value) -> &Self {
        self.respond(url, Ok(HttpReply::new(status, body.to_string())))
    }

    pub fn respond_always(&self, url: &str, reply: Scripted) -> &Self {
        self.script
            .lock()
            .unwrap()
            .sticky
            .insert(url.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.url == url)
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    fn reply(&self, call: RecordedCall) -> Scripted {
        let url = call.url.clone();
        self.calls.lock().unwrap().push(call);
        let mut script = self.script.lock().unwrap();
        if let Some(reply) = script.queued.get_mut(&url).and_then(VecDeque::pop_front) {
            return reply;
        }
        match script.sticky.get(&url) {
            Some(reply) => reply.clone(),
            None => {
                let message = format!("no scripted reply for {url}");
                Err(TransportFailure::new(message))
            }
        }
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportFailure> {
        self.reply(RecordedCall {
            method: "POST",
            url: url.to_string(),
            body: Some(body.clone()),
            content_type: Some("application/json".to_string()),
            bytes: Vec::new(),
        })
    }

    async fn put_bytes(
        &self,
        url: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<HttpReply, TransportFailure> {
        self.reply(RecordedCall {
            method: "PUT",
            url: url.to_string(),
            body: None,
            content_type: Some(content_type.to_string()),
            bytes: bytes.to_vec(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<HttpReply, TransportFailure> {
        self.reply(RecordedCall {
            method: "GET",
            url: url.to_string(),
            body: None,
            content_type: None,
            bytes: Vec::new(),
        })
    }
}

/// Returns immediately and records each requested wait. Optionally cancels
/// a token on the n-th sleep (1-based) and then never wakes.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
    cancel_on: Option<(usize, CancellationToken)>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_on(nth: usize, token: CancellationToken) -> Self {
        Self {
            waits: Mutex::new(Vec::new()),
            cancel_on: Some((nth, token)),
        }
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut waits = self.waits.lock().unwrap();
            waits.push(duration);
            waits.len()
        };
        if let Some((nth, token)) = &self.cancel_on {
            if count == *nth {
                token.cancel();
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn ok_json(body: Value) -> Scripted {
    Ok(HttpReply::new(200, body.to_string()))
}

pub fn upload_slot_reply(n: usize) -> Value {
    json!({
        "statusCode": 2000,
        "message": "SUCCESS",
        "body": {
            "uploadImage": format!("https://bucket.test/put/{n}?sig=abc"),
            "imageUrl": format!("https://cdn.test/assets/{n}.jpg"),
            "size": 1024
        }
    })
}

pub fn order_reply(order_id: &str) -> Value {
    json!({
        "statusCode": 2000,
        "message": "SUCCESS",
        "body": {
            "orderId": order_id,
            "maxRetriesAllowed": 5,
            "avgResponseTimeInSec": 15,
            "status": "init"
        }
    })
}

pub fn status_reply(status: &str, output: Option<&str>) -> Value {
    json!({
        "statusCode": 2000,
        "message": "SUCCESS",
        "body": {"orderId": "ord-1", "status": status, "output": output}
    })
}

/// Scripts `count` successful uploads; slot `n` answers PUTs at `put/n`.
pub fn script_uploads(transport: &FakeTransport, count: usize) {
    for n in 1..=count {
        transport.respond_json(UPLOAD_ENDPOINT, 200, upload_slot_reply(n));
        transport.respond(
            &format!("https://bucket.test/put/{n}?sig=abc"),
            Ok(HttpReply::new(200, "")),
        );
    }
}
