use std::sync::atomic::{AtomicU32, Ordering};

use crate::llm::{
    transmitter::{RawResponse, Transport},
    RequestSendPlayerMessage, ResponseReset, ResponseSendPlayerMessage, RESET_ENDPOINT,
    SEND_MESSAGE_ENDPOINT,
};

pub const DUMMY_FIRST_MESSAGE: &str = "こんにちは！今日はよろしくお願いします。";
pub const DUMMY_REPLY: &str = "サーバからのダミー返信です！";

/// Stands in for the llama server when running offline. Every reply scores
/// 10 and the session ends after `turns` replies.
pub struct DummyTransport {
    turns: u32,
    replied: AtomicU32,
}

impl DummyTransport {
    pub fn new(turns: u32) -> Self {
        Self {
            turns: turns.max(1),
            replied: AtomicU32::new(0),
        }
    }

    fn reset(&self) -> ResponseReset {
        self.replied.store(0, Ordering::SeqCst);
        ResponseReset {
            result: true,
            first_message: DUMMY_FIRST_MESSAGE.to_string(),
            face_type: 0,
        }
    }

    fn send_message(&self, request: RequestSendPlayerMessage) -> ResponseSendPlayerMessage {
        log::info!("dummy server received: {}", request.message);
        let replied = self.replied.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseSendPlayerMessage {
            message: DUMMY_REPLY.to_string(),
            face_type: 1,
            score: 10,
            end: replied >= self.turns,
        }
    }
}

impl Transport for DummyTransport {
    fn post_json(&self, url: &str, body: &str) -> anyhow::Result<RawResponse> {
        let endpoint = url.rsplit('/').next().unwrap_or_default();

        let body = match endpoint {
            RESET_ENDPOINT => serde_json::to_string(&self.reset())?,
            SEND_MESSAGE_ENDPOINT => {
                let request: RequestSendPlayerMessage = match serde_json::from_str(body) {
                    Ok(request) => request,
                    Err(e) => {
                        return Ok(RawResponse {
                            status: 422,
                            body: e.to_string(),
                        })
                    }
                };
                serde_json::to_string(&self.send_message(request))?
            }
            _ => {
                return Ok(RawResponse {
                    status: 404,
                    body: r#"{"detail":"Not Found"}"#.to_string(),
                })
            }
        };

        Ok(RawResponse { status: 200, body })
    }
}
