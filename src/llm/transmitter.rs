use std::sync::Arc;

use crossbeam::channel::{self, Receiver, TryRecvError};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Serialize};

use super::{
    RequestReset, RequestSendPlayerMessage, ResponseReset, ResponseSendPlayerMessage,
    RESET_ENDPOINT, SEND_MESSAGE_ENDPOINT,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Posts a JSON body. Any HTTP status comes back as a [`RawResponse`];
/// only network-level failures are errors.
pub trait Transport: Send + Sync {
    fn post_json(&self, url: &str, body: &str) -> anyhow::Result<RawResponse>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: &str) -> anyhow::Result<RawResponse> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body.to_string())
            .send()?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| anyhow::anyhow!("read body ({status}) err:{e}"))?;
        Ok(RawResponse { status, body })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request encode error: {0}")]
    Encode(serde_json::Error),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{status} : {body}")]
    Status { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Outcome of one exchange. On failure `response` is always the default
/// value, so callers must look at `success` first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settled<T> {
    pub success: bool,
    pub response: T,
}

impl<T: Default> Settled<T> {
    pub fn failed() -> Self {
        Self {
            success: false,
            response: T::default(),
        }
    }
}

/// An exchange that has been started but may not have settled yet.
/// Drop it after [`Pending::poll`] has returned `Some`.
pub struct Pending<T> {
    rx: Receiver<Settled<T>>,
}

impl<T: Default> Pending<T> {
    pub fn poll(&self) -> Option<Settled<T>> {
        match self.rx.try_recv() {
            Ok(settled) => Some(settled),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("[Error] request worker exited without a response");
                Some(Settled::failed())
            }
        }
    }

    #[cfg(test)]
    pub fn wait(self) -> Settled<T> {
        self.rx.recv().unwrap_or_else(|_| Settled::failed())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// one worker thread per request
    Thread,
    /// settle before `send` returns
    Inline,
}

#[derive(Clone)]
pub struct Transmitter {
    server_url: String,
    transport: Arc<dyn Transport>,
    dispatch: Dispatch,
}

impl Transmitter {
    pub fn new(server_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            server_url: server_url.into(),
            transport,
            dispatch: Dispatch::Thread,
        }
    }

    pub fn inline(server_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            dispatch: Dispatch::Inline,
            ..Self::new(server_url, transport)
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn endpoint(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub fn reset(&self, request: &RequestReset) -> Pending<ResponseReset> {
        self.send(RESET_ENDPOINT, request)
    }

    pub fn send_player_message(
        &self,
        request: &RequestSendPlayerMessage,
    ) -> Pending<ResponseSendPlayerMessage> {
        self.send(SEND_MESSAGE_ENDPOINT, request)
    }

    pub fn send<Req, Res>(&self, endpoint: &str, request: &Req) -> Pending<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned + Default + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        let url = self.endpoint(endpoint);
        let body = serde_json::to_string(request).map_err(GatewayError::Encode);
        let transport = self.transport.clone();

        let job = move || {
            let settled = settle(&url, try_exchange(transport.as_ref(), &url, body));
            let _ = tx.send(settled);
        };

        match self.dispatch {
            Dispatch::Thread => {
                std::thread::spawn(job);
            }
            Dispatch::Inline => job(),
        }

        Pending { rx }
    }
}

fn try_exchange<Res: DeserializeOwned>(
    transport: &dyn Transport,
    url: &str,
    body: Result<String, GatewayError>,
) -> Result<Res, GatewayError> {
    let body = body?;
    log::debug!("[Request] {url} {body}");

    let response = transport
        .post_json(url, &body)
        .map_err(|e| GatewayError::Transport(format!("{e:#}")))?;

    if !(200..300).contains(&response.status) {
        return Err(GatewayError::Status {
            status: response.status,
            body: response.body,
        });
    }

    log::debug!("[Response Raw] {}", response.body);
    Ok(serde_json::from_str(&response.body)?)
}

fn settle<Res: Default>(url: &str, result: Result<Res, GatewayError>) -> Settled<Res> {
    match result {
        Ok(response) => Settled {
            success: true,
            response,
        },
        Err(e) => {
            log::error!("[Error] {url} {e}");
            Settled::failed()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;

    /// Answers from per-endpoint scripts and records every request.
    /// Unscripted endpoints answer 404.
    #[derive(Default)]
    pub struct MockTransport {
        replies: Mutex<HashMap<String, VecDeque<Result<RawResponse, String>>>>,
        pub requests: Mutex<Vec<(String, String)>>,
    }

    impl MockTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn reply(&self, endpoint: &str, status: u16, body: &str) {
            self.push(
                endpoint,
                Ok(RawResponse {
                    status,
                    body: body.to_string(),
                }),
            );
        }

        pub fn fail(&self, endpoint: &str, error: &str) {
            self.push(endpoint, Err(error.to_string()));
        }

        fn push(&self, endpoint: &str, reply: Result<RawResponse, String>) {
            self.replies
                .lock()
                .unwrap()
                .entry(endpoint.to_string())
                .or_default()
                .push_back(reply);
        }

        pub fn requests(&self) -> Vec<(String, String)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn post_json(&self, url: &str, body: &str) -> anyhow::Result<RawResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), body.to_string()));

            let endpoint = url.rsplit('/').next().unwrap_or_default();
            let reply = self
                .replies
                .lock()
                .unwrap()
                .get_mut(endpoint)
                .and_then(|q| q.pop_front());

            match reply {
                Some(Ok(response)) => Ok(response),
                Some(Err(e)) => Err(anyhow::anyhow!(e)),
                None => Ok(RawResponse {
                    status: 404,
                    body: "not found".to_string(),
                }),
            }
        }
    }

    /// Accepts one connection on a local port, answers it with `response`
    /// and hands back the request it read, lowercased.
    fn serve_once(response: String) -> (String, std::thread::JoinHandle<String>) {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_lowercase();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            String::from_utf8_lossy(&request).to_lowercase()
        });
        (url, handle)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn http_transport_posts_json() {
        let (url, server) = serve_once(http_response(
            "200 OK",
            r#"{"result":true,"first_message":"Hello","face_type":1}"#,
        ));
        let transmitter = Transmitter::inline(url, Arc::new(HttpTransport::new().unwrap()));

        let settled = transmitter.reset(&RequestReset {}).wait();
        assert!(settled.success);
        assert_eq!(settled.response.first_message, "Hello");

        let request = server.join().unwrap();
        assert!(request.starts_with("post /reset http/1.1\r\n"));
        assert!(request.contains("content-type: application/json\r\n"));
        assert!(request.contains("accept: application/json\r\n"));
        assert!(request.ends_with("\r\n\r\n{}"));
    }

    #[test]
    fn http_server_error_yields_default() {
        let (url, server) = serve_once(http_response("500 Internal Server Error", "boom"));
        let transmitter = Transmitter::inline(url, Arc::new(HttpTransport::new().unwrap()));

        let settled = transmitter.send_player_message(&request()).wait();
        assert_eq!(settled, Settled::failed());
        assert!(server.join().unwrap().contains(r#"{"message":"hi"}"#));
    }

    #[test]
    fn http_refused_connection_yields_default() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let transmitter = Transmitter::inline(url, Arc::new(HttpTransport::new().unwrap()));

        let settled = transmitter.reset(&RequestReset {}).wait();
        assert_eq!(settled, Settled::failed());
    }

    #[test]
    fn truncated_body_is_a_transport_error() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"res".to_string(),
        );
        let transport = HttpTransport::new().unwrap();

        assert!(transport.post_json(&format!("{url}/reset"), "{}").is_err());
        server.join().unwrap();
    }

    fn request() -> RequestSendPlayerMessage {
        RequestSendPlayerMessage {
            message: "Hi".to_string(),
        }
    }

    #[test]
    fn ok_response_is_decoded() {
        let mock = MockTransport::new();
        mock.reply(
            SEND_MESSAGE_ENDPOINT,
            200,
            r#"{"message":"Hi there","face_type":2,"score":10,"end":false}"#,
        );
        let transmitter = Transmitter::inline("http://localhost:5000", mock.clone());

        let settled = transmitter.send_player_message(&request()).wait();
        assert!(settled.success);
        assert_eq!(
            settled.response,
            ResponseSendPlayerMessage {
                message: "Hi there".to_string(),
                face_type: 2,
                score: 10,
                end: false,
            }
        );
        assert_eq!(
            mock.requests(),
            vec![(
                "http://localhost:5000/send_message".to_string(),
                r#"{"message":"Hi"}"#.to_string()
            )]
        );
    }

    #[test]
    fn server_error_yields_default() {
        let mock = MockTransport::new();
        mock.reply(SEND_MESSAGE_ENDPOINT, 500, "boom");
        let transmitter = Transmitter::inline("http://localhost:5000", mock);

        let settled = transmitter.send_player_message(&request()).wait();
        assert_eq!(settled, Settled::failed());
        assert_eq!(settled.response, ResponseSendPlayerMessage::default());
    }

    #[test]
    fn malformed_body_yields_default() {
        let mock = MockTransport::new();
        mock.reply(SEND_MESSAGE_ENDPOINT, 200, "<html>not json</html>");
        mock.reply(SEND_MESSAGE_ENDPOINT, 200, r#"{"message":1,"face_type":"x"}"#);
        let transmitter = Transmitter::inline("http://localhost:5000", mock);

        for _ in 0..2 {
            let settled = transmitter.send_player_message(&request()).wait();
            assert!(!settled.success);
            assert_eq!(settled.response, ResponseSendPlayerMessage::default());
        }
    }

    #[test]
    fn transport_error_yields_default() {
        let mock = MockTransport::new();
        mock.fail(RESET_ENDPOINT, "connection refused");
        let transmitter = Transmitter::inline("http://localhost:5000", mock);

        let settled = transmitter.reset(&RequestReset {}).wait();
        assert!(!settled.success);
        assert_eq!(settled.response, ResponseReset::default());
    }

    #[test]
    fn reset_posts_empty_object() {
        let mock = MockTransport::new();
        mock.reply(
            RESET_ENDPOINT,
            200,
            r#"{"result":true,"first_message":"Hello","face_type":1}"#,
        );
        let transmitter = Transmitter::inline("http://localhost:5000/", mock.clone());

        let settled: Settled<ResponseReset> = transmitter.send(RESET_ENDPOINT, &RequestReset {}).wait();
        assert!(settled.success);
        assert_eq!(settled.response.first_message, "Hello");
        assert_eq!(
            mock.requests(),
            vec![("http://localhost:5000/reset".to_string(), "{}".to_string())]
        );
    }

    #[test]
    fn inline_settles_before_poll() {
        let mock = MockTransport::new();
        mock.reply(
            RESET_ENDPOINT,
            200,
            r#"{"result":true,"first_message":"Hello","face_type":1}"#,
        );
        let transmitter = Transmitter::inline("http://localhost:5000", mock);

        let pending = transmitter.reset(&RequestReset {});
        let settled = pending.poll().unwrap();
        assert!(settled.success);
    }

    #[test]
    fn threaded_dispatch_settles() {
        let mock = MockTransport::new();
        mock.reply(
            RESET_ENDPOINT,
            200,
            r#"{"result":true,"first_message":"Hello","face_type":1}"#,
        );
        let transmitter = Transmitter::new("http://localhost:5000", mock);

        let settled = transmitter.reset(&RequestReset {}).wait();
        assert!(settled.success);
        assert_eq!(settled.response.face_type, 1);
    }
}
