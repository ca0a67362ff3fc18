pub mod transmitter;

pub const RESET_ENDPOINT: &str = "reset";
pub const SEND_MESSAGE_ENDPOINT: &str = "send_message";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RequestReset {}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResponseReset {
    pub result: bool,
    pub first_message: String,
    pub face_type: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RequestSendPlayerMessage {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResponseSendPlayerMessage {
    pub message: String,
    pub face_type: i32,
    pub score: i32,
    pub end: bool,
}
