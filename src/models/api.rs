use serde::{ Serialize, Deserialize };

use crate::models::chat::Turn;
use crate::sentiment::Sentiment;

#[derive(Deserialize, Debug)]
pub struct ReplyRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ReplyResponse {
    pub reply: String,
    pub sentiment: Sentiment,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct StatusResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HistoryResponse {
    pub turns: Vec<Turn>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
