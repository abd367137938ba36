// src/utils.rs
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use std::net::IpAddr;
use std::fmt;

use crate::assembler::ListError;
use crate::models::game::GameError;

#[derive(Debug)]
pub enum RequestError {
    MissingPeerIP,
    RateLimitExceeded,
    InvalidRequest(String),
    ListNotReady,
    QueryFailed(ListError),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPeerIP => write!(f, "Failed to extract client IP"),
            Self::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            Self::InvalidRequest(reason) => write!(f, "Invalid request: {}", reason),
            Self::ListNotReady => write!(f, "Server list has not been retrieved yet"),
            Self::QueryFailed(e) => write!(f, "{}", e),
        }
    }
}

impl ResponseError for RequestError {
    fn error_response(&self) -> HttpResponse {
        match self {
            Self::RateLimitExceeded => {
                HttpResponse::TooManyRequests().body(self.to_string())
            }
            Self::ListNotReady => {
                HttpResponse::ServiceUnavailable().body(self.to_string())
            }
            Self::QueryFailed(ListError::Discovery(_)) => {
                HttpResponse::BadGateway().body(self.to_string())
            }
            Self::QueryFailed(ListError::Game(GameError::Load(_))) => {
                HttpResponse::InternalServerError().body(self.to_string())
            }
            _ => HttpResponse::BadRequest().body(self.to_string())
        }
    }
}

impl From<ListError> for RequestError {
    fn from(e: ListError) -> Self {
        Self::QueryFailed(e)
    }
}

/// The connecting peer's address, used as the rate-limit key.
pub fn client_ip(req: &HttpRequest) -> Result<IpAddr, RequestError> {
    req.peer_addr()
        .map(|addr| addr.ip())
        .ok_or(RequestError::MissingPeerIP)
}
