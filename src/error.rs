// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Error kinds surfaced by the gateway (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayErrorKind {
    /// Upstream connect/close, downstream send failures.
    Transport,
    /// Malformed client JSON, unsupported frame shape.
    Protocol,
    /// Unknown channel, non-publish channel, bad teleop shape.
    Validation,
    /// Missing bridge connection for a configured channel.
    Resource,
    /// Mapping fetch payload unparseable.
    External,
}

impl GatewayErrorKind {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Transport => 502,
            Self::Protocol => 400,
            Self::Validation => 400,
            Self::Resource => 404,
            Self::External => 502,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "TRANSPORT",
            Self::Protocol => "PROTOCOL",
            Self::Validation => "VALIDATION",
            Self::Resource => "RESOURCE",
            Self::External => "EXTERNAL",
        }
    }
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gateway error: a kind plus a human-readable message.
#[derive(Debug, Clone)]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Transport, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Protocol, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Validation, message)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Resource, message)
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::External, message)
    }

    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody { code: self.kind.as_str().to_owned(), message: self.message.clone() }
    }

    pub fn to_http_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse { error: self.to_error_body() }))
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for GatewayError {}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
