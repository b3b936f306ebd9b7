//! The narrow camera interface the targeting pipeline depends on.

use std::future::Future;

use thiserror::Error;

use crate::models::config::MoveSpeed;
use crate::models::orientation::NormalizedOrientation;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("not connected: call connect() first")]
    NotConnected,
    #[error("no active profile selected")]
    NoActiveProfile,
    #[error("unknown profile token: {0}")]
    UnknownProfile(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{action} failed with HTTP {status}: {fault}")]
    Soap {
        action: &'static str,
        status: u16,
        fault: String,
    },
    #[error("malformed {action} response: {detail}")]
    MalformedResponse {
        action: &'static str,
        detail: String,
    },
    #[error("digest authentication failed: {0}")]
    Digest(#[from] digest_auth::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Absolute-move command in normalized device units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteMove {
    pub pan: f64,
    pub tilt: f64,
    /// `None` leaves the zoom axis untouched.
    pub zoom: Option<f64>,
    pub speed: MoveSpeed,
}

/// Camera operations required by the targeting pipeline.
///
/// `move_absolute` returns once the command is accepted; it does not wait for
/// the camera to arrive.
pub trait CameraPort {
    fn current_orientation(
        &self,
    ) -> impl Future<Output = Result<NormalizedOrientation, CameraError>> + Send;

    fn move_absolute(
        &self,
        command: AbsoluteMove,
    ) -> impl Future<Output = Result<(), CameraError>> + Send;
}
