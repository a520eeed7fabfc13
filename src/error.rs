use std::error;
use std::fmt;
use std::io;

use crate::proto;

/// Reason the device rejected the `AuthChallenge` sent during connect.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthErrorType {
    InternalError,
    NoTls,
    SignatureAlgorithmUnavailable,
}

impl From<proto::AuthError_ErrorType> for AuthErrorType {
    fn from(error_type: proto::AuthError_ErrorType) -> Self {
        match error_type {
            proto::AuthError_ErrorType::INTERNAL_ERROR => AuthErrorType::InternalError,
            proto::AuthError_ErrorType::NO_TLS => AuthErrorType::NoTls,
            proto::AuthError_ErrorType::SIGNATURE_ALGORITHM_UNAVAILABLE => {
                AuthErrorType::SignatureAlgorithmUnavailable
            }
        }
    }
}

impl fmt::Display for AuthErrorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AuthErrorType::InternalError => write!(f, "internal error"),
            AuthErrorType::NoTls => write!(f, "no TLS"),
            AuthErrorType::SignatureAlgorithmUnavailable => {
                write!(f, "signature algorithm unavailable")
            }
        }
    }
}

/// Everything that can go wrong when talking to a cast device.
///
/// Semantic errors reported by the device (`InvalidRequest`, `LaunchError`,
/// `LoadFailed`, `LoadCancelled`, `InvalidPlayerState`) are recoverable at the
/// caller. `Disconnected` is recoverable by reconnecting.
/// `AuthenticationFailed` is fatal for the channel.
#[derive(Debug)]
pub enum Error {
    /// The device rejected the device auth challenge.
    AuthenticationFailed(AuthErrorType),
    /// The caller cancelled a pending request.
    Cancelled,
    /// The socket was closed by the peer or an I/O failure interrupted a
    /// pending request.
    Disconnected,
    /// The device reports a fixed volume and cannot change it.
    FixedVolume,
    /// The requested media operation is invalid in the player's current state.
    InvalidPlayerState,
    /// The device rejected a request as malformed.
    InvalidRequest(Option<String>),
    /// I/O failure while establishing the connection.
    Io(io::Error),
    /// The device failed to launch the requested application.
    LaunchError(Option<String>),
    /// An in-flight load was cancelled by a second load request.
    LoadCancelled(Option<i64>),
    /// The device could not load the media.
    LoadFailed,
    /// The operation requires a running application.
    NoApplicationRunning,
    /// Malformed frame, unexpected payload, or envelope violating the
    /// protocol rules.
    Protocol(String),
    /// No response arrived within the configured timeout.
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::AuthenticationFailed(ref error_type) => {
                write!(f, "device auth failed: {}", error_type)
            }
            Error::Cancelled => write!(f, "request cancelled"),
            Error::Disconnected => write!(f, "connection to cast device lost"),
            Error::FixedVolume => write!(f, "cast device volume is fixed"),
            Error::InvalidPlayerState => write!(f, "operation invalid in current player state"),
            Error::InvalidRequest(Some(ref reason)) => write!(f, "invalid request: {}", reason),
            Error::InvalidRequest(None) => write!(f, "invalid request"),
            Error::Io(ref err) => write!(f, "connect failed: {}", err),
            Error::LaunchError(Some(ref reason)) => write!(f, "app launch failed: {}", reason),
            Error::LaunchError(None) => write!(f, "app launch failed"),
            Error::LoadCancelled(Some(item)) => write!(f, "load cancelled (item {})", item),
            Error::LoadCancelled(None) => write!(f, "load cancelled"),
            Error::LoadFailed => write!(f, "load failed"),
            Error::NoApplicationRunning => write!(f, "no application running"),
            Error::Protocol(ref detail) => write!(f, "protocol error: {}", detail),
            Error::Timeout => write!(f, "no response from cast device within timeout"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
