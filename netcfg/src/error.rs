//! Error types for network configuration operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetCfgError {
    #[error("Failed to connect to WMI: {0}")]
    ConnectionFailed(String),

    #[error("WMI error: {0}")]
    WmiError(String),

    #[error("Required property missing: {0}")]
    MissingProperty(String),

    #[error("Network adapter configuration is not supported on this platform")]
    Unsupported,

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsError(#[from] windows::core::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NetCfgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message() {
        assert_eq!(
            NetCfgError::Unsupported.to_string(),
            "Network adapter configuration is not supported on this platform"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: NetCfgError = io.into();
        assert!(matches!(err, NetCfgError::IoError(_)));
        assert_eq!(err.to_string(), "IO error: access denied");
    }
}
