/// Bad input, configuration, or client request.
pub const EXIT_INPUT: u8 = 2;
/// Nothing usable remained to forecast.
pub const EXIT_NO_DATA: u8 = 3;
/// Upstream fetch or file I/O failure.
pub const EXIT_UPSTREAM: u8 = 4;
/// Model artifact load or inference failure.
pub const EXIT_MODEL: u8 = 5;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Errors caused by what the caller sent rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self.exit_code, EXIT_INPUT | EXIT_NO_DATA)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_input_and_no_data() {
        assert!(AppError::new(EXIT_INPUT, "bad").is_client_error());
        assert!(AppError::new(EXIT_NO_DATA, "empty").is_client_error());
        assert!(!AppError::new(EXIT_UPSTREAM, "down").is_client_error());
        assert!(!AppError::new(EXIT_MODEL, "nan").is_client_error());
    }
}
