//! Crate-level error type for daemon startup and serving.
//!
//! Components report their own error enums (`ScheduleError`,
//! `SessionError`, `ConfigError`); those are handled where they occur and
//! never need to travel this far.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::from(std::io::ErrorKind::AddrInUse).into();
        assert!(matches!(err, Error::Io(e) if e.kind() == std::io::ErrorKind::AddrInUse));
    }

    #[test]
    fn settings_message_names_the_problem() {
        let err = Error::Settings("QRALARM_API_ADDR: invalid value \"x\"".into());
        assert_eq!(
            err.to_string(),
            "invalid settings: QRALARM_API_ADDR: invalid value \"x\""
        );
    }
}
