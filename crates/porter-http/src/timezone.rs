use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimezoneError {
    #[error("unknown timezone")]
    Unknown,

    #[error("timezone support is unavailable")]
    Unsupported,
}

/// Resolves IANA timezone identifiers to their canonical name.
pub trait TimezoneSupport: Send + Sync {
    fn resolve(&self, name: &str) -> Result<String, TimezoneError>;
}

/// The bundled IANA database.
#[derive(Debug, Clone, Copy, Default)]
pub struct IanaTimezones;

impl TimezoneSupport for IanaTimezones {
    fn resolve(&self, name: &str) -> Result<String, TimezoneError> {
        name.parse::<Tz>()
            .map(|tz| tz.name().to_string())
            .map_err(|_| TimezoneError::Unknown)
    }
}

/// A platform without any timezone database.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTimezoneSupport;

impl TimezoneSupport for NoTimezoneSupport {
    fn resolve(&self, _name: &str) -> Result<String, TimezoneError> {
        Err(TimezoneError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_iana_names() {
        assert_eq!(IanaTimezones.resolve("Europe/Paris").unwrap(), "Europe/Paris");
        assert_eq!(IanaTimezones.resolve("Mars/Olympus"), Err(TimezoneError::Unknown));
        assert_eq!(NoTimezoneSupport.resolve("UTC"), Err(TimezoneError::Unsupported));
    }
}
