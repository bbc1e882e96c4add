use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `jwt_rotator=info` filter and
/// `LOG_FORMAT=json` switches to JSON lines for log shippers.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jwt_rotator=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Redact a secret value for display (show first 2 and last 2 chars).
pub fn redact_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_short_value() {
        assert_eq!(redact_secret("abc"), "***");
    }

    #[test]
    fn redact_long_value() {
        let redacted = redact_secret("eyJhbGciOiJIUzI1NiJ9.e30.sig");
        assert!(redacted.starts_with("ey"));
        assert!(redacted.ends_with("ig"));
        assert!(redacted.contains('…'));
    }
}
