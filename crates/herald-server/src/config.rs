use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Fan-out never goes faster than one attempt per this interval.
pub const MIN_SEND_INTERVAL: Duration = Duration::from_millis(50);

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "dev-secret-change-me"];

pub struct Config {
    pub bot_token: String,
    pub api_base: String,
    pub api_secret: String,
    pub operator_ids: Vec<i64>,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub send_interval: Duration,
    pub export_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = required("HERALD_BOT_TOKEN")?;

        let api_secret = required("HERALD_API_SECRET")?;
        if PLACEHOLDER_SECRETS.contains(&api_secret.as_str()) {
            bail!("HERALD_API_SECRET is still a placeholder");
        }

        let operator_ids = parse_operator_ids(&required("HERALD_OPERATOR_IDS")?)?;

        let port: u16 = std::env::var("HERALD_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("HERALD_PORT must be a port number")?;

        let send_interval =
            parse_send_interval(std::env::var("HERALD_SEND_INTERVAL_MS").ok().as_deref())?;

        Ok(Self {
            bot_token,
            api_base: std::env::var("HERALD_API_BASE")
                .unwrap_or_else(|_| "https://api.telegram.org".into()),
            api_secret,
            operator_ids,
            db_path: std::env::var("HERALD_DB_PATH")
                .unwrap_or_else(|_| "herald.db".into())
                .into(),
            host: std::env::var("HERALD_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            send_interval,
            export_dir: std::env::var("HERALD_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("herald-exports")),
        })
    }
}

fn required(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("{} must be set", key),
    }
}

/// Comma-separated operator ids, e.g. `123456789, 987654321`.
pub fn parse_operator_ids(raw: &str) -> Result<Vec<i64>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("invalid operator id '{}'", s))
        })
        .collect::<Result<Vec<_>>>()?;

    if ids.is_empty() {
        bail!("at least one operator id is required");
    }
    Ok(ids)
}

/// Interval in milliseconds, raised to the floor if set lower. Unset means
/// the floor.
pub fn parse_send_interval(raw: Option<&str>) -> Result<Duration> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(MIN_SEND_INTERVAL);
    };
    let ms: u64 = raw
        .parse()
        .with_context(|| format!("HERALD_SEND_INTERVAL_MS must be milliseconds, got '{}'", raw))?;
    Ok(Duration::from_millis(ms).max(MIN_SEND_INTERVAL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_ids_are_trimmed() {
        let ids = parse_operator_ids("123456789, 987654321 ,1122334455").unwrap();
        assert_eq!(ids, vec![123456789, 987654321, 1122334455]);
    }

    #[test]
    fn operator_ids_reject_garbage() {
        assert!(parse_operator_ids("12,abc").is_err());
        assert!(parse_operator_ids(" , ").is_err());
    }

    #[test]
    fn send_interval_has_floor() {
        assert_eq!(parse_send_interval(None).unwrap(), MIN_SEND_INTERVAL);
        assert_eq!(parse_send_interval(Some("")).unwrap(), MIN_SEND_INTERVAL);
        assert_eq!(parse_send_interval(Some("10")).unwrap(), MIN_SEND_INTERVAL);
        assert_eq!(
            parse_send_interval(Some(" 120 ")).unwrap(),
            Duration::from_millis(120)
        );
    }

    #[test]
    fn send_interval_typo_is_an_error() {
        let err = parse_send_interval(Some("1OO")).unwrap_err();
        assert!(format!("{:#}", err).contains("HERALD_SEND_INTERVAL_MS"));
        assert!(parse_send_interval(Some("-5")).is_err());
    }
}
