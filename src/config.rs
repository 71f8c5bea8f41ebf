use std::time::Duration;

use anyhow::{bail, Context};

/// Signing secrets and lifetimes for the two token classes.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
    pub issuer: String,
    pub audience: String,
}

/// S3-compatible bucket that receives avatar and cover images.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: Option<String>,
    pub upload_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub store_timeout: Duration,
    pub jwt: JwtConfig,
    pub media: Option<MediaConfig>,
    pub upload_max_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => bail!("{key} must be set"),
            }
        };
        let number = |key: &str, default: u64| -> anyhow::Result<u64> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{key} must be a whole number, got {value:?}")),
                None => Ok(default),
            }
        };
        let seconds =
            |key: &str, default: u64| number(key, default).map(Duration::from_secs);

        let jwt = JwtConfig {
            access_secret: required("ACCESS_TOKEN_SECRET")?,
            access_ttl: parse_ttl(&required("ACCESS_TOKEN_TTL")?).context("ACCESS_TOKEN_TTL")?,
            refresh_secret: required("REFRESH_TOKEN_SECRET")?,
            refresh_ttl: parse_ttl(&required("REFRESH_TOKEN_TTL")?)
                .context("REFRESH_TOKEN_TTL")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "vidvault".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "vidvault-users".into()),
        };
        if jwt.access_secret == jwt.refresh_secret {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }

        let media = match lookup("MEDIA_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            Some(endpoint) => Some(MediaConfig {
                endpoint,
                bucket: required("MEDIA_BUCKET")?,
                access_key: required("MEDIA_ACCESS_KEY")?,
                secret_key: required("MEDIA_SECRET_KEY")?,
                region: lookup("MEDIA_REGION").unwrap_or_else(|| "us-east-1".into()),
                public_url: lookup("MEDIA_PUBLIC_URL").filter(|v| !v.trim().is_empty()),
                upload_timeout: seconds("UPLOAD_TIMEOUT_SECS", 30)?,
            }),
            None => None,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            store_timeout: seconds("STORE_TIMEOUT_SECS", 5)?,
            jwt,
            media,
            upload_max_bytes: usize::try_from(number("UPLOAD_MAX_BYTES", 10 * 1024 * 1024)?)
                .context("UPLOAD_MAX_BYTES")?,
        })
    }
}

/// Upper bound for token lifetimes: ten years.
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Parses `15m`, `1h`, `10d`, `30s` or a bare number of seconds.
pub fn parse_ttl(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits
        .parse()
        .with_context(|| format!("invalid duration {raw:?}"))?;
    let unit_secs: u64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        other => bail!("unknown duration unit {other:?} in {raw:?}"),
    };
    let Some(secs) = value.checked_mul(unit_secs) else {
        bail!("duration {raw:?} is too large");
    };
    if secs == 0 {
        bail!("duration {raw:?} must be positive");
    }
    let ttl = Duration::from_secs(secs);
    if ttl > MAX_TTL {
        bail!("duration {raw:?} exceeds the {}-day maximum", MAX_TTL.as_secs() / 86_400);
    }
    Ok(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("ACCESS_TOKEN_SECRET", "access-secret"),
            ("ACCESS_TOKEN_TTL", "15m"),
            ("REFRESH_TOKEN_SECRET", "refresh-secret"),
            ("REFRESH_TOKEN_TTL", "10d"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> anyhow::Result<AppConfig> {
        AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn parse_ttl_units() {
        assert_eq!(parse_ttl("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_ttl("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_ttl("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_ttl("10d").unwrap(), Duration::from_secs(864_000));
        assert_eq!(parse_ttl("3600").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn parse_ttl_rejects_garbage() {
        assert!(parse_ttl("").is_err());
        assert!(parse_ttl("10x").is_err());
        assert!(parse_ttl("d").is_err());
        assert!(parse_ttl("0m").is_err());
    }

    #[test]
    fn parse_ttl_rejects_overflow() {
        assert!(parse_ttl("300000000000000d").is_err());
        assert!(parse_ttl("3000000d").is_err());
        assert!(parse_ttl(&format!("{}s", u64::MAX)).is_err());
        assert_eq!(parse_ttl("3650d").unwrap(), MAX_TTL);
    }

    #[test]
    fn malformed_numeric_settings_fail() {
        for key in ["STORE_TIMEOUT_SECS", "UPLOAD_MAX_BYTES"] {
            let mut env = base_env();
            env.insert(key, "5s");
            let err = load(&env).unwrap_err();
            assert!(format!("{err:#}").contains(key), "{key}: {err:#}");
        }

        let mut env = base_env();
        env.insert("MEDIA_ENDPOINT", "http://localhost:9000");
        env.insert("MEDIA_BUCKET", "avatars");
        env.insert("MEDIA_ACCESS_KEY", "minio");
        env.insert("MEDIA_SECRET_KEY", "minio123");
        env.insert("UPLOAD_TIMEOUT_SECS", "thirty");
        assert!(load(&env).is_err());

        env.insert("UPLOAD_TIMEOUT_SECS", "45");
        env.insert("STORE_TIMEOUT_SECS", "2");
        let cfg = load(&env).expect("config loads");
        assert_eq!(cfg.store_timeout, Duration::from_secs(2));
        assert_eq!(cfg.media.expect("media").upload_timeout, Duration::from_secs(45));
    }

    #[test]
    fn loads_required_token_settings_with_defaults() {
        let cfg = load(&base_env()).expect("config loads");
        assert_eq!(cfg.jwt.access_ttl, Duration::from_secs(900));
        assert_eq!(cfg.jwt.refresh_ttl, Duration::from_secs(864_000));
        assert_eq!(cfg.jwt.issuer, "vidvault");
        assert_eq!(cfg.store_timeout, Duration::from_secs(5));
        assert!(cfg.database_url.is_none());
        assert!(cfg.media.is_none());
    }

    #[test]
    fn each_token_setting_is_required() {
        for key in [
            "ACCESS_TOKEN_SECRET",
            "ACCESS_TOKEN_TTL",
            "REFRESH_TOKEN_SECRET",
            "REFRESH_TOKEN_TTL",
        ] {
            let mut env = base_env();
            env.remove(key);
            let err = load(&env).unwrap_err();
            assert!(format!("{err:#}").contains(key), "missing {key}: {err:#}");
        }
    }

    #[test]
    fn rejects_shared_secret() {
        let mut env = base_env();
        env.insert("REFRESH_TOKEN_SECRET", "access-secret");
        assert!(load(&env).is_err());
    }

    #[test]
    fn media_settings_require_bucket_and_keys() {
        let mut env = base_env();
        env.insert("MEDIA_ENDPOINT", "http://localhost:9000");
        assert!(load(&env).is_err());

        env.insert("MEDIA_BUCKET", "avatars");
        env.insert("MEDIA_ACCESS_KEY", "minio");
        env.insert("MEDIA_SECRET_KEY", "minio123");
        let cfg = load(&env).expect("config loads");
        let media = cfg.media.expect("media configured");
        assert_eq!(media.bucket, "avatars");
        assert_eq!(media.region, "us-east-1");
        assert_eq!(media.upload_timeout, Duration::from_secs(30));
    }
}
