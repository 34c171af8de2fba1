use std::path::PathBuf;

use crate::engine::OperatingHours;

/// Process configuration, read once from `DESKSPACE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub hours: OperatingHours,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

const DEFAULT_JWT_SECRET: &str = "deskspace";

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their default;
    /// set but unparsable keys are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Result<Option<T>, String> {
            match lookup(key) {
                None => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| format!("{key} has an invalid value: {raw}")),
            }
        }

        let default_hours = OperatingHours::default();
        let open = parsed(&lookup, "DESKSPACE_OPEN_HOUR")?.unwrap_or(default_hours.open());
        let close = parsed(&lookup, "DESKSPACE_CLOSE_HOUR")?.unwrap_or(default_hours.close());
        let hours = OperatingHours::new(open, close).map_err(|e| e.to_string())?;

        let jwt_secret = lookup("DESKSPACE_JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("DESKSPACE_JWT_SECRET not set, using the development secret");
            DEFAULT_JWT_SECRET.into()
        });

        Ok(Self {
            bind: lookup("DESKSPACE_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&lookup, "DESKSPACE_PORT")?.unwrap_or(8080),
            data_dir: lookup("DESKSPACE_DATA_DIR")
                .unwrap_or_else(|| "./data".into())
                .into(),
            jwt_secret,
            hours,
            compact_threshold: parsed(&lookup, "DESKSPACE_COMPACT_THRESHOLD")?.unwrap_or(1000),
            metrics_port: parsed(&lookup, "DESKSPACE_METRICS_PORT")?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
