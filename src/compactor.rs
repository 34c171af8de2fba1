use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Background task that rewrites a company journal once `threshold` records
/// have been appended since the last compaction.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_needed(&engine, threshold).await;
    }
}

/// Compact when the journal grew past `threshold`. Returns whether it did.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    let company = &engine.company().name;
    match engine.compact_wal().await {
        Ok(()) => {
            info!("compacted journal of {company} after {appends} appends");
            true
        }
        Err(e) => {
            warn!("compaction of {company} failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("deskspace_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn company() -> Company {
        Company {
            id: Ulid::new(),
            name: "Initech".into(),
            certification: "INI-7".into(),
        }
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let founder = User {
            id: Ulid::new(),
            email: "bill@initech.io".into(),
            username: "bill".into(),
            role: Role::Admin,
        };
        let engine = Engine::create(path.clone(), company(), founder).unwrap();
        let floor = Ulid::new();
        engine.create_floor(floor, "F".into()).await.unwrap();
        for i in 0..5 {
            engine.rename_floor(floor, format!("F{i}")).await.unwrap();
        }
        // Company + founder + 1 create + 5 renames.
        assert!(!compact_if_needed(&engine, 9).await);
        assert_eq!(engine.wal_appends_since_compact().await, 8);

        assert!(compact_if_needed(&engine, 8).await);
        assert_eq!(engine.wal_appends_since_compact().await, 0);

        let replayed = Engine::open(path).unwrap();
        assert_eq!(replayed.get_floor(&floor).unwrap().name, "F4");
    }
}
