//! Registration records: which controller version governs a scope.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// The version currently governing a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub scope: String,
    pub active_version: String,
    pub activated_at: String,
}

impl CacheDb {
    /// Get the registration for a scope, if any version has activated.
    pub async fn registration(&self, scope: &str) -> Result<Option<Registration>, Error> {
        let scope = scope.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Registration>, Error> {
                let reg = conn
                    .query_row(
                        "SELECT scope, active_version, activated_at FROM registrations WHERE scope = ?1",
                        params![scope],
                        |row| {
                            Ok(Registration {
                                scope: row.get(0)?,
                                active_version: row.get(1)?,
                                activated_at: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(reg)
            })
            .await
            .map_err(Error::from)
    }

    /// Record `version` as the active version for `scope`.
    pub async fn set_registration(&self, scope: &str, version: &str) -> Result<(), Error> {
        let (scope, version) = (scope.to_string(), version.to_string());
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO registrations (scope, active_version, activated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(scope) DO UPDATE SET
                        active_version = excluded.active_version,
                        activated_at = excluded.activated_at",
                    params![scope, version, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
