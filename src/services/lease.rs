//! Database-backed run lease: at most one sync at a time for every process that
//! shares the SQLite file (the `run` loop and any manual `sync`).
//!
//! The lease is a single row taken inside an IMMEDIATE transaction. A holder that
//! died without releasing is ignored once its lease is older than `STALE_AFTER`.

use crate::db::models::{NewSyncLease, SYNC_LEASE_ROW};
use crate::schema;
use chrono::{NaiveDateTime, TimeDelta};
use diesel::SqliteConnection;
use diesel::prelude::*;
use log::{debug, warn};

pub const STALE_AFTER: TimeDelta = TimeDelta::minutes(10);

/// Proof of holding the lease. Release it with [`SyncLease::release`].
#[derive(Debug)]
#[must_use]
pub struct SyncLease {
    token: i64,
}

/// `Ok(None)` when another holder has a live lease.
pub fn try_acquire(conn: &mut SqliteConnection, now: NaiveDateTime) -> Result<Option<SyncLease>, String> {
    use schema::sync_lease::dsl as S;

    let token = rand::random::<i64>();
    conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
        let stale = diesel::delete(S::sync_lease.filter(S::acquired_at.le(now - STALE_AFTER))).execute(conn)?;
        if stale > 0 {
            warn!("Discarded a sync lease older than {} minutes", STALE_AFTER.num_minutes());
        }

        let inserted = diesel::insert_into(S::sync_lease)
            .values(&NewSyncLease {
                id: SYNC_LEASE_ROW,
                token,
                acquired_at: now,
            })
            .on_conflict(S::id)
            .do_nothing()
            .execute(conn)?;
        Ok(inserted)
    })
    .map(|inserted| {
        if inserted == 1 {
            debug!("Acquired sync lease {:x}", token);
            Some(SyncLease { token })
        } else {
            None
        }
    })
    .map_err(|e| format!("acquire sync lease failed: {}", e))
}

impl SyncLease {
    /// Drops the row only if it is still ours; a lease taken over as stale is left alone.
    pub fn release(self, conn: &mut SqliteConnection) -> Result<(), String> {
        use schema::sync_lease::dsl as S;

        let removed = diesel::delete(S::sync_lease.filter(S::id.eq(SYNC_LEASE_ROW)).filter(S::token.eq(self.token)))
            .execute(conn)
            .map_err(|e| format!("release sync lease failed: {}", e))?;
        if removed == 0 {
            warn!("Sync lease {:x} was taken over before release", self.token);
        }
        Ok(())
    }
}
