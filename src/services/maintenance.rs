use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::CinemaError;
use crate::AppState;

/// Внеполосное обслуживание: сверяет счетчики свободных мест и чинит дрейф.
pub struct MaintenanceService {
    state: Arc<AppState>,
}

impl MaintenanceService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Проходит по всем сеансам, сверяет `seats_available` с живым пересчетом и
    /// вызывает `reconcile` для разошедшихся.
    pub async fn run_reconciliation_sweep(&self) -> SweepStats {
        info!("🧹 Starting seats_available reconciliation sweep");
        let mut stats = SweepStats::default();

        let session_ids = match self.state.store.session_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to list sessions for reconciliation: {:?}", e);
                return stats;
            }
        };

        for session_id in session_ids {
            stats.checked += 1;
            match self.state.availability.verify(session_id).await {
                Ok(_) => {}
                Err(CinemaError::Inconsistency { stored, expected, .. }) => {
                    stats.drifted += 1;
                    warn!(
                        "🎫 Session {} drifted (stored {}, expected {}), reconciling",
                        session_id, stored, expected
                    );
                    self.repair(session_id, &mut stats).await;
                }
                Err(e) => {
                    stats.failed += 1;
                    error!("🎫 Failed to verify session {}: {:?}", session_id, e);
                }
            }
        }

        info!(
            "✅ Reconciliation sweep completed: {} checked, {} drifted, {} repaired, {} failed",
            stats.checked, stats.drifted, stats.repaired, stats.failed
        );
        stats
    }

    async fn repair(&self, session_id: i64, stats: &mut SweepStats) {
        match self.state.engine.reconcile(session_id).await {
            Ok(report) => {
                if report.drifted() {
                    stats.repaired += 1;
                }
                self.state.cache.invalidate_session(session_id).await;
            }
            Err(e) => {
                stats.failed += 1;
                error!("🎫 Failed to reconcile session {}: {:?}", session_id, e);
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub checked: u64,
    pub drifted: u64,
    pub repaired: u64,
    pub failed: u64,
}

impl SweepStats {
    pub fn is_clean(&self) -> bool {
        self.drifted == 0 && self.failed == 0
    }
}
