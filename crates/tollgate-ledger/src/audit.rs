use tollgate_types::StorageAddress;

use crate::error::LedgerError;
use crate::records::SessionState;
use crate::traits::LedgerReader;

/// Result of a full-ledger audit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    pub gateway_count: u64,
    pub session_count: u64,
    pub violations: Vec<AuditViolation>,
}

impl AuditReport {
    /// Returns `true` if all checks passed.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific invariant violation detected during an audit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditViolation {
    pub address: StorageAddress,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// A session's `used` exceeds its `estimated_deposit`.
    DepositExceeded,
    /// A gateway's `total_volume` does not equal the sum of its sessions'
    /// `used` values.
    VolumeMismatch,
    /// A gateway's `total_sessions` does not equal the number of sessions
    /// opened against it.
    SessionCountMismatch,
    /// A session window is inverted (`expires_at` before `created_at`).
    WindowInverted,
}

/// Re-checks the global invariants the state machine is supposed to
/// maintain. A clean report after any sequence of successful operations is
/// a testable property; a dirty one means the store was mutated outside
/// the ledger's operations.
pub struct LedgerAuditor;

impl LedgerAuditor {
    pub fn audit<R: LedgerReader>(reader: &R) -> Result<AuditReport, LedgerError> {
        let gateways = reader.gateways()?;
        let mut violations = Vec::new();
        let mut session_count = 0u64;

        for (gateway_address, gateway) in &gateways {
            let sessions = reader.sessions_for_gateway(gateway_address)?;
            session_count += sessions.len() as u64;

            let mut volume = 0u64;
            for (session_address, session) in &sessions {
                volume = volume.saturating_add(session.used);

                if session.used > session.estimated_deposit {
                    violations.push(AuditViolation {
                        address: *session_address,
                        kind: ViolationKind::DepositExceeded,
                        description: format!(
                            "used {} exceeds deposit {}",
                            session.used, session.estimated_deposit
                        ),
                    });
                }

                if session.expires_at < session.created_at {
                    violations.push(AuditViolation {
                        address: *session_address,
                        kind: ViolationKind::WindowInverted,
                        description: format!(
                            "expires_at {} precedes created_at {}",
                            session.expires_at, session.created_at
                        ),
                    });
                }
            }

            if gateway.total_volume != volume {
                violations.push(AuditViolation {
                    address: *gateway_address,
                    kind: ViolationKind::VolumeMismatch,
                    description: format!(
                        "gateway {:?} records volume {}, sessions sum to {}",
                        gateway.slug, gateway.total_volume, volume
                    ),
                });
            }

            if gateway.total_sessions != sessions.len() as u64 {
                violations.push(AuditViolation {
                    address: *gateway_address,
                    kind: ViolationKind::SessionCountMismatch,
                    description: format!(
                        "gateway {:?} records {} sessions, found {}",
                        gateway.slug,
                        gateway.total_sessions,
                        sessions.len()
                    ),
                });
            }
        }

        Ok(AuditReport {
            gateway_count: gateways.len() as u64,
            session_count,
            violations,
        })
    }
}
