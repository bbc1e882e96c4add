//! Post-mint validation probes.
//!
//! A probe proves a token works against the real API before it is promoted.

pub mod balance;

pub use balance::BalanceProbe;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("probe endpoint returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("probe response is malformed: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait ValidationProbe: Send + Sync {
    /// Display name for logging.
    fn name(&self) -> &str;

    /// Query account state for `address` authenticating with `token`.
    async fn check_account(&self, address: &str, token: &str) -> Result<ProbeReport, ProbeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Accept,
    Reject,
    Unreachable,
}

/// Probe with a fixed verdict, for offline runs.
#[derive(Debug)]
pub struct StaticProbe {
    verdict: Verdict,
    calls: AtomicUsize,
}

impl StaticProbe {
    fn with_verdict(verdict: Verdict) -> Self {
        Self {
            verdict,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn passing() -> Self {
        Self::with_verdict(Verdict::Accept)
    }

    pub fn failing() -> Self {
        Self::with_verdict(Verdict::Reject)
    }

    /// Every check fails with a 503 from the API.
    pub fn erroring() -> Self {
        Self::with_verdict(Verdict::Unreachable)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValidationProbe for StaticProbe {
    fn name(&self) -> &str {
        "static"
    }

    async fn check_account(&self, address: &str, _token: &str) -> Result<ProbeReport, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.verdict {
            Verdict::Accept => Ok(ProbeReport {
                ok: true,
                detail: format!("account {address} accepted"),
            }),
            Verdict::Reject => Ok(ProbeReport {
                ok: false,
                detail: format!("account {address} rejected"),
            }),
            Verdict::Unreachable => Err(ProbeError::Service {
                status: 503,
                message: "service unavailable".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_verdicts() {
        let passing = StaticProbe::passing();
        assert!(passing.check_account("addr", "tok").await.unwrap().ok);
        assert!(!StaticProbe::failing().check_account("addr", "tok").await.unwrap().ok);

        let erroring = StaticProbe::erroring();
        let err = erroring.check_account("addr", "tok").await.unwrap_err();
        assert!(matches!(err, ProbeError::Service { status: 503, .. }));
        assert_eq!(erroring.call_count(), 1);
    }
}
