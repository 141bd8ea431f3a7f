//! Explicit stage results: every external call resolves to either its primary
//! value or a substituted value tagged with the reason it was substituted.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use supportflow_shared::{Result, SupportFlowError};

/// Why a stage used its substitute instead of the collaborator's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The collaborator was never reachable (or has been closed).
    Unavailable(String),
    /// The collaborator answered with nothing usable.
    EmptyResults,
    /// The call itself failed (transport, HTTP status, backend error).
    CallFailed(String),
    /// The reply could not be parsed into the expected shape.
    Malformed(String),
    /// The call did not finish within the stage deadline (seconds).
    TimedOut(u64),
    /// The reply parsed but carried a value outside its allowed range.
    OutOfRange(String),
}

impl FallbackReason {
    /// Map a collaborator error onto the reason taxonomy.
    pub fn from_error(err: &SupportFlowError) -> Self {
        match err {
            SupportFlowError::Timeout { secs, .. } => Self::TimedOut(*secs),
            e if e.is_parse() => Self::Malformed(e.to_string()),
            e => Self::CallFailed(e.to_string()),
        }
    }

    /// Short machine-friendly label for logs and metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::EmptyResults => "empty_results",
            Self::CallFailed(_) => "call_failed",
            Self::Malformed(_) => "malformed",
            Self::TimedOut(_) => "timed_out",
            Self::OutOfRange(_) => "out_of_range",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(why) => write!(f, "unavailable: {why}"),
            Self::EmptyResults => f.write_str("no results"),
            Self::CallFailed(why) => write!(f, "call failed: {why}"),
            Self::Malformed(why) => write!(f, "malformed output: {why}"),
            Self::TimedOut(secs) => write!(f, "timed out after {secs}s"),
            Self::OutOfRange(why) => write!(f, "out of range: {why}"),
        }
    }
}

/// Result of one stage: the collaborator's value, or a tagged substitute.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Primary(T),
    Fallback { value: T, reason: FallbackReason },
}

impl<T> StageOutcome<T> {
    pub fn fallback(value: T, reason: FallbackReason) -> Self {
        Self::Fallback { value, reason }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Primary(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Primary(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Self::Primary(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Split into the value and, if substituted, the reason.
    pub fn into_parts(self) -> (T, Option<FallbackReason>) {
        match self {
            Self::Primary(value) => (value, None),
            Self::Fallback { value, reason } => (value, Some(reason)),
        }
    }
}

/// Run one external call under a deadline.
///
/// An elapsed deadline becomes [`SupportFlowError::Timeout`]; dropping the
/// inner future abandons the call.
pub async fn with_deadline<T, F>(operation: &str, secs: u64, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(SupportFlowError::Timeout {
            operation: operation.to_string(),
            secs,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_reasons() {
        let timeout = SupportFlowError::Timeout {
            operation: "classify".into(),
            secs: 5,
        };
        assert_eq!(FallbackReason::from_error(&timeout), FallbackReason::TimedOut(5));
        assert!(matches!(
            FallbackReason::from_error(&SupportFlowError::parse("bad json")),
            FallbackReason::Malformed(_)
        ));
        assert!(matches!(
            FallbackReason::from_error(&SupportFlowError::Llm("HTTP 500".into())),
            FallbackReason::CallFailed(_)
        ));
    }

    #[test]
    fn outcome_accessors() {
        let primary = StageOutcome::Primary(1);
        assert!(!primary.is_fallback());
        assert_eq!(primary.fallback_reason(), None);

        let fallback = StageOutcome::fallback(2, FallbackReason::EmptyResults);
        assert_eq!(*fallback.value(), 2);
        assert_eq!(fallback.fallback_reason(), Some(&FallbackReason::EmptyResults));
        assert_eq!(fallback.into_parts(), (2, Some(FallbackReason::EmptyResults)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_elapses_into_timeout() {
        let err = with_deadline("draft", 2, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, SupportFlowError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, SupportFlowError::Timeout { secs: 2, .. }));
        assert_eq!(err.to_string(), "draft timed out after 2s");
    }

    #[tokio::test]
    async fn deadline_passes_results_through() {
        let value = with_deadline("draft", 2, async { Ok::<_, SupportFlowError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
