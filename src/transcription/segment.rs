//! Per-segment transcription with a hard deadline.

use super::{Describer, TranscriptFragment};
use crate::error::{LecternError, Result};
use crate::media::Segment;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Runs one describer call per segment.
///
/// Every call is bounded by `timeout`; a timed out call fails on its own and does
/// not hold up calls for other segments.
pub struct SegmentTranscriber {
    describer: Arc<dyn Describer>,
    instruction: String,
    timeout: Duration,
}

impl SegmentTranscriber {
    pub fn new(describer: Arc<dyn Describer>, instruction: String, timeout: Duration) -> Self {
        Self {
            describer,
            instruction,
            timeout,
        }
    }

    /// Describe `segment`, returning its segment-relative fragment.
    #[instrument(skip(self, segment), fields(segment = segment.index, describer = self.describer.name()))]
    pub async fn transcribe(&self, segment: &Segment) -> Result<TranscriptFragment> {
        let call = self.describer.describe(&segment.path, &self.instruction);

        let text = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                return Err(LecternError::Transcribe {
                    segment_index: segment.index,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(LecternError::Transcribe {
                    segment_index: segment.index,
                    reason: format!("timed out after {}s", self.timeout.as_secs_f64()),
                })
            }
        };

        if text.trim().is_empty() {
            return Err(LecternError::Transcribe {
                segment_index: segment.index,
                reason: "empty response".to_string(),
            });
        }

        debug!("Segment {} described ({} chars)", segment.index, text.len());
        Ok(TranscriptFragment {
            segment_index: segment.index,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{segment_at, FakeDescriber, Reply};

    fn transcriber(describer: FakeDescriber, timeout_ms: u64) -> SegmentTranscriber {
        SegmentTranscriber::new(
            Arc::new(describer),
            "describe".to_string(),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_successful_call() {
        let describer = FakeDescriber::new().reply(0, Reply::text("[00:00:00 to 00:00:05] hi"));
        let fragment = transcriber(describer, 1000)
            .transcribe(&segment_at(0, 0.0, 120.0))
            .await
            .unwrap();
        assert_eq!(fragment.segment_index, 0);
        assert_eq!(fragment.text, "[00:00:00 to 00:00:05] hi");
    }

    #[tokio::test]
    async fn test_timeout_fails_the_call() {
        let describer = FakeDescriber::new().reply(3, Reply::text("late").after_ms(2_000));
        let err = transcriber(describer, 50)
            .transcribe(&segment_at(3, 360.0, 120.0))
            .await
            .unwrap_err();
        match err {
            LecternError::Transcribe { segment_index, reason } => {
                assert_eq!(segment_index, 3);
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_response_rejected() {
        let describer = FakeDescriber::new().reply(1, Reply::text(" \n "));
        let err = transcriber(describer, 1000)
            .transcribe(&segment_at(1, 120.0, 120.0))
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::Transcribe { segment_index: 1, .. }));
    }

    #[tokio::test]
    async fn test_capability_error_wrapped() {
        let describer = FakeDescriber::new().reply(2, Reply::error("quota exceeded"));
        let err = transcriber(describer, 1000)
            .transcribe(&segment_at(2, 240.0, 120.0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }
}
