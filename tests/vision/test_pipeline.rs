// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end pipeline tests with a mock recognizer
//!
//! Pages are synthetic: dark bands on light paper. No model files needed.

use handscript_node::config::{PipelineConfig, SegmentationStrategy, ThresholdMethod};
use handscript_node::vision::ocr::{
    LineRecognizer, RecognitionError, RecognizerPool, NO_TEXT_SENTINEL,
    RECOGNITION_ERROR_SENTINEL,
};
use handscript_node::vision::{HandwritingPipeline, PipelineError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::common::{
    encode_png, extent_reader, mock_recognizer, page_with_strokes, synthetic_page, THREE_BANDS,
};

fn pipeline(config: PipelineConfig, recognizer: impl LineRecognizer + 'static) -> HandwritingPipeline {
    HandwritingPipeline::new(config, Arc::new(recognizer)).unwrap()
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;

    /// Three bands become three padded lines, read top to bottom
    #[tokio::test]
    async fn test_three_lines_in_page_order() {
        let mut mock = mock_recognizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        mock.expect_recognize()
            .withf(|line| line.height() == 32 && line.width() == 400)
            .times(3)
            .returning(move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Ok(format!("line {}", n + 1))
            });

        let transcript = pipeline(PipelineConfig::default(), mock)
            .transcribe(synthetic_page(&THREE_BANDS))
            .await
            .unwrap();

        assert_eq!(transcript.text, "line 1\nline 2\nline 3");
        assert_eq!(transcript.lines.len(), 3);
        assert_eq!(transcript.failed_lines(), 0);
        assert_eq!((transcript.width, transcript.height), (400, 300));

        // Each interval covers its band
        for (line, &(top, bottom)) in transcript.lines.iter().zip(THREE_BANDS.iter()) {
            assert!(line.interval.top <= top + 1 && line.interval.bottom + 1 >= bottom);
        }
    }

    /// A recognizer fault on line 2 leaves lines 1 and 3 intact
    #[tokio::test]
    async fn test_line_fault_is_isolated() {
        let mut mock = mock_recognizer();
        let calls = AtomicUsize::new(0);
        mock.expect_recognize().times(3).returning(move |_| {
            match calls.fetch_add(1, Ordering::SeqCst) {
                1 => Err(RecognitionError::Internal("bad stroke".to_string())),
                n => Ok(format!("line {}", n + 1)),
            }
        });

        let transcript = pipeline(PipelineConfig::default(), mock)
            .transcribe(synthetic_page(&THREE_BANDS))
            .await
            .unwrap();

        assert_eq!(
            transcript.text,
            format!("line 1\n{}\nline 3", RECOGNITION_ERROR_SENTINEL)
        );
        assert_eq!(transcript.failed_lines(), 1);
    }

    /// A whitespace-only result becomes the no-text sentinel for that line
    #[tokio::test]
    async fn test_whitespace_line_becomes_sentinel() {
        let mut mock = mock_recognizer();
        mock.expect_recognize()
            .times(1)
            .returning(|_| Ok("  \t ".to_string()));

        let transcript = pipeline(PipelineConfig::default(), mock)
            .transcribe(synthetic_page(&[(100, 120)]))
            .await
            .unwrap();

        assert_eq!(transcript.text, NO_TEXT_SENTINEL);
        assert_eq!(transcript.lines.len(), 1);
    }

    /// A blank page never reaches the recognizer
    #[tokio::test]
    async fn test_blank_page() {
        let mut mock = mock_recognizer();
        mock.expect_recognize().times(0);

        let transcript = pipeline(PipelineConfig::default(), mock)
            .transcribe(synthetic_page(&[]))
            .await
            .unwrap();

        assert_eq!(transcript.text, NO_TEXT_SENTINEL);
        assert!(transcript.lines.is_empty());
    }

    /// A systemic recognizer failure aborts the page
    #[tokio::test]
    async fn test_unavailable_recognizer_aborts_page() {
        let mut mock = mock_recognizer();
        mock.expect_recognize()
            .returning(|_| Err(RecognitionError::Unavailable("session lost".to_string())));

        let err = pipeline(PipelineConfig::default(), mock)
            .transcribe(synthetic_page(&THREE_BANDS))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::RecognizerUnavailable(_)));
    }

    /// Undecodable bytes fail before any stage runs
    #[tokio::test]
    async fn test_decode_error_before_recognition() {
        let mut mock = mock_recognizer();
        mock.expect_recognize().times(0);

        let err = pipeline(PipelineConfig::default(), mock)
            .transcribe_bytes(b"GIF89a but not really", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Decode(_)));
    }

    /// PNG bytes and base64 payloads take the same path as decoded images
    #[tokio::test]
    async fn test_encoded_inputs() {
        let png = encode_png(&synthetic_page(&THREE_BANDS));
        let pipeline = pipeline(PipelineConfig::default(), extent_reader(1));

        let (from_bytes, info) = pipeline
            .transcribe_bytes(&png, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!((info.width, info.height), (400, 300));
        assert_eq!(from_bytes.lines.len(), 3);

        use base64::Engine as _;
        let payload = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png)
        );
        let (from_base64, _) = pipeline
            .transcribe_base64(&payload, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(from_base64.text, from_bytes.text);
    }

    /// Both segmentation strategies find the same three lines
    #[tokio::test]
    async fn test_contour_strategy() {
        let config = PipelineConfig {
            segmentation_strategy: SegmentationStrategy::Contour,
            ..Default::default()
        };
        let pipeline = pipeline(config, extent_reader(1));
        assert_eq!(pipeline.segmentation_strategy(), "contour");

        let transcript = pipeline
            .transcribe(synthetic_page(&THREE_BANDS))
            .await
            .unwrap();
        assert_eq!(transcript.text, "ends at 379\nends at 379\nends at 379");
    }

    #[tokio::test]
    async fn test_otsu_threshold() {
        let config = PipelineConfig {
            threshold_method: ThresholdMethod::Otsu,
            ..Default::default()
        };
        let transcript = pipeline(config, extent_reader(1))
            .transcribe(synthetic_page(&THREE_BANDS))
            .await
            .unwrap();
        assert_eq!(transcript.lines.len(), 3);
    }

    /// Wide pages are downscaled to the width cap before segmentation
    #[tokio::test]
    async fn test_wide_page_downscaled() {
        let page = page_with_strokes(2560, 600, &[(60, 100, 2500), (300, 340, 2500)]);
        let transcript = pipeline(PipelineConfig::default(), extent_reader(1))
            .transcribe(page)
            .await
            .unwrap();

        assert_eq!((transcript.width, transcript.height), (1280, 300));
        assert_eq!(transcript.lines.len(), 2);
    }

    /// Parallel recognition through a pool still joins lines in page order
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_keeps_page_order() {
        let members: Vec<Arc<dyn LineRecognizer>> = vec![
            Arc::new(extent_reader(1)),
            Arc::new(extent_reader(1)),
        ];
        let pool = RecognizerPool::new(members).unwrap();
        let config = PipelineConfig {
            recognition_workers: 4,
            ..Default::default()
        };

        let page = page_with_strokes(
            400,
            300,
            &[(30, 50, 100), (100, 120, 200), (160, 180, 300), (220, 240, 390)],
        );
        let transcript = pipeline(config, pool).transcribe(page).await.unwrap();

        assert_eq!(
            transcript.text,
            "ends at 99\nends at 199\nends at 299\nends at 389"
        );
    }

    /// Cancelling before recognition starts skips every line
    #[tokio::test]
    async fn test_cancelled_page() {
        let mut mock = mock_recognizer();
        mock.expect_recognize().times(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pipeline(PipelineConfig::default(), mock)
            .transcribe_with_cancel(synthetic_page(&THREE_BANDS), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Cancelled {
                completed: 0,
                total: 3
            }
        ));
    }
}
