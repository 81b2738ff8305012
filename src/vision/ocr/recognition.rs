// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX CTC line recognition model
//!
//! Runs a CTC text-line recognition model (PaddleOCR-style rec model exported
//! to ONNX) on CPU. The session sits behind a mutex, so one instance serves
//! one call at a time; use `RecognizerPool` for more throughput.

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array4, ArrayViewD, IxDyn};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::{preprocess_for_recognition, REC_INPUT_HEIGHT, REC_MIN_WIDTH};
use super::recognizer::{LineRecognizer, RecognitionError};

/// Recognized text with confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    /// The recognized text content
    pub text: String,
    /// Mean per-character probability (0.0-1.0)
    pub confidence: f32,
}

impl RecognizedText {
    pub fn new(text: String, confidence: f32) -> Self {
        Self { text, confidence }
    }

    /// Check if the text is empty or whitespace only
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// CTC line recognition model on ONNX Runtime
#[derive(Clone)]
pub struct OnnxLineRecognizer {
    /// ONNX Runtime session (one call at a time)
    session: Arc<Mutex<Session>>,
    /// Index 0 is the CTC blank
    dictionary: Arc<Vec<char>>,
    input_name: String,
}

impl std::fmt::Debug for OnnxLineRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxLineRecognizer")
            .field("dictionary_size", &self.dictionary.len())
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl OnnxLineRecognizer {
    /// Load the recognition model and its character dictionary
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - Dictionary file not found or empty
    /// - ONNX Runtime initialization fails
    pub async fn new<P: AsRef<Path>>(model_path: P, dict_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let dict_path = dict_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Recognition model not found: {}", model_path.display());
        }
        if !dict_path.exists() {
            anyhow::bail!("Character dictionary not found: {}", dict_path.display());
        }

        info!("Loading line recognition model from {}", model_path.display());

        let dictionary = load_dictionary(dict_path)?;
        info!(
            "Loaded character dictionary with {} entries",
            dictionary.len()
        );

        // CPU-only execution
        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load recognition model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        debug!("Recognition model loaded - input: {}", input_name);
        info!("Line recognition model ready (CPU)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            dictionary: Arc::new(dictionary),
            input_name,
        })
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }

    /// Run the model on a preprocessed [1, 3, 48, W] tensor
    pub fn recognize_tensor(&self, input: &Array4<f32>) -> Result<RecognizedText, RecognitionError> {
        let shape = input.shape();
        if shape[0] != 1
            || shape[1] != 3
            || shape[2] != REC_INPUT_HEIGHT as usize
            || shape[3] < REC_MIN_WIDTH as usize
        {
            return Err(RecognitionError::MalformedInput(format!(
                "tensor shape {:?}, expected [1, 3, {}, W>={}]",
                shape, REC_INPUT_HEIGHT, REC_MIN_WIDTH
            )));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| RecognitionError::Unavailable("session lock poisoned".to_string()))?;

        let input_value = Value::from_array(input.to_owned())
            .map_err(|e| RecognitionError::ResourceExhausted(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| RecognitionError::Internal(format!("inference failed: {}", e)))?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| RecognitionError::Internal(format!("bad output tensor: {}", e)))?;

        debug!("Recognition output shape: {:?}", output_tensor.shape());

        ctc_greedy_decode(&output_tensor, &self.dictionary)
            .map_err(|e| RecognitionError::Internal(e.to_string()))
    }
}

impl LineRecognizer for OnnxLineRecognizer {
    fn recognize(&self, line: &RgbImage) -> Result<String, RecognitionError> {
        if line.width() == 0 || line.height() == 0 {
            return Err(RecognitionError::MalformedInput(format!(
                "empty line image {}x{}",
                line.width(),
                line.height()
            )));
        }

        let tensor = preprocess_for_recognition(line);
        let recognized = self.recognize_tensor(&tensor)?;
        debug!(
            "Recognized {} chars, confidence {:.2}",
            recognized.text.chars().count(),
            recognized.confidence
        );
        Ok(recognized.text)
    }

    fn name(&self) -> &str {
        "onnx-ctc"
    }
}

/// Load a character dictionary, one character per line
///
/// Index 0 is reserved for the CTC blank and a trailing space class is
/// always appended, matching how the rec models are exported.
pub fn load_dictionary<P: AsRef<Path>>(path: P) -> Result<Vec<char>> {
    let file = File::open(path.as_ref()).context(format!(
        "Failed to open dictionary: {}",
        path.as_ref().display()
    ))?;

    let reader = BufReader::new(file);
    let mut dictionary = vec!['\0'];

    for line in reader.lines() {
        let line = line.context("Failed to read dictionary line")?;
        if let Some(ch) = line.chars().next() {
            dictionary.push(ch);
        }
    }

    if dictionary.len() == 1 {
        anyhow::bail!("Dictionary is empty: {}", path.as_ref().display());
    }
    dictionary.push(' ');

    Ok(dictionary)
}

/// Greedy (best path) CTC decoding with blank removal and repeat collapse
///
/// Accepts `[batch, seq_len, classes]` (batch 0 is used) or `[seq_len, classes]`.
pub fn ctc_greedy_decode(output: &ArrayViewD<'_, f32>, dictionary: &[char]) -> Result<RecognizedText> {
    let shape = output.shape();
    let (seq_len, num_classes) = match shape.len() {
        3 => (shape[1], shape[2]),
        2 => (shape[0], shape[1]),
        _ => anyhow::bail!("Unexpected output shape: {:?}", shape),
    };

    let mut text = String::new();
    let mut total_confidence = 0.0f32;
    let mut emitted = 0usize;
    let mut prev_index: Option<usize> = None;

    for t in 0..seq_len {
        let mut max_prob = f32::NEG_INFINITY;
        let mut max_index = 0usize;

        for c in 0..num_classes {
            let prob = if shape.len() == 3 {
                output[IxDyn(&[0, t, c])]
            } else {
                output[IxDyn(&[t, c])]
            };
            if prob > max_prob {
                max_prob = prob;
                max_index = c;
            }
        }

        if max_index != 0 && Some(max_index) != prev_index {
            if let Some(&ch) = dictionary.get(max_index) {
                text.push(ch);
                total_confidence += max_prob;
                emitted += 1;
            }
        }

        prev_index = (max_index != 0).then_some(max_index);
    }

    let confidence = if emitted == 0 {
        0.0
    } else {
        (total_confidence / emitted as f32).clamp(0.0, 1.0)
    };

    Ok(RecognizedText::new(text, confidence))
}
