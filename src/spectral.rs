//! Frame segmentation and spectral estimation

use crate::config::MagnitudeSource;
use crate::error::{Result, TranscriptionError};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use rustfft::{num_complex::Complex32, Fft, FftPlanner};
use std::sync::Arc;

/// Frames handed to the FFT per worker thread in one batch
pub const SPECTRUM_BATCH_PER_THREAD: usize = 4;

/// One windowed excerpt of the input, zero padded to the frame length
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFrame {
    /// Position in the frame sequence
    pub index: usize,
    /// Offset of the first sample in the input buffer
    pub start: usize,
    /// Number of input samples before zero padding
    pub valid_len: usize,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AnalysisFrame {
    pub fn is_partial(&self) -> bool {
        self.valid_len < self.samples.len()
    }
}

/// Slices a sample buffer into overlapping Hann-windowed frames.
///
/// Frames start every `frame_length / overlap` samples. Segmentation ends with
/// the first frame whose end reaches the end of the buffer; when that frame is
/// short it is windowed with a Hann window of its own length and zero padded.
/// A buffer shorter than one frame produces no frames at all.
#[derive(Debug, Clone)]
pub struct FrameSegmenter<'a> {
    samples: &'a [f32],
    frame_length: usize,
    hop_length: usize,
    sample_rate: u32,
    window: Vec<f32>,
}

impl<'a> FrameSegmenter<'a> {
    pub fn new(
        samples: &'a [f32],
        frame_length: usize,
        overlap: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if frame_length == 0 {
            return Err(TranscriptionError::ConfigValidationFailed(
                "frame_length must be > 0".to_string(),
            ));
        }
        if overlap == 0 || overlap > frame_length {
            return Err(TranscriptionError::ConfigValidationFailed(format!(
                "overlap must be in 1..={}, got {}",
                frame_length, overlap
            )));
        }

        Ok(Self {
            samples,
            frame_length,
            hop_length: frame_length / overlap,
            sample_rate,
            window: hann_window(frame_length),
        })
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Number of frames `frames()` yields
    pub fn frame_count(&self) -> usize {
        let len = self.samples.len();
        if len < self.frame_length {
            return 0;
        }
        (len - self.frame_length).div_ceil(self.hop_length) + 1
    }

    /// Start offset of every frame, without windowing any of them
    pub fn frame_offsets(&self) -> Vec<usize> {
        (0..self.frame_count()).map(|i| i * self.hop_length).collect()
    }

    /// A fresh pass over the frames; every call starts from the beginning
    pub fn frames(&self) -> Frames<'_, 'a> {
        Frames {
            segmenter: self,
            next_index: 0,
            finished: false,
        }
    }
}

/// Lazy frame iterator produced by [`FrameSegmenter::frames`]
pub struct Frames<'s, 'a> {
    segmenter: &'s FrameSegmenter<'a>,
    next_index: usize,
    finished: bool,
}

impl Iterator for Frames<'_, '_> {
    type Item = AnalysisFrame;

    fn next(&mut self) -> Option<AnalysisFrame> {
        let seg = self.segmenter;
        let len = seg.samples.len();
        let start = self.next_index * seg.hop_length;

        if self.finished || len < seg.frame_length || start >= len {
            self.finished = true;
            return None;
        }

        let end = (start + seg.frame_length).min(len);
        let excerpt = &seg.samples[start..end];
        let mut samples = vec![0.0f32; seg.frame_length];

        if excerpt.len() == seg.frame_length {
            for ((out, &x), &w) in samples.iter_mut().zip(excerpt).zip(&seg.window) {
                *out = x * w;
            }
        } else {
            let tail_window = hann_window(excerpt.len());
            for ((out, &x), &w) in samples.iter_mut().zip(excerpt).zip(&tail_window) {
                *out = x * w;
            }
        }

        if start + seg.frame_length >= len {
            self.finished = true;
        }

        let frame = AnalysisFrame {
            index: self.next_index,
            start,
            valid_len: excerpt.len(),
            sample_rate: seg.sample_rate,
            samples,
        };
        self.next_index += 1;
        Some(frame)
    }
}

/// Symmetric Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    match size {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
            })
            .collect(),
    }
}

/// Forward FFT over analysis frames, keeping the lower half of the spectrum.
///
/// Output magnitudes are amplitude-normalised by `2 / frame_length`.
pub struct SpectralEstimator {
    fft: Arc<dyn Fft<f32>>,
    frame_length: usize,
    source: MagnitudeSource,
}

impl SpectralEstimator {
    pub fn new(frame_length: usize, source: MagnitudeSource) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_length);
        Self {
            fft,
            frame_length,
            source,
        }
    }

    /// Number of bins kept per frame
    pub fn n_bins(&self) -> usize {
        self.frame_length / 2
    }

    /// Magnitudes for bins `0..frame_length / 2` of one frame
    pub fn magnitudes(&self, frame: &AnalysisFrame) -> Result<Vec<f32>> {
        if frame.samples.len() != self.frame_length {
            return Err(TranscriptionError::SpectralProcessingError(format!(
                "frame {} has {} samples, expected {}",
                frame.index,
                frame.samples.len(),
                self.frame_length
            )));
        }

        let mut buffer: Vec<Complex32> = frame
            .samples
            .iter()
            .map(|&x| Complex32::new(x, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let norm = 2.0 / self.frame_length as f32;
        Ok(buffer[..self.n_bins()]
            .iter()
            .map(|c| match self.source {
                MagnitudeSource::Modulus => c.norm() * norm,
                MagnitudeSource::Imaginary => c.im.abs() * norm,
            })
            .collect())
    }

    /// Magnitude spectrogram (bins × frames), columns in frame order.
    ///
    /// Frames are pulled from the segmenter in batches of
    /// [`SPECTRUM_BATCH_PER_THREAD`] per worker thread, so only one batch of
    /// windowed frames is alive at a time.
    pub fn spectrogram(&self, segmenter: &FrameSegmenter) -> Result<Array2<f32>> {
        let n_frames = segmenter.frame_count();
        let batch_len = rayon::current_num_threads().max(1) * SPECTRUM_BATCH_PER_THREAD;
        let mut spec = Array2::<f32>::zeros((self.n_bins(), n_frames));
        let mut frames = segmenter.frames();

        loop {
            let batch: Vec<AnalysisFrame> = frames.by_ref().take(batch_len).collect();
            if batch.is_empty() {
                break;
            }

            let columns: Vec<Vec<f32>> = batch
                .par_iter()
                .map(|frame| self.magnitudes(frame))
                .collect::<Result<_>>()?;

            for (frame, column) in batch.iter().zip(columns) {
                if frame.index >= n_frames {
                    return Err(TranscriptionError::SpectralProcessingError(format!(
                        "frame {} beyond expected count {}",
                        frame.index, n_frames
                    )));
                }
                spec.column_mut(frame.index)
                    .assign(&ArrayView1::from(column.as_slice()));
            }
        }
        Ok(spec)
    }
}
