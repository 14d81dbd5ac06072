// Spectrum module - frequency-magnitude taps and band energy reduction
//
// An audio tap is anything that can hand out a magnitude snapshot of the
// live signal without disturbing playback. The PCM tap below keeps the
// most recent FFT window of samples pushed by the host and computes a
// Hann-windowed magnitude spectrum on demand.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Frequency-domain analysis tap polled once per frame
pub trait AudioTap: Send {
    /// Sample rate of the underlying signal, used to map bins to Hz
    fn sample_rate(&self) -> u32;

    /// Current magnitude snapshot (bins evenly spaced from 0 Hz to Nyquist).
    ///
    /// `None` means the tap has been lost and must be re-acquired.
    fn magnitudes(&mut self) -> Option<&[f32]>;
}

/// Something a tap can be acquired from, e.g. a running audio graph
pub trait AudioSource {
    /// Try to open a tap. `None` if the source is not currently running.
    fn open_tap(&mut self) -> Option<Box<dyn AudioTap>>;
}

/// Average magnitude of the bins covering `[lo_hz, hi_hz]`.
///
/// Bins are assumed to span 0 Hz..=Nyquist. When the band is narrower
/// than one bin, the bin nearest the band center is used.
pub fn band_energy(magnitudes: &[f32], sample_rate: u32, lo_hz: f32, hi_hz: f32) -> f32 {
    if magnitudes.len() < 2 || sample_rate == 0 || !(hi_hz > lo_hz) {
        return 0.0;
    }
    let last = magnitudes.len() - 1;
    let bin_hz = (sample_rate as f32 / 2.0) / last as f32;
    let lo_bin = (lo_hz / bin_hz).ceil().max(0.0) as usize;
    let hi_bin = ((hi_hz / bin_hz).floor() as usize).min(last);

    if lo_bin > hi_bin {
        let center = (((lo_hz + hi_hz) / 2.0) / bin_hz).round() as usize;
        return magnitudes[center.min(last)];
    }

    let bins = &magnitudes[lo_bin..=hi_bin];
    bins.iter().sum::<f32>() / bins.len() as f32
}

/// Shared ring of recent PCM samples, written by the host
#[derive(Debug)]
struct PcmRing {
    samples: VecDeque<f32>,
    capacity: usize,
    running: bool,
}

/// Host-side handle for feeding PCM into spectrum taps
///
/// Clones share the same ring. Pushing is cheap; FFT work happens when a
/// tap is polled.
#[derive(Debug, Clone)]
pub struct PcmFeed {
    ring: Arc<Mutex<PcmRing>>,
    sample_rate: u32,
    fft_size: usize,
}

impl PcmFeed {
    /// Create a running feed holding the last `fft_size` samples.
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        Self {
            ring: Arc::new(Mutex::new(PcmRing {
                samples: VecDeque::with_capacity(fft_size),
                capacity: fft_size,
                running: true,
            })),
            sample_rate,
            fft_size,
        }
    }

    /// Append mono samples, evicting the oldest past capacity.
    pub fn push(&self, samples: &[f32]) {
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        let capacity = ring.capacity;
        // Only the tail can survive eviction
        let tail = &samples[samples.len().saturating_sub(capacity)..];
        for &sample in tail {
            if ring.samples.len() == capacity {
                ring.samples.pop_front();
            }
            ring.samples.push_back(sample);
        }
    }

    /// Start or stop the feed. Stopped feeds refuse new taps and existing taps report loss.
    pub fn set_running(&self, running: bool) {
        self.ring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running = running;
    }

    pub fn is_running(&self) -> bool {
        self.ring
            .lock()
            .map(|ring| ring.running)
            .unwrap_or(false)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
}

impl AudioSource for PcmFeed {
    fn open_tap(&mut self) -> Option<Box<dyn AudioTap>> {
        if !self.is_running() || self.sample_rate == 0 {
            return None;
        }
        Some(Box::new(PcmSpectrumTap::new(self.clone())))
    }
}

/// Spectrum tap computing a magnitude spectrum from a [`PcmFeed`]
pub struct PcmSpectrumTap {
    feed: PcmFeed,
    fft: Arc<dyn Fft<f32>>,
    /// Hann window for FFT (pre-computed)
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    spectrum: Vec<f32>,
}

impl PcmSpectrumTap {
    pub fn new(feed: PcmFeed) -> Self {
        let fft_size = feed.fft_size;
        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        // Pre-compute Hann window to reduce spectral leakage
        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (fft_size as f32 - 1.0)).cos())
            })
            .collect();

        Self {
            feed,
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            spectrum: vec![0.0; fft_size / 2 + 1],
        }
    }
}

impl AudioTap for PcmSpectrumTap {
    fn sample_rate(&self) -> u32 {
        self.feed.sample_rate
    }

    fn magnitudes(&mut self) -> Option<&[f32]> {
        let fft_size = self.feed.fft_size;
        {
            let ring = self.feed.ring.lock().ok()?;
            if !ring.running {
                return None;
            }
            // Left-pad with silence until the ring fills up
            let pad = fft_size - ring.samples.len();
            for slot in self.buffer[..pad].iter_mut() {
                *slot = Complex::new(0.0, 0.0);
            }
            for (i, &sample) in ring.samples.iter().enumerate() {
                let idx = pad + i;
                self.buffer[idx] = Complex::new(sample * self.window[idx], 0.0);
            }
        }

        self.fft.process(&mut self.buffer);

        // Scale so a full-scale sine lands near 1.0 regardless of FFT size
        let scale = 4.0 / fft_size as f32;
        for (out, bin) in self.spectrum.iter_mut().zip(self.buffer.iter()) {
            *out = bin.norm() * scale;
        }
        Some(&self.spectrum)
    }
}
