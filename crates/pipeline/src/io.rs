// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Frame input and result output boundaries.
//!
//! A [`FrameSource`] lends frames: the orchestrator takes one with
//! `get_frame` and always hands it back with `release_frame`, on success
//! and failure alike. A [`ResultSink`] receives at most one
//! [`CycleResult`] per successful cycle and may refuse it when full.

use crate::{CycleResult, PipelineError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One RGB565 camera frame.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    id: u64,
    width: u16,
    height: u16,
    data: Vec<u8>,
}

impl Frame {
    /// Wraps `data`, which must hold exactly `width × height` pixels.
    pub fn new(id: u64, width: u16, height: u16, data: Vec<u8>) -> Result<Self, PipelineError> {
        let expected = width as usize * height as usize * 2;
        if data.len() != expected {
            return Err(PipelineError::InvalidInput(format!(
                "frame {id}: {} bytes for {width}x{height}, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            id,
            width,
            height,
            data,
        })
    }

    /// A frame with every byte set to `fill` (0x80 gives mid-grey).
    pub fn filled(id: u64, width: u16, height: u16, fill: u8) -> Self {
        Self {
            id,
            width,
            height,
            data: vec![fill; width as usize * height as usize * 2],
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Gives the pixel buffer back for reuse.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Non-blocking producer of frames.
pub trait FrameSource: Send {
    /// The next ready frame, or `None` if none is ready.
    fn get_frame(&mut self) -> Option<Frame>;

    /// Returns a frame taken with `get_frame`.
    fn release_frame(&mut self, frame: Frame);
}

/// Frame counters shared between a [`SyntheticCamera`] and its observers.
#[derive(Debug, Default)]
pub struct CameraCounters {
    issued: AtomicU64,
    released: AtomicU64,
}

impl CameraCounters {
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Frames handed out and not yet returned.
    pub fn outstanding(&self) -> u64 {
        self.issued().saturating_sub(self.released())
    }
}

/// A frame source backed by a fixed pool of recycled buffers.
#[derive(Debug)]
pub struct SyntheticCamera {
    width: u16,
    height: u16,
    pool: Vec<Vec<u8>>,
    next_id: u64,
    remaining: Option<u64>,
    counters: Arc<CameraCounters>,
}

impl SyntheticCamera {
    /// A camera with `buffers` mid-grey frame buffers.
    pub fn new(width: u16, height: u16, buffers: usize) -> Self {
        let len = width as usize * height as usize * 2;
        Self {
            width,
            height,
            pool: (0..buffers).map(|_| vec![0x80; len]).collect(),
            next_id: 0,
            remaining: None,
            counters: Arc::new(CameraCounters::default()),
        }
    }

    /// Stops producing frames after `frames` have been issued.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.remaining = Some(frames);
        self
    }

    pub fn counters(&self) -> Arc<CameraCounters> {
        Arc::clone(&self.counters)
    }
}

impl FrameSource for SyntheticCamera {
    fn get_frame(&mut self) -> Option<Frame> {
        if self.remaining == Some(0) {
            return None;
        }
        let data = self.pool.pop()?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.counters.issued.fetch_add(1, Ordering::Relaxed);
        Some(Frame {
            id,
            width: self.width,
            height: self.height,
            data,
        })
    }

    fn release_frame(&mut self, frame: Frame) {
        self.counters.released.fetch_add(1, Ordering::Relaxed);
        self.pool.push(frame.into_data());
    }
}

/// Why a result was not accepted by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("result sink is full")]
    Full,
    #[error("result sink is closed")]
    Closed,
}

/// Consumer of aggregated cycle results. Must not block.
pub trait ResultSink: Send {
    fn publish(&mut self, result: CycleResult) -> Result<(), SinkError>;
}

/// A sink over a bounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<CycleResult>,
}

impl ChannelSink {
    /// A sink holding at most `capacity` unread results, and its reader.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<CycleResult>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn publish(&mut self, result: CycleResult) -> Result<(), SinkError> {
        self.tx.try_send(result).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}
