//! Decode worker thread
//!
//! Owns the [`VideoDecoder`] on a dedicated OS thread so decode latency never
//! stalls the controller loop. Commands arrive over a channel and are handled
//! strictly in order; results are pushed into the shared [`FrameQueue`] and
//! announced with [`DecoderEvent`]s.
//!
//! Seek and load commands carry the queue epoch they were issued in. Work for
//! an epoch that has since been drained is skipped, and its frames are rejected
//! by the queue.

use crate::error::{Error, Result};
use crate::playback::decoder::VideoDecoder;
use crate::playback::frame_queue::FrameQueue;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Commands accepted by the decode worker
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderCommand {
    /// Open a video file
    ///
    /// `generation` is echoed in the answer so results of superseded opens
    /// can be told apart.
    OpenFile { path: PathBuf, generation: u64 },

    /// Reposition and queue the first frame at the new position
    SeekFrame { frame_number: u32, epoch: u64 },

    /// Decode one frame, step over `skip` frames after it, queue the decoded one
    LoadFrames { skip: u32, epoch: u64 },

    /// Stop the worker thread
    Shutdown,
}

/// Notifications sent back by the decode worker
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderEvent {
    VideoLoaded {
        frame_count: u32,
        frame_rate: f64,
        generation: u64,
    },

    OpenFailed {
        path: PathBuf,
        reason: String,
        generation: u64,
    },

    /// First frame after a seek is queued
    SeekFinished { frame_number: u32, epoch: u64 },

    /// A `LoadFrames` request queued `frame_number`
    FramesReady { frame_number: u32, epoch: u64 },

    /// A request ran past the last frame of the video
    EndOfVideo { epoch: u64 },

    /// A seek or load request failed
    DecodeFailed { reason: String, epoch: u64 },
}

/// Handle to the decode worker thread
pub struct DecoderWorker {
    command_tx: mpsc::UnboundedSender<DecoderCommand>,
    thread: Option<JoinHandle<()>>,
}

impl DecoderWorker {
    /// Start the worker thread
    pub fn spawn(
        decoder: Box<dyn VideoDecoder>,
        queue: Arc<FrameQueue>,
        event_tx: mpsc::UnboundedSender<DecoderEvent>,
    ) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let handle = thread::Builder::new()
            .name("decoder-worker".to_string())
            .spawn(move || {
                let mut worker = WorkerLoop {
                    decoder,
                    queue,
                    events: event_tx,
                };
                worker.run(command_rx);
            })?;

        info!("Decode worker started");
        Ok(Self {
            command_tx,
            thread: Some(handle),
        })
    }

    /// Queue a command for the worker
    pub fn send(&self, command: DecoderCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| Error::Decode(format!("decode worker is gone: {:?}", e.0)))
    }

    /// Stop the worker and wait for the thread to exit
    ///
    /// The caller must drain the frame queue first if the worker may be
    /// blocked on a full queue.
    pub fn shutdown(mut self) -> Result<()> {
        info!("Shutting down decode worker");
        let _ = self.command_tx.send(DecoderCommand::Shutdown);

        if let Some(handle) = self.thread.take() {
            match handle.join() {
                Ok(()) => debug!("Decode worker joined successfully"),
                Err(e) => {
                    error!("Decode worker join failed: {:?}", e);
                    return Err(Error::Internal("decode worker panicked".to_string()));
                }
            }
        }
        Ok(())
    }
}

impl Drop for DecoderWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.command_tx.send(DecoderCommand::Shutdown);
        }
    }
}

struct WorkerLoop {
    decoder: Box<dyn VideoDecoder>,
    queue: Arc<FrameQueue>,
    events: mpsc::UnboundedSender<DecoderEvent>,
}

impl WorkerLoop {
    fn run(&mut self, mut commands: mpsc::UnboundedReceiver<DecoderCommand>) {
        debug!("Decode worker loop running");
        while let Some(command) = commands.blocking_recv() {
            let keep_running = match command {
                DecoderCommand::OpenFile { path, generation } => self.open(path, generation),
                DecoderCommand::SeekFrame {
                    frame_number,
                    epoch,
                } => self.seek(frame_number, epoch),
                DecoderCommand::LoadFrames { skip, epoch } => self.load(skip, epoch),
                DecoderCommand::Shutdown => false,
            };
            if !keep_running {
                break;
            }
        }
        debug!("Decode worker loop exited");
    }

    /// Returns false once nobody listens for events anymore
    fn emit(&self, event: DecoderEvent) -> bool {
        self.events.send(event).is_ok()
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.queue.epoch() != epoch
    }

    fn open(&mut self, path: PathBuf, generation: u64) -> bool {
        match self.decoder.open(&path) {
            Ok(properties) => {
                info!(
                    "Opened {}: {} frames at {:.2} fps",
                    path.display(),
                    properties.frame_count,
                    properties.frame_rate
                );
                self.emit(DecoderEvent::VideoLoaded {
                    frame_count: properties.frame_count,
                    frame_rate: properties.frame_rate,
                    generation,
                })
            }
            Err(e) => {
                error!("Failed to open {}: {}", path.display(), e);
                let reason = match e {
                    Error::DecodeOpenFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                self.emit(DecoderEvent::OpenFailed {
                    path,
                    reason,
                    generation,
                })
            }
        }
    }

    fn seek(&mut self, frame_number: u32, epoch: u64) -> bool {
        if self.is_stale(epoch) {
            debug!("Skipping stale seek to frame {} (epoch {})", frame_number, epoch);
            return true;
        }
        if let Err(e) = self.decoder.seek(frame_number) {
            warn!("Seek to frame {} failed: {}", frame_number, e);
            return self.emit(DecoderEvent::DecodeFailed {
                reason: e.to_string(),
                epoch,
            });
        }

        match self.decoder.decode_frame() {
            Ok(Some(frame)) => {
                let decoded = frame.frame_number;
                match self.queue.put_in_epoch(epoch, frame) {
                    Ok(()) => self.emit(DecoderEvent::SeekFinished {
                        frame_number: decoded,
                        epoch,
                    }),
                    Err(_) => {
                        debug!("Seek result for frame {} discarded by drain", decoded);
                        true
                    }
                }
            }
            Ok(None) => self.emit(DecoderEvent::EndOfVideo { epoch }),
            Err(e) => {
                warn!("Decode after seek to frame {} failed: {}", frame_number, e);
                self.emit(DecoderEvent::DecodeFailed {
                    reason: e.to_string(),
                    epoch,
                })
            }
        }
    }

    fn load(&mut self, skip: u32, epoch: u64) -> bool {
        if self.is_stale(epoch) {
            trace!("Skipping stale load request (epoch {})", epoch);
            return true;
        }

        let frame = match self.decoder.decode_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.emit(DecoderEvent::EndOfVideo { epoch }),
            Err(e) => {
                warn!("Frame decode failed: {}", e);
                return self.emit(DecoderEvent::DecodeFailed {
                    reason: e.to_string(),
                    epoch,
                });
            }
        };

        for _ in 0..skip {
            match self.decoder.skip_frame() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!("Frame skip failed: {}", e);
                    break;
                }
            }
        }

        let frame_number = frame.frame_number;
        match self.queue.put_in_epoch(epoch, frame) {
            Ok(()) => self.emit(DecoderEvent::FramesReady {
                frame_number,
                epoch,
            }),
            Err(_) => {
                trace!("Frame {} discarded by drain", frame_number);
                true
            }
        }
    }
}
