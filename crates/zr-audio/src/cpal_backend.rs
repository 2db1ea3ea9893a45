//! cpal output fed through a lock-free ring buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use zr_ir::StereoFrame;

use crate::traits::{AudioError, AudioOutput};

/// Default-device stereo output.
///
/// The render thread pushes frames into the producer half; the cpal callback
/// drains the consumer half and plays silence on underrun.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<StereoFrame>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device. The returned consumer goes to
    /// [`CpalOutput::build_stream`].
    pub fn new() -> Result<(Self, HeapCons<StereoFrame>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        config.channels = 2;

        // About 100 ms of headroom.
        let capacity = (config.sample_rate.0 as usize / 10).max(256);
        let (producer, consumer) = HeapRb::<StereoFrame>::new(capacity).split();
        log::debug!("audio: {} Hz, {} frame ring", config.sample_rate.0, capacity);

        let output = Self { device, config, stream: None, producer, running: Arc::new(AtomicBool::new(false)) };
        Ok((output, consumer))
    }

    /// Build and start the device stream.
    pub fn build_stream(&mut self, mut consumer: HeapCons<StereoFrame>) -> Result<(), AudioError> {
        let running = Arc::clone(&self.running);
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    for chunk in data.chunks_mut(channels) {
                        let frame = consumer.try_pop().unwrap_or_default();
                        for (i, sample) in chunk.iter_mut().enumerate() {
                            *sample = match i {
                                0 => frame.left,
                                1 => frame.right,
                                _ => 0.0,
                            };
                        }
                    }
                },
                |err| log::warn!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Free space in the ring, in frames.
    pub fn vacant(&self) -> usize {
        self.producer.vacant_len()
    }

    /// Write one frame, spinning until the ring has room.
    pub fn write_spin(&mut self, frame: StereoFrame) {
        while self.producer.try_push(frame).is_err() {
            std::hint::spin_loop();
        }
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, frames: &[StereoFrame]) -> usize {
        self.producer.push_slice(frames)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}
