//! # Live Capture Module
//!
//! Real-time capture from the default input device through CPAL. The audio
//! callback only forwards sample chunks; framing and pitch estimation run on
//! a dedicated analysis thread through the core's live scanner, so live and
//! file analysis share every line of estimator code.

use anyhow::{Result, anyhow};
use clap::Args;
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use std::thread;
use std::time::{Duration, Instant};

use notescan_core::stream::{FrameAssembler, LiveScanner};
use notescan_core::{CancelFlag, Estimator, RawPitchEvent, quantize, tuning};

use crate::{PipelineArgs, build_config, print_notes, write_outputs};

/// Preferred capture rate.
const TARGET_SAMPLE_RATE: u32 = 44100;

#[derive(Args, Debug)]
pub struct LiveArgs {
    /// Seconds to record
    #[arg(long, default_value_t = 10.0)]
    seconds: f64,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

/// Starts audio capture from the default input device.
///
/// Every callback buffer is averaged to mono and sent as one chunk.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and its sample rate
/// * `Err(e)` - No device or no usable f32 input format
pub fn start_audio_capture(sender: Sender<Vec<f32>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = TARGET_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_rate = config.sample_rate().0;
    let channels = config.channels();
    let config: cpal::StreamConfig = config.into();

    log::info!("Capturing {} channel(s) at {} Hz", channels, sample_rate);

    let err_fn = |err| log::error!("An error occurred on the audio stream: {}", err);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let chunk = if channels > 1 {
                data.chunks_exact(channels as usize)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                    .collect()
            } else {
                data.to_vec()
            };
            // The analysis thread is gone once it has been cancelled.
            let _ = sender.send(chunk);
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate))
}

/// Picks the f32 input configuration closest to the target rate, preferring mono.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let in_range =
                c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let rate_diff = if in_range { 0 } else { min_diff.min(max_diff) };
            (c.channels() != 1, rate_diff)
        })
}

/// Records for the requested time, printing pitches as they are detected,
/// then quantizes and writes the notes.
pub fn run_live(args: &LiveArgs) -> Result<()> {
    let config = build_config(&args.pipeline)?;
    let (chunk_tx, chunk_rx) = crossbeam_channel::unbounded::<Vec<f32>>();
    let (stream, sample_rate) = start_audio_capture(chunk_tx)?;

    let assembler = FrameAssembler::new(sample_rate, config.window_size, config.hop_size)?;
    let cancel = CancelFlag::new();
    let worker_cancel = cancel.clone();
    let estimator = Estimator::from_config(&config);
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<RawPitchEvent>();

    let worker = thread::spawn(move || {
        log::debug!("Analysis thread started");
        for event in LiveScanner::new(chunk_rx, assembler, estimator).with_cancel(worker_cancel) {
            if event_tx.send(event).is_err() {
                break;
            }
        }
        log::debug!("Analysis thread finished");
    });

    let deadline = Instant::now() + Duration::from_secs_f64(args.seconds.max(0.0));
    let mut events = Vec::new();
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match event_rx.recv_timeout(remaining) {
            Ok(event) => {
                let name = tuning::hz_to_midi_clamped(event.frequency_hz)
                    .map_or("?", tuning::note_name);
                log::info!("{:>8.3}s  {:>8.2} Hz  {}", event.time, event.frequency_hz, name);
                events.push(event);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => break,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    cancel.cancel();
    // Dropping the stream drops the callback's sender, which unblocks the scanner.
    if let Err(e) = stream.pause() {
        log::warn!("Error pausing stream: {}", e);
    }
    drop(stream);
    if worker.join().is_err() {
        return Err(anyhow!("analysis thread panicked"));
    }
    events.extend(event_rx.try_iter());

    let notes = quantize::quantize(&events, &config.quantize)?;
    print_notes(&notes);
    write_outputs(&notes, &args.pipeline)
}
