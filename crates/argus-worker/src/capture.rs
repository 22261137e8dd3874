//! Capture worker: one OS thread per source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use argus_media::{open_source, BadFrameChecker, CaptureSource, MediaError, MediaResult};
use argus_models::SourceConfig;
use tracing::warn;

use crate::config::EngineConfig;
use crate::frame_buffer::FrameBuffer;
use crate::logging::SourceLogger;
use crate::metrics::{self, RateMeter};

/// Opens capture sources. Seam for tests and alternative inputs.
pub trait CaptureFactory: Send + Sync {
    fn open(&self, config: &SourceConfig) -> MediaResult<Box<dyn CaptureSource>>;
}

/// Opens sources with FFmpeg or as still-image directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaCaptureFactory;

impl CaptureFactory for MediaCaptureFactory {
    fn open(&self, config: &SourceConfig) -> MediaResult<Box<dyn CaptureSource>> {
        open_source(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Reads slower than this are logged
    pub read_budget: Duration,
    /// Pause before a failed worker exits
    pub reconnect_delay: Duration,
}

impl From<&EngineConfig> for CaptureSettings {
    fn from(engine: &EngineConfig) -> Self {
        Self {
            read_budget: engine.read_budget(),
            reconnect_delay: engine.reconnect_delay(),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Everything one capture thread needs.
pub struct CaptureWorker {
    pub config: Arc<SourceConfig>,
    pub buffer: Arc<FrameBuffer>,
    pub checker: Option<Arc<BadFrameChecker>>,
    pub factory: Arc<dyn CaptureFactory>,
    pub settings: CaptureSettings,
    pub stop: Arc<AtomicBool>,
}

impl CaptureWorker {
    /// Read frames into the buffer until the source fails or a stop is
    /// requested. Returning ends the thread; the supervisor restarts it.
    pub fn run(self) {
        let logger = SourceLogger::new(&self.config.name, "capture");
        let _span = logger.create_span().entered();

        let mut source = match self.factory.open(&self.config) {
            Ok(source) => source,
            Err(e) => {
                logger.log_warning(&format!("Cannot open source: {}", e));
                self.pause();
                return;
            }
        };
        logger.log_start("capture opened");

        let mut fps = RateMeter::new(RateMeter::DEFAULT_PERIOD, Instant::now());
        while !self.stopped() {
            let started = Instant::now();
            let frame = match source.read() {
                Ok(frame) => frame,
                Err(MediaError::EndOfStream) => {
                    logger.log_progress("End of stream");
                    self.pause();
                    break;
                }
                Err(e) => {
                    logger.log_warning(&format!("Read failed: {}", e));
                    self.pause();
                    break;
                }
            };

            let elapsed = started.elapsed();
            if elapsed > self.settings.read_budget {
                warn!(
                    source = %self.config.name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Slow frame read"
                );
            }

            if let Some(checker) = &self.checker {
                if checker.check(&frame) {
                    warn!(source = %self.config.name, "Bad frame dropped");
                    metrics::record_bad_frame(&self.config.name);
                    continue;
                }
            }

            self.buffer.put(frame);
            metrics::record_frame_captured(&self.config.name);

            if let Some(rate) = fps.record(Instant::now()) {
                logger.log_progress(&format!("Capture rate {:.1} fps", rate));
                metrics::set_source_fps(&self.config.name, rate);
            }
        }

        logger.log_stop("capture worker exiting");
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn pause(&self) {
        if !self.stopped() && !self.settings.reconnect_delay.is_zero() {
            std::thread::sleep(self.settings.reconnect_delay);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use argus_media::Frame;
    use image::RgbImage;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Produces `frames` solid frames, then fails.
    pub struct ScriptedCapture {
        remaining: usize,
        value: u8,
    }

    impl CaptureSource for ScriptedCapture {
        fn read(&mut self) -> MediaResult<Frame> {
            if self.remaining == 0 {
                return Err(MediaError::EndOfStream);
            }
            self.remaining -= 1;
            Ok(Frame::new(RgbImage::from_pixel(
                8,
                8,
                image::Rgb([self.value; 3]),
            )))
        }
    }

    /// Counts opens per source name.
    #[derive(Default)]
    pub struct ScriptedFactory {
        pub frames: usize,
        pub value: u8,
        pub fail_open: bool,
        pub opens: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedFactory {
        pub fn opens(&self, name: &str) -> usize {
            self.opens.lock().unwrap().get(name).copied().unwrap_or(0)
        }
    }

    impl CaptureFactory for ScriptedFactory {
        fn open(&self, config: &SourceConfig) -> MediaResult<Box<dyn CaptureSource>> {
            *self
                .opens
                .lock()
                .unwrap()
                .entry(config.name.clone())
                .or_default() += 1;
            if self.fail_open {
                return Err(MediaError::source_unavailable(&config.name, "offline"));
            }
            Ok(Box::new(ScriptedCapture {
                remaining: self.frames,
                value: self.value,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ScriptedFactory;
    use super::*;
    use argus_models::BadFrameCheckerConfig;
    use image::GrayImage;

    fn worker(factory: Arc<dyn CaptureFactory>, checker: Option<Arc<BadFrameChecker>>) -> CaptureWorker {
        CaptureWorker {
            config: Arc::new(SourceConfig::new("cam", "dir:/unused", "/tmp/out")),
            buffer: Arc::new(FrameBuffer::new(3)),
            checker,
            factory,
            settings: CaptureSettings {
                read_budget: Duration::from_secs(5),
                reconnect_delay: Duration::ZERO,
            },
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn test_frames_flow_into_buffer_until_source_ends() {
        let factory = Arc::new(ScriptedFactory {
            frames: 5,
            ..Default::default()
        });
        let worker = worker(factory.clone(), None);
        let buffer = Arc::clone(&worker.buffer);

        worker.run();

        // Latest-wins: only the newest three survive
        assert_eq!(buffer.len(), 3);
        assert_eq!(factory.opens("cam"), 1);
    }

    #[test]
    fn test_open_failure_ends_worker() {
        let factory = Arc::new(ScriptedFactory {
            fail_open: true,
            ..Default::default()
        });
        let worker = worker(factory, None);
        let buffer = Arc::clone(&worker.buffer);

        worker.run();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_bad_frames_are_dropped() {
        let config = BadFrameCheckerConfig {
            coords: [0, 4, 0, 4],
            template_path: "/unused.png".into(),
            threshold: 10.0,
            reverse_pixel: None,
        };
        // Template is black, frames are white: every frame is bad
        let checker = BadFrameChecker::new(&config, GrayImage::new(4, 4)).unwrap();
        let factory = Arc::new(ScriptedFactory {
            frames: 4,
            value: 255,
            ..Default::default()
        });
        let worker = worker(factory, Some(Arc::new(checker)));
        let buffer = Arc::clone(&worker.buffer);

        worker.run();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_stop_flag_ends_loop() {
        let factory = Arc::new(ScriptedFactory {
            frames: 1_000,
            ..Default::default()
        });
        let worker = worker(factory, None);
        worker.stop.store(true, Ordering::SeqCst);
        let buffer = Arc::clone(&worker.buffer);

        worker.run();
        assert!(buffer.is_empty());
    }
}
