//! `dual-capture`: record the microphone and the system output to two WAV
//! files for a fixed number of seconds.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use dual_capture_core::{
    create_output_directory, format_last_platform_error, CaptureConfiguration, CaptureDelegate, CaptureSource, DualCaptureCoordinator, LogDelegate,
    SamplingPolicy,
};

#[derive(Debug, Parser)]
#[command(about = "Record microphone and system audio to separate WAV files", author, version)]
struct Args {
    /// Directory for the recordings
    #[arg(long = "output-dir", default_value = "output")]
    output_dir: PathBuf,

    /// Session length in seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    duration: u64,

    /// File name for the microphone recording
    #[arg(long = "mic-file", default_value = "mic.wav")]
    mic_file: String,

    /// File name for the system audio recording
    #[arg(long = "loopback-file", default_value = "speaker.wav")]
    loopback_file: String,

    /// Skip the JSON metadata written next to each recording
    #[arg(long = "no-metadata", default_value_t = false)]
    no_metadata: bool,

    /// Log every N-th buffer per stream (0 disables)
    #[arg(long = "log-every", default_value_t = 100)]
    log_every: u64,
}

impl Args {
    fn to_config(&self) -> CaptureConfiguration {
        CaptureConfiguration {
            output_directory: self.output_dir.clone(),
            mic_file_name: self.mic_file.clone(),
            loopback_file_name: self.loopback_file.clone(),
            session_duration: Duration::from_secs(self.duration),
            log_sample_every: self.log_every,
            write_metadata: !self.no_metadata,
            ..Default::default()
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.to_config();

    if !create_output_directory(&config.output_directory) {
        eprintln!(
            "Cannot create output directory {}: {}",
            config.output_directory.display(),
            format_last_platform_error()
        );
        return ExitCode::FAILURE;
    }

    let delegate = Arc::new(LogDelegate::new(SamplingPolicy::new(config.log_sample_every)));
    let mut coordinator = match DualCaptureCoordinator::from_factory(
        &platform::factory(),
        &config,
        Arc::clone(&delegate) as Arc<dyn CaptureDelegate>,
    ) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Starting audio capture...");
    if let Err(e) = coordinator.start_all() {
        eprintln!("Failed to start audio capture: {}", e);
        return ExitCode::FAILURE;
    }

    let full_length = countdown(&coordinator, config.session_duration.as_secs());

    coordinator.stop_all();
    println!("\nCapture complete");

    for source in [CaptureSource::Loopback, CaptureSource::Microphone] {
        let diag = delegate.diagnostics(source);
        match coordinator.session(source).result() {
            Some(result) => println!(
                "  {:<8} {} ({:.1} s, {} buffers, {} silent, {} discontinuities)",
                source.label(),
                result.file_path.display(),
                result.duration_secs,
                diag.buffers,
                diag.silent_buffers,
                diag.discontinuities
            ),
            None => println!("  {:<8} no recording", source.label()),
        }
    }

    if full_length && all_recorded(&coordinator) {
        ExitCode::SUCCESS
    } else {
        eprintln!("Capture did not complete for both streams");
        ExitCode::FAILURE
    }
}

/// Returns false if both captures stopped before the session ended.
fn countdown(coordinator: &DualCaptureCoordinator, seconds: u64) -> bool {
    let mut stdout = std::io::stdout();
    for remaining in (1..=seconds).rev() {
        if !coordinator.is_running() {
            log::warn!("Both captures ended early");
            return false;
        }
        print!("\rTime remaining: {} seconds ", remaining);
        let _ = stdout.flush();
        thread::sleep(Duration::from_secs(1));
    }
    true
}

/// Both streams produced a finalized recording.
fn all_recorded(coordinator: &DualCaptureCoordinator) -> bool {
    coordinator.results().len() == 2
}

#[cfg(target_os = "windows")]
mod platform {
    pub fn factory() -> dual_capture_windows::WindowsEngineFactory {
        dual_capture_windows::WindowsEngineFactory
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use dual_capture_core::{
        AudioFormat, CaptureConfiguration, CaptureDelegate, CaptureEngine, CaptureError, CaptureSource,
        EngineFactory, EngineSummary,
    };

    /// Engine for platforms without a capture backend; refuses to start.
    struct UnsupportedEngine {
        source: CaptureSource,
        output_path: PathBuf,
    }

    impl CaptureEngine for UnsupportedEngine {
        fn source(&self) -> CaptureSource {
            self.source
        }

        fn output_path(&self) -> &Path {
            &self.output_path
        }

        fn start(&mut self) -> Result<AudioFormat, CaptureError> {
            Err(CaptureError::EndpointUnavailable(format!(
                "{} capture is only available on Windows",
                self.source
            )))
        }

        fn stop(&mut self) -> EngineSummary {
            EngineSummary::default()
        }

        fn is_capturing(&self) -> bool {
            false
        }
    }

    pub struct UnsupportedFactory;

    impl EngineFactory for UnsupportedFactory {
        fn loopback(&self, config: &CaptureConfiguration, _delegate: Arc<dyn CaptureDelegate>) -> Box<dyn CaptureEngine> {
            Box::new(UnsupportedEngine {
                source: CaptureSource::Loopback,
                output_path: config.output_path(CaptureSource::Loopback),
            })
        }

        fn microphone(
            &self,
            config: &CaptureConfiguration,
            _delegate: Arc<dyn CaptureDelegate>,
        ) -> Box<dyn CaptureEngine> {
            Box::new(UnsupportedEngine {
                source: CaptureSource::Microphone,
                output_path: config.output_path(CaptureSource::Microphone),
            })
        }
    }

    pub fn factory() -> UnsupportedFactory {
        UnsupportedFactory
    }
}
