//! `vidgen-cli` library crate.
//!
//! Argument parsing and state rendering for the `vidgen` binary, split
//! out of `main.rs` so they can be tested without a terminal or network.

use std::path::PathBuf;

use tokio::sync::watch;
use vidgen_core::error::CoreError;
use vidgen_core::request::{
    ImageBlob, ImageJobRequest, JobRequest, Resolution, Seed, TextJobRequest, MAX_IMAGES,
};
use vidgen_core::state::{JobPhase, JobState};

pub const USAGE: &str = "\
Usage:
  vidgen [OPTIONS] <PROMPT>...
  vidgen [OPTIONS] --image <PATH> [--image <PATH>]... [PROMPT]...

Options:
  --resolution <W*H>   1280*720 (default), 960*960, 720*1280, 1088*832, 832*1088
  --seed <N>           Fixed seed; -1 lets the service choose (default)
  --random-seed        Pick a random seed locally
  --no-watermark       Disable the watermark
  --image <PATH>       Input image (PNG or JPEG), up to 5, in order
  -h, --help           Show this message";

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Missing value for {0}")]
    MissingValue(&'static str),

    #[error("Unknown option '{0}'")]
    UnknownOption(String),

    #[error("Invalid value '{value}' for {flag}: {reason}")]
    InvalidValue {
        flag: &'static str,
        value: String,
        reason: String,
    },

    #[error("A prompt is required for text-to-video jobs")]
    MissingPrompt,

    #[error("Failed to read image '{path}': {source}")]
    ReadImage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Help,
    Run(JobArgs),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobArgs {
    pub prompt: Option<String>,
    pub resolution: Resolution,
    pub seed: Seed,
    pub watermark: bool,
    pub images: Vec<PathBuf>,
}

impl Default for JobArgs {
    fn default() -> Self {
        Self {
            prompt: None,
            resolution: Resolution::Landscape720,
            seed: Seed::Auto,
            watermark: true,
            images: Vec::new(),
        }
    }
}

/// Parse command-line arguments (without the program name).
///
/// Positional arguments are joined with spaces to form the prompt.
pub fn parse_args<I>(args: I) -> Result<Invocation, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = JobArgs::default();
    let mut words: Vec<String> = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "--resolution" => {
                let value = args.next().ok_or(CliError::MissingValue("--resolution"))?;
                parsed.resolution = value.parse().map_err(|e: CoreError| CliError::InvalidValue {
                    flag: "--resolution",
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
            }
            "--seed" => {
                let value = args.next().ok_or(CliError::MissingValue("--seed"))?;
                let seed: i64 = value.parse().map_err(|_| CliError::InvalidValue {
                    flag: "--seed",
                    value: value.clone(),
                    reason: "expected an integer".to_string(),
                })?;
                parsed.seed = Seed::from_wire(seed);
            }
            "--random-seed" => parsed.seed = Seed::random(),
            "--no-watermark" => parsed.watermark = false,
            "--image" => {
                let value = args.next().ok_or(CliError::MissingValue("--image"))?;
                parsed.images.push(PathBuf::from(value));
            }
            flag if flag.starts_with("--") => return Err(CliError::UnknownOption(flag.to_string())),
            _ => words.push(arg),
        }
    }

    if parsed.images.len() > MAX_IMAGES {
        return Err(CliError::InvalidValue {
            flag: "--image",
            value: parsed.images.len().to_string(),
            reason: format!("at most {MAX_IMAGES} images are allowed"),
        });
    }

    let prompt = words.join(" ");
    parsed.prompt = (!prompt.trim().is_empty()).then_some(prompt);
    if parsed.images.is_empty() && parsed.prompt.is_none() {
        return Err(CliError::MissingPrompt);
    }

    Ok(Invocation::Run(parsed))
}

impl JobArgs {
    /// Read the referenced images from disk and build the request.
    pub fn load_request(&self) -> Result<JobRequest, CliError> {
        let mut blobs = Vec::with_capacity(self.images.len());
        for path in &self.images {
            let bytes = std::fs::read(path).map_err(|source| CliError::ReadImage {
                path: path.clone(),
                source,
            })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            blobs.push(ImageBlob::sniff(file_name, bytes)?);
        }
        self.build_request(blobs)
    }

    /// Build the request from already-loaded images.
    pub fn build_request(&self, images: Vec<ImageBlob>) -> Result<JobRequest, CliError> {
        if images.is_empty() {
            let prompt = self.prompt.clone().ok_or(CliError::MissingPrompt)?;
            return Ok(JobRequest::Text(TextJobRequest {
                prompt,
                resolution: self.resolution,
                watermark: self.watermark,
                seed: self.seed,
            }));
        }
        Ok(JobRequest::Image(ImageJobRequest {
            prompt: self.prompt.clone(),
            images,
            watermark: self.watermark,
            seed: self.seed,
        }))
    }
}

/// One-line, human-readable summary of a state.
pub fn describe(state: &JobState) -> String {
    match state.phase() {
        JobPhase::Idle => "idle".to_string(),
        JobPhase::Submitting => "submitting".to_string(),
        JobPhase::Polling => format!(
            "generating {:.0}% (about {:.0}s left)",
            state.progress(),
            state.estimated_seconds_remaining()
        ),
        JobPhase::Succeeded => format!("done: {}", state.result_url().unwrap_or_default()),
        JobPhase::Failed => match state.error() {
            Some(error) => format!("failed ({:?}): {}", error.kind, error.message),
            None => "failed".to_string(),
        },
    }
}

/// Log every distinct state until the job finishes, then return the
/// final state. Returns early if the controller goes away.
pub async fn follow(states: &mut watch::Receiver<JobState>) -> JobState {
    let mut last_line = String::new();
    loop {
        let state = states.borrow_and_update().clone();
        let line = describe(&state);
        if line != last_line {
            tracing::info!(phase = ?state.phase(), "{line}");
            last_line = line;
        }
        if state.phase().is_terminal() || states.changed().await.is_err() {
            return state;
        }
    }
}
