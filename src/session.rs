//! Session flow controller.
//!
//! A [`Session`] owns every piece of mutable state for one user session and
//! exposes the flow as named transitions:
//!
//! ```text
//! AwaitingCredential -> SelectingPreset -> AwaitingImage -> Generating -> ViewingResult
//!         ^                    ^               |   ^             |              |
//!         |                    +- change_style-+   +-- failure --+              |
//!         +---------- credential rejected -----------------------+              |
//!                                              ^------------ close_result ------+
//! ```
//!
//! At most one generation is in flight. [`Session::start_generation`] flips the
//! generating flag synchronously and hands back a [`PendingGeneration`] that
//! performs the remote call; [`Session::finish_generation`] applies its outcome.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::credential::{Credential, CredentialHolder, CredentialOrigin};
use crate::error::{FlowError, MagicLensError, Result, TransformError};
use crate::image::{self, GenerationResult, RawFile, SourceFile, UploadedImage};
use crate::presets::{self, Preset};
use crate::transform::TransformProvider;

/// File name prefix for downloaded results.
pub const DOWNLOAD_PREFIX: &str = "magiclens-ai";

/// Where the user is in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    /// No usable credential; the rest of the flow is gated.
    AwaitingCredential,
    /// Choosing a preset.
    SelectingPreset,
    /// Preset chosen; uploading a photo and triggering generation.
    AwaitingImage,
    /// A generation request is in flight.
    Generating,
    /// Showing a generation result.
    ViewingResult,
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AwaitingCredential => "awaiting a credential",
            Self::SelectingPreset => "selecting a preset",
            Self::AwaitingImage => "awaiting an image",
            Self::Generating => "generating",
            Self::ViewingResult => "viewing a result",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct InFlight {
    id: u64,
    token: CancellationToken,
}

/// Serializable view of the session, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowSnapshot {
    /// Current step.
    pub step: FlowStep,
    /// Selected preset id.
    pub preset_id: Option<u32>,
    /// Selected preset label.
    pub preset_label: Option<&'static str>,
    /// Uploaded file metadata.
    pub image: Option<SourceFile>,
    /// Whether a result is held.
    pub has_result: bool,
    /// Last user-facing error.
    pub last_error: Option<String>,
    /// Whether a generation is in flight.
    pub is_generating: bool,
    /// Origin of the active credential; never the value.
    pub credential_origin: Option<CredentialOrigin>,
}

/// Outcome of one generation attempt, tagged with its ticket id.
#[derive(Debug)]
pub struct GenerationOutcome {
    id: u64,
    result: std::result::Result<GenerationResult, TransformError>,
}

impl GenerationOutcome {
    /// Returns the transformation result.
    pub fn result(&self) -> std::result::Result<&GenerationResult, &TransformError> {
        self.result.as_ref()
    }
}

/// A generation that has been admitted but not yet executed.
#[must_use = "a pending generation does nothing until run"]
pub struct PendingGeneration<P> {
    id: u64,
    provider: Arc<P>,
    image: UploadedImage,
    instruction: &'static str,
    credential: Credential,
    token: CancellationToken,
}

impl<P> fmt::Debug for PendingGeneration<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingGeneration")
            .field("id", &self.id)
            .field("image", &self.image.source().name)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl<P: TransformProvider> PendingGeneration<P> {
    /// Returns a token that cancels this generation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Issues the single remote call, racing it against cancellation.
    pub async fn run(self) -> GenerationOutcome {
        tracing::info!(
            id = self.id,
            provider = self.provider.name(),
            image = %self.image.source().name,
            "generation started"
        );
        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TransformError::Cancelled),
            result = self.provider.transform(&self.image, self.instruction, &self.credential) => result,
        };
        GenerationOutcome {
            id: self.id,
            result,
        }
    }
}

/// One user session: credential gate, preset, upload, generation and result.
pub struct Session<P> {
    provider: Arc<P>,
    credentials: CredentialHolder,
    step: FlowStep,
    selected_preset: Option<&'static Preset>,
    uploaded_image: Option<UploadedImage>,
    result: Option<GenerationResult>,
    last_error: Option<String>,
    in_flight: Option<InFlight>,
    next_generation_id: u64,
}

impl<P> fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("step", &self.step)
            .field("credentials", &self.credentials)
            .field("selected_preset", &self.selected_preset.map(|p| p.id))
            .field("has_image", &self.uploaded_image.is_some())
            .field("has_result", &self.result.is_some())
            .field("last_error", &self.last_error)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl<P: TransformProvider> Session<P> {
    /// Creates a session gated on a credential.
    pub fn new(provider: P, credentials: CredentialHolder) -> Self {
        Self {
            provider: Arc::new(provider),
            credentials,
            step: FlowStep::AwaitingCredential,
            selected_preset: None,
            uploaded_image: None,
            result: None,
            last_error: None,
            in_flight: None,
            next_generation_id: 0,
        }
    }

    /// Returns the current step.
    pub fn step(&self) -> FlowStep {
        self.step
    }

    /// Returns the selected preset.
    pub fn selected_preset(&self) -> Option<&'static Preset> {
        self.selected_preset
    }

    /// Returns the uploaded image.
    pub fn uploaded_image(&self) -> Option<&UploadedImage> {
        self.uploaded_image.as_ref()
    }

    /// Returns the current result.
    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    /// Returns the last user-facing error.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns true while a generation is in flight.
    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns the active credential's origin.
    pub fn credential_origin(&self) -> Option<CredentialOrigin> {
        self.credentials.active().map(Credential::origin)
    }

    /// Returns true if the generate action is currently enabled.
    pub fn can_generate(&self) -> bool {
        self.step == FlowStep::AwaitingImage
            && !self.is_generating()
            && self.selected_preset.is_some()
            && self.uploaded_image.is_some()
            && self.credentials.has_credential()
    }

    /// Returns a serializable view of the session.
    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            step: self.step,
            preset_id: self.selected_preset.map(|p| p.id),
            preset_label: self.selected_preset.map(|p| p.label),
            image: self.uploaded_image.as_ref().map(|i| i.source().clone()),
            has_result: self.result.is_some(),
            last_error: self.last_error.clone(),
            is_generating: self.is_generating(),
            credential_origin: self.credential_origin(),
        }
    }

    fn transition(&mut self, to: FlowStep) {
        if self.step != to {
            tracing::debug!(from = %self.step, to = %to, "flow transition");
        }
        self.step = to;
    }

    fn require(&self, allowed: &[FlowStep], action: &'static str) -> std::result::Result<(), FlowError> {
        if allowed.contains(&self.step) {
            Ok(())
        } else {
            Err(FlowError::InvalidTransition {
                step: self.step,
                action,
            })
        }
    }

    /// Leaves the credential gate for wherever the retained state points.
    fn resume_after_credential(&mut self) {
        let to = if self.selected_preset.is_some() {
            FlowStep::AwaitingImage
        } else {
            FlowStep::SelectingPreset
        };
        self.transition(to);
    }

    /// Re-checks for a host-selected or environment credential.
    ///
    /// Returns true if the session is past the credential gate afterwards.
    /// A key the service already rejected is not picked up again, and the
    /// last error is kept while the gate stays closed.
    pub async fn check_credential(&mut self) -> bool {
        let found = self.credentials.refresh().await.is_some();
        if found && self.step == FlowStep::AwaitingCredential {
            self.last_error = None;
            self.resume_after_credential();
        }
        found
    }

    /// Acquires a credential, optionally from a manually entered value.
    pub async fn submit_credential(&mut self, manual: Option<&str>) -> Result<CredentialOrigin> {
        self.require(&[FlowStep::AwaitingCredential], "submit a credential")?;
        match self.credentials.acquire(manual).await {
            Ok(credential) => {
                self.last_error = None;
                self.resume_after_credential();
                Ok(credential.origin())
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Discards the credential and returns to the gate.
    ///
    /// Preset and uploaded image are kept. Any in-flight generation is
    /// cancelled and a displayed result is closed.
    pub fn change_credential(&mut self) {
        self.abort_in_flight();
        self.credentials.clear();
        self.result = None;
        self.last_error = None;
        self.transition(FlowStep::AwaitingCredential);
    }

    /// Selects a preset. Clears any result and error, keeps the uploaded image.
    pub fn select_preset(&mut self, id: u32) -> Result<&'static Preset> {
        self.require(
            &[FlowStep::SelectingPreset, FlowStep::AwaitingImage],
            "select a preset",
        )?;
        let preset = presets::find(id).ok_or(FlowError::UnknownPreset(id))?;
        self.selected_preset = Some(preset);
        self.result = None;
        self.last_error = None;
        tracing::debug!(preset = preset.id, label = preset.label, "preset selected");
        self.transition(FlowStep::AwaitingImage);
        Ok(preset)
    }

    /// Returns to preset selection, discarding preset, image, result and error.
    pub fn change_style(&mut self) -> std::result::Result<(), FlowError> {
        self.require(&[FlowStep::AwaitingImage], "change style")?;
        self.selected_preset = None;
        self.uploaded_image = None;
        self.result = None;
        self.last_error = None;
        self.transition(FlowStep::SelectingPreset);
        Ok(())
    }

    /// Installs a decoded upload, replacing any previous one.
    pub fn upload_image(&mut self, image: UploadedImage) -> std::result::Result<(), FlowError> {
        self.require(&[FlowStep::AwaitingImage], "upload an image")?;
        tracing::debug!(
            name = %image.source().name,
            size = image.source().size,
            replaced = self.uploaded_image.is_some(),
            "image uploaded"
        );
        self.uploaded_image = Some(image);
        self.result = None;
        self.last_error = None;
        Ok(())
    }

    /// Validates, decodes and installs a raw file.
    ///
    /// A non-image file fails with [`crate::ImageError::NotAnImage`] and leaves the
    /// session untouched.
    pub async fn accept_upload(&mut self, file: RawFile) -> Result<()> {
        self.require(&[FlowStep::AwaitingImage], "upload an image")?;
        let image = image::accept(file).await?;
        self.upload_image(image)?;
        Ok(())
    }

    /// Admits a generation if the generate action is enabled.
    ///
    /// The generating flag is set before this returns, so a second call
    /// yields `None` until the first outcome is applied or cancelled.
    pub fn start_generation(&mut self) -> Option<PendingGeneration<P>> {
        if !self.can_generate() {
            tracing::debug!(step = %self.step, generating = self.is_generating(), "generate ignored");
            return None;
        }
        let preset = self.selected_preset?;
        let image = self.uploaded_image.clone()?;
        let credential = self.credentials.active()?.clone();

        self.next_generation_id += 1;
        let id = self.next_generation_id;
        let token = CancellationToken::new();
        self.in_flight = Some(InFlight {
            id,
            token: token.clone(),
        });
        self.result = None;
        self.last_error = None;
        self.transition(FlowStep::Generating);

        Some(PendingGeneration {
            id,
            provider: Arc::clone(&self.provider),
            image,
            instruction: preset.prompt,
            credential,
            token,
        })
    }

    /// Applies a generation outcome. Outcomes of cancelled or superseded
    /// generations are ignored.
    pub fn finish_generation(&mut self, outcome: GenerationOutcome) -> FlowStep {
        match self.in_flight {
            Some(ref in_flight) if in_flight.id == outcome.id => {}
            _ => {
                tracing::debug!(id = outcome.id, "ignoring stale generation outcome");
                return self.step;
            }
        }
        self.in_flight = None;

        match outcome.result {
            Ok(result) => {
                tracing::info!(
                    id = outcome.id,
                    duration_ms = result.metadata.duration_ms,
                    "generation succeeded"
                );
                self.result = Some(result);
                self.transition(FlowStep::ViewingResult);
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                let origin = self.credential_origin();
                if e.is_credential_rejection() && origin != Some(CredentialOrigin::EnvironmentDefault) {
                    tracing::warn!(id = outcome.id, origin = ?origin, "credential rejected; re-gating");
                    self.credentials.reject();
                    self.transition(FlowStep::AwaitingCredential);
                } else {
                    tracing::warn!(id = outcome.id, retryable = e.is_retryable(), "generation failed: {e}");
                    self.transition(FlowStep::AwaitingImage);
                }
            }
        }
        self.step
    }

    /// Runs a full generation: admit, call, apply.
    ///
    /// Returns `None` without any remote call if generation is not enabled.
    pub async fn generate(&mut self) -> Option<FlowStep> {
        let pending = self.start_generation()?;
        let outcome = pending.run().await;
        Some(self.finish_generation(outcome))
    }

    fn abort_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.token.cancel();
                tracing::warn!(id = in_flight.id, "generation cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels the in-flight generation and returns to the upload step.
    pub fn cancel_generation(&mut self) -> bool {
        if !self.abort_in_flight() {
            return false;
        }
        self.transition(FlowStep::AwaitingImage);
        true
    }

    /// Closes the result view, keeping preset and image.
    pub fn close_result(&mut self) -> std::result::Result<(), FlowError> {
        self.require(&[FlowStep::ViewingResult], "close the result")?;
        self.result = None;
        self.last_error = None;
        self.transition(FlowStep::AwaitingImage);
        Ok(())
    }

    /// Writes the result to `<dir>/magiclens-ai-<epoch-millis>.png`.
    pub async fn download(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        self.require(&[FlowStep::ViewingResult], "download")?;
        let result = self.result.as_ref().ok_or(FlowError::NoResult)?;
        let bytes = result.bytes().map_err(MagicLensError::from)?;

        let file_name = format!(
            "{}-{}.png",
            DOWNLOAD_PREFIX,
            chrono::Utc::now().timestamp_millis()
        );
        let path = dir.as_ref().join(file_name);
        tokio::fs::write(&path, &bytes).await?;
        tracing::info!(path = %path.display(), size = bytes.len(), "result downloaded");
        Ok(path)
    }
}

impl<P> Drop for Session<P> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.token.cancel();
        }
    }
}
