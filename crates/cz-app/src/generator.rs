use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;
use cz_core::{
    AudioConditioning, GenerationRequest, SequenceResult, SequenceState, SongBatch, SongPlan, Stage, TrackLedger,
};
use crate::config::AppConfig;
use crate::error::{PollError, SequenceError, StageFailure};
use crate::generator::backend::StudioClient;
use crate::generator::captcha::{ChallengeSolver, DisabledSolver, TwoCaptchaSolver};
use crate::generator::poller::{JobPoller, PollConfig};
use crate::generator::retriever::AssetRetriever;

pub mod backend;
pub mod captcha;
pub mod poller;
pub mod retriever;

/// Chains intro, extensions and outro into one song. Each stage submits one
/// request, waits for its whole batch and downloads it before the next
/// stage is allowed to start.
pub struct Sequencer {
    client: Arc<StudioClient>,
    poller: JobPoller,
    retriever: AssetRetriever,
    cancel: CancellationToken,
    state_tx: Option<UnboundedSender<SequenceState>>,
}

impl Sequencer {
    pub fn new(
        client: StudioClient,
        poll: PollConfig,
        retriever: AssetRetriever,
        cancel: CancellationToken,
    ) -> Self {
        let client = Arc::new(client);
        let poller = JobPoller::new(client.clone(), poll, cancel.clone());

        Self {
            client,
            poller,
            retriever,
            cancel,
            state_tx: None,
        }
    }

    pub fn from_config(config: &AppConfig, cancel: CancellationToken) -> anyhow::Result<Self> {
        let solver: Arc<dyn ChallengeSolver> = match &config.twocaptcha_key {
            Some(key) => Arc::new(TwoCaptchaSolver::new(key.clone())),
            None => Arc::new(DisabledSolver),
        };
        let client = StudioClient::new(config.studio.clone(), solver)?;
        let retriever = AssetRetriever::new(config.output_dir.clone(), config.download_policy);

        Ok(Self::new(client, config.poll.clone(), retriever, cancel))
    }

    /// Publish every state transition to `tx`
    pub fn with_state_listener(mut self, tx: UnboundedSender<SequenceState>) -> Self {
        self.state_tx = Some(tx);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run a whole plan. Nothing is returned unless every stage succeeded.
    ///
    /// A plan that fails validation is reported against `Stage::Initial`
    /// with `StageFailure::InvalidPlan`. No request is sent and the machine
    /// never leaves `Idle`, so listeners see no state at all.
    pub async fn create_complete_song(&self, plan: &SongPlan) -> Result<SequenceResult, SequenceError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("sequence", run_id = %run_id);

        self.run(plan, run_id).instrument(span).await
    }

    async fn run(&self, plan: &SongPlan, run_id: String) -> Result<SequenceResult, SequenceError> {
        let mut ledger = TrackLedger::new();
        let mut state = SequenceState::Idle;

        // Rejected before the first stage starts, so no Failed transition
        if let Err(reason) = plan.validate() {
            return Err(SequenceError::new(Stage::Initial, StageFailure::InvalidPlan(reason), ledger));
        }

        info!(extensions = plan.extension_count, "Starting complete song sequence");

        self.transition(&mut state, SequenceState::GeneratingInitial);
        let initial = match self
            .create_song(&plan.initial_prompt, plan.seed, plan.initial_lyrics.as_deref(), &mut ledger)
            .await
        {
            Ok(batch) => batch,
            Err(kind) => return Err(self.fail(&mut state, Stage::Initial, kind, ledger)),
        };

        let mut extensions: Vec<SongBatch> = Vec::with_capacity(plan.extension_count);
        for i in 0..plan.extension_count {
            let stage = Stage::Extension(i);
            self.transition(&mut state, SequenceState::generating(stage));

            let previous = extensions.last().unwrap_or(&initial);
            let conditioning = match conditioning_from(previous) {
                Ok(c) => c,
                Err(kind) => return Err(self.fail(&mut state, stage, kind, ledger)),
            };

            // validate() guarantees a non-empty prompt list here
            let prompt = plan.extension_prompt(i).unwrap_or_default();
            let lyrics = plan.extension_lyrics(i);

            match self.extend(i, prompt, plan.seed, conditioning, lyrics, &mut ledger).await {
                Ok(batch) => extensions.push(batch),
                Err(kind) => return Err(self.fail(&mut state, stage, kind, ledger)),
            }
        }

        self.transition(&mut state, SequenceState::GeneratingOutro);
        let last = extensions.last().unwrap_or(&initial);
        let conditioning = match conditioning_from(last) {
            Ok(c) => c,
            Err(kind) => return Err(self.fail(&mut state, Stage::Outro, kind, ledger)),
        };

        let outro = match self
            .add_outro(&plan.outro_prompt, plan.seed, conditioning, plan.outro_lyrics.as_deref(), &mut ledger)
            .await
        {
            Ok(batch) => batch,
            Err(kind) => return Err(self.fail(&mut state, Stage::Outro, kind, ledger)),
        };

        self.transition(&mut state, SequenceState::Complete);
        info!(tracks = ledger.len(), "Complete song sequence generated");

        Ok(SequenceResult {
            run_id,
            initial,
            extensions,
            outro,
            ledger,
        })
    }

    /// Generate the opening segment into `short_songs`
    pub async fn create_song(
        &self,
        prompt: &str,
        seed: Option<i64>,
        lyrics: Option<&str>,
        ledger: &mut TrackLedger,
    ) -> Result<SongBatch, StageFailure> {
        let request = GenerationRequest::initial(prompt, seed, lyrics);
        self.run_stage(Stage::Initial, request, ledger).await
    }

    /// Generate extension `index`, continuing from `conditioning`, into `extend_songs`
    pub async fn extend(
        &self,
        index: usize,
        prompt: &str,
        seed: Option<i64>,
        conditioning: AudioConditioning,
        lyrics: Option<&str>,
        ledger: &mut TrackLedger,
    ) -> Result<SongBatch, StageFailure> {
        let request = GenerationRequest::extension(prompt, seed, conditioning, lyrics);
        self.run_stage(Stage::Extension(index), request, ledger).await
    }

    /// Generate the closing segment into `outro_songs`
    pub async fn add_outro(
        &self,
        prompt: &str,
        seed: Option<i64>,
        conditioning: AudioConditioning,
        lyrics: Option<&str>,
        ledger: &mut TrackLedger,
    ) -> Result<SongBatch, StageFailure> {
        let request = GenerationRequest::outro(prompt, seed, conditioning, lyrics);
        self.run_stage(Stage::Outro, request, ledger).await
    }

    async fn run_stage(
        &self,
        stage: Stage,
        request: GenerationRequest,
        ledger: &mut TrackLedger,
    ) -> Result<SongBatch, StageFailure> {
        if self.cancel.is_cancelled() {
            return Err(StageFailure::Cancelled);
        }

        info!(%stage, prompt = %request.prompt, "Submitting generation");
        let response = self
            .client
            .submit_generation(&request)
            .await
            .map_err(StageFailure::Submit)?;

        if response.track_ids.is_empty() {
            return Err(StageFailure::NoTracks);
        }
        ledger.record(stage, response.track_ids.iter().cloned());

        let jobs = self.poller.await_completion(stage.kind(), &response.track_ids).await?;
        let files = self.retriever.fetch_batch(&jobs, stage.bucket()).await?;

        info!(%stage, bucket = stage.bucket(), jobs = jobs.len(), "Stage complete");
        Ok(SongBatch::new(stage, jobs, files))
    }

    fn transition(&self, state: &mut SequenceState, next: SequenceState) {
        debug_assert!(state.can_transition_to(next), "illegal transition {state:?} -> {next:?}");
        info!(from = ?state, to = ?next, "Sequence state changed");

        *state = next;
        if let Some(tx) = &self.state_tx {
            let _ = tx.send(next);
        }
    }

    fn fail(&self, state: &mut SequenceState, stage: Stage, kind: StageFailure, ledger: TrackLedger) -> SequenceError {
        error!(%stage, error = %kind, "Sequence aborted");
        self.transition(state, SequenceState::Failed);
        SequenceError::new(stage, kind, ledger)
    }
}

fn conditioning_from(batch: &SongBatch) -> Result<AudioConditioning, StageFailure> {
    let lead = batch.lead().ok_or(StageFailure::NoTracks)?;
    lead.conditioning()
        .ok_or_else(|| StageFailure::Poll(PollError::Incomplete(lead.id.clone())))
}
