use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Notice, StudioError};
use crate::gateway::{GenerationGateway, ImageRequest};
use crate::prompts::build_cinematic_prompt;
use crate::storyboard::model::{
    derive_character_profiles, Blueprint, CharacterProfile, Scene, Shot, ShotUpdate,
    WorkflowStage,
};
use crate::storyboard::shots::{
    find_shot, find_shot_mut, flatten_shots, ShotGenerationState, ShotId,
};

#[derive(Debug, Clone, Default)]
pub struct StoryboardState {
    pub stage: WorkflowStage,
    pub blueprint: Option<Blueprint>,
    pub profiles: BTreeMap<String, CharacterProfile>,
    pub shots: ShotGenerationState,
    pub is_parsing: bool,
    pub batch: u64,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batch: u64,
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Results that arrived after a newer batch or regeneration took over
    /// their slot.
    pub discarded: usize,
}

/// Clears `is_parsing` when a parse ends, including when its future is
/// dropped before completion.
struct ParsingGuard<'a> {
    state: &'a Mutex<StoryboardState>,
}

impl Drop for ParsingGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().is_parsing = false;
    }
}

/// Drives one storyboard session through script → blueprint → board.
///
/// State lives behind a mutex that is only held between awaits, so every
/// in-flight generation writes its own slot when it resolves.
pub struct StoryboardOrchestrator {
    gateway: Arc<dyn GenerationGateway>,
    visual_style: String,
    state: Mutex<StoryboardState>,
}

impl StoryboardOrchestrator {
    pub fn new(gateway: Arc<dyn GenerationGateway>, visual_style: impl Into<String>) -> Self {
        StoryboardOrchestrator {
            gateway,
            visual_style: visual_style.into(),
            state: Mutex::new(StoryboardState::default()),
        }
    }

    pub fn snapshot(&self) -> StoryboardState {
        self.state.lock().clone()
    }

    pub fn stage(&self) -> WorkflowStage {
        self.state.lock().stage
    }

    fn require_stage(
        &self,
        operation: &'static str,
        expected: WorkflowStage,
    ) -> Result<(), StudioError> {
        let stage = self.state.lock().stage;
        if stage == expected {
            Ok(())
        } else {
            Err(StudioError::invalid_stage(operation, stage))
        }
    }

    pub async fn draft_story(&self, seed: Option<&str>) -> String {
        self.gateway.generate_story(seed).await
    }

    /// Returns `Ok(false)` when there was nothing to do: blank input or a
    /// parse already in flight.
    pub async fn parse_story(&self, story: &str) -> Result<bool, StudioError> {
        if story.trim().is_empty() {
            return Ok(false);
        }
        let parsing = {
            let mut state = self.state.lock();
            if state.stage != WorkflowStage::Script {
                return Err(StudioError::invalid_stage("parse_story", state.stage));
            }
            if state.is_parsing {
                return Ok(false);
            }
            state.is_parsing = true;
            state.notice = None;
            ParsingGuard { state: &self.state }
        };

        let parsed = self.gateway.parse_story_to_blueprint(story).await;
        drop(parsing);

        let mut state = self.state.lock();
        match parsed {
            Some(blueprint) => {
                info!(
                    "Blueprint '{}' ready: {} scene(s), {} shot(s)",
                    blueprint.title,
                    blueprint.scenes.len(),
                    flatten_shots(&blueprint).len()
                );
                state.profiles = derive_character_profiles(&blueprint);
                state.blueprint = Some(blueprint);
                state.stage = WorkflowStage::Blueprint;
                state.notice = None;
                Ok(true)
            }
            None => {
                let message = "The story could not be turned into a blueprint. Edit the story and try again.";
                state.notice = Some(Notice::error(message));
                Err(StudioError::Parse(message.to_string()))
            }
        }
    }

    pub fn back_to_script(&self) -> Result<(), StudioError> {
        let mut state = self.state.lock();
        if state.stage != WorkflowStage::Blueprint {
            return Err(StudioError::invalid_stage("back_to_script", state.stage));
        }
        state.stage = WorkflowStage::Script;
        state.notice = None;
        Ok(())
    }

    pub fn update_character_profile(
        &self,
        name: &str,
        detailed_description: impl Into<String>,
    ) -> Result<(), StudioError> {
        let mut state = self.state.lock();
        if state.stage != WorkflowStage::Blueprint {
            return Err(StudioError::invalid_stage(
                "update_character_profile",
                state.stage,
            ));
        }
        let profile = state
            .profiles
            .get_mut(name)
            .ok_or_else(|| StudioError::UnknownCharacter(name.to_string()))?;
        profile.detailed_description = detailed_description.into();
        Ok(())
    }

    /// Moves to the board stage, then renders every shot.
    pub async fn finalize_blueprint(&self) -> Result<BatchReport, StudioError> {
        {
            let mut state = self.state.lock();
            if state.stage != WorkflowStage::Blueprint || state.blueprint.is_none() {
                return Err(StudioError::invalid_stage("finalize_blueprint", state.stage));
            }
            state.stage = WorkflowStage::Board;
        }
        self.generate_all_shots().await
    }

    pub async fn generate_all_shots(&self) -> Result<BatchReport, StudioError> {
        let (batch, jobs) = {
            let mut state = self.state.lock();
            if state.stage != WorkflowStage::Board {
                return Err(StudioError::invalid_stage("generate_all_shots", state.stage));
            }
            let Some(blueprint) = &state.blueprint else {
                return Err(StudioError::invalid_stage("generate_all_shots", state.stage));
            };
            let prompts: Vec<(ShotId, String)> = flatten_shots(blueprint)
                .into_iter()
                .map(|shot| {
                    let prompt = build_cinematic_prompt(
                        shot.scene,
                        shot.shot,
                        &self.visual_style,
                        &state.profiles,
                    );
                    (shot.id, prompt)
                })
                .collect();

            let ids: Vec<ShotId> = prompts.iter().map(|(id, _)| *id).collect();
            let tickets = state.shots.begin_batch(&ids);
            state.batch += 1;
            state.notice = None;
            let jobs: Vec<_> = tickets
                .into_iter()
                .zip(prompts)
                .map(|(ticket, (_, prompt))| (ticket, prompt))
                .collect();
            (state.batch, jobs)
        };

        info!("Shot batch {} started with {} shot(s)", batch, jobs.len());
        let requested = jobs.len();
        let outcomes = join_all(jobs.into_iter().map(|(ticket, prompt)| async move {
            let result = self
                .gateway
                .generate_image(ImageRequest::new(prompt, None, None))
                .await;
            let generated = result.is_ok();
            let url = match result {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!("Shot {} failed in batch {}: {}", ticket.id, batch, err);
                    None
                }
            };
            if self.state.lock().shots.complete(ticket, url) {
                Some(generated)
            } else {
                info!("Discarded stale result for shot {} from batch {}", ticket.id, batch);
                None
            }
        }))
        .await;

        let succeeded = outcomes.iter().filter(|outcome| **outcome == Some(true)).count();
        let failed = outcomes.iter().filter(|outcome| **outcome == Some(false)).count();
        let report = BatchReport {
            batch,
            requested,
            succeeded,
            failed,
            discarded: requested - succeeded - failed,
        };
        info!(
            "Shot batch {} finished: {}/{} generated, {} failed, {} discarded",
            report.batch, report.succeeded, report.requested, report.failed, report.discarded
        );
        if report.failed > 0 {
            let mut state = self.state.lock();
            if state.batch == batch {
                state.notice = Some(Notice::error(format!(
                    "{} of {} shots could not be generated. Regenerate them individually.",
                    report.failed, report.requested
                )));
            }
        }
        Ok(report)
    }

    /// Re-renders one shot. The previous image stays visible while loading
    /// and is restored if the new request fails. Returns whether a new image
    /// was produced.
    pub async fn regenerate_shot(
        &self,
        id: ShotId,
        scene: &Scene,
        shot: &Shot,
    ) -> Result<bool, StudioError> {
        let (permit, previous, prompt) = {
            let mut state = self.state.lock();
            if state.stage != WorkflowStage::Board {
                return Err(StudioError::invalid_stage("regenerate_shot", state.stage));
            }
            let prompt = build_cinematic_prompt(scene, shot, &self.visual_style, &state.profiles);
            let (permit, previous) = state.shots.begin_regeneration(id);
            (permit, previous, prompt)
        };

        let result = self
            .gateway
            .generate_image(ImageRequest::new(prompt, None, None))
            .await;

        let mut state = self.state.lock();
        match result {
            Ok(url) => {
                state.shots.complete(permit, Some(url));
                Ok(true)
            }
            Err(err) => {
                warn!("Regeneration of shot {} failed: {}", id, err);
                state.shots.complete(permit, previous);
                state.notice = Some(Notice::error(format!(
                    "Shot {id} could not be regenerated. The previous image was kept."
                )));
                Ok(false)
            }
        }
    }

    /// Regenerates a shot using its current fields in the blueprint.
    pub async fn regenerate(&self, id: ShotId) -> Result<bool, StudioError> {
        let (scene, shot) = {
            let state = self.state.lock();
            let blueprint = state
                .blueprint
                .as_ref()
                .ok_or(StudioError::UnknownShot(id))?;
            let (scene, shot) = find_shot(blueprint, id).ok_or(StudioError::UnknownShot(id))?;
            (scene.clone(), shot.clone())
        };
        self.regenerate_shot(id, &scene, &shot).await
    }

    /// Applies edited fields to the shot at `id` and regenerates it.
    pub async fn update_shot(&self, id: ShotId, update: ShotUpdate) -> Result<bool, StudioError> {
        if update.is_empty() {
            return Err(StudioError::Validation(format!(
                "No fields to update for shot {id}"
            )));
        }
        self.require_stage("update_shot", WorkflowStage::Board)?;
        let (scene, shot) = {
            let mut state = self.state.lock();
            let blueprint = state
                .blueprint
                .as_mut()
                .ok_or(StudioError::UnknownShot(id))?;
            let target = find_shot_mut(blueprint, id).ok_or(StudioError::UnknownShot(id))?;
            update.apply_to(target);
            let (scene, shot) = find_shot(blueprint, id).ok_or(StudioError::UnknownShot(id))?;
            (scene.clone(), shot.clone())
        };
        info!("Shot {} updated, regenerating", id);
        self.regenerate_shot(id, &scene, &shot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AnalysisError, GenerationError};
    use crate::llm::media::ImageHandle;
    use crate::storyboard::model::{Beat, CastRef};
    use crate::storyboard::shots::ShotStatus;
    use crate::studio::model::StyleAttributes;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct MockGateway {
        blueprint: Option<Blueprint>,
        fail_all: AtomicBool,
        prompts: parking_lot::Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        parse_calls: AtomicUsize,
        first_parse_delay: Option<Duration>,
        gate: Option<tokio::sync::Semaphore>,
    }

    impl MockGateway {
        fn with_blueprint(blueprint: Blueprint) -> Arc<Self> {
            Arc::new(MockGateway {
                blueprint: Some(blueprint),
                ..MockGateway::default()
            })
        }

        /// Image calls wait until `release` hands out permits.
        fn gated(blueprint: Blueprint) -> Arc<Self> {
            Arc::new(MockGateway {
                blueprint: Some(blueprint),
                gate: Some(tokio::sync::Semaphore::new(0)),
                ..MockGateway::default()
            })
        }

        fn with_slow_first_parse(blueprint: Blueprint, delay: Duration) -> Arc<Self> {
            Arc::new(MockGateway {
                blueprint: Some(blueprint),
                first_parse_delay: Some(delay),
                ..MockGateway::default()
            })
        }

        fn generate_calls(&self) -> usize {
            self.prompts.lock().len()
        }

        fn release(&self, calls: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(calls);
            }
        }

        async fn wait_for_calls(&self, calls: usize) {
            while self.generate_calls() < calls {
                tokio::task::yield_now().await;
            }
        }
    }

    #[async_trait]
    impl GenerationGateway for MockGateway {
        async fn analyze_reference_image(
            &self,
            _image: &ImageHandle,
        ) -> Result<StyleAttributes, AnalysisError> {
            Err(AnalysisError("unused".into()))
        }

        async fn generate_image(
            &self,
            request: ImageRequest,
        ) -> Result<ImageHandle, GenerationError> {
            let call = {
                let mut prompts = self.prompts.lock();
                prompts.push(request.prompt().to_string());
                prompts.len()
            };
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_all.load(Ordering::SeqCst) || request.prompt().contains("FAIL") {
                Err(GenerationError::Remote("boom".into()))
            } else {
                Ok(ImageHandle::from_url(format!("https://img.test/{call}.png")))
            }
        }

        async fn parse_story_to_blueprint(&self, _story: &str) -> Option<Blueprint> {
            let previous_calls = self.parse_calls.fetch_add(1, Ordering::SeqCst);
            if let (0, Some(delay)) = (previous_calls, self.first_parse_delay) {
                tokio::time::sleep(delay).await;
            }
            self.blueprint.clone()
        }

        async fn generate_story(&self, _seed: Option<&str>) -> String {
            "A story".into()
        }
    }

    fn shot(caption: &str) -> Shot {
        Shot {
            shot_type: "Wide".into(),
            caption: caption.into(),
            lens_choice: "35mm".into(),
            aperture: "f/4".into(),
            camera_movement: "Static".into(),
        }
    }

    fn blueprint(captions: &[&[&str]]) -> Blueprint {
        let mut cast_refs = BTreeMap::new();
        cast_refs.insert(
            "Mara".to_string(),
            CastRef {
                name: "Mara".into(),
                description: "A pilot".into(),
            },
        );
        cast_refs.insert(
            "Jonah".to_string(),
            CastRef {
                name: "Jonah".into(),
                description: "A mechanic".into(),
            },
        );
        Blueprint {
            title: "Skyline".into(),
            logline: "Two friends fix a plane".into(),
            cast_refs,
            scenes: captions
                .iter()
                .enumerate()
                .map(|(index, shots)| Scene {
                    title: format!("Scene {}", index + 1),
                    location: "Hangar".into(),
                    beats: vec![Beat {
                        title: "Beat".into(),
                        description: String::new(),
                        shot_recommendations: shots.iter().map(|caption| shot(caption)).collect(),
                    }],
                    ..Scene::default()
                })
                .collect(),
        }
    }

    fn two_by_three() -> Blueprint {
        blueprint(&[
            &["Mara climbs in", "Jonah waves", "The engine coughs"],
            &["Mara takes off", "Jonah watches", "The plane banks"],
        ])
    }

    async fn at_board(gateway: Arc<MockGateway>) -> StoryboardOrchestrator {
        let orchestrator = StoryboardOrchestrator::new(gateway, "Painterly");
        assert!(orchestrator.parse_story("Once upon a hangar").await.unwrap());
        orchestrator.finalize_blueprint().await.unwrap();
        orchestrator
    }

    #[tokio::test]
    async fn successful_parse_moves_to_blueprint_with_one_profile_per_cast_member() {
        let orchestrator = StoryboardOrchestrator::new(MockGateway::with_blueprint(two_by_three()), "x");
        assert!(orchestrator.parse_story("A story").await.unwrap());

        let state = orchestrator.snapshot();
        assert_eq!(state.stage, WorkflowStage::Blueprint);
        assert!(!state.is_parsing);
        let keys: Vec<&String> = state.profiles.keys().collect();
        assert_eq!(keys, vec!["Jonah", "Mara"]);
        assert_eq!(state.profiles["Mara"].detailed_description, "A pilot");
    }

    #[tokio::test]
    async fn blank_story_is_a_no_op() {
        let gateway = MockGateway::with_blueprint(two_by_three());
        let orchestrator = StoryboardOrchestrator::new(gateway.clone(), "x");
        assert!(!orchestrator.parse_story("   \n").await.unwrap());
        assert_eq!(gateway.parse_calls.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.stage(), WorkflowStage::Script);
    }

    #[tokio::test]
    async fn failed_parse_stays_in_script_with_notice() {
        let orchestrator = StoryboardOrchestrator::new(Arc::new(MockGateway::default()), "x");
        let err = orchestrator.parse_story("A story").await.unwrap_err();
        assert!(matches!(err, StudioError::Parse(_)));

        let state = orchestrator.snapshot();
        assert_eq!(state.stage, WorkflowStage::Script);
        assert!(state.blueprint.is_none());
        assert!(state.notice.is_some());
    }

    #[tokio::test]
    async fn two_scenes_of_three_shots_issue_six_concurrent_calls() {
        let gateway = MockGateway::with_blueprint(two_by_three());
        let orchestrator = at_board(gateway.clone()).await;

        assert_eq!(gateway.generate_calls(), 6);
        assert_eq!(gateway.max_in_flight.load(Ordering::SeqCst), 6);
        let state = orchestrator.snapshot();
        assert_eq!(state.stage, WorkflowStage::Board);
        assert_eq!(state.shots.len(), 6);
        assert!(state.shots.iter().all(|(_, status)| !status.is_loading && status.url.is_some()));
    }

    #[tokio::test]
    async fn partial_failures_only_clear_their_own_slots() {
        let gateway = MockGateway::with_blueprint(blueprint(&[
            &["Mara FAIL", "Jonah waves"],
            &["FAIL again", "The plane banks"],
        ]));
        let orchestrator = StoryboardOrchestrator::new(gateway, "x");
        orchestrator.parse_story("story").await.unwrap();
        let report = orchestrator.finalize_blueprint().await.unwrap();

        assert_eq!(report.requested, 4);
        assert_eq!(report.failed, 2);
        let state = orchestrator.snapshot();
        assert_eq!(state.shots.loading_count(), 0);
        let failed = ShotStatus {
            is_loading: false,
            url: None,
        };
        assert_eq!(state.shots.get(ShotId::new(0, 0, 0)), Some(&failed));
        assert_eq!(state.shots.get(ShotId::new(1, 0, 0)), Some(&failed));
        assert!(state.shots.get(ShotId::new(0, 0, 1)).unwrap().url.is_some());
        assert!(state.notice.is_some());
    }

    #[tokio::test]
    async fn failed_regeneration_keeps_previous_image() {
        let gateway = MockGateway::with_blueprint(two_by_three());
        let orchestrator = at_board(gateway.clone()).await;
        let id = ShotId::new(0, 0, 1);
        let before = orchestrator.snapshot().shots.get(id).unwrap().url.clone();
        assert!(before.is_some());

        gateway.fail_all.store(true, Ordering::SeqCst);
        assert!(!orchestrator.regenerate(id).await.unwrap());

        let status = orchestrator.snapshot().shots.get(id).cloned().unwrap();
        assert_eq!(
            status,
            ShotStatus {
                is_loading: false,
                url: before
            }
        );
    }

    #[tokio::test]
    async fn editing_lens_replaces_that_shot_and_regenerates_it_once() {
        let gateway = MockGateway::with_blueprint(blueprint(&[&["Jonah waves", "Jonah waves"]]));
        let orchestrator = at_board(gateway.clone()).await;
        let calls_before = gateway.generate_calls();
        let id = ShotId::new(0, 0, 1);

        let regenerated = orchestrator
            .update_shot(
                id,
                ShotUpdate {
                    lens_choice: Some("85mm".into()),
                    ..ShotUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(regenerated);
        assert_eq!(gateway.generate_calls(), calls_before + 1);
        assert!(gateway.prompts.lock().last().unwrap().contains("Lens: 85mm"));

        let state = orchestrator.snapshot();
        let shots = &state.blueprint.as_ref().unwrap().scenes[0].beats[0].shot_recommendations;
        assert_eq!(shots[0].lens_choice, "35mm");
        assert_eq!(shots[1].lens_choice, "85mm");
        assert!(!state.shots.get(id).unwrap().is_loading);
    }

    #[tokio::test]
    async fn stage_guards_reject_out_of_order_operations() {
        let orchestrator = StoryboardOrchestrator::new(MockGateway::with_blueprint(two_by_three()), "x");
        assert!(matches!(
            orchestrator.finalize_blueprint().await,
            Err(StudioError::InvalidStage { .. })
        ));
        assert!(orchestrator.back_to_script().is_err());

        orchestrator.parse_story("story").await.unwrap();
        assert!(matches!(
            orchestrator.regenerate(ShotId::new(0, 0, 0)).await,
            Err(StudioError::InvalidStage { .. })
        ));
        assert!(matches!(
            orchestrator.update_character_profile("Nobody", "x"),
            Err(StudioError::UnknownCharacter(_))
        ));
        orchestrator
            .update_character_profile("Mara", "A pilot with a scarred cheek")
            .unwrap();

        orchestrator.back_to_script().unwrap();
        let state = orchestrator.snapshot();
        assert_eq!(state.stage, WorkflowStage::Script);
        assert!(state.blueprint.is_some());
        assert_eq!(state.profiles["Mara"].detailed_description, "A pilot with a scarred cheek");
    }

    #[tokio::test]
    async fn edited_profile_feeds_shot_prompts() {
        let gateway = MockGateway::with_blueprint(two_by_three());
        let orchestrator = StoryboardOrchestrator::new(gateway.clone(), "Painterly");
        orchestrator.parse_story("story").await.unwrap();
        orchestrator
            .update_character_profile("Mara", "A pilot in a green flight jacket")
            .unwrap();
        orchestrator.finalize_blueprint().await.unwrap();

        assert!(orchestrator.update_character_profile("Mara", "x").is_err());
        let prompts = gateway.prompts.lock();
        assert!(prompts
            .iter()
            .any(|prompt| prompt.contains("Mara (A pilot in a green flight jacket)")));
    }

    #[tokio::test]
    async fn unknown_shot_is_rejected() {
        let orchestrator = at_board(MockGateway::with_blueprint(two_by_three())).await;
        let update = ShotUpdate {
            caption: Some("x".into()),
            ..ShotUpdate::default()
        };
        assert!(matches!(
            orchestrator.update_shot(ShotId::new(5, 0, 0), update).await,
            Err(StudioError::UnknownShot(_))
        ));
    }

    #[tokio::test]
    async fn abandoned_parse_does_not_block_the_next_one() {
        let gateway = MockGateway::with_slow_first_parse(two_by_three(), Duration::from_secs(5));
        let orchestrator = StoryboardOrchestrator::new(gateway.clone(), "x");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), orchestrator.parse_story("story")).await;
        assert!(abandoned.is_err());
        assert!(!orchestrator.snapshot().is_parsing);

        assert!(orchestrator.parse_story("story").await.unwrap());
        assert_eq!(gateway.parse_calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.stage(), WorkflowStage::Blueprint);
    }

    #[tokio::test]
    async fn board_shows_every_slot_loading_before_generation_resolves() {
        let gateway = MockGateway::gated(two_by_three());
        let orchestrator = StoryboardOrchestrator::new(gateway.clone(), "x");
        orchestrator.parse_story("story").await.unwrap();

        let (report, pending) = tokio::join!(orchestrator.finalize_blueprint(), async {
            gateway.wait_for_calls(6).await;
            let pending = orchestrator.snapshot();
            gateway.release(6);
            pending
        });

        assert_eq!(pending.stage, WorkflowStage::Board);
        assert_eq!(pending.shots.len(), 6);
        assert!(pending
            .shots
            .iter()
            .all(|(_, status)| *status == ShotStatus::loading()));
        let report = report.unwrap();
        assert_eq!(report.succeeded, 6);
        assert_eq!(orchestrator.snapshot().shots.loading_count(), 0);
    }

    #[tokio::test]
    async fn superseded_batch_results_are_discarded() {
        let gateway = MockGateway::gated(blueprint(&[&["Mara climbs in", "Jonah waves"]]));
        let orchestrator = StoryboardOrchestrator::new(gateway.clone(), "x");
        orchestrator.parse_story("story").await.unwrap();

        let (first, second) = tokio::join!(orchestrator.finalize_blueprint(), async {
            gateway.wait_for_calls(2).await;
            let (second, _) = tokio::join!(orchestrator.generate_all_shots(), async {
                gateway.wait_for_calls(4).await;
                gateway.release(4);
            });
            second
        });

        let first = first.unwrap();
        assert_eq!(first.batch, 1);
        assert_eq!((first.succeeded, first.failed, first.discarded), (0, 0, 2));
        let second = second.unwrap();
        assert_eq!(second.batch, 2);
        assert_eq!((second.succeeded, second.failed, second.discarded), (2, 0, 0));

        let state = orchestrator.snapshot();
        assert_eq!(
            state.shots.get(ShotId::new(0, 0, 0)).unwrap().url,
            Some(ImageHandle::from_url("https://img.test/3.png"))
        );
        assert_eq!(
            state.shots.get(ShotId::new(0, 0, 1)).unwrap().url,
            Some(ImageHandle::from_url("https://img.test/4.png"))
        );
    }
}
