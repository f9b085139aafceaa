//! End-to-end pipeline scenarios.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::config::{PipelineConfig, RetryConfig};
    use crate::contracts::Boundary;
    use crate::errors::{ErrorKind, PipelineError, RunError, SpecialistError};
    use crate::events::{CollectingEventSink, EventKind};
    use crate::pipeline::{Orchestrator, PipelineOptions, PipelinePhase, PipelineResult};
    use crate::specialists::{FnSpecialist, Specialist, SpecialistSet, StageInput, StageName};
    use crate::state::GenerationState;
    use crate::testing::{fixtures, RecordingLogger, RecordingSleeper, ScriptedSpecialist, Step};
    use crate::utils::content_digest;
    use async_trait::async_trait;
    use mockall::mock;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    mock! {
        Stage {}

        #[async_trait]
        impl Specialist for Stage {
            async fn run(&self, input: StageInput, state: GenerationState) -> Result<Value, SpecialistError>;
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        logger: Arc<RecordingLogger>,
        sleeper: Arc<RecordingSleeper>,
        events: Arc<CollectingEventSink>,
    }

    fn harness(specialists: SpecialistSet) -> Harness {
        let logger = Arc::new(RecordingLogger::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        let events = Arc::new(CollectingEventSink::new());
        let orchestrator = Orchestrator::new(specialists)
            .with_logger(logger.clone())
            .with_sleeper(sleeper.clone())
            .with_event_sink(events.clone());
        Harness {
            orchestrator,
            logger,
            sleeper,
            events,
        }
    }

    fn scripted(stage: StageName) -> Arc<ScriptedSpecialist> {
        Arc::new(ScriptedSpecialist::succeeding(
            stage.as_str(),
            fixtures::output_for(stage),
        ))
    }

    fn never_invoked() -> Arc<MockStage> {
        let mut mock = MockStage::new();
        mock.expect_run().times(0);
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_paris_flight_sale_recovers_from_content_failures() {
        let content = Arc::new(ScriptedSpecialist::failing_then(
            "content",
            2,
            fixtures::content_output(),
        ));
        let h = harness(fixtures::happy_specialists().with(StageName::Content, content.clone()));

        let success = h
            .orchestrator
            .run_pipeline(
                "Paris flight sale",
                PipelineOptions::new().with_max_retries(2),
            )
            .await
            .unwrap();

        assert_eq!(success.phases.last(), Some(&PipelinePhase::Completed));
        assert!(success.final_state.html().is_some());
        assert!(success.final_state.qa_score() >= 0.0);
        assert_eq!(success.final_state.brief(), "Paris flight sale");

        let warnings = h.logger.retry_warnings_for("content");
        assert_eq!(warnings.len(), 2);
        assert_eq!(h.logger.retry_warnings().len(), 2);
        assert_eq!(warnings[0].error, "content attempt 1 failed");
        assert_eq!(
            h.sleeper.sleeps(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );

        assert_eq!(content.call_count(), 3);
        assert_eq!(success.stage(StageName::Content).unwrap().attempts, 3);
        assert_eq!(success.stage(StageName::Design).unwrap().attempts, 1);
        assert_eq!(success.total_attempts(), 6);
    }

    #[tokio::test]
    async fn test_retry_count_override_keeps_configured_backoff() {
        let content = Arc::new(ScriptedSpecialist::failing_then(
            "content",
            2,
            fixtures::content_output(),
        ));
        let mut h = harness(fixtures::happy_specialists().with(StageName::Content, content.clone()));
        h.orchestrator = h.orchestrator.with_config(PipelineConfig::new().with_retry(
            RetryConfig::new()
                .with_max_retries(0)
                .with_retry_delay_ms(10)
                .with_backoff_ceiling_ms(15),
        ));

        let success = h
            .orchestrator
            .run_pipeline(
                "Paris flight sale",
                PipelineOptions::new().with_max_retries(2),
            )
            .await
            .unwrap();

        assert_eq!(
            h.sleeper.sleeps(),
            vec![Duration::from_millis(10), Duration::from_millis(15)]
        );
        let warnings = h.logger.retry_warnings_for("content");
        assert_eq!(warnings[1].context.backoff, Duration::from_millis(15));
        assert_eq!(success.stage(StageName::Content).unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn test_success_result_carries_receipt_and_digest() {
        let h = harness(fixtures::happy_specialists());

        let success = h
            .orchestrator
            .run_pipeline("Paris flight sale", PipelineOptions::new())
            .await
            .unwrap();

        assert_eq!(success.receipt.campaign_id.as_deref(), Some("cmp-paris-001"));
        assert_eq!(success.receipt.status, "queued");
        assert_eq!(success.content_digest, content_digest(fixtures::email_html()));
        assert_eq!(success.final_state.qa_score(), 92.0);
        assert_eq!(success.final_state.assets().len(), 2);
        assert_eq!(success.final_state.metadata().content_variations, 3);
        assert_eq!(
            success.phases,
            vec![
                PipelinePhase::Initialized,
                PipelinePhase::ContentRunning,
                PipelinePhase::DesignRunning,
                PipelinePhase::QualityRunning,
                PipelinePhase::DeliveryRunning,
                PipelinePhase::Completed,
            ]
        );

        let value = serde_json::to_value(PipelineResult::from(Ok(success))).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["final_state"]["qa_score"], 92.0);
    }

    #[tokio::test]
    async fn test_design_without_email_package_never_reaches_quality() {
        let quality = scripted(StageName::Quality);
        let design = Arc::new(ScriptedSpecialist::succeeding(
            "design",
            json!({"html": fixtures::email_html()}),
        ));
        let h = harness(
            fixtures::happy_specialists()
                .with(StageName::Design, design.clone())
                .with(StageName::Quality, quality.clone()),
        );

        let failure = h
            .orchestrator
            .run_pipeline("Paris flight sale", PipelineOptions::new())
            .await
            .unwrap_err();

        assert_eq!(failure.failed_stage(), Some(StageName::Design));
        assert_eq!(failure.kind(), ErrorKind::SchemaViolation);
        assert_eq!(failure.phase(), PipelinePhase::Failed);
        assert_eq!(quality.call_count(), 0);
        // Structural failures are not retried.
        assert_eq!(design.call_count(), 1);
        assert!(h.logger.retry_warnings().is_empty());

        let RunError::Failed(stage_failure) = &failure.error else {
            panic!("expected a stage failure, got {:?}", failure.error);
        };
        let PipelineError::SchemaViolation(violation) = &stage_failure.error else {
            panic!("expected a schema violation, got {:?}", stage_failure.error);
        };
        assert_eq!(violation.boundary, Boundary::DesignToQuality);
        assert_eq!(violation.field.as_deref(), Some("email_package"));
    }

    #[tokio::test]
    async fn test_quality_without_email_package_never_reaches_delivery() {
        let quality = Arc::new(ScriptedSpecialist::succeeding(
            "quality",
            json!({"quality_package": {"score": 88}}),
        ));
        let h = harness(
            fixtures::happy_specialists()
                .with(StageName::Quality, quality)
                .with(StageName::Delivery, never_invoked()),
        );

        let failure = h
            .orchestrator
            .run_pipeline("Paris flight sale", PipelineOptions::new())
            .await
            .unwrap_err();

        assert_eq!(failure.failed_stage(), Some(StageName::Quality));
        assert_eq!(failure.kind(), ErrorKind::SchemaViolation);
        assert_eq!(failure.stages.len(), 2);

        let failures = h.logger.stage_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, StageName::Quality);
        assert_eq!(failures[0].1, ErrorKind::SchemaViolation);

        let value = serde_json::to_value(PipelineResult::from(Err(failure))).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["failed_stage"], "quality");
        assert_eq!(value["error"]["kind"], "schema_violation");
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_final_error() {
        let content = Arc::new(
            ScriptedSpecialist::new("content")
                .then(Step::fail("pricing API 502"))
                .then(Step::fail("pricing API 504")),
        );
        let h = harness(
            fixtures::happy_specialists()
                .with(StageName::Content, content.clone())
                .with(StageName::Design, never_invoked()),
        );

        let failure = h
            .orchestrator
            .run_pipeline("brief", PipelineOptions::new().with_max_retries(1))
            .await
            .unwrap_err();

        assert_eq!(content.call_count(), 2);
        assert_eq!(failure.failed_stage(), Some(StageName::Content));
        assert_eq!(failure.kind(), ErrorKind::TransientFailure);
        assert!(failure.error.to_string().contains("pricing API 504"));
        assert_eq!(h.logger.retry_warnings().len(), 1);
        assert_eq!(
            failure.phases,
            vec![
                PipelinePhase::Initialized,
                PipelinePhase::ContentRunning,
                PipelinePhase::Failed,
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_retries_fail_on_first_error() {
        let content = Arc::new(ScriptedSpecialist::always_failing("content", "down"));
        let h = harness(fixtures::happy_specialists().with(StageName::Content, content.clone()));

        let failure = h
            .orchestrator
            .run_pipeline("brief", PipelineOptions::new().with_max_retries(0))
            .await
            .unwrap_err();

        assert_eq!(content.call_count(), 1);
        assert_eq!(failure.kind(), ErrorKind::TransientFailure);
        assert!(h.sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_merge_precondition_failure_is_not_retried() {
        let design = Arc::new(ScriptedSpecialist::succeeding(
            "design",
            json!({"email_package": {"assets": []}}),
        ));
        let h = harness(
            fixtures::happy_specialists()
                .with(StageName::Design, design.clone())
                .with(StageName::Quality, never_invoked()),
        );

        let failure = h
            .orchestrator
            .run_pipeline("brief", PipelineOptions::new())
            .await
            .unwrap_err();

        assert_eq!(failure.failed_stage(), Some(StageName::Design));
        assert_eq!(failure.kind(), ErrorKind::PreconditionViolation);
        assert_eq!(design.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stages_see_state_in_pipeline_order() {
        let content = scripted(StageName::Content);
        let design = scripted(StageName::Design);
        let quality = scripted(StageName::Quality);
        let mut delivery = MockStage::new();
        delivery
            .expect_run()
            .withf(|input, state| {
                input.handoff.as_ref().map(|h| h.boundary()) == Some(Boundary::QualityToDelivery)
                    && state.html().is_some()
                    && state.has_qa_score()
            })
            .times(1)
            .returning(|_, _| Ok(fixtures::delivery_output()));
        let h = harness(SpecialistSet::new(
            content.clone(),
            design.clone(),
            quality.clone(),
            Arc::new(delivery),
        ));

        h.orchestrator
            .run_pipeline("brief", PipelineOptions::new())
            .await
            .unwrap();

        let content_calls = content.calls();
        let (content_input, content_state) = &content_calls[0];
        assert!(content_input.handoff.is_none());
        assert!(content_state.copy().is_none());

        let design_calls = design.calls();
        let (design_input, design_state) = &design_calls[0];
        assert_eq!(
            design_input.handoff.as_ref().map(|h| h.boundary()),
            Some(Boundary::ContentToDesign)
        );
        assert!(design_state.copy().is_some());
        assert!(design_state.html().is_none());

        // qa_score is never observed before html.
        let quality_calls = quality.calls();
        let (_, quality_state) = &quality_calls[0];
        assert!(quality_state.html().is_some());
        assert!(!quality_state.has_qa_score());
    }

    #[tokio::test]
    async fn test_params_reach_every_specialist() {
        let design = scripted(StageName::Design);
        let h = harness(fixtures::happy_specialists().with(StageName::Design, design.clone()));

        h.orchestrator
            .run_pipeline(
                "brief",
                PipelineOptions::new().with_param("locale", json!("fr-FR")),
            )
            .await
            .unwrap();

        assert_eq!(design.calls()[0].0.params["locale"], "fr-FR");
    }

    #[tokio::test]
    async fn test_current_date_reaches_state() {
        let h = harness(fixtures::happy_specialists());

        let success = h
            .orchestrator
            .run_pipeline(
                "brief",
                PipelineOptions::new().with_current_date(fixtures::reference_date()),
            )
            .await
            .unwrap();

        assert_eq!(success.final_state.current_date(), fixtures::reference_date());
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let h = harness(fixtures::happy_specialists());

        let success = h
            .orchestrator
            .run_pipeline("brief", PipelineOptions::new())
            .await
            .unwrap();

        let mut expected = vec![EventKind::PipelineStarted];
        for _ in StageName::PIPELINE {
            expected.extend([EventKind::StageStarted, EventKind::StageCompleted]);
        }
        expected.push(EventKind::PipelineCompleted);
        assert_eq!(h.events.kinds(), expected);
        assert!(h
            .events
            .events()
            .iter()
            .all(|event| event.run_id == success.run_id));

        let completed = h.events.events_of_kind(EventKind::StageCompleted);
        let stages: Vec<_> = completed.iter().filter_map(|event| event.stage).collect();
        assert_eq!(stages, StageName::PIPELINE.to_vec());
        assert_eq!(h.logger.completed_stages().len(), 4);
    }

    #[tokio::test]
    async fn test_failure_events() {
        let h = harness(
            fixtures::happy_specialists().with(
                StageName::Design,
                Arc::new(ScriptedSpecialist::succeeding("design", json!({}))),
            ),
        );

        h.orchestrator
            .run_pipeline("brief", PipelineOptions::new())
            .await
            .unwrap_err();

        assert_eq!(
            h.events.kinds(),
            vec![
                EventKind::PipelineStarted,
                EventKind::StageStarted,
                EventKind::StageCompleted,
                EventKind::StageStarted,
                EventKind::StageFailed,
                EventKind::PipelineFailed,
            ]
        );
        let failed = &h.events.events_of_kind(EventKind::PipelineFailed)[0];
        assert_eq!(failed.data["failed_stage"], "design");
        assert_eq!(failed.data["kind"], "schema_violation");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = Arc::new(CancellationToken::new());
        token.cancel("client disconnected");
        let h = harness(
            fixtures::happy_specialists().with(StageName::Content, never_invoked()),
        );

        let failure = h
            .orchestrator
            .run_pipeline("brief", PipelineOptions::new().with_cancellation(token))
            .await
            .unwrap_err();

        assert!(failure.error.is_cancelled());
        assert_eq!(failure.kind(), ErrorKind::Cancelled);
        assert_eq!(failure.failed_stage(), Some(StageName::Content));
        assert_eq!(
            failure.phases,
            vec![PipelinePhase::Initialized, PipelinePhase::Cancelled]
        );
        assert_eq!(
            h.events.kinds(),
            vec![EventKind::PipelineStarted, EventKind::PipelineCancelled]
        );
        // Cancellation is not a stage failure.
        assert!(h.logger.stage_failures().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_at_stage_boundary() {
        let token = Arc::new(CancellationToken::new());
        let content = {
            let token = token.clone();
            FnSpecialist::new("content", move |_input, _state| {
                let token = token.clone();
                async move {
                    token.cancel("operator abort");
                    Ok(fixtures::content_output())
                }
            })
        };
        let h = harness(
            fixtures::happy_specialists()
                .with(StageName::Content, Arc::new(content))
                .with(StageName::Design, never_invoked()),
        );

        let failure = h
            .orchestrator
            .run_pipeline("brief", PipelineOptions::new().with_cancellation(token))
            .await
            .unwrap_err();

        assert_eq!(failure.failed_stage(), Some(StageName::Design));
        assert!(matches!(
            &failure.error,
            RunError::Cancelled { reason, .. } if reason == "operator abort"
        ));
        assert_eq!(failure.stages.len(), 1);
        assert_eq!(failure.phase(), PipelinePhase::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let token = Arc::new(CancellationToken::new());
        let content = Arc::new(ScriptedSpecialist::always_failing("content", "rate limited"));
        let orchestrator = Orchestrator::new(
            fixtures::happy_specialists().with(StageName::Content, content.clone()),
        )
        .with_logger(Arc::new(RecordingLogger::new()))
        .with_config(PipelineConfig::new().with_retry(
            RetryConfig::new()
                .with_max_retries(5)
                .with_retry_delay_ms(3_600_000)
                .with_backoff_ceiling_ms(3_600_000),
        ));

        let handle = {
            let token = token.clone();
            tokio::spawn(async move {
                orchestrator
                    .run_pipeline("brief", PipelineOptions::new().with_cancellation(token))
                    .await
            })
        };
        while content.call_count() == 0 {
            tokio::task::yield_now().await;
        }
        token.cancel("shutdown");

        let failure = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::Cancelled);
        assert_eq!(failure.failed_stage(), Some(StageName::Content));
        assert_eq!(content.call_count(), 1);
        assert_eq!(
            failure.phases,
            vec![
                PipelinePhase::Initialized,
                PipelinePhase::ContentRunning,
                PipelinePhase::Cancelled,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_retryable_failure() {
        let design = Arc::new(
            ScriptedSpecialist::new("design")
                .then(Step::ok(fixtures::design_output()).after(Duration::from_secs(30)))
                .then(Step::ok(fixtures::design_output())),
        );
        let h = harness(fixtures::happy_specialists().with(StageName::Design, design.clone()));

        let success = h
            .orchestrator
            .run_pipeline(
                "brief",
                PipelineOptions::new()
                    .with_max_retries(1)
                    .with_stage_timeout(Some(Duration::from_secs(5))),
            )
            .await
            .unwrap();

        assert_eq!(design.call_count(), 2);
        assert_eq!(success.stage(StageName::Design).unwrap().attempts, 2);
        let warnings = h.logger.retry_warnings_for("design");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].error.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_exhausts_retries() {
        let quality = Arc::new(
            ScriptedSpecialist::new("quality")
                .then(Step::ok(fixtures::quality_output()).after(Duration::from_secs(120))),
        );
        let h = harness(fixtures::happy_specialists().with(StageName::Quality, quality.clone()));

        let failure = h
            .orchestrator
            .run_pipeline(
                "brief",
                PipelineOptions::new()
                    .with_max_retries(2)
                    .with_stage_timeout(Some(Duration::from_secs(1))),
            )
            .await
            .unwrap_err();

        assert_eq!(quality.call_count(), 3);
        assert_eq!(failure.failed_stage(), Some(StageName::Quality));
        assert_eq!(failure.kind(), ErrorKind::TransientFailure);
        assert!(matches!(
            &failure.error,
            RunError::Failed(stage_failure) if matches!(
                &stage_failure.error,
                PipelineError::Transient { source: SpecialistError::TimedOut(_), .. }
            )
        ));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_isolated() {
        let h = harness(fixtures::happy_specialists());
        let briefs = ["Paris flight sale", "Rome city break", "Lisbon long weekend"];

        let outcomes =
            futures::future::join_all(briefs.iter().map(|brief| {
                h.orchestrator.run_pipeline(*brief, PipelineOptions::new())
            }))
            .await;

        let mut run_ids = Vec::new();
        for (brief, outcome) in briefs.iter().zip(outcomes) {
            let success = outcome.unwrap();
            assert_eq!(success.final_state.brief(), *brief);
            assert_eq!(success.final_state.assets().len(), 2);
            run_ids.push(success.run_id);
        }
        run_ids.sort();
        run_ids.dedup();
        assert_eq!(run_ids.len(), briefs.len());
    }
}
