//! Session manager: the only owner of `Session` records.
//!
//! Every inbound message for a session id is processed under that id's
//! async lock, so two turns for the same session never interleave while
//! turns for different sessions run fully in parallel.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use fixwise_types::error::SessionError;
use fixwise_types::reply::{AgentReply, InboundImage};
use fixwise_types::session::{Session, SessionId, SessionMode, Turn, TurnPayload};

use super::store::SessionStore;
use crate::agent::{ConversationalGuide, Coordinator};

/// Longest accepted session id.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Routes turns to the coordinator or the guide and persists the result.
pub struct SessionManager<S: SessionStore> {
    store: S,
    coordinator: Coordinator,
    guide: ConversationalGuide,
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
    strict: bool,
}

impl<S: SessionStore> SessionManager<S> {
    /// Create a manager.
    ///
    /// With `strict` set, unknown ids are rejected with `NotFound` instead
    /// of creating a session on first contact.
    pub fn new(store: S, coordinator: Coordinator, guide: ConversationalGuide, strict: bool) -> Self {
        Self {
            store,
            coordinator,
            guide,
            locks: DashMap::new(),
            strict,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Per-session lock handle. The map guard is dropped before returning,
    /// so it is never held across an await.
    fn session_lock(&self, id: &SessionId) -> Arc<Mutex<()>> {
        self.locks.entry(id.clone()).or_default().value().clone()
    }

    /// Drop the lock entry for `id` unless another task still holds a copy.
    /// Callers must drop their own handle first.
    fn release_lock(&self, id: &SessionId) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Process one inbound turn and return the agent's reply.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn handle_message(
        &self,
        session_id: &SessionId,
        text: Option<&str>,
        image: Option<&InboundImage>,
    ) -> Result<AgentReply, SessionError> {
        validate_id(session_id)?;
        let text = text.map(str::trim).filter(|t| !t.is_empty());
        if text.is_none() && image.is_none() {
            return Err(SessionError::InvalidInput(
                "message needs text or an image".to_string(),
            ));
        }

        let lock = self.session_lock(session_id);
        let guard = lock.lock().await;

        let mut session = match self.store.load(session_id).await? {
            Some(session) => session,
            None if self.strict => {
                drop(guard);
                drop(lock);
                self.release_lock(session_id);
                return Err(SessionError::NotFound(session_id.clone()));
            }
            None => {
                info!("creating session on first contact");
                Session::new(session_id.clone())
            }
        };

        let image_ref = image.map(|i| i.reference.clone());
        if image_ref.is_some() {
            session.last_image = image_ref.clone();
        }
        session.append_turn(Turn::user(text.unwrap_or_default(), image_ref));

        let mut reply = match session.mode() {
            SessionMode::Discovery => self.discover(&mut session, text, image).await,
            SessionMode::Guidance => self.continue_guidance(&mut session, text, image).await,
        };

        reply.mode = session.mode();
        session.append_turn(Turn::agent(reply.text.clone(), payload_for(&reply)));
        self.store.save(&session).await?;

        drop(guard);

        info!(
            mode = %session.mode(),
            turns = session.history().len(),
            resolved = reply.resolved,
            "turn handled"
        );
        Ok(reply)
    }

    async fn discover(
        &self,
        session: &mut Session,
        text: Option<&str>,
        image: Option<&InboundImage>,
    ) -> AgentReply {
        let outcome = self.coordinator.run_discovery_turn(session, text, image).await;
        session.record_discovery_pass(outcome.assessment, outcome.plan);
        if outcome.ready && session.enter_guidance() {
            info!("discovery complete, entering guidance");
        }
        outcome.reply
    }

    async fn continue_guidance(
        &self,
        session: &mut Session,
        text: Option<&str>,
        image: Option<&InboundImage>,
    ) -> AgentReply {
        let outcome = self.guide.respond(session, text, image).await;

        if !outcome.new_problem {
            session.current_step_index = outcome.step_index;
            if outcome.assessment.is_some() {
                session.last_assessment = outcome.assessment;
            }
            return outcome.reply;
        }

        info!("different problem detected, restarting discovery");
        session.restart_discovery();
        // The old item's assessment must not steer the new search.
        session.last_assessment = outcome.assessment;
        let mut reply = self.discover(session, text, None).await;
        reply.text = format!("{}\n{}", outcome.reply.text, reply.text);
        reply
    }

    /// Ordered turns of a session.
    pub async fn get_history(&self, session_id: &SessionId) -> Result<Vec<Turn>, SessionError> {
        self.get_session(session_id)
            .await
            .map(|session| session.history().to_vec())
    }

    /// Snapshot of a session record.
    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        self.store
            .load(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))
    }

    /// Explicitly create a session. Fails if it already exists.
    pub async fn create_session(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        validate_id(session_id)?;
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        if self.store.load(session_id).await?.is_some() {
            return Err(SessionError::AlreadyExists(session_id.clone()));
        }
        let session = Session::new(session_id.clone());
        self.store.save(&session).await?;
        info!(session_id = %session_id, "session created");
        Ok(session)
    }

    /// Delete a session. Deleting an unknown id is not an error.
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<(), SessionError> {
        let lock = self.session_lock(session_id);
        let removed = {
            let _guard = lock.lock().await;
            self.store.delete(session_id).await?
        };
        drop(lock);
        self.release_lock(session_id);
        debug!(session_id = %session_id, removed, "session delete");
        Ok(())
    }

    /// Remove sessions idle for longer than `ttl`. Returns how many went.
    pub async fn purge_idle(&self, ttl: Duration) -> Result<usize, SessionError> {
        let Some(before) = chrono::TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return Ok(0);
        };

        let purged = self.store.purge_idle(before).await?;
        for id in &purged {
            self.release_lock(id);
        }
        if !purged.is_empty() {
            info!(count = purged.len(), "purged idle sessions");
        }
        Ok(purged.len())
    }
}

fn validate_id(session_id: &SessionId) -> Result<(), SessionError> {
    let id = session_id.as_str();
    if id.trim().is_empty() {
        return Err(SessionError::InvalidInput("session id is empty".to_string()));
    }
    if id.len() > MAX_SESSION_ID_LEN {
        return Err(SessionError::InvalidInput(format!(
            "session id longer than {MAX_SESSION_ID_LEN} bytes"
        )));
    }
    Ok(())
}

fn payload_for(reply: &AgentReply) -> Option<TurnPayload> {
    if reply.plan.is_none() && reply.source_links.is_empty() && !reply.resolved {
        return None;
    }
    Some(TurnPayload {
        plan: reply.plan.clone(),
        source_links: reply.source_links.clone(),
        resolved: reply.resolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::capability::{BoxKnowledgeAdapter, BoxVisionClassifier};
    use crate::plan::{PlanSynthesizer, ReadinessPolicy};
    use crate::research::ResearchAggregator;
    use crate::session::ArenaSessionStore;
    use crate::testing::{FakeAdapter, FakeVision, assessment, blender_guides};
    use fixwise_types::assessment::Severity;
    use fixwise_types::config::CircuitConfig;
    use fixwise_types::session::{ImageRef, Sender};
    use fixwise_types::source::SourceKind;

    fn coordinator(adapters: Vec<FakeAdapter>, vision: Option<BoxVisionClassifier>) -> Coordinator {
        let research = ResearchAggregator::new(
            adapters.into_iter().map(BoxKnowledgeAdapter::new).collect(),
            &CircuitConfig::default(),
            0.92,
        );
        Coordinator::new(
            vision,
            research,
            PlanSynthesizer::default(),
            ReadinessPolicy::new(0.6),
            Duration::from_millis(200),
        )
    }

    fn manager(adapters: Vec<FakeAdapter>, vision: Option<FakeVision>, strict: bool) -> SessionManager<ArenaSessionStore> {
        let vision = vision.map(BoxVisionClassifier::new);
        let guide = ConversationalGuide::new(vision.clone(), Duration::from_millis(200));
        SessionManager::new(ArenaSessionStore::new(), coordinator(adapters, vision), guide, strict)
    }

    fn blender_photo() -> InboundImage {
        InboundImage::new(ImageRef::new("img-blender"), vec![0xFF, 0xD8])
    }

    fn cracked_blender() -> FakeVision {
        FakeVision::returning(assessment("blender", &["cracked base"], Severity::Severe, 0.9))
    }

    fn id(s: &str) -> SessionId {
        SessionId::from(s)
    }

    #[tokio::test]
    async fn scenario_a_text_only_without_sources_stays_in_discovery() {
        let m = manager(
            vec![FakeAdapter::empty(SourceKind::IFixit), FakeAdapter::empty(SourceKind::WikiHow)],
            Some(cracked_blender()),
            false,
        );
        let reply = m.handle_message(&id("a"), Some("my blender won't turn on"), None).await.unwrap();

        assert_eq!(reply.mode, SessionMode::Discovery);
        assert!(reply.plan.is_none());
        assert!(reply.text.ends_with('?'), "expected a question: {}", reply.text);
        assert_eq!(m.get_session(&id("a")).await.unwrap().mode(), SessionMode::Discovery);
    }

    #[tokio::test]
    async fn scenario_b_photo_and_guides_enter_guidance() {
        let m = manager(vec![FakeAdapter::empty(SourceKind::IFixit)], Some(cracked_blender()), false);
        let sid = id("b");
        let first = m.handle_message(&sid, Some("my blender won't turn on"), None).await.unwrap();
        assert_eq!(first.mode, SessionMode::Discovery);

        // Second turn: the guide sources now have matches.
        let vision = Some(BoxVisionClassifier::new(cracked_blender()));
        let m = SessionManager {
            coordinator: coordinator(vec![FakeAdapter::hits(SourceKind::IFixit, blender_guides())], vision),
            ..m
        };
        let reply = m
            .handle_message(&sid, Some("the base is cracked"), Some(&blender_photo()))
            .await
            .unwrap();

        assert_eq!(reply.mode, SessionMode::Guidance);
        assert!(reply.plan.is_some());
        assert_eq!(reply.source_links.len(), 2);
        assert!(reply.text.contains("1. "));

        let session = m.get_session(&sid).await.unwrap();
        assert_eq!(session.mode(), SessionMode::Guidance);
        assert_eq!(session.discovery_passes(), 2);
        assert_eq!(session.last_image, Some(ImageRef::new("img-blender")));
        assert_eq!(session.last_assessment.map(|a| a.severity), Some(Severity::Severe));
    }

    #[tokio::test]
    async fn scenario_c_resolution_does_not_rerun_discovery() {
        let adapter = FakeAdapter::hits(SourceKind::IFixit, blender_guides());
        let calls = adapter.calls();
        let m = manager(vec![adapter], Some(cracked_blender()), false);
        let sid = id("c");

        m.handle_message(&sid, Some("the base is cracked"), Some(&blender_photo())).await.unwrap();
        assert_eq!(m.get_session(&sid).await.unwrap().mode(), SessionMode::Guidance);
        let before = calls.load(Ordering::SeqCst);

        let reply = m.handle_message(&sid, Some("it's fixed!"), None).await.unwrap();
        assert!(reply.resolved);
        assert_eq!(reply.mode, SessionMode::Guidance);
        assert_eq!(calls.load(Ordering::SeqCst), before);

        let session = m.get_session(&sid).await.unwrap();
        assert_eq!(session.discovery_passes(), 1);
        let last = session.history().last().and_then(|t| t.payload.clone());
        assert!(last.is_some_and(|p| p.resolved));
    }

    #[tokio::test]
    async fn scenario_d_all_sources_unreachable() {
        let m = manager(
            vec![
                FakeAdapter::unreachable(SourceKind::IFixit),
                FakeAdapter::unreachable(SourceKind::WikiHow),
                FakeAdapter::unreachable(SourceKind::Manual),
            ],
            Some(cracked_blender()),
            false,
        );
        let sid = id("d");
        let reply = m
            .handle_message(&sid, Some("blender base cracked"), Some(&blender_photo()))
            .await
            .unwrap();

        assert_eq!(reply.mode, SessionMode::Discovery);
        assert!(reply.text.contains("temporarily unavailable"));
        let session = m.get_session(&sid).await.unwrap();
        assert_eq!(session.mode(), SessionMode::Discovery);
        assert!(session.last_plan().is_some_and(|p| p.insufficient_evidence));
    }

    #[tokio::test]
    async fn history_round_trips_in_append_order() {
        let m = manager(vec![FakeAdapter::empty(SourceKind::IFixit)], None, false);
        let sid = id("h");
        for text in ["one", "two", "three"] {
            m.handle_message(&sid, Some(text), None).await.unwrap();
        }

        let history = m.get_history(&sid).await.unwrap();
        assert_eq!(history.len(), 6);
        let senders: Vec<Sender> = history.iter().map(|t| t.sender).collect();
        assert_eq!(
            senders,
            vec![Sender::User, Sender::Agent, Sender::User, Sender::Agent, Sender::User, Sender::Agent]
        );
        let user_texts: Vec<&str> = history
            .iter()
            .filter(|t| t.sender == Sender::User)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(user_texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn history_of_unknown_session_is_not_found() {
        let m = manager(vec![], None, false);
        assert!(matches!(
            m.get_history(&id("nobody")).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let m = manager(vec![FakeAdapter::empty(SourceKind::IFixit)], None, false);
        let sid = id("del");
        m.handle_message(&sid, Some("hello"), None).await.unwrap();

        assert!(m.delete_session(&sid).await.is_ok());
        assert!(m.delete_session(&sid).await.is_ok());
        assert!(matches!(m.get_session(&sid).await, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn lenient_mode_creates_on_first_contact() {
        let m = manager(vec![FakeAdapter::empty(SourceKind::IFixit)], None, false);
        assert!(!m.is_strict());
        assert!(m.handle_message(&id("new"), Some("hi"), None).await.is_ok());
        assert_eq!(m.get_history(&id("new")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn strict_mode_rejects_unknown_ids() {
        let m = manager(vec![FakeAdapter::empty(SourceKind::IFixit)], None, true);
        let sid = id("strict");

        let err = m.handle_message(&sid, Some("hi"), None).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
        assert!(m.store().is_empty());

        m.create_session(&sid).await.unwrap();
        assert!(m.handle_message(&sid, Some("hi"), None).await.is_ok());
        assert!(matches!(
            m.create_session(&sid).await,
            Err(SessionError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn rejected_ids_leave_no_lock_behind() {
        let m = manager(vec![FakeAdapter::empty(SourceKind::IFixit)], None, true);
        let before = m.locks.len();
        for n in 0..50 {
            let err = m
                .handle_message(&id(&format!("ghost-{n}")), Some("hi"), None)
                .await
                .unwrap_err();
            assert!(matches!(err, SessionError::NotFound(_)));
        }
        assert_eq!(m.locks.len(), before);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_side_effects() {
        let m = manager(vec![], None, false);
        let err = m.handle_message(&id("e"), Some("   "), None).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert!(m.store().is_empty());

        let err = m.handle_message(&id(""), Some("hi"), None).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn concurrent_turns_for_one_session_do_not_interleave() {
        let slow = FakeAdapter::hanging(SourceKind::Manual, std::time::Duration::from_millis(50));
        let m = manager(vec![slow], None, false);
        let sid = id("race");

        let (a, b) = tokio::join!(
            m.handle_message(&sid, Some("first"), None),
            m.handle_message(&sid, Some("second"), None),
        );
        assert!(a.is_ok() && b.is_ok());

        let history = m.get_history(&sid).await.unwrap();
        assert_eq!(history.len(), 4);
        let senders: Vec<Sender> = history.iter().map(|t| t.sender).collect();
        assert_eq!(senders, vec![Sender::User, Sender::Agent, Sender::User, Sender::Agent]);
    }

    #[tokio::test]
    async fn delete_does_not_split_the_lock_for_waiting_turns() {
        let slow = FakeAdapter::hanging(SourceKind::Manual, std::time::Duration::from_millis(50));
        let m = manager(vec![slow], None, false);
        let sid = id("split");

        // Polled in order: "one" takes the lock, the delete and "two" queue
        // behind it, and "three" only arrives once the delete is done.
        let (one, after_delete, two) = tokio::join!(
            m.handle_message(&sid, Some("one"), None),
            async {
                m.delete_session(&sid).await.unwrap();
                m.handle_message(&sid, Some("three"), None).await
            },
            m.handle_message(&sid, Some("two"), None),
        );
        assert!(one.is_ok() && two.is_ok() && after_delete.is_ok());

        let history = m.get_history(&sid).await.unwrap();
        let user_texts: Vec<&str> = history
            .iter()
            .filter(|t| t.sender == Sender::User)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(user_texts, vec!["two", "three"]);
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn delete_releases_an_idle_lock() {
        let m = manager(vec![FakeAdapter::empty(SourceKind::IFixit)], None, false);
        let sid = id("tidy");
        m.handle_message(&sid, Some("hello"), None).await.unwrap();
        assert_eq!(m.locks.len(), 1);
        m.delete_session(&sid).await.unwrap();
        assert!(m.locks.is_empty());
    }

    #[tokio::test]
    async fn new_photo_of_another_item_restarts_discovery() {
        let m = manager(
            vec![FakeAdapter::hits(SourceKind::IFixit, blender_guides())],
            Some(cracked_blender()),
            false,
        );
        let sid = id("switch");
        m.handle_message(&sid, Some("the base is cracked"), Some(&blender_photo())).await.unwrap();
        assert_eq!(m.get_session(&sid).await.unwrap().mode(), SessionMode::Guidance);

        // Same manager, but the next photo classifies as a toaster.
        let toaster = BoxVisionClassifier::new(FakeVision::returning(assessment(
            "toaster",
            &["burnt element"],
            Severity::Moderate,
            0.85,
        )));
        let guide = ConversationalGuide::new(Some(toaster), Duration::from_millis(200));
        let m = SessionManager { guide, ..m };

        let reply = m
            .handle_message(&sid, Some("now this"), Some(&InboundImage::new(ImageRef::new("img-toaster"), vec![1])))
            .await
            .unwrap();
        assert!(reply.text.starts_with("Sounds like a different problem"));

        let session = m.get_session(&sid).await.unwrap();
        assert_eq!(session.discovery_passes(), 2);
        assert_eq!(
            session.last_assessment.as_ref().map(|a| a.item_type.as_str()),
            Some("toaster")
        );
        // The blender guides still match, so the fresh pass is ready again.
        assert_eq!(session.mode(), SessionMode::Guidance);
        assert_eq!(session.current_step_index, 0);
    }

    #[tokio::test]
    async fn explicit_new_problem_drops_the_old_assessment() {
        let m = manager(
            vec![FakeAdapter::empty(SourceKind::IFixit)],
            Some(cracked_blender()),
            false,
        );
        let sid = id("phrase");
        let mut seeded = Session::new(sid.clone());
        seeded.record_discovery_pass(
            Some(assessment("blender", &[], Severity::Severe, 0.9)),
            PlanSynthesizer::default().synthesize(None, &blender_guides()),
        );
        seeded.enter_guidance();
        m.store().save(&seeded).await.unwrap();

        let reply = m
            .handle_message(&sid, Some("I have a new problem with my kettle"), None)
            .await
            .unwrap();
        assert_eq!(reply.mode, SessionMode::Discovery);

        let session = m.get_session(&sid).await.unwrap();
        assert!(session.last_assessment.is_none());
        assert_eq!(session.mode(), SessionMode::Discovery);
    }

    #[tokio::test]
    async fn guidance_steps_are_persisted() {
        let m = manager(
            vec![FakeAdapter::hits(SourceKind::IFixit, blender_guides())],
            Some(cracked_blender()),
            false,
        );
        let sid = id("steps");
        m.handle_message(&sid, Some("cracked base"), Some(&blender_photo())).await.unwrap();
        m.handle_message(&sid, Some("done"), None).await.unwrap();
        m.handle_message(&sid, Some("done"), None).await.unwrap();
        assert_eq!(m.get_session(&sid).await.unwrap().current_step_index, 2);
    }

    #[tokio::test]
    async fn purge_idle_counts_removed_sessions() {
        let m = manager(vec![FakeAdapter::empty(SourceKind::IFixit)], None, false);
        let mut stale = Session::new(id("old"));
        stale.last_activity_at = Utc::now() - chrono::Duration::hours(30);
        m.store().save(&stale).await.unwrap();
        m.handle_message(&id("recent"), Some("hi"), None).await.unwrap();

        assert_eq!(m.purge_idle(Duration::from_secs(24 * 3600)).await.unwrap(), 1);
        assert!(m.get_session(&id("recent")).await.is_ok());
        assert_eq!(m.purge_idle(Duration::MAX).await.unwrap(), 0);
    }
}
