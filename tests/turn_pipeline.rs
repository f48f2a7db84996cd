//! End-to-end turn pipeline properties, exercised through the public API
//! with in-memory service backends.

use parley::context::{ContextStore, Role, TurnContext};
use parley::services::{
    ReasonBackend, ReasoningAdapter, ServiceRegistry, SynthesisAdapter, SynthesizeBackend,
    TranscribeBackend, TranscriptionAdapter,
};
use parley::workflow::{canonical_graph, WorkflowEngine};
use parley::ParleyError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct ScriptedTranscriber(Vec<String>);

impl TranscribeBackend for ScriptedTranscriber {
    fn transcribe(&mut self, _audio_ref: &Path) -> parley::Result<String> {
        if self.0.is_empty() {
            Ok(String::new())
        } else {
            Ok(self.0.remove(0))
        }
    }
}

struct WritingSynthesizer;

impl SynthesizeBackend for WritingSynthesizer {
    fn synthesize(&mut self, text: &str, out_path: &Path) -> parley::Result<()> {
        std::fs::write(out_path, text)
            .map_err(|e| ParleyError::AdapterCallError(e.to_string()))
    }
}

struct RefusingSynthesizer;

impl SynthesizeBackend for RefusingSynthesizer {
    fn synthesize(&mut self, _text: &str, _out_path: &Path) -> parley::Result<()> {
        Err(ParleyError::AdapterCallError("tts engine refused".to_string()))
    }
}

fn registry(transcripts: &[&str], out_path: PathBuf) -> ServiceRegistry {
    let transcripts: Vec<String> = transcripts.iter().map(|s| s.to_string()).collect();
    let scripted = std::sync::Mutex::new(Some(transcripts));
    ServiceRegistry::new(
        TranscriptionAdapter::new(move || {
            let transcripts = scripted
                .lock()
                .unwrap()
                .take()
                .expect("transcription backend initialized twice");
            Ok(Box::new(ScriptedTranscriber(transcripts)) as Box<dyn TranscribeBackend>)
        }),
        ReasoningAdapter::echo(),
        SynthesisAdapter::new(out_path, || {
            Ok(Box::new(WritingSynthesizer) as Box<dyn SynthesizeBackend>)
        }),
    )
}

fn run_turn(engine: &WorkflowEngine, store: &ContextStore, audio: &str) -> parley::Result<()> {
    let mut context = store.load();
    context.begin_turn(audio);
    let outcome = engine.run(&mut context);
    store.save(&context).unwrap();
    outcome
}

#[test]
fn first_turn_on_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContextStore::new(dir.path().join("context.json"));
    let out = dir.path().join("response.wav");

    // Empty store loads as a fresh context
    let fresh = store.load();
    assert!(fresh.conversation_history.is_empty());
    assert!(fresh.current_focus.is_none());

    let engine = WorkflowEngine::new(
        canonical_graph().unwrap(),
        Arc::new(registry(&["turn on the light"], out.clone())),
    );
    run_turn(&engine, &store, "utterance.wav").unwrap();

    let persisted = store.load();
    assert_eq!(persisted.transcript, "turn on the light");
    assert_eq!(persisted.response_text, "turn on the light");
    assert_eq!(persisted.output_audio_ref, Some(out.clone()));
    assert_eq!(persisted.history_len(), 1);
    assert_eq!(persisted.conversation_history[0].role, Role::User);
    assert_eq!(persisted.conversation_history[0].text, "turn on the light");

    // The synthesized response carries the reasoned text
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "turn on the light");
}

#[test]
fn second_turn_appends_in_arrival_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContextStore::new(dir.path().join("context.json"));
    let out = dir.path().join("response.wav");

    let engine = WorkflowEngine::new(
        canonical_graph().unwrap(),
        Arc::new(registry(&["open the door", "close the door"], out)),
    );

    run_turn(&engine, &store, "first.wav").unwrap();
    run_turn(&engine, &store, "second.wav").unwrap();

    let persisted = store.load();
    assert_eq!(persisted.history_len(), 2);
    assert_eq!(persisted.conversation_history[0].text, "open the door");
    assert_eq!(persisted.conversation_history[1].text, "close the door");
}

#[test]
fn save_then_load_is_idempotent_for_engine_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContextStore::new(dir.path().join("context.json"));
    let out = dir.path().join("response.wav");

    let engine = WorkflowEngine::new(
        canonical_graph().unwrap(),
        Arc::new(registry(&["remember this"], out)),
    );

    let mut context = store.load();
    context.begin_turn("utterance.wav");
    engine.run(&mut context).unwrap();
    store.save(&context).unwrap();

    let loaded = store.load();
    assert_eq!(loaded, context);

    store.save(&loaded).unwrap();
    assert_eq!(store.load(), loaded);
}

#[test]
fn empty_transcript_completes_the_turn() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContextStore::new(dir.path().join("context.json"));
    let out = dir.path().join("response.wav");

    let engine = WorkflowEngine::new(
        canonical_graph().unwrap(),
        Arc::new(registry(&[""], out.clone())),
    );
    run_turn(&engine, &store, "silence.wav").unwrap();

    let persisted = store.load();
    assert_eq!(persisted.transcript, "");
    assert_eq!(persisted.response_text, "");
    assert_eq!(persisted.output_audio_ref, Some(out));
    assert_eq!(persisted.history_len(), 1);
}

#[test]
fn synthesis_failure_preserves_earlier_stage_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContextStore::new(dir.path().join("context.json"));

    let transcription = TranscriptionAdapter::new(|| {
        Ok(Box::new(ScriptedTranscriber(vec!["expensive transcript".to_string()]))
            as Box<dyn TranscribeBackend>)
    });
    let synthesis = SynthesisAdapter::new(dir.path().join("response.wav"), || {
        Ok(Box::new(RefusingSynthesizer) as Box<dyn SynthesizeBackend>)
    });
    let engine = WorkflowEngine::new(
        canonical_graph().unwrap(),
        Arc::new(ServiceRegistry::new(
            transcription,
            ReasoningAdapter::echo(),
            synthesis,
        )),
    );

    let err = run_turn(&engine, &store, "utterance.wav").unwrap_err();
    assert!(matches!(err, ParleyError::WorkflowError(_)));

    let persisted = store.load();
    assert_eq!(persisted.transcript, "expensive transcript");
    assert_eq!(persisted.response_text, "expensive transcript");
    assert!(persisted.output_audio_ref.is_none());
}

#[test]
fn corrupted_record_starts_fresh_and_keeps_working() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContextStore::new(dir.path().join("context.json"));
    let out = dir.path().join("response.wav");

    std::fs::write(store.path(), "definitely-not-json{{{").unwrap();

    // Corruption never surfaces to the caller
    let fresh = store.load();
    assert!(fresh.conversation_history.is_empty());

    let engine = WorkflowEngine::new(
        canonical_graph().unwrap(),
        Arc::new(registry(&["recovered"], out)),
    );
    run_turn(&engine, &store, "utterance.wav").unwrap();
    assert_eq!(store.load().history_len(), 1);
}

#[test]
fn failed_initialization_never_retries() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContextStore::new(dir.path().join("context.json"));

    let init_attempts = Arc::new(AtomicUsize::new(0));
    let attempts = Arc::clone(&init_attempts);
    let transcription = TranscriptionAdapter::new(move || {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(ParleyError::AdapterInitError("model file missing".to_string()))
    });
    let synthesis = SynthesisAdapter::new(dir.path().join("response.wav"), || {
        Ok(Box::new(WritingSynthesizer) as Box<dyn SynthesizeBackend>)
    });
    let engine = WorkflowEngine::new(
        canonical_graph().unwrap(),
        Arc::new(ServiceRegistry::new(
            transcription,
            ReasoningAdapter::echo(),
            synthesis,
        )),
    );

    for _ in 0..3 {
        let err = run_turn(&engine, &store, "utterance.wav").unwrap_err();
        assert!(matches!(err, ParleyError::WorkflowError(_)));
    }

    // The broken heavy resource was acquired exactly once
    assert_eq!(init_attempts.load(Ordering::SeqCst), 1);

    // Failed turns persisted no history
    assert_eq!(store.load().history_len(), 0);
}

#[test]
fn focus_survives_turns_until_changed() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContextStore::new(dir.path().join("context.json"));
    let out = dir.path().join("response.wav");

    let mut seeded = TurnContext::new();
    seeded.current_focus = Some(parley::context::Focus {
        project: Some("LightControl".to_string()),
        directory: None,
        file: Some("main.py".to_string()),
    });
    store.save(&seeded).unwrap();

    let engine = WorkflowEngine::new(
        canonical_graph().unwrap(),
        Arc::new(registry(&["status report"], out)),
    );
    run_turn(&engine, &store, "utterance.wav").unwrap();

    let persisted = store.load();
    let focus = persisted.current_focus.expect("focus dropped");
    assert_eq!(focus.project.as_deref(), Some("LightControl"));
    assert_eq!(focus.file.as_deref(), Some("main.py"));
}

#[test]
fn reasoning_backend_sees_prior_history() {
    struct HistoryAwareReasoner;
    impl ReasonBackend for HistoryAwareReasoner {
        fn respond(&mut self, transcript: &str, context: &TurnContext) -> parley::Result<String> {
            Ok(format!("{} (turn {})", transcript, context.history_len()))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let store = ContextStore::new(dir.path().join("context.json"));

    let transcription = TranscriptionAdapter::new(|| {
        Ok(Box::new(ScriptedTranscriber(vec![
            "hello".to_string(),
            "hello again".to_string(),
        ])) as Box<dyn TranscribeBackend>)
    });
    let reasoning = ReasoningAdapter::new(|| {
        Ok(Box::new(HistoryAwareReasoner) as Box<dyn ReasonBackend>)
    });
    let synthesis = SynthesisAdapter::new(dir.path().join("response.wav"), || {
        Ok(Box::new(WritingSynthesizer) as Box<dyn SynthesizeBackend>)
    });
    let engine = WorkflowEngine::new(
        canonical_graph().unwrap(),
        Arc::new(ServiceRegistry::new(transcription, reasoning, synthesis)),
    );

    run_turn(&engine, &store, "a.wav").unwrap();
    assert_eq!(store.load().response_text, "hello (turn 1)");

    run_turn(&engine, &store, "b.wav").unwrap();
    assert_eq!(store.load().response_text, "hello again (turn 2)");
}
