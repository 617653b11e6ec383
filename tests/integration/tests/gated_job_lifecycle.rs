use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use anyhow::Result;
use hwa_access::{
    AuthorityVerdict, CommandClassifier, DecisionAuthority, DecisionPrompt, DenialReason,
    GateState, PermissionGate,
};
use hwa_jobs::{
    FileJobStore, JobRegistry, JobStatus, JobStore, ProcessProbe, SystemProcessControl,
};
use hwa_tools::{job_tools, CommandExecutor, ExecutionPipeline, ExecutorConfig};

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(1);

struct IsolatedWorkspace {
    root: PathBuf,
}

impl IsolatedWorkspace {
    fn new(label: &str) -> Self {
        let tick = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let count = WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "hwa-it-{label}-{}-{tick}-{count}",
            std::process::id()
        ));
        fs::create_dir_all(&root).expect("must create isolated workspace root");
        Self { root }
    }

    fn ledger(&self) -> PathBuf {
        self.root.join(".job_registry.json")
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for IsolatedWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// Answers from a queue and keeps every prompt it was shown.
struct ScriptedAuthority {
    verdicts: Mutex<Vec<AuthorityVerdict>>,
    prompts: Mutex<Vec<DecisionPrompt>>,
}

impl ScriptedAuthority {
    fn new(verdicts: Vec<AuthorityVerdict>) -> Arc<Self> {
        Arc::new(Self {
            verdicts: Mutex::new(verdicts.into_iter().rev().collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<DecisionPrompt> {
        self.prompts.lock().expect("prompts").clone()
    }
}

impl DecisionAuthority for ScriptedAuthority {
    fn decide(&self, prompt: &DecisionPrompt) -> Result<AuthorityVerdict> {
        self.prompts.lock().expect("prompts").push(prompt.clone());
        Ok(self
            .verdicts
            .lock()
            .expect("verdicts")
            .pop()
            .unwrap_or(AuthorityVerdict::Denied(DenialReason::NoApprovalRule)))
    }
}

fn registry_at(ledger: &Path) -> Arc<JobRegistry> {
    Arc::new(JobRegistry::new(
        Arc::new(FileJobStore::new(ledger)),
        Arc::new(SystemProcessControl),
    ))
}

fn pipeline_at(ledger: &Path, authority: Arc<dyn DecisionAuthority>) -> ExecutionPipeline {
    ExecutionPipeline::new(
        PermissionGate::new(CommandClassifier::default(), authority),
        CommandExecutor::new(
            registry_at(ledger),
            Arc::new(SystemProcessControl),
            ExecutorConfig::default(),
        ),
    )
}

async fn wait_until_gone(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while SystemProcessControl.is_alive(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[test]
fn integration_gate_classifies_safe_and_dangerous_commands() {
    let workspace = IsolatedWorkspace::new("gate");
    let authority = ScriptedAuthority::new(vec![AuthorityVerdict::Denied(
        DenialReason::InteractivelyByUser,
    )]);
    let pipeline = pipeline_at(&workspace.ledger(), authority.clone());

    let safe = pipeline
        .authorize(&hwa_access::PermissionRequest::shell("ls -la", "s1"))
        .expect("safe command approved");
    assert_eq!(safe.state, GateState::AutoApproved);
    assert!(authority.prompts().is_empty());

    let error = pipeline
        .authorize(&hwa_access::PermissionRequest::shell("rm -rf /tmp/x", "s1"))
        .expect_err("dangerous command denied");
    assert_eq!(error.reason_code(), "permission_denied");
    let prompts = authority.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].danger_flag);
}

#[cfg(unix)]
#[tokio::test]
async fn integration_background_job_scenario_survives_restart_and_reconciles() {
    let workspace = IsolatedWorkspace::new("scenario");
    let ledger = workspace.ledger();
    let authority = ScriptedAuthority::new(vec![AuthorityVerdict::Approved]);
    let pipeline = pipeline_at(&ledger, authority.clone());

    let spawned = job_tools::spawn_job(&pipeline, "sleep 1", "napper", "s1").await;
    assert!(!spawned.is_error, "{}", spawned.as_text());
    let job_id = spawned.content["job_id"].as_str().expect("job id").to_string();
    let pid = spawned.content["pid"].as_u64().expect("pid") as u32;
    assert_eq!(authority.prompts().len(), 1);

    // A fresh registry over the same file models a restarted agent.
    let restarted = registry_at(&ledger);
    let record = restarted.get(&job_id).expect("record after restart");
    assert_eq!(record.status, JobStatus::Running);
    assert_eq!(record.pid, pid);
    assert_eq!(record.stopped_at, None);

    wait_until_gone(pid).await;
    let snapshot = restarted
        .get_refreshed(&job_id)
        .expect("refresh")
        .expect("snapshot");
    assert!(!snapshot.is_running);
    assert_eq!(snapshot.record.status, JobStatus::NotFound);
    assert!(snapshot.record.stopped_at.is_some());

    let stop = job_tools::stop_job(&pipeline, &job_id);
    assert!(!stop.is_error);
    assert_eq!(stop.content["outcome"], "already_gone");

    let removed = job_tools::remove_job(&restarted, &job_id);
    assert_eq!(removed.content["success"], true);
    assert!(pipeline.executor().registry().get(&job_id).is_none());
}

#[test]
fn integration_corrupt_ledger_recovers_and_ids_stay_unique_across_reloads() {
    let workspace = IsolatedWorkspace::new("corrupt");
    let ledger = workspace.ledger();
    fs::write(&ledger, "{\"job_1\": [unterminated").expect("write corrupt ledger");
    assert!(FileJobStore::new(&ledger).load().is_empty());

    let mut ids = BTreeSet::new();
    for round in 0..3u32 {
        let registry = registry_at(&ledger);
        for index in 0..4u32 {
            let id = registry
                .register(10_000 + round * 10 + index, "probe", "true", "s1")
                .expect("register");
            assert!(ids.insert(id));
        }
    }
    let persisted = FileJobStore::new(&ledger).load();
    assert_eq!(persisted.len(), 12);
    assert!(ids.iter().all(|id| persisted.contains_key(id)));
    assert!(workspace.root().join(".job_registry.json.lock").exists());
}
