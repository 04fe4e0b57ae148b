//! In-process backend for tests.
//!
//! `ScriptedBackend` counts runtime starts and worker installs, records every
//! call envelope and answers calls from canned responses. Methods without a
//! canned response get a synthesized success object when a registry is
//! attached: one key per declared return, valued by kind, with arguments of
//! the same name echoed back.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::registry::{Registry, ReturnKind, WorkerSpec};
use crate::runtime::{Backend, CallEnvelope};

#[derive(Default)]
struct Script {
    starts: AtomicUsize,
    shutdowns: AtomicUsize,
    failing_starts: AtomicUsize,
    crashing_calls: AtomicUsize,
    /// Sessions with a serial up to this one are dead.
    killed_through: AtomicUsize,
    installs: Mutex<FxHashMap<u8, usize>>,
    failing_installs: Mutex<FxHashMap<u8, usize>>,
    calls: Mutex<Vec<CallEnvelope>>,
    responses: Mutex<FxHashMap<String, Value>>,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend double with observable side effects. Clones share counters.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Script>,
    registry: Option<Arc<Registry>>,
    start_delay: Duration,
    install_delay: Duration,
    call_delay: Duration,
}

/// Session handed out by [`ScriptedBackend`].
pub struct ScriptedSession {
    pub serial: usize,
    closed: AtomicBool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesize responses from this registry's declared returns.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_install_delay(mut self, delay: Duration) -> Self {
        self.install_delay = delay;
        self
    }

    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Make the next `n` starts fail.
    pub fn fail_next_starts(&self, n: usize) {
        self.script.failing_starts.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` installs of `worker_id` fail.
    pub fn fail_next_installs(&self, worker_id: u8, n: usize) {
        guard(&self.script.failing_installs).insert(worker_id, n);
    }

    /// Make the next `n` calls fail and take their session down with them.
    pub fn crash_next_calls(&self, n: usize) {
        self.script.crashing_calls.store(n, Ordering::SeqCst);
    }

    /// Kill every session started so far, as if the interpreter exited.
    pub fn kill_sessions(&self) {
        let started = self.script.starts.load(Ordering::SeqCst);
        self.script.killed_through.fetch_max(started, Ordering::SeqCst);
    }

    /// Answer every call to `method_id` with `value`.
    pub fn respond(&self, method_id: &str, value: Value) {
        guard(&self.script.responses).insert(method_id.to_string(), value);
    }

    pub fn start_count(&self) -> usize {
        self.script.starts.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.script.shutdowns.load(Ordering::SeqCst)
    }

    pub fn install_count(&self, worker_id: u8) -> usize {
        guard(&self.script.installs)
            .get(&worker_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<CallEnvelope> {
        guard(&self.script.calls).clone()
    }

    fn synthesize(&self, envelope: &CallEnvelope) -> Option<Value> {
        let registry = self.registry.as_ref()?;
        let descriptor = registry.get(&envelope.method_id)?;
        let fields: Map<String, Value> = descriptor
            .returns
            .iter()
            .map(|ret| {
                let value = envelope
                    .args
                    .get(&ret.name)
                    .cloned()
                    .unwrap_or_else(|| placeholder(ret.kind));
                (ret.name.clone(), value)
            })
            .collect();
        Some(Value::Object(fields))
    }
}

fn placeholder(kind: ReturnKind) -> Value {
    match kind {
        ReturnKind::Number => json!(0.5),
        ReturnKind::Boolean => json!(false),
        ReturnKind::String => json!(""),
        ReturnKind::NumberVector => json!([]),
        ReturnKind::NumberMatrix => json!([]),
        ReturnKind::Interval => json!({"lower": 0.0, "upper": 1.0}),
        ReturnKind::Json => Value::Null,
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl Backend for ScriptedBackend {
    type Session = ScriptedSession;

    async fn start(&self) -> Result<ScriptedSession> {
        let serial = self.script.starts.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if take_failure(&self.script.failing_starts) {
            return Err(Error::Initialization("scripted start failure".to_string()));
        }
        Ok(ScriptedSession {
            serial,
            closed: AtomicBool::new(false),
        })
    }

    async fn install_worker(&self, session: &ScriptedSession, worker: &WorkerSpec) -> Result<()> {
        *guard(&self.script.installs).entry(worker.id).or_default() += 1;
        if !self.install_delay.is_zero() {
            tokio::time::sleep(self.install_delay).await;
        }
        if !self.is_alive(session) {
            return Err(Error::Ipc("session closed".to_string()));
        }
        let failing = {
            let mut failing = guard(&self.script.failing_installs);
            match failing.get_mut(&worker.id) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        };
        if failing {
            return Err(Error::Ipc(format!("scripted install failure for worker {}", worker.id)));
        }
        Ok(())
    }

    async fn call(&self, session: &ScriptedSession, envelope: &CallEnvelope) -> Result<Option<Value>> {
        guard(&self.script.calls).push(envelope.clone());
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
        if !self.is_alive(session) {
            return Err(Error::Ipc("session closed".to_string()));
        }
        if take_failure(&self.script.crashing_calls) {
            self.script
                .killed_through
                .fetch_max(session.serial, Ordering::SeqCst);
            return Err(Error::Ipc("scripted session crash".to_string()));
        }
        let canned = guard(&self.script.responses).get(&envelope.method_id).cloned();
        Ok(canned.or_else(|| self.synthesize(envelope)))
    }

    fn is_alive(&self, session: &ScriptedSession) -> bool {
        !session.closed.load(Ordering::SeqCst)
            && session.serial > self.script.killed_through.load(Ordering::SeqCst)
    }

    async fn shutdown(&self, session: &ScriptedSession) {
        session.closed.store(true, Ordering::SeqCst);
        self.script.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
