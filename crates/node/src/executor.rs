//! Tool execution: the manifest registry and the actuator.
//!
//! Agents run probers, monitors run listeners; both are external
//! executables registered in a YAML manifest. At startup each tool is
//! probed with `--info` and must print a JSON self-description (name,
//! accepted parameters, produced metrics) that becomes part of the
//! component's advertised features. At run time an instruction's actions
//! are executed in parallel, one child process per action, with the
//! stimulus parameters passed as `--name value` flags.

use benchnet_messages::{ActionSpec, ErrorInfo, Evaluation, Instruction};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Deadline applied to an action without an explicit `timeout` parameter.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const WAIT_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to read tool manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid tool manifest {path}: {source}")]
    ManifestFormat {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// One registered tool executable.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub path: PathBuf,
}

/// The tool manifest: which probers and listeners this node may run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolManifest {
    #[serde(default)]
    pub probers: Vec<ToolEntry>,
    #[serde(default)]
    pub listeners: Vec<ToolEntry>,
}

impl ToolManifest {
    pub fn load(path: &Path) -> Result<Self, ExecutorError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ExecutorError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ExecutorError::ManifestFormat {
            path: path.to_path_buf(),
            source,
        })
    }
}

struct Tool {
    entry: ToolEntry,
    info: Value,
}

/// Runs registered tools on behalf of instructions.
pub struct Actuator {
    kind: &'static str,
    tools: BTreeMap<String, Tool>,
}

impl Actuator {
    /// Probe each manifest entry with `--info` and register the ones that
    /// answer with a JSON self-description. A tool that fails the probe is
    /// logged and skipped; it simply is not advertised.
    pub fn probe(kind: &'static str, entries: Vec<ToolEntry>) -> Self {
        let mut tools = BTreeMap::new();
        for entry in entries {
            match probe_tool(&entry) {
                Ok(info) => {
                    info!(kind, id = %entry.id, path = %entry.path.display(), "tool registered");
                    tools.insert(entry.id.clone(), Tool { entry, info });
                }
                Err(reason) => {
                    warn!(kind, id = %entry.id, path = %entry.path.display(), reason, "tool probe failed, skipped");
                }
            }
        }
        Actuator { kind, tools }
    }

    /// The advertised tool set: tool id mapped to its self-description.
    pub fn advertised(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .tools
            .iter()
            .map(|(id, tool)| (id.clone(), tool.info.clone()))
            .collect();
        Value::Object(map)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run every action of `instruction`, one child process per action,
    /// all in parallel. Always yields one evaluation per action: metrics on
    /// a clean exit, an error otherwise.
    pub fn act(&self, instruction: &Instruction) -> Vec<Evaluation> {
        info!(
            kind = self.kind,
            actions = instruction.actions.len(),
            "running instruction"
        );
        std::thread::scope(|scope| {
            let handles: Vec<_> = instruction
                .actions
                .values()
                .map(|action| scope.spawn(move || self.run_action(action)))
                .collect();
            handles
                .into_iter()
                .zip(instruction.actions.values())
                .map(|(handle, action)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| failure(action, self.kind, "tool runner panicked"))
                })
                .collect()
        })
    }

    fn run_action(&self, action: &ActionSpec) -> Evaluation {
        let Some(tool) = self.tools.get(&action.stimulus.id) else {
            return failure(action, self.kind, "tool is not registered");
        };
        let deadline = action_timeout(action);
        let mut command = Command::new(&tool.entry.path);
        for (name, value) in &action.stimulus.parameters {
            if value.is_null() {
                continue;
            }
            command.arg(format!("--{name}"));
            command.arg(argument_text(value));
        }
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        debug!(tool = %action.stimulus.id, timeout = ?deadline, "spawning tool");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => return failure(action, self.kind, format!("spawn failed: {err}")),
        };
        let stdout = collector(child.stdout.take());
        let stderr = collector(child.stderr.take());

        let status = match wait_with_deadline(&mut child, deadline) {
            Ok(status) => status,
            Err(reason) => {
                let _ = stdout.join();
                let _ = stderr.join();
                return failure(action, self.kind, reason);
            }
        };
        let out = stdout.join().unwrap_or_default();
        let err = stderr.join().unwrap_or_default();

        if status.success() {
            match serde_json::from_str::<Value>(&out) {
                Ok(metrics) => Evaluation {
                    id: action.id.clone(),
                    tool: Some(action.stimulus.id.clone()),
                    kind: Some(self.kind.to_string()),
                    metrics: Some(metrics),
                    ..Default::default()
                },
                Err(_) => failure(action, self.kind, format!("tool output is not json: {out}")),
            }
        } else {
            let detail = if err.trim().is_empty() { out } else { err };
            failure(action, self.kind, detail.trim().to_string())
        }
    }
}

fn probe_tool(entry: &ToolEntry) -> Result<Value, String> {
    let output = Command::new(&entry.path)
        .arg("--info")
        .output()
        .map_err(|err| format!("probe failed: {err}"))?;
    if !output.status.success() {
        return Err(format!("probe exited with {}", output.status));
    }
    serde_json::from_slice(&output.stdout).map_err(|err| format!("probe output is not json: {err}"))
}

fn action_timeout(action: &ActionSpec) -> Duration {
    let seconds = match action.stimulus.parameters.get("timeout") {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.parse().ok(),
        _ => None,
    };
    match seconds {
        Some(seconds) if seconds > 0.0 => Duration::from_secs_f64(seconds),
        _ => DEFAULT_TIMEOUT,
    }
}

fn argument_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn failure(action: &ActionSpec, kind: &str, detail: impl Into<Value>) -> Evaluation {
    Evaluation {
        id: action.id.clone(),
        tool: Some(action.stimulus.id.clone()),
        kind: Some(kind.to_string()),
        error: Some(ErrorInfo::from_data(detail)),
        ..Default::default()
    }
}

/// Drain a child pipe on its own thread so the child never blocks on a full
/// pipe while we poll for its exit.
fn collector<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut collected = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut collected);
        }
        collected
    })
}

/// Poll the child until it exits; past the deadline it is killed and the
/// action reported as timed out.
fn wait_with_deadline(
    child: &mut Child,
    deadline: Duration,
) -> Result<std::process::ExitStatus, String> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(err) => return Err(format!("wait failed: {err}")),
        }
        if started.elapsed() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(format!("timed out after {deadline:?}"));
        }
        std::thread::sleep(WAIT_POLL);
    }
}
