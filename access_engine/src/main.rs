/// Access Kernel: Determinism Harness
///
/// Loads a scenario (a JSON array of identity-tagged invocations), runs it
/// through two fresh engines, and compares world-state digests.
///
/// Usage: access_engine [scenario.json]

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use access_engine::engine::AccessEngine;
use access_engine::identity::IdentityContext;
use access_engine::invariants::try_validate_world;
use access_engine::invocation::Invocation;
use access_engine::store::MemoryStore;

const DEFAULT_PATHS: [&str; 3] = [
    "tests/golden/scenario.json",
    "access_engine/tests/golden/scenario.json",
    "../tests/golden/scenario.json",
];

struct Step {
    ctx: IdentityContext,
    invocation: Invocation,
    expect_kind: Option<String>,
}

struct Outcome {
    digest: String,
    entries: usize,
    mismatches: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let explicit = std::env::args().nth(1);
    let path = match explicit {
        Some(p) => p,
        None => match DEFAULT_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => p.to_string(),
            None => {
                error!("no scenario file given and none found at the default paths");
                return ExitCode::FAILURE;
            }
        },
    };

    let steps = match load_scenario(&path) {
        Ok(steps) => steps,
        Err(e) => {
            error!(path = %path, error = %e, "could not load scenario");
            return ExitCode::FAILURE;
        }
    };
    info!(path = %path, steps = steps.len(), "scenario loaded");

    let first = run(&steps);
    let second = run(&steps);

    let mut ok = true;
    for m in &first.mismatches {
        warn!("{}", m);
        ok = false;
    }
    if first.digest != second.digest {
        error!(run1 = %first.digest, run2 = %second.digest, "determinism failure");
        ok = false;
    }

    if ok {
        println!(
            "[PASS] {} step(s), {} key(s), digest={}",
            steps.len(),
            first.entries,
            first.digest
        );
        ExitCode::SUCCESS
    } else {
        println!("[FAIL] scenario {}", path);
        ExitCode::FAILURE
    }
}

fn load_scenario(path: &str) -> Result<Vec<Step>, String> {
    let data = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let raw: Vec<Value> = serde_json::from_str(&data).map_err(|e| e.to_string())?;
    raw.iter()
        .enumerate()
        .map(|(i, v)| {
            let field = |name: &str| {
                v.get(name)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| format!("step {}: missing string field {:?}", i, name))
            };
            let invocation = Invocation::from_value(v).map_err(|e| format!("step {}: {}", i, e))?;
            Ok(Step {
                ctx: IdentityContext::new(field("principal")?, field("org")?),
                invocation,
                expect_kind: v.get("expect").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect()
}

fn run(steps: &[Step]) -> Outcome {
    let mut engine = AccessEngine::<MemoryStore>::default();
    let mut mismatches = Vec::new();

    for (i, step) in steps.iter().enumerate() {
        // Failed steps leave no writes behind, as on the ledger.
        let snapshot = engine.store().clone();
        let result = engine.submit(&step.ctx, &step.invocation);
        let actual = match &result {
            Ok(_) => None,
            Err(e) => {
                engine = AccessEngine::new(snapshot);
                Some(e.kind().as_str().to_string())
            }
        };
        if actual != step.expect_kind {
            mismatches.push(format!(
                "step {} ({}): expected {:?}, got {:?}",
                i, step.invocation.operation, step.expect_kind, actual
            ));
        }
    }

    if let Err(e) = try_validate_world(engine.store()) {
        mismatches.push(format!("world-state check failed: {}", e));
    }

    Outcome {
        digest: engine.state_digest(),
        entries: engine.store().len(),
        mismatches,
    }
}
