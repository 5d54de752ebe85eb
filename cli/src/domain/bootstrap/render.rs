//! Rendering a `BootstrapPlan` into bash.
//!
//! Output depends only on the plan, so an unchanged configuration renders
//! byte-identical text and never forces a host replacement.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use agenthost_common::{REDACTED, SecretString};

use crate::domain::bootstrap::artifacts::shell_quote;
use crate::domain::bootstrap::{
    BOOTSTRAP_LOG, BootstrapPlan, BootstrapStage, FailurePolicy, Guard,
};
use crate::domain::error::BootstrapError;

/// Largest user data the provider accepts.
pub const MAX_USER_DATA_BYTES: usize = 32 * 1024;

/// Terminator of secret heredocs; a secret containing it as a line is rejected.
const SECRET_EOF: &str = "AGENTHOST_SECRET_EOF";

/// Shell helper applying a stage's failure policy. Mirrors
/// `FailurePolicy::disposition`.
const RUN_STAGE: &str = r#"run_stage() {
    local name="$1" policy="$2" fn="$3" expected="${4:-}"
    local out rc
    out="$(mktemp)"
    echo "=== [$name] started: $(date -u +%Y-%m-%dT%H:%M:%SZ) ==="
    set +e
    ( set -e; "$fn" ) >"$out" 2>&1
    rc=$?
    set -e
    cat "$out"
    if [ "$rc" -eq 0 ]; then
        echo "=== [$name] ok ==="
    elif [ "$policy" = "best-effort" ]; then
        echo "=== [$name] failed with exit $rc (best-effort, continuing) ==="
    elif [ "$policy" = "expected-error" ] && grep -qF -- "$expected" "$out"; then
        echo "=== [$name] failed with expected error, continuing ==="
    else
        echo "=== [$name] FAILED with exit $rc, aborting bootstrap ===" >&2
        rm -f "$out"
        exit "$rc"
    fi
    rm -f "$out"
}
"#;

/// The rendered startup script in two forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupPayload {
    /// Script with secret values inlined; only ever sent to the provider.
    pub script: SecretString,
    /// Same script with every secret value replaced by `[secret]`.
    pub redacted: String,
}

/// Render the full first-boot script.
///
/// # Errors
///
/// Returns `BootstrapError::UnsafeSecret` if a secret would terminate its
/// heredoc early, or `BootstrapError::PayloadTooLarge` above the provider
/// limit.
pub fn render(plan: &BootstrapPlan) -> Result<StartupPayload, BootstrapError> {
    let script = render_plan(plan, true, BOOTSTRAP_LOG)?;
    if script.len() > MAX_USER_DATA_BYTES {
        return Err(BootstrapError::PayloadTooLarge {
            size: script.len(),
            limit: MAX_USER_DATA_BYTES,
        });
    }
    Ok(StartupPayload {
        script: SecretString::new(script),
        redacted: render_plan(plan, false, BOOTSTRAP_LOG)?,
    })
}

/// Render one stage as a standalone script that runs the stage and exits
/// with its status. The caller applies the failure policy.
///
/// # Errors
///
/// Returns `BootstrapError::UnsafeSecret` as for [`render`].
pub fn render_stage_script(stage: &BootstrapStage) -> Result<SecretString, BootstrapError> {
    let mut out = String::new();
    out.push_str("#!/bin/bash\n");
    out.push_str("set -euo pipefail\n");
    write_secret_dirs(&mut out, std::slice::from_ref(stage));
    let fn_name = function_name(0, stage);
    write_stage_function(&mut out, &fn_name, stage, true)?;
    let _ = writeln!(out, "{fn_name}");
    Ok(SecretString::new(out))
}

/// Render the whole plan, teeing the transcript to `log`.
fn render_plan(plan: &BootstrapPlan, reveal: bool, log: &str) -> Result<String, BootstrapError> {
    let mut out = String::new();
    out.push_str("#!/bin/bash\n");
    let _ = writeln!(
        out,
        "# agenthost first-boot bootstrap for {}. Generated; do not edit.",
        plan.hostname
    );
    out.push_str("set -euo pipefail\n");
    let _ = writeln!(out, "exec > >(tee -a {}) 2>&1", shell_quote(log));
    out.push_str(
        "echo \"=== agenthost bootstrap started: $(date -u +%Y-%m-%dT%H:%M:%SZ) ===\"\n",
    );
    write_secret_dirs(&mut out, &plan.stages);
    out.push('\n');
    out.push_str(RUN_STAGE);

    let mut calls = String::new();
    for (i, stage) in plan.stages.iter().enumerate() {
        let fn_name = function_name(i + 1, stage);
        out.push('\n');
        write_stage_function(&mut out, &fn_name, stage, reveal)?;
        let _ = writeln!(calls, "{}", run_stage_call(stage, &fn_name));
    }

    out.push('\n');
    out.push_str(&calls);
    out.push_str("echo \"=== agenthost bootstrap complete ===\"\n");
    Ok(out)
}

/// Create every directory the stages' secret files live in, owner-only.
fn write_secret_dirs(out: &mut String, stages: &[BootstrapStage]) {
    let dirs: BTreeSet<&str> = stages
        .iter()
        .flat_map(|s| &s.secrets)
        .map(|s| s.dir.as_str())
        .collect();
    for dir in dirs {
        let _ = writeln!(out, "install -d -m 700 {dir}");
    }
}

fn function_name(index: usize, stage: &BootstrapStage) -> String {
    format!("stage_{index:02}_{}", stage.name.replace('-', "_"))
}

fn run_stage_call(stage: &BootstrapStage, fn_name: &str) -> String {
    let name = shell_quote(&stage.name);
    match &stage.policy {
        FailurePolicy::Fatal => format!("run_stage {name} fatal {fn_name}"),
        FailurePolicy::BestEffort => format!("run_stage {name} best-effort {fn_name}"),
        FailurePolicy::FatalUnlessExpected(pattern) => format!(
            "run_stage {name} expected-error {fn_name} {}",
            shell_quote(pattern)
        ),
    }
}

/// Emit `fn_name() { guard; secret files; body }`.
///
/// Heredoc lines stay at column zero, so the body is not indented.
fn write_stage_function(
    out: &mut String,
    fn_name: &str,
    stage: &BootstrapStage,
    reveal: bool,
) -> Result<(), BootstrapError> {
    let _ = writeln!(out, "{fn_name}() {{");
    if let Guard::SkipWhen(probe) = &stage.guard {
        let _ = writeln!(out, "if {probe}; then");
        let _ = writeln!(out, "    echo \"[{}] already done, skipping\"", stage.name);
        out.push_str("    return 0\n");
        out.push_str("fi\n");
    }
    if !stage.secrets.is_empty() {
        let paths: Vec<String> = stage.secrets.iter().map(super::SecretInput::path).collect();
        let _ = writeln!(out, "trap 'rm -f {}' EXIT", paths.join(" "));
        for secret in &stage.secrets {
            let value = secret.value.expose_secret().trim_end_matches('\n');
            if value.lines().any(|l| l == SECRET_EOF) {
                return Err(BootstrapError::UnsafeSecret {
                    stage: stage.name.clone(),
                });
            }
            let path = secret.path();
            let _ = writeln!(out, "install -m 600 /dev/null {path}");
            let _ = writeln!(out, "cat > {path} <<'{SECRET_EOF}'");
            out.push_str(if reveal { value } else { REDACTED });
            out.push('\n');
            let _ = writeln!(out, "{SECRET_EOF}");
        }
    }
    out.push_str(&stage.body);
    if !stage.body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("}\n");
    Ok(())
}
