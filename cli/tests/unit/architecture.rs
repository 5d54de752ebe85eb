//! Structural tests for layer boundaries.
//!
//! Scan the source tree and fail when a layer reaches into one it must not
//! depend on. Comment lines and `#[cfg(test)]` blocks are ignored.

use std::path::{Path, PathBuf};

fn src() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src")
}

/// All `.rs` files under `dir`, recursively.
fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(rust_files(&path));
        } else if path.extension().is_some_and(|e| e == "rs") {
            files.push(path);
        }
    }
    files
}

/// Non-comment lines outside `#[cfg(test)]` blocks, with 1-based numbers.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut depth = 0i32;
    let mut test_depth: Option<i32> = None;
    let mut lines = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("#[cfg(test)]") && test_depth.is_none() {
            test_depth = Some(depth);
        }
        let in_test = test_depth.is_some();
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if test_depth.is_some_and(|d| depth <= d) {
                        test_depth = None;
                    }
                }
                _ => {}
            }
        }
        if !in_test && !trimmed.starts_with("//") && !trimmed.is_empty() {
            lines.push((i + 1, line.to_string()));
        }
    }
    lines
}

/// `path:line: text` for every production line in `dir` containing any of
/// `needles`.
fn violations(dir: &Path, needles: &[&str]) -> Vec<String> {
    let mut found = Vec::new();
    for file in rust_files(dir) {
        let rel = file
            .strip_prefix(env!("CARGO_MANIFEST_DIR"))
            .unwrap_or(&file)
            .display()
            .to_string();
        for (n, line) in production_lines(&file) {
            if needles.iter().any(|needle| line.contains(needle)) {
                found.push(format!("{rel}:{n}: {}", line.trim()));
            }
        }
    }
    found
}

#[test]
fn domain_is_pure() {
    let found = violations(
        &src().join("domain"),
        &[
            "tokio",
            "std::fs",
            "std::process",
            "std::net",
            "reqwest",
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
        ],
    );
    assert!(found.is_empty(), "domain/ must stay free of I/O:\n{}", found.join("\n"));
}

#[test]
fn application_depends_only_on_domain_and_ports() {
    let found = violations(
        &src().join("application"),
        &["crate::infra", "crate::commands", "crate::output", "reqwest"],
    );
    assert!(
        found.is_empty(),
        "application/ must not import infra or presentation:\n{}",
        found.join("\n")
    );
}

#[test]
fn services_take_ports_not_adapters() {
    let found = violations(
        &src().join("application").join("services"),
        &[
            "HcloudProvider",
            "StateManager",
            "TokioCommandRunner",
            "BashStageExecutor",
            "RandSecretGenerator",
        ],
    );
    assert!(
        found.is_empty(),
        "services must use port trait bounds, not adapters:\n{}",
        found.join("\n")
    );
}

#[test]
fn infra_has_no_presentation() {
    let found = violations(
        &src().join("infra"),
        &["crate::commands", "crate::output", "println!", "eprintln!"],
    );
    assert!(
        found.is_empty(),
        "infra/ must not import from commands/ or output/ or print:\n{}",
        found.join("\n")
    );
}

#[test]
fn commands_render_through_the_renderer() {
    let found = violations(&src().join("commands"), &["json: bool", "if json", "if !json"]);
    assert!(
        found.is_empty(),
        "commands/ must use app.renderer() instead of branching on a json flag:\n{}",
        found.join("\n")
    );
}
