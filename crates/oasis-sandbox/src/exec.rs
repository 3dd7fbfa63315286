//! Subprocess execution: write inputs, run the interpreter with a
//! deadline, capture capped output, collect produced files.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::types::{ExecuteRequest, ExecuteResponse, FilePayload, SandboxRuntime};

/// Run a request inside `dir`, using the given interpreter binaries.
pub async fn run_code(
    request: &ExecuteRequest,
    dir: &Path,
    python_bin: &str,
    node_bin: &str,
    max_output: usize,
) -> ExecuteResponse {
    // Stage input files.
    for file in &request.files {
        let Some(name) = safe_file_name(&file.name) else {
            return failure(format!("invalid file name: {}", file.name));
        };
        let bytes = match base64::engine::general_purpose::STANDARD.decode(&file.data) {
            Ok(b) => b,
            Err(e) => return failure(format!("invalid base64 in file {}: {e}", file.name)),
        };
        if let Err(e) = tokio::fs::write(dir.join(name), bytes).await {
            return failure(format!("failed to stage file {}: {e}", file.name));
        }
    }

    let entry = request.runtime.entry_file();
    if let Err(e) = tokio::fs::write(dir.join(entry), &request.code).await {
        return failure(format!("failed to write code: {e}"));
    }

    let before = list_files(dir);

    let bin = match request.runtime {
        SandboxRuntime::Python => python_bin,
        SandboxRuntime::Node => node_bin,
    };

    debug!(
        execution = %request.execution_id,
        runtime = ?request.runtime,
        timeout = request.effective_timeout(),
        "running code"
    );

    let child = Command::new(bin)
        .arg(entry)
        .current_dir(dir)
        .kill_on_drop(true)
        .output();

    let timeout = Duration::from_secs(request.effective_timeout());
    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return failure(format!("failed to start {bin}: {e}")),
        Err(_) => {
            // Deadline hit: kill_on_drop reaps the subprocess.
            warn!(execution = %request.execution_id, "execution timed out");
            return ExecuteResponse {
                exit_code: -1,
                error: Some(format!(
                    "execution timed out after {} seconds",
                    request.effective_timeout()
                )),
                ..Default::default()
            };
        }
    };

    let produced = collect_new_files(dir, &before, entry);

    ExecuteResponse {
        output: cap(String::from_utf8_lossy(&output.stdout).into_owned(), max_output),
        logs: cap(String::from_utf8_lossy(&output.stderr).into_owned(), max_output),
        exit_code: output.status.code().unwrap_or(-1) as i64,
        error: None,
        files: produced,
    }
}

fn failure(error: String) -> ExecuteResponse {
    ExecuteResponse {
        exit_code: -1,
        error: Some(error),
        ..Default::default()
    }
}

/// Keep only the final path component; reject anything that would leave
/// the workspace.
fn safe_file_name(name: &str) -> Option<&str> {
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        None
    } else {
        Some(name)
    }
}

fn list_files(dir: &Path) -> HashSet<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Files present after the run that were not there before.
fn collect_new_files(dir: &Path, before: &HashSet<String>, entry: &str) -> Vec<FilePayload> {
    let mut files: Vec<FilePayload> = list_files(dir)
        .into_iter()
        .filter(|name| !before.contains(name) && name != entry)
        .filter_map(|name| {
            let bytes = std::fs::read(dir.join(&name)).ok()?;
            Some(FilePayload {
                mime: Some(guess_mime(&name).to_string()),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
                name,
            })
        })
        .collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
}

fn guess_mime(name: &str) -> &'static str {
    match name.rsplit('.').next().unwrap_or("") {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "csv" => "text/csv",
        "json" => "application/json",
        "txt" => "text/plain",
        "html" => "text/html",
        _ => "application/octet-stream",
    }
}

fn cap(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while cut > 0 && !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("\n[output truncated]");
    }
    s
}
