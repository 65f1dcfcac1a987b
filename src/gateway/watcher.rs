//! Contract hot reload
//!
//! A `notify` watcher over the configured contract directories. Each
//! create/modify/remove event clears the dev middleware's validation cache
//! and the generated-type cache entries for the changed contract, and
//! re-loads changed `*.contract.json` files so new versions register
//! without a restart.
//!
//! Registrations stay immutable: editing the schema of an already
//! registered version is rejected and logged; bump the version instead.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::dev::DevValidation;
use crate::error::Result;
use crate::loader::{is_contract_file, load_contract_file, CONTRACT_FILE_SUFFIX};

/// Start watching `paths`; missing paths are skipped with a warning
pub(crate) fn spawn(dev: &DevValidation, paths: &[PathBuf]) -> Result<RecommendedWatcher> {
    let state = dev.downgrade();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Some(state) = state.upgrade() else {
            return;
        };
        match res {
            Ok(event) => handle_event(&DevValidation::from_state(state), &event),
            Err(e) => tracing::warn!(error = %e, "contract watcher error"),
        }
    })?;

    let mut watched = 0;
    for path in paths {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "watch path does not exist; skipping");
            continue;
        }
        watcher.watch(path, RecursiveMode::Recursive)?;
        watched += 1;
    }
    tracing::info!(paths = watched, "contract watcher started");
    Ok(watcher)
}

fn handle_event(dev: &DevValidation, event: &Event) {
    let removed = match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => false,
        EventKind::Remove(_) => true,
        _ => return,
    };
    for path in &event.paths {
        handle_change(dev, path, removed);
    }
}

/// Invalidate caches for one changed file and re-load it when it is a
/// contract definition that still exists
pub(crate) fn handle_change(dev: &DevValidation, path: &Path, removed: bool) {
    let stem = contract_stem(path);
    let cleared = dev.clear_validation_cache();
    let dropped = stem.as_deref().map_or(0, |s| dev.type_cache().invalidate_overlapping(s));
    tracing::info!(
        path = %path.display(),
        validations = cleared,
        types = dropped,
        "contract source changed; caches invalidated"
    );

    if removed || !is_contract_file(path) || !path.is_file() {
        return;
    }
    let result = load_contract_file(&mut dev.registry().write(), path);
    match result {
        Ok(key) => tracing::info!(contract = %key, "reloaded contract file"),
        Err(e) => tracing::warn!(path = %path.display(), error = %format!("{:#}", e), "contract file not reloaded"),
    }
}

/// `contracts/task.contract.json` -> `task`
fn contract_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name
        .strip_suffix(CONTRACT_FILE_SUFFIX)
        .or_else(|| name.split('.').next())
        .unwrap_or(name);
    (!stem.is_empty()).then(|| stem.to_string())
}
