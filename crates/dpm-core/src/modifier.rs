//! The per-run modification engine: change queue, patch cache, applier.
//!
//! A [`Modifier`] is owned by exactly one export run. Changes are queued
//! while the caller collects inputs, then [`Modifier::export`] applies them
//! in queue order against a per-file cache and packs the results. The cache
//! guarantees each source file is read at most once per run, so changes
//! targeting the same file compose instead of clobbering each other. The
//! cache and queue are wiped when the run finishes, success or not.

use crate::edit::{self, EditMethod, ScalarValue, value_matches_method};
use crate::error::{Error, Result};
use crate::export::{self, ExportSettings, ExportedPack, Progress, ProgressCounter};
use crate::pack::{Datapack, PackStore};
use std::collections::HashMap;

/// A queued edit intent.
#[derive(Debug, Clone)]
pub struct Change {
    pub pack_id: String,
    /// File path pattern: `./name` targets exactly `name`, anything else is
    /// a suffix match over the pack listing.
    pub file_path: String,
    /// `/`-separated path to the value inside the file.
    pub value_path: String,
    pub value: ScalarValue,
    pub method: EditMethod,
}

/// Counters for one export run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    /// Cache populations from source archive bytes. At most one per
    /// `(pack, file)` pair per run.
    pub files_loaded: usize,
    /// Individual file patches that succeeded.
    pub files_patched: usize,
    /// Unmodified files copied through to an output archive.
    pub files_copied: usize,
}

pub(crate) type ChangeCache = HashMap<(String, String), String>;

/// Queue and cache for one export run.
#[derive(Default)]
pub struct Modifier {
    queue: Vec<Change>,
    cache: ChangeCache,
    stats: RunStats,
}

impl Modifier {
    pub fn new() -> Modifier {
        Modifier::default()
    }

    pub fn queue(&self) -> &[Change] {
        &self.queue
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Queues a change to one value in one file (or files) of a datapack.
    /// The change is only made when the run is exported.
    ///
    /// The value's runtime kind must match the method; mismatches are logged
    /// and dropped without failing the caller.
    pub fn queue_change(
        &mut self,
        pack_id: &str,
        file_path: &str,
        value_path: &str,
        value: ScalarValue,
        method: EditMethod,
    ) {
        if !value_matches_method(&value, method) {
            log::warn!(
                "change not queued: value {} ({}) doesn't match method \"{}\"",
                value,
                value.kind(),
                method
            );
            return;
        }
        log::debug!(
            "queued change: pack={} files={} value_path={} value={} method={}",
            pack_id,
            file_path,
            value_path,
            value,
            method
        );
        self.queue.push(Change {
            pack_id: pack_id.to_string(),
            file_path: file_path.to_string(),
            value_path: value_path.to_string(),
            value,
            method,
        });
    }

    /// Turns a pack's configuration plus collected input values into queued
    /// changes: one change per accessor file pattern, for every method with
    /// an input.
    ///
    /// Pass inputs through [`crate::config::PackConfig::active_inputs`]
    /// first so methods left at their widget defaults stay untouched. A
    /// method whose transformer fails to evaluate is skipped as a whole —
    /// no partial set of its accessors is queued.
    pub fn plan_changes(
        &mut self,
        pack: &Datapack,
        inputs: &HashMap<String, ScalarValue>,
        slots: &HashMap<String, ScalarValue>,
    ) {
        let Some(config) = &pack.config else {
            log::debug!("pack \"{}\" has no configuration, nothing to plan", pack.id);
            return;
        };

        for (name, def) in &config.methods {
            let Some(input) = inputs.get(name) else {
                log::debug!("method \"{}\" has no input, skipping", name);
                continue;
            };

            let mut pending = Vec::with_capacity(def.accessors.len());
            let mut failed = false;
            for accessor in &def.accessors {
                let transformer = accessor.transformer.as_ref().unwrap_or(&def.transformer);
                match transformer.evaluate(Some(input), slots) {
                    Ok(value) => pending.push((accessor, value)),
                    Err(e) => {
                        log::warn!(
                            "[{}] method \"{}\" failed to evaluate: {}; method skipped",
                            pack.id,
                            name,
                            e
                        );
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                continue;
            }

            for (accessor, value) in pending {
                for pattern in &accessor.file_paths {
                    self.queue_change(
                        &pack.id,
                        pattern,
                        &accessor.value_path,
                        value.clone(),
                        accessor.method,
                    );
                }
            }
        }
    }

    /// Runs the queued changes and packs the outputs. The queue and cache
    /// are wiped afterwards regardless of the outcome.
    pub fn export(
        &mut self,
        packs: &PackStore,
        settings: &ExportSettings,
        progress: &mut dyn Progress,
    ) -> Result<Vec<ExportedPack>> {
        let result = self.run(packs, settings, progress);
        self.wipe();
        result
    }

    fn run(
        &mut self,
        packs: &PackStore,
        settings: &ExportSettings,
        progress: &mut dyn Progress,
    ) -> Result<Vec<ExportedPack>> {
        self.stats = RunStats::default();
        let mut counter = ProgressCounter::new(progress, self.queue.len());

        let queue = std::mem::take(&mut self.queue);
        for change in &queue {
            if let Err(e) = self.apply_change(packs, change) {
                log::warn!(
                    "[{}:{}] change at \"{}\" failed: {}",
                    change.pack_id,
                    change.file_path,
                    change.value_path,
                    e
                );
            }
            counter.step();
        }

        export::pack_outputs(packs, &self.cache, settings, &mut counter, &mut self.stats)
    }

    /// Applies one change: resolves the file pattern against the pack
    /// listing and patches every resolved file through the cache.
    fn apply_change(&mut self, packs: &PackStore, change: &Change) -> Result<()> {
        let Some(pack) = packs.get(&change.pack_id) else {
            log::warn!("pack \"{}\" is not loaded, change dropped", change.pack_id);
            return Ok(());
        };

        if let Some(exact) = change.file_path.strip_prefix("./") {
            self.apply_change_to_file(pack, change, exact)?;
        } else {
            let matches: Vec<String> = pack
                .file_names()
                .filter(|name| name.ends_with(&change.file_path))
                .map(String::from)
                .collect();
            if matches.is_empty() {
                // Some configurations target optional files on purpose.
                log::warn!(
                    "pattern \"{}\" matched no files in \"{}\"",
                    change.file_path,
                    change.pack_id
                );
            }
            for file_name in matches {
                // One bad file doesn't stop the rest of the pattern.
                if let Err(e) = self.apply_change_to_file(pack, change, &file_name) {
                    log::warn!(
                        "[{}:{}] change at \"{}\" failed: {}",
                        change.pack_id,
                        file_name,
                        change.value_path,
                        e
                    );
                }
            }
        }
        Ok(())
    }

    fn apply_change_to_file(
        &mut self,
        pack: &Datapack,
        change: &Change,
        file_name: &str,
    ) -> Result<()> {
        let key = (change.pack_id.clone(), file_name.to_string());

        let (text, overwrite) = if let Some(cached) = self.cache.get(&key) {
            (cached.clone(), true)
        } else if let Some(data) = pack.file(file_name) {
            self.stats.files_loaded += 1;
            (String::from_utf8_lossy(data).into_owned(), false)
        } else {
            log::warn!(
                "file \"{}\" doesn't exist in \"{}\"",
                file_name,
                change.pack_id
            );
            return Ok(());
        };

        let mut parsed: serde_json::Value =
            serde_json::from_str(&text).map_err(|source| Error::MalformedJson {
                pack: change.pack_id.clone(),
                file: file_name.to_string(),
                source,
            })?;

        edit::apply_to_value(&mut parsed, &change.value_path, &change.value, change.method)?;

        let serialized = serde_json::to_string(&parsed)?;
        self.store_cached(key, serialized, overwrite)?;
        self.stats.files_patched += 1;
        Ok(())
    }

    /// The only write path into the cache. A first write must not collide
    /// with an existing entry; overwrites are only legal for entries the run
    /// has already created.
    fn store_cached(&mut self, key: (String, String), text: String, overwrite: bool) -> Result<()> {
        if !overwrite && self.cache.contains_key(&key) {
            return Err(Error::CacheCollision {
                pack: key.0,
                file: key.1,
            });
        }
        self.cache.insert(key, text);
        Ok(())
    }

    fn wipe(&mut self) {
        self.queue.clear();
        self.cache.clear();
        log::info!("change cache wiped");
    }
}
