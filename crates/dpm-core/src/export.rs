//! Output assembly: grouping cached edits by pack, passthrough copies, and
//! zip emission.

use crate::error::Result;
use crate::modifier::{ChangeCache, RunStats};
use crate::pack::PackStore;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::FileOptions;

pub const COMBINED_PACK_NAME: &str = "Combined Pack.zip";
const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Debug, Clone, Copy)]
pub struct ExportSettings {
    /// 0 stores entries uncompressed; 1-9 select deflate effort.
    pub compression_level: u32,
    /// Only emit files touched by a change.
    pub modified_only: bool,
    /// Merge every touched pack into one output archive.
    pub combine_packs: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            modified_only: false,
            combine_packs: false,
        }
    }
}

/// Clamps a raw compression level to 0-9, defaulting to 6 when absent or out
/// of range.
pub fn compression_level_or_default(raw: Option<i64>) -> u32 {
    match raw {
        Some(n) if (0..=9).contains(&n) => n as u32,
        _ => DEFAULT_COMPRESSION_LEVEL,
    }
}

/// Progress over the run's planned file operations (changes applied plus
/// files copied). `done` only ever grows; `total` may grow mid-run as
/// passthrough copies are planned.
pub trait Progress {
    fn on_step(&mut self, done: usize, total: usize) {
        let _ = (done, total);
    }
}

/// Reporter that ignores everything.
pub struct NoProgress;

impl Progress for NoProgress {}

pub(crate) struct ProgressCounter<'a> {
    done: usize,
    total: usize,
    reporter: &'a mut dyn Progress,
}

impl<'a> ProgressCounter<'a> {
    pub(crate) fn new(reporter: &'a mut dyn Progress, planned: usize) -> Self {
        reporter.on_step(0, planned);
        ProgressCounter {
            done: 0,
            total: planned,
            reporter,
        }
    }

    pub(crate) fn add_planned(&mut self, extra: usize) {
        self.total += extra;
        self.reporter.on_step(self.done, self.total);
    }

    pub(crate) fn step(&mut self) {
        self.done += 1;
        self.reporter.on_step(self.done, self.total);
    }
}

/// A finished output archive, ready to be written to disk or offered as a
/// download.
pub struct ExportedPack {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Entry list for one output archive; inserting an existing name overwrites
/// in place, so colliding paths resolve last-write-wins.
#[derive(Default)]
struct OutputBuilder {
    index: HashMap<String, usize>,
    files: Vec<(String, Vec<u8>)>,
}

impl OutputBuilder {
    fn insert(&mut self, name: String, data: Vec<u8>) {
        if let Some(&at) = self.index.get(&name) {
            log::debug!("output path \"{}\" collides, overwriting", name);
            self.files[at] = (name, data);
        } else {
            self.index.insert(name.clone(), self.files.len());
            self.files.push((name, data));
        }
    }

    fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Materializes output archives from the patch cache.
///
/// Only packs touched by at least one cached edit produce output. Without
/// `modified_only`, every original file of a touched pack is carried over,
/// with cached content replacing the originals it shadows.
pub(crate) fn pack_outputs(
    packs: &PackStore,
    cache: &ChangeCache,
    settings: &ExportSettings,
    counter: &mut ProgressCounter<'_>,
    stats: &mut RunStats,
) -> Result<Vec<ExportedPack>> {
    let mut outputs: Vec<(String, OutputBuilder)> = Vec::new();
    let mut combined = OutputBuilder::default();

    for pack in packs.iter() {
        let touched = cache.keys().any(|(id, _)| *id == pack.id);
        if !touched {
            continue;
        }

        let builder = if settings.combine_packs {
            &mut combined
        } else {
            outputs.push((
                format!("Modded copy of {}", pack.file_name),
                OutputBuilder::default(),
            ));
            let last = outputs.len() - 1;
            &mut outputs[last].1
        };

        if settings.modified_only {
            for name in pack.file_names() {
                let key = (pack.id.clone(), name.to_string());
                if let Some(text) = cache.get(&key) {
                    builder.insert(name.to_string(), text.clone().into_bytes());
                }
            }
        } else {
            counter.add_planned(pack.file_count());
            for name in pack.file_names() {
                let key = (pack.id.clone(), name.to_string());
                match cache.get(&key) {
                    Some(text) => builder.insert(name.to_string(), text.clone().into_bytes()),
                    None => {
                        let data = pack.file(name).unwrap_or_default().to_vec();
                        builder.insert(name.to_string(), data);
                        stats.files_copied += 1;
                    }
                }
                counter.step();
            }
        }
    }

    let mut exported = Vec::new();
    if settings.combine_packs {
        if !combined.is_empty() {
            exported.push(ExportedPack {
                file_name: COMBINED_PACK_NAME.to_string(),
                data: write_zip(&combined.files, settings.compression_level)?,
            });
        }
    } else {
        for (file_name, builder) in outputs {
            exported.push(ExportedPack {
                file_name,
                data: write_zip(&builder.files, settings.compression_level)?,
            });
        }
    }

    log::info!(
        "exported {} archive(s), {} file(s) copied through",
        exported.len(),
        stats.files_copied
    );
    Ok(exported)
}

fn write_zip(files: &[(String, Vec<u8>)], level: u32) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = if level == 0 {
        FileOptions::default().compression_method(CompressionMethod::Stored)
    } else {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level as i32))
    }
    .unix_permissions(0o644);

    for (name, data) in files {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(data)?;
    }
    Ok(zip.finish()?.into_inner())
}
