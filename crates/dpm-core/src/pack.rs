use crate::config::PackConfig;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Capabilities detected from a pack's file listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Module {
    StructureSet,
    Biome,
    Overworld,
    DpConfig,
}

const MODULE_MATCHERS: &[(&str, Module)] = &[
    ("/structure_set/", Module::StructureSet),
    ("/worldgen/biome/", Module::Biome),
    ("minecraft/dimension/overworld.json", Module::Overworld),
    ("dpconfig.json", Module::DpConfig),
];

#[derive(Debug, Clone)]
pub enum PackDescription {
    Plain(String),
    /// Rich text as a list of colored fragments.
    Rich(Vec<DescriptionFragment>),
}

#[derive(Debug, Clone)]
pub struct DescriptionFragment {
    pub text: String,
    pub color: Option<String>,
}

impl PackDescription {
    /// Flattens the description to displayable text.
    pub fn display(&self) -> String {
        match self {
            PackDescription::Plain(s) => s.clone(),
            PackDescription::Rich(fragments) => {
                fragments.iter().map(|f| f.text.as_str()).collect()
            }
        }
    }
}

/// A loaded datapack: identity from `pack.mcmeta` plus the full entry list,
/// held in archive order. Entry order is the listing order used when
/// resolving suffix patterns.
#[derive(Debug)]
pub struct Datapack {
    pub id: String,
    pub name: String,
    pub description: PackDescription,
    pub file_name: String,
    pub icon: Option<Vec<u8>>,
    pub mcmeta: serde_json::Value,
    pub config: Option<PackConfig>,
    pub modules: BTreeSet<Module>,
    entries: Vec<(String, Vec<u8>)>,
}

impl Datapack {
    pub fn load_path(path: &Path) -> Result<Datapack> {
        let data = fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("datapack.zip");
        Datapack::from_bytes(file_name, &data)
    }

    pub fn from_bytes(file_name: &str, data: &[u8]) -> Result<Datapack> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().replace('\\', "/");
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut content)?;
            entries.push((name, content));
        }

        let mcmeta_bytes = entries
            .iter()
            .find(|(name, _)| name == "pack.mcmeta")
            .map(|(_, data)| data.as_slice())
            .ok_or_else(|| Error::NotADatapack {
                path: file_name.to_string(),
            })?;
        let mcmeta: serde_json::Value =
            serde_json::from_slice(mcmeta_bytes).map_err(|source| Error::MalformedJson {
                pack: file_name.to_string(),
                file: "pack.mcmeta".to_string(),
                source,
            })?;

        let pack_section = mcmeta.get("pack");
        let id = pack_section
            .and_then(|p| p.get("id"))
            .and_then(|v| v.as_str())
            .unwrap_or(file_name)
            .to_string();
        let name = pack_section
            .and_then(|p| p.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or(file_name)
            .to_string();
        let description = parse_description(pack_section.and_then(|p| p.get("description")));

        let icon = entries
            .iter()
            .find(|(name, _)| name == "pack.png")
            .map(|(_, data)| data.clone());

        let mut modules = BTreeSet::new();
        for (name, _) in &entries {
            for (pattern, module) in MODULE_MATCHERS {
                if name.contains(pattern) {
                    modules.insert(*module);
                }
            }
        }

        let config_entry = entries
            .iter()
            .find(|(name, _)| name == "dpconfig.json")
            .map(|(_, data)| data.as_slice());
        let config = match config_entry {
            Some(raw) => {
                let parsed: serde_json::Value =
                    serde_json::from_slice(raw).map_err(|source| Error::MalformedJson {
                        pack: id.clone(),
                        file: "dpconfig.json".to_string(),
                        source,
                    })?;
                Some(PackConfig::parse(&id, &parsed)?)
            }
            None => None,
        };

        log::info!(
            "loaded pack \"{}\" ({} files, modules: {:?})",
            id,
            entries.len(),
            modules
        );

        Ok(Datapack {
            id,
            name,
            description,
            file_name: file_name.to_string(),
            icon,
            mcmeta,
            config,
            modules,
            entries,
        })
    }

    /// Entry names in archive order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, data)| data.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(entry, _)| entry == name)
    }

    pub fn file_count(&self) -> usize {
        self.entries.len()
    }
}

fn parse_description(raw: Option<&serde_json::Value>) -> PackDescription {
    match raw {
        Some(serde_json::Value::String(s)) => PackDescription::Plain(s.clone()),
        Some(serde_json::Value::Array(list)) => PackDescription::Rich(
            list.iter()
                .filter_map(|entry| {
                    let text = entry.get("text")?.as_str()?.to_string();
                    let color = entry
                        .get("color")
                        .and_then(|c| c.as_str())
                        .map(String::from);
                    Some(DescriptionFragment { text, color })
                })
                .collect(),
        ),
        _ => PackDescription::Plain(String::new()),
    }
}

/// Loaded packs keyed by id, in insertion order. Adding a pack whose id is
/// already present is a no-op.
#[derive(Default)]
pub struct PackStore {
    packs: Vec<Datapack>,
}

impl PackStore {
    pub fn new() -> PackStore {
        PackStore::default()
    }

    pub fn add(&mut self, pack: Datapack) -> bool {
        if self.packs.iter().any(|p| p.id == pack.id) {
            log::debug!("pack \"{}\" already in store", pack.id);
            return false;
        }
        self.packs.push(pack);
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.packs.len();
        self.packs.retain(|p| p.id != id);
        self.packs.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&Datapack> {
        self.packs.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Datapack> {
        self.packs.iter()
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}

/// Recursively collects `.zip` files under a directory, sorted.
pub fn find_pack_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).into_iter().flatten() {
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
        {
            out.push(path.to_path_buf());
        }
    }
    out.sort();
    out
}
