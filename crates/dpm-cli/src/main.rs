use clap::{Args as ClapArgs, Parser, Subcommand};
use dpm_core::{
    Datapack, ExportSettings, Modifier, PackStore, Progress, ScalarValue, Widget,
    compression_level_or_default, find_pack_files,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "dpm-cli",
    about = "Apply configurable edits to zip-packaged datapacks and export the results",
    version
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show pack identity and detected modules
    Info(PacksArgs),
    /// List the files inside a pack
    List(PackArgs),
    /// Show the configuration widgets and methods of a pack
    Widgets(PackArgs),
    /// Apply input values through pack configurations and export archives
    Export(ExportArgs),
}

#[derive(ClapArgs, Debug)]
struct PacksArgs {
    /// Pack zip files, or directories to scan for them
    paths: Vec<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct PackArgs {
    /// Pack zip file
    path: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct ExportArgs {
    /// Pack zip files, or directories to scan for them
    paths: Vec<PathBuf>,
    /// JSON file with input values, e.g. {"method_name": 10}
    #[arg(long)]
    values: Option<PathBuf>,
    /// JSON file with named slot values
    #[arg(long)]
    slots: Option<PathBuf>,
    /// Compression level 0-9 (0 = store only)
    #[arg(long, default_value_t = 6)]
    level: i64,
    /// Only include files touched by a change
    #[arg(long, default_value_t = false)]
    modified_only: bool,
    /// Merge all packs into one output archive
    #[arg(long, default_value_t = false)]
    combine: bool,
    /// Output directory (defaults to a timestamped export-... directory)
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Info(a) => cmd_info(a),
        Cmd::List(a) => cmd_list(a),
        Cmd::Widgets(a) => cmd_widgets(a),
        Cmd::Export(a) => cmd_export(a),
    }
}

fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for p in paths {
        if p.is_dir() {
            out.extend(find_pack_files(p));
        } else {
            out.push(p.clone());
        }
    }
    out
}

fn load_store(paths: &[PathBuf]) -> PackStore {
    let mut store = PackStore::new();
    for path in expand_paths(paths) {
        match Datapack::load_path(&path) {
            Ok(pack) => {
                store.add(pack);
            }
            Err(e) => {
                eprintln!("error loading {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
    }
    if store.is_empty() {
        eprintln!("no packs loaded");
        std::process::exit(2);
    }
    store
}

fn cmd_info(args: PacksArgs) {
    let store = load_store(&args.paths);
    for pack in store.iter() {
        println!("{}", pack.id);
        println!("  name: {}", pack.name);
        println!("  description: {}", pack.description.display());
        println!("  files: {}", pack.file_count());
        println!("  modules: {:?}", pack.modules);
    }
}

fn cmd_list(args: PackArgs) {
    let pack = Datapack::load_path(&args.path).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(2);
    });
    for name in pack.file_names() {
        println!("{}", name);
    }
}

fn cmd_widgets(args: PackArgs) {
    let pack = Datapack::load_path(&args.path).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(2);
    });
    let Some(config) = &pack.config else {
        eprintln!("pack \"{}\" has no configuration", pack.id);
        std::process::exit(3);
    };

    println!("tab: {} (ver {})", config.meta.tab, config.meta.ver);
    for widget in &config.widgets {
        match widget {
            Widget::Text { kind, text } => println!("{:?}: {}", kind, text),
            Widget::Image { file, .. } => println!("Image: {}", file),
            Widget::Number { text, binding, value } | Widget::Slider { text, binding, value } => {
                println!(
                    "Input: {}\tdefault={}\tmethods={:?}",
                    text, value.default, binding.methods
                );
            }
            Widget::Switch {
                text,
                binding,
                default_on,
                ..
            } => {
                println!(
                    "Switch: {}\tdefault={}\tmethods={:?}",
                    text, default_on, binding.methods
                );
            }
        }
    }
    for (name, def) in &config.methods {
        println!("method {}: {} accessor(s)", name, def.accessors.len());
    }
}

/// Reports percent completion on stderr as the run advances.
struct StderrProgress {
    last_percent: u32,
}

impl Progress for StderrProgress {
    fn on_step(&mut self, done: usize, total: usize) {
        // total can still grow while copies are being planned, so the
        // percentage may briefly drop back
        let percent = (done * 100 / total.max(1)) as u32;
        if percent != self.last_percent {
            self.last_percent = percent;
            eprint!("\rexporting... {}%", percent);
        }
    }
}

fn cmd_export(args: ExportArgs) {
    let store = load_store(&args.paths);
    let values = read_scalar_map(args.values.as_deref());
    let slots = read_scalar_map(args.slots.as_deref());

    let mut modifier = Modifier::new();
    for pack in store.iter() {
        let Some(config) = &pack.config else {
            continue;
        };
        let active = config.active_inputs(&values);
        modifier.plan_changes(pack, &active, &slots);
    }
    if modifier.queue().is_empty() {
        eprintln!("nothing to do: no method has an active input");
        std::process::exit(3);
    }

    let settings = ExportSettings {
        compression_level: compression_level_or_default(Some(args.level)),
        modified_only: args.modified_only,
        combine_packs: args.combine,
    };

    let mut progress = StderrProgress { last_percent: 0 };
    let outputs = modifier
        .export(&store, &settings, &mut progress)
        .unwrap_or_else(|e| {
            eprintln!();
            eprintln!("export failed: {}", e);
            std::process::exit(4);
        });
    eprintln!();

    let out_dir = args.out.unwrap_or_else(|| {
        PathBuf::from(format!(
            "export-{}",
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        ))
    });
    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        eprintln!("error creating {}: {}", out_dir.display(), e);
        std::process::exit(5);
    }
    for output in outputs {
        let dest = out_dir.join(&output.file_name);
        if let Err(e) = std::fs::write(&dest, &output.data) {
            eprintln!("error writing {}: {}", dest.display(), e);
            std::process::exit(5);
        }
        println!("{}", dest.display());
    }

    let stats = modifier.stats();
    println!(
        "patched {} file(s), copied {} file(s) through",
        stats.files_patched, stats.files_copied
    );
}

fn read_scalar_map(path: Option<&Path>) -> HashMap<String, ScalarValue> {
    let Some(path) = path else {
        return HashMap::new();
    };
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error reading {}: {}", path.display(), e);
        std::process::exit(2);
    });
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("invalid JSON in {}: {}", path.display(), e);
        std::process::exit(3);
    });
    let Some(obj) = parsed.as_object() else {
        eprintln!("{}: expected a top-level JSON object", path.display());
        std::process::exit(3);
    };
    let mut out = HashMap::new();
    for (key, value) in obj {
        match ScalarValue::from_json(value) {
            Some(v) => {
                out.insert(key.clone(), v);
            }
            None => eprintln!("{}: ignoring non-scalar value for \"{}\"", path.display(), key),
        }
    }
    out
}
