//! Typed datapack configuration (`dpconfig.json`).
//!
//! The configuration is parsed once, eagerly, into typed structures. Broken
//! transformers and meta blocks fail the load; invalid accessors and unknown
//! widget types are dropped with a warning and the rest of the configuration
//! stays usable.

use crate::edit::{EditMethod, ScalarValue};
use crate::error::{Error, Result};
use crate::transform::Transformer;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct PackConfig {
    pub meta: ConfigMeta,
    pub widgets: Vec<Widget>,
    pub methods: BTreeMap<String, MethodDef>,
}

#[derive(Debug, Clone)]
pub struct ConfigMeta {
    pub ver: u32,
    pub tab: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Title,
    Heading,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Int,
    Percent,
    Float,
}

/// Value block of a number/slider widget.
#[derive(Debug, Clone)]
pub struct NumberSpec {
    pub kind: NumberKind,
    pub default: f64,
    pub range: Option<(f64, f64)>,
    pub step: Option<f64>,
    pub suffix: Option<String>,
    pub decimals: Option<u32>,
}

/// Method and slot names an input widget feeds.
#[derive(Debug, Clone, Default)]
pub struct MethodBinding {
    pub methods: Vec<String>,
    pub slots: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Widget {
    Text {
        kind: TextKind,
        text: String,
    },
    Image {
        file: String,
        width: Option<f64>,
        height: Option<f64>,
    },
    Number {
        text: String,
        binding: MethodBinding,
        value: NumberSpec,
    },
    Slider {
        text: String,
        binding: MethodBinding,
        value: NumberSpec,
    },
    Switch {
        text: String,
        binding: MethodBinding,
        default_on: bool,
        enabled_text: Option<String>,
        disabled_text: Option<String>,
    },
}

impl Widget {
    pub fn binding(&self) -> Option<&MethodBinding> {
        match self {
            Widget::Number { binding, .. }
            | Widget::Slider { binding, .. }
            | Widget::Switch { binding, .. } => Some(binding),
            _ => None,
        }
    }

    /// The value the widget reports when the user has not touched it.
    pub fn default_value(&self) -> Option<ScalarValue> {
        match self {
            Widget::Number { value, .. } | Widget::Slider { value, .. } => {
                Some(ScalarValue::Number(value.default))
            }
            Widget::Switch { default_on, .. } => Some(ScalarValue::Bool(*default_on)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub transformer: Transformer,
    pub accessors: Vec<Accessor>,
}

#[derive(Debug, Clone)]
pub struct Accessor {
    pub method: EditMethod,
    pub file_paths: Vec<String>,
    pub value_path: String,
    /// Per-accessor override of the method-level transformer.
    pub transformer: Option<Transformer>,
}

impl PackConfig {
    /// Parses a configuration document. `pack` is only used for error and
    /// log attribution.
    pub fn parse(pack: &str, raw: &serde_json::Value) -> Result<PackConfig> {
        // Some packs nest the definition under a top-level "config" key.
        let root = raw.get("config").filter(|c| c.is_object()).unwrap_or(raw);

        let meta = parse_meta(pack, root.get("meta"))?;

        let mut widgets = Vec::new();
        if let Some(list) = root.get("widgets").and_then(|w| w.as_array()) {
            for (index, entry) in list.iter().enumerate() {
                match parse_widget(entry) {
                    Some(w) => widgets.push(w),
                    None => log::warn!(
                        "[{}] skipping widget #{}: unrecognized definition",
                        pack,
                        index
                    ),
                }
            }
        }

        let mut methods = BTreeMap::new();
        if let Some(map) = root.get("methods").and_then(|m| m.as_object()) {
            for (name, entry) in map {
                methods.insert(name.clone(), parse_method(pack, name, entry)?);
            }
        }

        Ok(PackConfig {
            meta,
            widgets,
            methods,
        })
    }

    /// Filters a raw `{method -> value}` map down to the methods whose value
    /// differs from the defining widget's default. A method left at its
    /// default enqueues nothing.
    pub fn active_inputs(
        &self,
        raw: &HashMap<String, ScalarValue>,
    ) -> HashMap<String, ScalarValue> {
        let mut out = raw.clone();
        for widget in &self.widgets {
            let (Some(binding), Some(default)) = (widget.binding(), widget.default_value()) else {
                continue;
            };
            for method in &binding.methods {
                if out.get(method) == Some(&default) {
                    log::debug!("method \"{}\" left at its default, skipping", method);
                    out.remove(method);
                }
            }
        }
        out
    }
}

fn parse_meta(pack: &str, raw: Option<&serde_json::Value>) -> Result<ConfigMeta> {
    let bad = |reason: &str| Error::BadConfig {
        pack: pack.to_string(),
        reason: reason.to_string(),
    };
    let meta = raw.and_then(|m| m.as_object()).ok_or_else(|| bad("missing meta block"))?;
    let ver = meta
        .get("ver")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| bad("meta.ver is missing"))?;
    if ver != 1 && ver != 2 {
        return Err(bad(&format!("unsupported meta.ver {}", ver)));
    }
    let tab = meta
        .get("tab")
        .and_then(|t| t.as_str())
        .ok_or_else(|| bad("meta.tab is missing"))?
        .to_string();
    let id = meta
        .get("id")
        .and_then(|i| i.as_str())
        .map(|s| s.to_string());
    Ok(ConfigMeta {
        ver: ver as u32,
        tab,
        id,
    })
}

fn parse_widget(raw: &serde_json::Value) -> Option<Widget> {
    let obj = raw.as_object()?;
    let text = obj
        .get("text")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();

    match obj.get("type").and_then(|t| t.as_str())? {
        "title" => Some(Widget::Text {
            kind: TextKind::Title,
            text,
        }),
        "heading" => Some(Widget::Text {
            kind: TextKind::Heading,
            text,
        }),
        "text" => Some(Widget::Text {
            kind: TextKind::Text,
            text,
        }),
        "image" => Some(Widget::Image {
            file: obj.get("file").and_then(|f| f.as_str())?.to_string(),
            width: dimension(obj.get("width")),
            height: dimension(obj.get("height")),
        }),
        // "value" is the v1 spelling of the number widget
        "number" | "value" => Some(Widget::Number {
            text,
            binding: parse_binding(obj),
            value: parse_number_spec(obj.get("value"))?,
        }),
        "slider" => Some(Widget::Slider {
            text,
            binding: parse_binding(obj),
            value: parse_number_spec(obj.get("value"))?,
        }),
        "switch" => {
            // v2 keeps the default under value.default, v1 uses a
            // widget-level "enabled"/"disabled" string
            let default_on = obj
                .get("value")
                .and_then(|v| v.get("default"))
                .and_then(|d| d.as_bool())
                .unwrap_or_else(|| {
                    obj.get("default").and_then(|d| d.as_str()) != Some("disabled")
                });
            Some(Widget::Switch {
                text,
                binding: parse_binding(obj),
                default_on,
                enabled_text: string_member(obj, "enabled_text"),
                disabled_text: string_member(obj, "disabled_text"),
            })
        }
        _ => None,
    }
}

fn parse_binding(obj: &serde_json::Map<String, serde_json::Value>) -> MethodBinding {
    let mut binding = MethodBinding::default();
    if let Some(m) = obj.get("method").and_then(|m| m.as_str()) {
        binding.methods.push(m.to_string());
    }
    if let Some(list) = obj.get("methods").and_then(|m| m.as_array()) {
        for m in list.iter().filter_map(|m| m.as_str()) {
            binding.methods.push(m.to_string());
        }
    }
    binding.slots = name_or_list(obj.get("slots"));
    binding
}

fn parse_number_spec(raw: Option<&serde_json::Value>) -> Option<NumberSpec> {
    let obj = raw?.as_object()?;
    let kind = match obj.get("type").and_then(|t| t.as_str()) {
        Some("int") => NumberKind::Int,
        Some("percent") => NumberKind::Percent,
        _ => NumberKind::Float,
    };
    let range = obj.get("range").and_then(|r| r.as_array()).and_then(|r| {
        match (r.first().and_then(|v| v.as_f64()), r.get(1).and_then(|v| v.as_f64())) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        }
    });
    Some(NumberSpec {
        kind,
        default: obj.get("default").and_then(|d| d.as_f64()).unwrap_or(0.0),
        range,
        step: obj.get("step").and_then(|s| s.as_f64()),
        suffix: obj.get("suffix").and_then(|s| s.as_str()).map(String::from),
        decimals: obj.get("decimals").and_then(|d| d.as_u64()).map(|d| d as u32),
    })
}

fn parse_method(pack: &str, name: &str, raw: &serde_json::Value) -> Result<MethodDef> {
    let obj = raw.as_object().ok_or_else(|| Error::BadConfig {
        pack: pack.to_string(),
        reason: format!("method \"{}\" is not an object", name),
    })?;
    // older packs spell "transformer" as "value"
    let transformer =
        Transformer::parse(obj.get("transformer").or_else(|| obj.get("value")).unwrap_or(
            &serde_json::Value::Null,
        ))?;

    let mut accessors = Vec::new();
    if let Some(list) = obj.get("accessors").and_then(|a| a.as_array()) {
        for (index, entry) in list.iter().enumerate() {
            match parse_accessor(entry)? {
                Some(a) => accessors.push(a),
                None => log::warn!(
                    "[{}] dropping invalid accessor #{} of method \"{}\"",
                    pack,
                    index,
                    name
                ),
            }
        }
    }
    Ok(MethodDef {
        transformer,
        accessors,
    })
}

/// `Ok(None)` means the accessor is malformed and must be dropped; broken
/// transformer overrides are still load errors.
fn parse_accessor(raw: &serde_json::Value) -> Result<Option<Accessor>> {
    let Some(obj) = raw.as_object() else {
        return Ok(None);
    };
    let Some(method) = obj
        .get("method")
        .and_then(|m| m.as_str())
        .and_then(EditMethod::parse)
    else {
        return Ok(None);
    };
    let file_paths = name_or_list(obj.get("file_path"));
    if file_paths.is_empty() {
        return Ok(None);
    }
    let Some(value_path) = obj.get("value_path").and_then(|p| p.as_str()) else {
        return Ok(None);
    };
    let transformer = match obj.get("value") {
        Some(raw) => Some(Transformer::parse(raw)?),
        None => None,
    };
    Ok(Some(Accessor {
        method,
        file_paths,
        value_path: value_path.to_string(),
        transformer,
    }))
}

fn name_or_list(raw: Option<&serde_json::Value>) -> Vec<String> {
    match raw {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(list)) => list
            .iter()
            .filter_map(|v| v.as_str())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn string_member(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn dimension(raw: Option<&serde_json::Value>) -> Option<f64> {
    match raw? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
