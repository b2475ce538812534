//! Reflection-free config binding.
//!
//! Rust has no runtime reflection, so where `original_source/bind.go` walks
//! struct fields with `reflect`, callers here implement [`Bindable`]: a
//! small visitor enumerating `(path, tags, getter, setter)` triples. The
//! contract this module promises is the original's: precedence order
//! `default < env < flag < registry`(KV), applied at bind time for the
//! first three sources and on every refresh for the KV source.

pub mod flags;
pub mod refresh;

use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Caller-supplied lock a [`BoundConfig`] acquires for the entire mutation
/// pass of one refresh cycle, mirroring the `Lock`/`Unlock` contract
/// `original_source/bind.go` expects of its target struct. Rust guards don't
/// travel well across an explicit `Unlock` call, so the contract is
/// expressed as a scoped callback: `locked` acquires, runs `body`, and
/// releases on return — the refresher calls it once per config and does all
/// of that config's item mutations inside `body`, so a reader taking the
/// same lock never observes a partially-applied batch.
pub trait ConfigLock: Send + Sync {
    fn locked(&self, body: &mut dyn FnMut());
}

impl ConfigLock for std::sync::Mutex<()> {
    fn locked(&self, body: &mut dyn FnMut()) {
        let _guard = self.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        body();
    }
}

/// A private, config-local lock for callers with no broader lock of their
/// own to share.
pub fn default_lock() -> Arc<dyn ConfigLock> {
    Arc::new(std::sync::Mutex::new(()))
}

/// Scalar kinds [`Bindable::fields`] can declare; covers SPEC_FULL.md §4.7's
/// supported type list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Bool,
    Duration,
    StringList,
    IntList,
}

/// A bound field's current value, used both to set the field and to
/// deep-compare on refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
    F32(f32),
    F64(f64),
    Bool(bool),
    Duration(Duration),
    StringList(Vec<String>),
    IntList(Vec<i64>),
}

/// Parses `raw` into a [`FieldValue`] of the given `kind`.
pub fn parse_value(path: &str, kind: FieldKind, raw: &str) -> Result<FieldValue> {
    let parse_err = |message: String| Error::Parse { path: path.to_string(), message };

    Ok(match kind {
        FieldKind::String => FieldValue::String(raw.to_string()),
        FieldKind::I8 => FieldValue::I8(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::I16 => FieldValue::I16(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::I32 => FieldValue::I32(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::I64 => FieldValue::I64(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::Isize => FieldValue::Isize(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::U8 => FieldValue::U8(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::U16 => FieldValue::U16(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::U32 => FieldValue::U32(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::U64 => FieldValue::U64(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::Usize => FieldValue::Usize(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::F32 => FieldValue::F32(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::F64 => FieldValue::F64(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::Bool => FieldValue::Bool(raw.parse().map_err(|e| parse_err(format!("{e}")))?),
        FieldKind::Duration => FieldValue::Duration(parse_duration(raw).map_err(|e| parse_err(e))?),
        FieldKind::StringList => FieldValue::StringList(raw.split(',').map(str::to_string).collect()),
        FieldKind::IntList => FieldValue::IntList(
            raw.split(',')
                .map(|s| s.trim().parse::<i64>().map_err(|e| format!("{e}")))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(parse_err)?,
        ),
    })
}

/// Parses a duration literal like `30s`, `5m`, `1h`, or a bare integer
/// (seconds).
fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    let raw = raw.trim();
    let (number, unit) = match raw.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: f64 = number.parse().map_err(|_| format!("invalid duration {raw}"))?;
    let seconds = match unit {
        "" | "s" => value,
        "ms" => value / 1000.0,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unknown duration unit {other}")),
    };
    Ok(Duration::from_secs_f64(seconds.max(0.0)))
}

/// One bindable field: the tag set from SPEC_FULL.md §4.7, plus the
/// getter/setter pair a [`Bindable`] implementation supplies in place of a
/// reflective field reference.
pub struct FieldSpec {
    pub path: String,
    pub kind: FieldKind,
    pub default: Option<String>,
    pub env: Option<String>,
    pub flag: Option<String>,
    pub registry_key: Option<String>,
    pub get: Box<dyn Fn() -> FieldValue + Send + Sync>,
    pub set: Box<dyn Fn(FieldValue) + Send + Sync>,
}

impl std::fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("registry_key", &self.registry_key)
            .finish()
    }
}

/// Implemented by config structs that want to participate in binding.
/// Stands in for the original's reflective struct walk: each field the
/// struct wants bound is enumerated explicitly, with its tag set and a
/// getter/setter pair instead of a `reflect.Value`.
pub trait Bindable {
    fn fields(&self) -> Vec<FieldSpec>;
}

/// One resolved, bound field: the registry key it tracks (if any) and the
/// last value applied, used by the refresher to detect changes.
pub(crate) struct BoundItem {
    pub path: String,
    pub registry_key: Option<String>,
    pub kind: FieldKind,
    pub set: Box<dyn Fn(FieldValue) + Send + Sync>,
    pub get: Box<dyn Fn() -> FieldValue + Send + Sync>,
}

/// Resolves `field`'s raw value with precedence `default < env < flag`,
/// then parses and applies it. Returns the field's registry key (if any)
/// and a [`BoundItem`] ready for the refresher.
fn bind_field(field: FieldSpec, argv: &[String]) -> Result<BoundItem> {
    let mut raw = field.default.clone().unwrap_or_default();

    if let Some(env_name) = &field.env {
        if let Ok(value) = std::env::var(env_name) {
            if !value.is_empty() {
                raw = value;
            }
        }
    }

    if let Some(flag_name) = &field.flag {
        if let Some(value) = flags::lookup(argv, flag_name) {
            if !value.is_empty() {
                raw = value;
            }
        }
    }

    if !raw.is_empty() {
        let value = parse_value(&field.path, field.kind, &raw)?;
        (field.set)(value);
    }

    Ok(BoundItem {
        path: field.path,
        registry_key: field.registry_key,
        kind: field.kind,
        set: field.set,
        get: field.get,
    })
}

/// One bound config instance: its identity, its resolved items, the
/// registered `OnUpdate<Field>` hooks, and the lock the refresher holds for
/// the whole of each mutation pass.
pub struct BoundConfig {
    pub(crate) ident: String,
    pub(crate) items: Vec<BoundItem>,
    pub(crate) on_update: std::collections::HashMap<String, Box<dyn Fn() + Send + Sync>>,
    pub(crate) lock: Arc<dyn ConfigLock>,
}

impl BoundConfig {
    /// Binds `target`'s fields: resolves default/env/flag precedence for
    /// each, applying the result immediately. Items carrying a non-empty
    /// `registry` tag are retained for the refresh cycle.
    ///
    /// `lock` is acquired by the refresher around the entire per-config
    /// mutation pass (see [`crate::config::refresh::refresh_once`]); pass
    /// [`default_lock`] if the target has no lock of its own to share.
    pub fn bind(ident: impl Into<String>, target: &dyn Bindable, argv: &[String], lock: Arc<dyn ConfigLock>) -> Result<Self> {
        let mut items = Vec::new();
        for field in target.fields() {
            items.push(bind_field(field, argv)?);
        }
        Ok(Self { ident: ident.into(), items, on_update: std::collections::HashMap::new(), lock })
    }

    /// Registers a hook invoked after `field_path` is updated by a refresh.
    /// Stands in for the original's reflective `OnUpdate<FieldName>` method
    /// lookup — callers name the field and supply the method directly.
    pub fn on_update(&mut self, field_path: impl Into<String>, hook: impl Fn() + Send + Sync + 'static) {
        self.on_update.insert(field_path.into(), Box::new(hook));
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub(crate) fn registry_keys(&self) -> Vec<&str> {
        self.items.iter().filter_map(|i| i.registry_key.as_deref()).collect()
    }
}
