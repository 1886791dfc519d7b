//! Environment overrides for [`Settings`].
//!
//! `{PREFIX}__PARSE__STRICT=true` sets `parse.strict`. Each variable under the
//! prefix must name a settings field (group and field matched without regard
//! to case), so a misspelled variable is an error instead of a silent no-op.
//! Values are typed after the field's compiled default.

use confique::Config;
use confique::meta::{Expr, FieldKind, LeafKind, Meta};
use toml::{Table, Value};

use crate::error::StanzaError;
use crate::settings::Settings;

/// A settings leaf and the path of field names leading to it.
struct EnvField {
    path: Vec<&'static str>,
    default: Option<Expr>,
}

impl EnvField {
    fn matches(&self, segments: &[&str]) -> bool {
        self.path.len() == segments.len()
            && self
                .path
                .iter()
                .zip(segments)
                .all(|(name, segment)| name.eq_ignore_ascii_case(segment))
    }

    /// Strings that do not fit the field's type are passed through as-is and
    /// rejected when the layer is deserialized.
    fn value(&self, raw: &str) -> Value {
        match self.default {
            Some(Expr::Bool(_)) if raw.eq_ignore_ascii_case("true") => Value::Boolean(true),
            Some(Expr::Bool(_)) if raw.eq_ignore_ascii_case("false") => Value::Boolean(false),
            Some(Expr::Integer(_)) => raw
                .parse()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            _ => Value::String(raw.to_string()),
        }
    }
}

fn leaf_fields(meta: &Meta, parent: &[&'static str], out: &mut Vec<EnvField>) {
    for field in meta.fields {
        let mut path = parent.to_vec();
        path.push(field.name);
        match field.kind {
            FieldKind::Leaf { kind, .. } => {
                let default = match kind {
                    LeafKind::Required { default } => default,
                    LeafKind::Optional => None,
                };
                out.push(EnvField { path, default });
            }
            FieldKind::Nested { meta } => leaf_fields(meta, &path, out),
        }
    }
}

/// Collect `{prefix}__GROUP__FIELD` variables into a settings table.
///
/// Variables outside the prefix are ignored. One that is inside it but names
/// no field fails with [`StanzaError::UnknownSetting`].
pub fn env_to_table(
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<Table, StanzaError> {
    let needle = format!("{prefix}__");
    let mut fields = Vec::new();
    leaf_fields(&Settings::META, &[], &mut fields);

    let mut table = Table::new();
    for (var, raw) in vars {
        let Some(rest) = var.strip_prefix(&needle) else {
            continue;
        };
        let segments: Vec<&str> = rest.split("__").collect();
        let Some(field) = fields.iter().find(|f| f.matches(&segments)) else {
            return Err(StanzaError::UnknownSetting { var });
        };
        insert_at(&mut table, &field.path, field.value(&raw));
    }
    Ok(table)
}

fn insert_at(table: &mut Table, path: &[&str], value: Value) {
    match path {
        [] => {}
        [leaf] => {
            table.insert(leaf.to_string(), value);
        }
        [group, rest @ ..] => {
            let sub = table
                .entry(group.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if let Value::Table(sub) = sub {
                insert_at(sub, rest, value);
            }
        }
    }
}
