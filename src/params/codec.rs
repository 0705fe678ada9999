//! Translation between raw device text and typed parameter values.
//!
//! This layer is pure: it owns no I/O and operates only on lines already
//! framed out of the device stream.

use super::{
    spec_for, EncodeError, ParamKind, ParamValue, ParameterEntry, ParameterSpec, ParameterTable,
};

/// Split a raw device line into (name, value).
///
/// Whitespace is stripped, anything after a `;` is a comment, and anything
/// after a second `=` is ignored. Returns `None` for lines that do not parse
/// as `name=value`.
pub fn split_line(line: &str) -> Option<(String, String)> {
    let stripped: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    let (name, rest) = stripped.split_once('=')?;
    if name.is_empty() {
        return None;
    }
    let value = rest
        .split('=')
        .next()
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("");
    Some((name.to_string(), value.to_string()))
}

/// Snap `val` to the closest key of a sparse table.
///
/// An exact key is returned unchanged. Values above the highest key clamp to
/// it. Between two keys the numerically closer one wins; on a tie the lower
/// key is chosen.
pub fn nearest_key(val: i64, table: &[(i64, &str)]) -> Option<i64> {
    if table.iter().any(|(k, _)| *k == val) {
        return Some(val);
    }

    let mut keys: Vec<i64> = table.iter().map(|(k, _)| *k).collect();
    keys.sort_unstable();
    let highest = *keys.last()?;
    if val > highest {
        return Some(highest);
    }

    // Walk to the highest key below the value, then compare the bracketing
    // pair. The upper key wins only when strictly closer.
    let mut index = 0;
    while index + 1 < keys.len() && keys[index + 1] < val {
        index += 1;
    }
    if index + 1 >= keys.len() {
        return Some(keys[index]);
    }
    if keys[index + 1] - val < val - keys[index] {
        Some(keys[index + 1])
    } else {
        Some(keys[index])
    }
}

/// Decode one raw value against its spec.
///
/// Returns the decoded value and whether the entry starts out modified
/// (the device held an off-table value the codec had to normalize).
fn decode_value(spec: &ParameterSpec, raw: &str) -> Option<(ParamValue, bool)> {
    match spec.kind {
        ParamKind::PlainString => Some((ParamValue::Text(raw.to_string()), false)),
        ParamKind::IndexedEnumHex(options) => {
            let digits = raw.strip_prefix("0x").unwrap_or(raw);
            let index = usize::from_str_radix(digits, 16).ok()?;
            let label = options.get(index)?;
            Some((
                ParamValue::Choice {
                    index,
                    label: label.to_string(),
                },
                false,
            ))
        }
        ParamKind::IndexedEnumDecimal(options) => {
            let index: usize = raw.parse().ok()?;
            let label = options.get(index)?;
            Some((
                ParamValue::Choice {
                    index,
                    label: label.to_string(),
                },
                false,
            ))
        }
        ParamKind::NearestMatchTable(table) => {
            let val: i64 = raw.parse().ok()?;
            let key = nearest_key(val, table)?;
            let label = table.iter().find(|(k, _)| *k == key).map(|(_, l)| *l)?;
            // An off-table value was silently normalized; surface that as a
            // pending modification rather than hiding it.
            Some((
                ParamValue::TableEntry {
                    key,
                    label: label.to_string(),
                },
                key != val,
            ))
        }
    }
}

/// Decode raw config lines into an ordered parameter table.
///
/// Malformed lines are dropped. Outside advanced mode, names absent from the
/// schema are skipped, and the table is cut short when the first parameter
/// name repeats (the device dumps its table cyclically). Advanced mode keeps
/// every parseable line as plain text for diagnostic visibility.
pub fn decode_table(lines: &[String], advanced: bool) -> ParameterTable {
    let mut entries: Vec<ParameterEntry> = Vec::new();

    for line in lines {
        let Some((name, raw)) = split_line(line) else {
            continue;
        };

        if advanced {
            entries.push(ParameterEntry {
                name,
                value: ParamValue::Text(raw.clone()),
                raw,
                modified: false,
            });
            continue;
        }

        let Some(spec) = spec_for(&name) else {
            log::debug!("Skipping unknown parameter {}", name);
            continue;
        };
        if entries.first().map(|e| e.name == name).unwrap_or(false) {
            break;
        }
        match decode_value(spec, &raw) {
            Some((value, modified)) => entries.push(ParameterEntry {
                name,
                raw,
                value,
                modified,
            }),
            None => log::debug!("Could not decode {}={}", name, raw),
        }
    }

    ParameterTable { entries }
}

/// Re-encode an edited entry into the device's value syntax.
pub fn encode_entry(entry: &ParameterEntry) -> Result<String, EncodeError> {
    let fail = |reason: &str| EncodeError {
        name: entry.name.clone(),
        reason: reason.to_string(),
    };

    match &entry.value {
        // Plain strings (and everything in advanced mode) go out verbatim.
        ParamValue::Text(text) => Ok(text.clone()),
        ParamValue::Choice { index, .. } => {
            let spec = spec_for(&entry.name).ok_or_else(|| fail("not in schema"))?;
            match spec.kind {
                ParamKind::IndexedEnumHex(options) => {
                    if *index >= options.len() {
                        return Err(fail("option index out of range"));
                    }
                    Ok(format!("0x{:X}", index))
                }
                ParamKind::IndexedEnumDecimal(options) => {
                    if *index >= options.len() {
                        return Err(fail("option index out of range"));
                    }
                    Ok(index.to_string())
                }
                _ => Err(fail("value does not match parameter kind")),
            }
        }
        ParamValue::TableEntry { label, .. } => {
            let spec = spec_for(&entry.name).ok_or_else(|| fail("not in schema"))?;
            let ParamKind::NearestMatchTable(table) = spec.kind else {
                return Err(fail("value does not match parameter kind"));
            };
            let key = table
                .iter()
                .find(|(_, l)| *l == label.as_str())
                .map(|(k, _)| *k)
                .ok_or_else(|| fail("label not in table"))?;
            Ok(format!("+{}", key))
        }
    }
}
