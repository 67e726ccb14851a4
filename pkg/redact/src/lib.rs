//! Field redaction for decoded objects.
//!
//! A path is a list of keys separated by `.`. A key wrapped in `[...]` may
//! contain `.`, `:`, `/` and `*` literally, which is how annotation and
//! label keys are addressed:
//!
//! ```text
//! metadata.annotations[kubectl.kubernetes.io/last-applied-configuration]
//! ```
//!
//! There is no escape for a literal `]` inside brackets.
//!
//! Resolution is best-effort: a missing key, or an intermediate value that
//! is not a map, stops the walk without error. Exclusion lists are shared
//! by objects of different shapes.

use serde_json::{Map, Value};

/// Split a path expression into keys.
///
/// `.` outside brackets ends a key, `[` and `]` toggle bracket mode and also
/// end a key. Empty keys are dropped.
pub fn parse_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;

    for c in path.chars() {
        match c {
            '.' if !in_brackets => flush(&mut current, &mut segments),
            '[' => {
                in_brackets = true;
                flush(&mut current, &mut segments);
            }
            ']' => {
                in_brackets = false;
                flush(&mut current, &mut segments);
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut segments);
    segments
}

fn flush(current: &mut String, segments: &mut Vec<String>) {
    if !current.is_empty() {
        segments.push(std::mem::take(current));
    }
}

/// Delete the field addressed by `path` from `object`. Idempotent.
pub fn redact(object: &mut Map<String, Value>, path: &str) {
    let segments = parse_path(path);
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = object;
    for segment in parents {
        match current.get_mut(segment) {
            Some(Value::Object(next)) => current = next,
            _ => return,
        }
    }
    current.shift_remove(last);
}

/// Apply every path in `paths` to `object`. Non-map values are left untouched.
pub fn redact_all<S: AsRef<str>>(object: &mut Value, paths: &[S]) {
    if let Value::Object(map) = object {
        for path in paths {
            redact(map, path.as_ref());
        }
    }
}
