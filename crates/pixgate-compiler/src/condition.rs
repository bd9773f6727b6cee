//! Condition-tree compilation
//!
//! Walks a condition JSON tree and produces a compiled [`Matcher`].
//! Composite nodes (`all` / `any` / `none`) are flattened when they nest a
//! combinator of the same kind and constant-folded (an `all` containing a
//! constant-false child collapses to constant false, empty lists fold to
//! their identity). Leaves are validated field by field; every problem is
//! recorded with its JSON path and compilation continues so one pass
//! reports everything.

use crate::error::{CompileErrorKind, CompileIssue};
use pixgate_core::matcher::{
    AmountCoerce, AmountRangeMatcher, DaySet, DebugMatcher, Matcher, MemberSet, RegexMatcher,
    RegexMode, StrCoerce, TimeWindowMatcher, ValueInMatcher,
};
use pixgate_core::Scalar;
use regex::RegexBuilder;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::str::FromStr;

/// Matcher debug-wrapping configuration, threaded down from the compiler
/// options.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DebugConfig {
    pub debug: bool,
    pub capture_ctx_keys: bool,
}

impl DebugConfig {
    fn wrap(&self, matcher: Matcher, path: &str) -> Matcher {
        if self.debug {
            Matcher::Debug(DebugMatcher::new(matcher, path, self.capture_ctx_keys))
        } else {
            matcher
        }
    }
}

/// Compile one condition node. Returns `None` when the node (or any child)
/// failed; the issues list then explains why.
pub(crate) fn compile_condition(
    node: &Value,
    path: &str,
    debug: DebugConfig,
    issues: &mut Vec<CompileIssue>,
) -> Option<Matcher> {
    let Some(obj) = node.as_object() else {
        issues.push(CompileIssue::new(
            path,
            CompileErrorKind::BadType,
            "condition node must be a JSON object",
        ));
        return None;
    };
    if obj.is_empty() {
        issues.push(CompileIssue::new(
            path,
            CompileErrorKind::BadType,
            "condition node must not be empty",
        ));
        return None;
    }

    let composites: Vec<&str> = ["all", "any", "none"]
        .into_iter()
        .filter(|k| obj.contains_key(*k))
        .collect();
    if composites.len() > 1 {
        issues.push(CompileIssue::new(
            path,
            CompileErrorKind::BadType,
            format!("ambiguous composite node: use only one of {composites:?}"),
        ));
        return None;
    }

    if let Some(&kind) = composites.first() {
        for key in obj.keys().filter(|k| k.as_str() != kind) {
            issues.push(CompileIssue::new(
                format!("{path}.{key}"),
                CompileErrorKind::UnknownField,
                format!("unexpected field next to '{kind}'"),
            ));
        }
        return compile_composite(kind, &obj[kind], path, debug, issues);
    }

    compile_leaf(obj, path, debug, issues)
}

fn compile_composite(
    kind: &str,
    children_node: &Value,
    path: &str,
    debug: DebugConfig,
    issues: &mut Vec<CompileIssue>,
) -> Option<Matcher> {
    let Some(raw_children) = children_node.as_array() else {
        issues.push(CompileIssue::new(
            format!("{path}.{kind}"),
            CompileErrorKind::BadType,
            format!("composite '{kind}' must be a list"),
        ));
        return None;
    };

    let mut children = Vec::with_capacity(raw_children.len());
    let mut failed = false;
    for (i, child) in raw_children.iter().enumerate() {
        let child_path = format!("{path}.{kind}[{i}]");
        match compile_condition(child, &child_path, debug, issues) {
            Some(m) => children.push(m),
            None => failed = true,
        }
    }
    if failed {
        return None;
    }

    let node = match kind {
        "all" => fold_all(flatten_all(children)),
        "any" => fold_any(flatten_any(children)),
        _ => fold_none(children),
    };
    Some(debug.wrap(node, path))
}

/// Collapse directly nested `All` children into their parent.
fn flatten_all(children: Vec<Matcher>) -> Vec<Matcher> {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Matcher::All(grand) => flat.extend(grand),
            other => flat.push(other),
        }
    }
    flat
}

/// Collapse directly nested `Any` children into their parent.
fn flatten_any(children: Vec<Matcher>) -> Vec<Matcher> {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Matcher::Any(grand) => flat.extend(grand),
            other => flat.push(other),
        }
    }
    flat
}

fn fold_all(children: Vec<Matcher>) -> Matcher {
    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Matcher::ConstFalse => return Matcher::ConstFalse,
            Matcher::ConstTrue => {}
            other => kept.push(other),
        }
    }
    match kept.len() {
        0 => Matcher::ConstTrue,
        1 => kept.into_iter().next().unwrap(),
        _ => Matcher::All(kept),
    }
}

fn fold_any(children: Vec<Matcher>) -> Matcher {
    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Matcher::ConstTrue => return Matcher::ConstTrue,
            Matcher::ConstFalse => {}
            other => kept.push(other),
        }
    }
    match kept.len() {
        0 => Matcher::ConstFalse,
        1 => kept.into_iter().next().unwrap(),
        _ => Matcher::Any(kept),
    }
}

fn fold_none(children: Vec<Matcher>) -> Matcher {
    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        match child {
            // A constant-true child makes the NONE unsatisfiable
            Matcher::ConstTrue => return Matcher::ConstFalse,
            Matcher::ConstFalse => {}
            other => kept.push(other),
        }
    }
    if kept.is_empty() {
        Matcher::ConstTrue
    } else {
        Matcher::NoneOf(kept)
    }
}

fn compile_leaf(
    obj: &Map<String, Value>,
    path: &str,
    debug: DebugConfig,
    issues: &mut Vec<CompileIssue>,
) -> Option<Matcher> {
    let type_tag = match obj.get("type") {
        Some(Value::String(t)) => t.as_str(),
        Some(_) => {
            issues.push(CompileIssue::new(
                format!("{path}.type"),
                CompileErrorKind::BadType,
                "'type' must be a string",
            ));
            return None;
        }
        None => {
            issues.push(CompileIssue::new(
                path,
                CompileErrorKind::MissingField,
                "leaf node requires a 'type'",
            ));
            return None;
        }
    };

    let matcher = match type_tag {
        "VALUE_IN" => compile_value_in(obj, path, issues),
        "REGEX" => compile_regex(obj, path, issues),
        "AMOUNT_RANGE" => compile_amount_range(obj, path, issues),
        "TIME_WINDOW" => compile_time_window(obj, path, issues),
        other => {
            issues.push(CompileIssue::new(
                format!("{path}.type"),
                CompileErrorKind::BadType,
                format!("unknown matcher type: {other:?}"),
            ));
            return None;
        }
    }?;
    Some(debug.wrap(matcher, path))
}

// ---- field helpers ---------------------------------------------------

fn reject_unknown_fields(
    obj: &Map<String, Value>,
    kind: &str,
    allowed: &[&str],
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> bool {
    let mut ok = true;
    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            issues.push(CompileIssue::new(
                format!("{path}.{key}"),
                CompileErrorKind::UnknownField,
                format!("field not accepted by {kind} nodes"),
            ));
            ok = false;
        }
    }
    ok
}

fn require_str<'v>(
    obj: &'v Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> Option<&'v str> {
    match obj.get(key) {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            issues.push(CompileIssue::new(
                format!("{path}.{key}"),
                CompileErrorKind::BadType,
                format!("'{key}' must be a string"),
            ));
            None
        }
        None => {
            issues.push(CompileIssue::new(
                path,
                CompileErrorKind::MissingField,
                format!("'{key}' is required"),
            ));
            None
        }
    }
}

/// Absent is fine (`Ok(None)`); present-but-wrong-type is an error (`Err`).
fn optional_str<'v>(
    obj: &'v Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> std::result::Result<Option<&'v str>, ()> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => {
            issues.push(CompileIssue::new(
                format!("{path}.{key}"),
                CompileErrorKind::BadType,
                format!("'{key}' must be a string"),
            ));
            Err(())
        }
    }
}

fn optional_bool(
    obj: &Map<String, Value>,
    key: &str,
    default: bool,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> std::result::Result<bool, ()> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => {
            issues.push(CompileIssue::new(
                format!("{path}.{key}"),
                CompileErrorKind::BadType,
                format!("'{key}' must be a boolean"),
            ));
            Err(())
        }
    }
}

// ---- VALUE_IN --------------------------------------------------------

fn compile_value_in(
    obj: &Map<String, Value>,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> Option<Matcher> {
    let mut ok = reject_unknown_fields(
        obj,
        "VALUE_IN",
        &["type", "field", "values", "coerce"],
        path,
        issues,
    );

    let field = require_str(obj, "field", path, issues);
    let coerce = match optional_str(obj, "coerce", path, issues) {
        Ok(c) => c,
        Err(()) => {
            ok = false;
            None
        }
    };
    if let Some(c) = coerce {
        if !matches!(c, "int" | "str" | "lower-str") {
            issues.push(CompileIssue::new(
                format!("{path}.coerce"),
                CompileErrorKind::InvalidCoerce,
                format!("coerce must be one of int, str, lower-str; got {c:?}"),
            ));
            ok = false;
        }
    }

    let values = match obj.get("values") {
        Some(Value::Array(values)) if !values.is_empty() => Some(values),
        Some(Value::Array(_)) => {
            issues.push(CompileIssue::new(
                format!("{path}.values"),
                CompileErrorKind::EmptyValues,
                "'values' must not be empty",
            ));
            None
        }
        Some(_) => {
            issues.push(CompileIssue::new(
                format!("{path}.values"),
                CompileErrorKind::BadType,
                "'values' must be a list",
            ));
            None
        }
        None => {
            issues.push(CompileIssue::new(
                path,
                CompileErrorKind::MissingField,
                "'values' is required",
            ));
            None
        }
    };

    let (field, values) = (field?, values?);
    if !ok {
        return None;
    }

    let mut scalars = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        match Scalar::from_json(v) {
            Some(s) => scalars.push(s),
            None => {
                issues.push(CompileIssue::new(
                    format!("{path}.values[{i}]"),
                    CompileErrorKind::BadType,
                    "membership values must be numbers or strings",
                ));
                ok = false;
            }
        }
    }
    if !ok {
        return None;
    }

    let set = match coerce {
        Some("int") => {
            let mut ints = HashSet::with_capacity(scalars.len());
            for (i, s) in scalars.iter().enumerate() {
                match s.as_int() {
                    Some(v) => {
                        ints.insert(v);
                    }
                    None => {
                        issues.push(CompileIssue::new(
                            format!("{path}.values[{i}]"),
                            CompileErrorKind::BadType,
                            format!("value does not cast to an integer: {s}"),
                        ));
                        ok = false;
                    }
                }
            }
            if !ok {
                return None;
            }
            MemberSet::Ints(ints)
        }
        Some("str") => MemberSet::Strs(scalars.iter().map(Scalar::display_string).collect()),
        Some("lower-str") => MemberSet::LowerStrs(
            scalars
                .iter()
                .map(|s| s.display_string().to_lowercase())
                .collect(),
        ),
        _ => MemberSet::Raw(scalars.into_iter().collect()),
    };

    Some(Matcher::ValueIn(ValueInMatcher::new(field, set)))
}

// ---- REGEX -----------------------------------------------------------

const DEFAULT_REGEX_MAX_LEN: usize = 256;

fn compile_regex(
    obj: &Map<String, Value>,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> Option<Matcher> {
    let mut ok = reject_unknown_fields(
        obj,
        "REGEX",
        &["type", "field", "pattern", "mode", "flags", "coerce", "max_len"],
        path,
        issues,
    );

    let field = require_str(obj, "field", path, issues);
    let pattern = require_str(obj, "pattern", path, issues);

    let mode = match optional_str(obj, "mode", path, issues) {
        Ok(None) | Ok(Some("search")) => Some(RegexMode::Search),
        Ok(Some("match")) => Some(RegexMode::Match),
        Ok(Some("fullmatch")) => Some(RegexMode::FullMatch),
        Ok(Some(other)) => {
            issues.push(CompileIssue::new(
                format!("{path}.mode"),
                CompileErrorKind::BadType,
                format!("mode must be one of search, match, fullmatch; got {other:?}"),
            ));
            None
        }
        Err(()) => None,
    };

    let coerce = match optional_str(obj, "coerce", path, issues) {
        Ok(None) => Some(StrCoerce::None),
        Ok(Some("str")) => Some(StrCoerce::Str),
        Ok(Some("lower-str")) => Some(StrCoerce::LowerStr),
        Ok(Some(other)) => {
            issues.push(CompileIssue::new(
                format!("{path}.coerce"),
                CompileErrorKind::InvalidCoerce,
                format!("coerce must be one of str, lower-str; got {other:?}"),
            ));
            None
        }
        Err(()) => None,
    };

    let max_len = match obj.get("max_len") {
        None | Some(Value::Null) => Some(DEFAULT_REGEX_MAX_LEN),
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 => Some(n as usize),
            _ => {
                issues.push(CompileIssue::new(
                    format!("{path}.max_len"),
                    CompileErrorKind::BadType,
                    "'max_len' must be an integer >= 1",
                ));
                None
            }
        },
    };

    let mut builder_flags = RegexFlags::default();
    if let Some(flags) = obj.get("flags") {
        match flags.as_array() {
            Some(names) => {
                for (i, name) in names.iter().enumerate() {
                    match name.as_str().and_then(RegexFlags::apply_name) {
                        Some(update) => update(&mut builder_flags),
                        None => {
                            issues.push(CompileIssue::new(
                                format!("{path}.flags[{i}]"),
                                CompileErrorKind::InvalidRegex,
                                format!("unknown regex flag: {name}"),
                            ));
                            ok = false;
                        }
                    }
                }
            }
            None => {
                issues.push(CompileIssue::new(
                    format!("{path}.flags"),
                    CompileErrorKind::BadType,
                    "'flags' must be a list of flag names",
                ));
                ok = false;
            }
        }
    }

    let (field, pattern, mode, coerce, max_len) = (field?, pattern?, mode?, coerce?, max_len?);
    if !ok {
        return None;
    }

    let anchored = match mode {
        RegexMode::Search => pattern.to_string(),
        RegexMode::Match => format!(r"\A(?:{pattern})"),
        RegexMode::FullMatch => format!(r"\A(?:{pattern})\z"),
    };
    let regex = match builder_flags.build(&anchored) {
        Ok(r) => r,
        Err(e) => {
            issues.push(CompileIssue::new(
                format!("{path}.pattern"),
                CompileErrorKind::InvalidRegex,
                e.to_string(),
            ));
            return None;
        }
    };

    Some(Matcher::Regex(RegexMatcher::new(
        field, pattern, regex, mode, coerce, max_len,
    )))
}

/// Accumulated regex flags, mapped onto [`RegexBuilder`] switches.
#[derive(Debug, Clone, Copy, Default)]
struct RegexFlags {
    case_insensitive: bool,
    multi_line: bool,
    dot_matches_new_line: bool,
    ascii: bool,
    ignore_whitespace: bool,
}

impl RegexFlags {
    fn apply_name(name: &str) -> Option<fn(&mut RegexFlags)> {
        match name {
            "IGNORECASE" => Some(|f| f.case_insensitive = true),
            "MULTILINE" => Some(|f| f.multi_line = true),
            "DOTALL" => Some(|f| f.dot_matches_new_line = true),
            "ASCII" => Some(|f| f.ascii = true),
            "VERBOSE" => Some(|f| f.ignore_whitespace = true),
            _ => None,
        }
    }

    fn build(&self, pattern: &str) -> std::result::Result<regex::Regex, regex::Error> {
        RegexBuilder::new(pattern)
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_matches_new_line)
            .unicode(!self.ascii)
            .ignore_whitespace(self.ignore_whitespace)
            .build()
    }
}

// ---- AMOUNT_RANGE ----------------------------------------------------

/// `rust_decimal` supports at most 28 fractional digits.
const MAX_DECIMAL_SCALE: u64 = 28;

fn compile_amount_range(
    obj: &Map<String, Value>,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> Option<Matcher> {
    let mut ok = reject_unknown_fields(
        obj,
        "AMOUNT_RANGE",
        &[
            "type",
            "field",
            "coerce",
            "scale",
            "min",
            "max",
            "min_inclusive",
            "max_inclusive",
        ],
        path,
        issues,
    );

    let field = match optional_str(obj, "field", path, issues) {
        Ok(f) => f.unwrap_or("amount").to_string(),
        Err(()) => {
            ok = false;
            String::new()
        }
    };

    let coerce = match optional_str(obj, "coerce", path, issues) {
        Ok(None) | Ok(Some("decimal")) => Some(AmountCoerce::Decimal),
        Ok(Some("int")) => Some(AmountCoerce::Int),
        Ok(Some(other)) => {
            issues.push(CompileIssue::new(
                format!("{path}.coerce"),
                CompileErrorKind::InvalidCoerce,
                format!("coerce must be one of int, decimal; got {other:?}"),
            ));
            None
        }
        Err(()) => None,
    };

    let scale = match obj.get("scale") {
        None | Some(Value::Null) => Some(0u32),
        Some(v) => match v.as_u64() {
            Some(n) if n <= MAX_DECIMAL_SCALE => Some(n as u32),
            _ => {
                issues.push(CompileIssue::new(
                    format!("{path}.scale"),
                    CompileErrorKind::BadDecimal,
                    format!("'scale' must be an integer in 0..={MAX_DECIMAL_SCALE}"),
                ));
                None
            }
        },
    };

    let min = parse_bound(obj, "min", path, issues);
    let max = parse_bound(obj, "max", path, issues);

    let min_inclusive = optional_bool(obj, "min_inclusive", true, path, issues);
    let max_inclusive = optional_bool(obj, "max_inclusive", true, path, issues);

    let (coerce, scale, min, max) = (coerce?, scale?, min.ok()?, max.ok()?);
    let (min_inclusive, max_inclusive) = (min_inclusive.ok()?, max_inclusive.ok()?);
    if !ok {
        return None;
    }

    if let (Some(lo), Some(hi)) = (min, max) {
        if hi < lo {
            issues.push(CompileIssue::new(
                format!("{path}.max"),
                CompileErrorKind::BadDecimal,
                format!("max ({hi}) is below min ({lo})"),
            ));
            return None;
        }
    }

    Some(Matcher::AmountRange(AmountRangeMatcher::new(
        field,
        coerce,
        scale,
        min,
        max,
        min_inclusive,
        max_inclusive,
    )))
}

/// Parse an optional decimal bound given as a string or number.
fn parse_bound(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> std::result::Result<Option<Decimal>, ()> {
    let raw = match obj.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let parsed = match raw {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };
    match parsed {
        Some(d) => Ok(Some(d)),
        None => {
            issues.push(CompileIssue::new(
                format!("{path}.{key}"),
                CompileErrorKind::BadDecimal,
                format!("'{key}' must be an exact decimal (string or number)"),
            ));
            Err(())
        }
    }
}

// ---- TIME_WINDOW -----------------------------------------------------

fn compile_time_window(
    obj: &Map<String, Value>,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> Option<Matcher> {
    let ok = reject_unknown_fields(
        obj,
        "TIME_WINDOW",
        &["type", "tz", "start", "end", "days_of_week"],
        path,
        issues,
    );

    let tz = require_str(obj, "tz", path, issues).and_then(|name| {
        match name.parse::<chrono_tz::Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                issues.push(CompileIssue::new(
                    format!("{path}.tz"),
                    CompileErrorKind::InvalidTimezone,
                    format!("not an IANA timezone: {name:?}"),
                ));
                None
            }
        }
    });

    let start = require_str(obj, "start", path, issues)
        .and_then(|s| parse_time_of_day(s, &format!("{path}.start"), issues));
    let end = require_str(obj, "end", path, issues)
        .and_then(|s| parse_time_of_day(s, &format!("{path}.end"), issues));

    let days = match obj.get("days_of_week") {
        None | Some(Value::Null) => Some(None),
        Some(Value::Array(names)) => {
            parse_days_of_week(names, &format!("{path}.days_of_week"), issues).map(Some)
        }
        Some(_) => {
            issues.push(CompileIssue::new(
                format!("{path}.days_of_week"),
                CompileErrorKind::BadType,
                "'days_of_week' must be a list of day names",
            ));
            None
        }
    };

    let (tz, start, end, days) = (tz?, start?, end?, days?);
    if !ok {
        return None;
    }

    Some(Matcher::TimeWindow(TimeWindowMatcher::new(
        tz, start, end, days,
    )))
}

/// Parse `HH:MM` or `HH:MM:SS`.
fn parse_time_of_day(
    s: &str,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> Option<chrono::NaiveTime> {
    let bad = |issues: &mut Vec<CompileIssue>| {
        issues.push(CompileIssue::new(
            path,
            CompileErrorKind::BadTime,
            format!("not a valid HH:MM[:SS] time: {s:?}"),
        ));
        None
    };

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return bad(issues);
    }
    let mut nums = [0u32; 3];
    for (i, part) in parts.iter().enumerate() {
        match part.parse::<u32>() {
            Ok(n) => nums[i] = n,
            Err(_) => return bad(issues),
        }
    }
    match chrono::NaiveTime::from_hms_opt(nums[0], nums[1], nums[2]) {
        Some(t) => Some(t),
        None => bad(issues),
    }
}

/// Parse day names (short or long form, case-insensitive) into a `DaySet`.
fn parse_days_of_week(
    names: &[Value],
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> Option<DaySet> {
    let mut indices = Vec::with_capacity(names.len());
    let mut ok = true;
    for (i, name) in names.iter().enumerate() {
        let idx = name.as_str().and_then(|s| day_index(s.trim()));
        match idx {
            Some(idx) => indices.push(idx),
            None => {
                issues.push(CompileIssue::new(
                    format!("{path}[{i}]"),
                    CompileErrorKind::BadTime,
                    format!("not a day of week (mon..sun): {name}"),
                ));
                ok = false;
            }
        }
    }
    if ok {
        Some(DaySet::from_indices(indices))
    } else {
        None
    }
}

fn day_index(name: &str) -> Option<u8> {
    match name.to_lowercase().as_str() {
        "mon" | "monday" => Some(0),
        "tue" | "tuesday" => Some(1),
        "wed" | "wednesday" => Some(2),
        "thu" | "thursday" => Some(3),
        "fri" | "friday" => Some(4),
        "sat" | "saturday" => Some(5),
        "sun" | "sunday" => Some(6),
        _ => None,
    }
}
