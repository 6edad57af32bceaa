//! Coercion of items to a target item type.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use super::{AtomicType, ItemType};
use crate::model::XdmNode;
use crate::runtime::{DynamicContext, Error, ErrorCode};
use crate::xdm::{XdmAtomicValue, XdmItem, XdmString};

/// Convert `item` to `target`. Nodes only satisfy node targets; for atomic
/// targets nodes are atomized first.
pub fn coerce<N: XdmNode>(
    item: XdmItem<N>,
    target: &ItemType,
    ctx: &DynamicContext<N>,
) -> Result<XdmItem<N>, Error> {
    match target {
        ItemType::Item => Ok(item),
        ItemType::EmptySequence => Err(Error::from_code(
            ErrorCode::XPTY0004,
            "no item can be converted to empty-sequence()",
        )),
        ItemType::Node(_) => {
            if item.item_type().instance_of(target) {
                Ok(item)
            } else {
                Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    format!("cannot convert {} to {}", item.item_type(), target),
                ))
            }
        }
        ItemType::Atomic(t) => cast_atomic(item.atomize(), *t, ctx).map(XdmItem::Atomic),
    }
}

pub(crate) fn cast_atomic<N>(
    a: XdmAtomicValue,
    target: AtomicType,
    ctx: &DynamicContext<N>,
) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as A;
    match target {
        AtomicType::AnyAtomic => Ok(a),
        AtomicType::String => Ok(A::String(XdmString::derived(lexical(&a)))),
        AtomicType::UntypedAtomic => Ok(A::UntypedAtomic(lexical(&a))),
        AtomicType::AnyUri => match a {
            A::AnyUri(u) => Ok(A::AnyUri(u)),
            other => {
                let text = require_string_like(&other, target)?;
                Ok(A::AnyUri(text.trim().to_string()))
            }
        },
        AtomicType::Boolean => match a {
            A::Boolean(b) => Ok(A::Boolean(b)),
            A::Integer(i) => Ok(A::Boolean(i != 0)),
            A::Decimal(d) | A::Double(d) => Ok(A::Boolean(d != 0.0 && !d.is_nan())),
            A::Float(f) => Ok(A::Boolean(f != 0.0 && !f.is_nan())),
            other => match require_string_like(&other, target)?.trim() {
                "true" | "1" => Ok(A::Boolean(true)),
                "false" | "0" => Ok(A::Boolean(false)),
                _ => Err(invalid_lexical(target)),
            },
        },
        AtomicType::Integer => match a {
            A::Integer(i) => Ok(A::Integer(i)),
            A::Boolean(b) => Ok(A::Integer(i64::from(b))),
            A::Decimal(d) | A::Double(d) => float_to_integer(d),
            A::Float(f) => float_to_integer(f64::from(f)),
            other => {
                let text = require_string_like(&other, target)?;
                let trimmed = text.trim();
                let digits = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid_lexical(target));
                }
                trimmed
                    .trim_start_matches('+')
                    .parse::<i64>()
                    .map(A::Integer)
                    .map_err(|_| Error::from_code(ErrorCode::FOCA0002, "xs:integer out of range"))
            }
        },
        AtomicType::Decimal => match a {
            A::Decimal(d) => Ok(A::Decimal(d)),
            A::Integer(i) => Ok(A::Decimal(i as f64)),
            A::Boolean(b) => Ok(A::Decimal(if b { 1.0 } else { 0.0 })),
            A::Double(d) => finite_decimal(d),
            A::Float(f) => finite_decimal(f64::from(f)),
            other => {
                let text = require_string_like(&other, target)?;
                let trimmed = text.trim();
                if !is_decimal_lexical(trimmed) {
                    return Err(invalid_lexical(target));
                }
                trimmed
                    .parse::<f64>()
                    .map(A::Decimal)
                    .map_err(|_| invalid_lexical(target))
            }
        },
        AtomicType::Double => match a {
            A::Double(d) => Ok(A::Double(d)),
            A::Float(f) => Ok(A::Double(f64::from(f))),
            A::Decimal(d) => Ok(A::Double(d)),
            A::Integer(i) => Ok(A::Double(i as f64)),
            A::Boolean(b) => Ok(A::Double(if b { 1.0 } else { 0.0 })),
            other => parse_double(require_string_like(&other, target)?.trim())
                .map(A::Double)
                .ok_or_else(|| invalid_lexical(target)),
        },
        AtomicType::Float => match a {
            A::Float(f) => Ok(A::Float(f)),
            A::Double(d) | A::Decimal(d) => Ok(A::Float(d as f32)),
            A::Integer(i) => Ok(A::Float(i as f32)),
            A::Boolean(b) => Ok(A::Float(if b { 1.0 } else { 0.0 })),
            other => parse_double(require_string_like(&other, target)?.trim())
                .map(|d| A::Float(d as f32))
                .ok_or_else(|| invalid_lexical(target)),
        },
        AtomicType::QName => match a {
            q @ A::QName { .. } => Ok(q),
            // Only string literals may become QNames; derived strings lost
            // their namespace context.
            A::String(s) if s.is_direct() => resolve_qname(s.as_str().trim(), ctx),
            other => Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("cannot cast {} to xs:QName", other.atomic_type()),
            )),
        },
        AtomicType::Date => match a {
            A::Date { date, tz } => Ok(A::Date { date, tz }),
            A::DateTime(dt) => Ok(A::Date {
                date: dt.date_naive(),
                tz: Some(*dt.offset()),
            }),
            other => {
                let text = require_string_like(&other, target)?;
                let (body, tz) = split_timezone(text.trim()).ok_or_else(|| invalid_lexical(target))?;
                let date = NaiveDate::parse_from_str(body, "%Y-%m-%d")
                    .map_err(|_| invalid_lexical(target))?;
                Ok(A::Date { date, tz })
            }
        },
        AtomicType::DateTime => match a {
            A::DateTime(dt) => Ok(A::DateTime(dt)),
            A::Date { date, tz } => {
                let tz = tz.unwrap_or_else(|| ctx.implicit_timezone());
                with_offset(date.and_time(NaiveTime::MIN), tz)
                    .map(A::DateTime)
                    .ok_or_else(|| invalid_lexical(target))
            }
            other => {
                let text = require_string_like(&other, target)?;
                let (body, tz) = split_timezone(text.trim()).ok_or_else(|| invalid_lexical(target))?;
                let naive = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f")
                    .map_err(|_| invalid_lexical(target))?;
                with_offset(naive, tz.unwrap_or_else(|| ctx.implicit_timezone()))
                    .map(A::DateTime)
                    .ok_or_else(|| invalid_lexical(target))
            }
        },
    }
}

/// Canonical lexical form of an atomic value.
pub fn lexical(a: &XdmAtomicValue) -> String {
    use XdmAtomicValue as A;
    match a {
        A::Boolean(b) => b.to_string(),
        A::String(s) => s.as_str().to_string(),
        A::UntypedAtomic(s) | A::AnyUri(s) => s.clone(),
        A::Integer(i) => i.to_string(),
        A::Decimal(d) => format_decimal(*d),
        A::Double(d) => format_double(*d),
        A::Float(f) => format_float(*f),
        A::QName { prefix, local, .. } => match prefix {
            Some(p) if !p.is_empty() => format!("{p}:{local}"),
            _ => local.clone(),
        },
        A::Date { date, tz } => format!("{}{}", date.format("%Y-%m-%d"), format_tz(*tz)),
        A::DateTime(dt) => format!(
            "{}{}",
            dt.naive_local().format("%Y-%m-%dT%H:%M:%S%.f"),
            format_tz(Some(*dt.offset()))
        ),
    }
}

fn require_string_like(a: &XdmAtomicValue, target: AtomicType) -> Result<String, Error> {
    match a {
        XdmAtomicValue::String(s) => Ok(s.as_str().to_string()),
        XdmAtomicValue::UntypedAtomic(s) => Ok(s.clone()),
        other => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("cannot cast {} to {}", other.atomic_type(), target),
        )),
    }
}

fn invalid_lexical(target: AtomicType) -> Error {
    Error::from_code(ErrorCode::FORG0001, format!("invalid lexical form for {target}"))
}

fn float_to_integer(d: f64) -> Result<XdmAtomicValue, Error> {
    let t = d.trunc();
    if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(Error::from_code(
            ErrorCode::FOCA0002,
            "value cannot be represented as xs:integer",
        ));
    }
    Ok(XdmAtomicValue::Integer(t as i64))
}

fn finite_decimal(d: f64) -> Result<XdmAtomicValue, Error> {
    if d.is_finite() {
        Ok(XdmAtomicValue::Decimal(d))
    } else {
        Err(Error::from_code(
            ErrorCode::FOCA0002,
            "value cannot be represented as xs:decimal",
        ))
    }
}

fn is_decimal_lexical(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (int, frac) = body.split_once('.').unwrap_or((body, ""));
    !(int.is_empty() && frac.is_empty())
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

/// `xs:double` lexical space: decimal or exponent notation plus the special
/// tokens `INF`, `-INF` and `NaN`.
fn parse_double(s: &str) -> Option<f64> {
    match s {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => {
            let (mantissa, exponent) = match s.find(['e', 'E']) {
                Some(i) => (&s[..i], Some(&s[i + 1..])),
                None => (s, None),
            };
            let exp_ok = exponent.is_none_or(|e| {
                let digits = e.strip_prefix(['+', '-']).unwrap_or(e);
                !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
            });
            if exp_ok && is_decimal_lexical(mantissa) {
                s.parse().ok()
            } else {
                None
            }
        }
    }
}

fn format_decimal(d: f64) -> String {
    if d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{}", d as i64)
    } else {
        format!("{d}")
    }
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    if (1e-6..1e6).contains(&d.abs()) {
        return format_decimal(d);
    }
    // Exponent form always carries a fractional mantissa: 1.0E6
    let s = format!("{d:E}");
    match s.split_once('E') {
        Some((m, e)) if !m.contains('.') => format!("{m}.0E{e}"),
        _ => s,
    }
}

fn format_float(f: f32) -> String {
    if f.is_nan() || f.is_infinite() || f == 0.0 {
        return format_double(f64::from(f));
    }
    if (1e-6..1e6).contains(&f.abs()) {
        return if f.fract() == 0.0 {
            format!("{}", f as i64)
        } else {
            format!("{f}")
        };
    }
    let s = format!("{f:E}");
    match s.split_once('E') {
        Some((m, e)) if !m.contains('.') => format!("{m}.0E{e}"),
        _ => s,
    }
}

fn format_tz(tz: Option<FixedOffset>) -> String {
    match tz {
        None => String::new(),
        Some(off) if off.local_minus_utc() == 0 => "Z".to_string(),
        Some(off) => {
            let secs = off.local_minus_utc();
            let sign = if secs < 0 { '-' } else { '+' };
            let mins = secs.abs() / 60;
            format!("{sign}{:02}:{:02}", mins / 60, mins % 60)
        }
    }
}

/// Split a trailing `Z` or `±hh:mm` timezone from a date/time lexical form.
/// Returns `None` for a malformed offset.
fn split_timezone(s: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(body) = s.strip_suffix('Z') {
        return Some((body, FixedOffset::east_opt(0)));
    }
    let split = s.len().saturating_sub(6);
    if split > 0
        && let (Some(body), Some(tail)) = (s.get(..split), s.get(split..))
        && tail.is_ascii()
    {
        let bytes = tail.as_bytes();
        if (bytes[0] == b'+' || bytes[0] == b'-') && bytes[3] == b':' {
            let hours: i32 = tail[1..3].parse().ok()?;
            let mins: i32 = tail[4..6].parse().ok()?;
            if hours > 14 || mins > 59 {
                return None;
            }
            let secs = (hours * 60 + mins) * 60;
            let offset = if bytes[0] == b'-' {
                FixedOffset::west_opt(secs)
            } else {
                FixedOffset::east_opt(secs)
            };
            return offset.map(|o| (body, Some(o)));
        }
    }
    Some((s, None))
}

fn with_offset(naive: NaiveDateTime, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive).single()
}

fn resolve_qname<N>(lexical: &str, ctx: &DynamicContext<N>) -> Result<XdmAtomicValue, Error> {
    let (prefix, local) = match lexical.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, lexical),
    };
    if !is_ncname(local) || prefix.is_some_and(|p| !is_ncname(p)) {
        return Err(invalid_lexical(AtomicType::QName));
    }
    let ns_uri = match prefix {
        Some(p) => Some(
            ctx.static_ctx
                .resolve_prefix(p)
                .ok_or_else(|| {
                    Error::from_code(ErrorCode::FONS0004, format!("no namespace bound to prefix '{p}'"))
                })?
                .to_string(),
        ),
        None => None,
    };
    Ok(XdmAtomicValue::QName {
        ns_uri,
        prefix: prefix.map(str::to_string),
        local: local.to_string(),
    })
}

fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
