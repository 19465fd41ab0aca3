// A small printf-style renderer with explicit argument indices (`%[n]s`),
// as produced by the placeholder compiler.
//
// Supported: flags `-` and `0`, width, precision, `[n]` argument indices,
// verbs `s`, `d`, `v`, and `%%`. Problems are reported inline, never as errors:
// `%!v(BADINDEX)`, `%!v(MISSING)`, `%!(NOVERB)`, `%!d(str=..)` for wrong types,
// and a trailing `%!(EXTRA ..)` if arguments were left over and no explicit index was used.
use std::{fmt::Write, time::Duration};

/// Marks the start of the diagnostics for unused arguments.
pub(crate) const EXTRA_SENTINEL: &str = "%!(EXTRA";

#[derive(Clone, Copy, Debug)]
pub(crate) enum Arg<'a> {
    Uint(u64),
    Str(&'a str),
    Duration(Duration),
}

impl Arg<'_> {
    fn type_name(&self) -> &'static str {
        match self {
            Arg::Uint(_) => "u64",
            Arg::Str(_) => "str",
            Arg::Duration(_) => "Duration",
        }
    }
    fn plain(&self) -> String {
        match self {
            Arg::Uint(u) => u.to_string(),
            Arg::Str(s) => (*s).to_string(),
            Arg::Duration(d) => format!("{d:?}"),
        }
    }
}

#[derive(Default)]
struct Spec {
    minus: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

pub(crate) fn sprintf(format: &str, args: &[Arg]) -> String {
    let bytes = format.as_bytes();
    let mut out = String::with_capacity(format.len() + 64);
    let mut arg_num = 0_usize;
    let mut reordered = false;
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && bytes[i] != b'%' {
            i += 1;
        }
        out.push_str(&format[start..i]);
        if i >= bytes.len() {
            break;
        }
        i += 1;

        let mut spec = Spec::default();
        while i < bytes.len() {
            match bytes[i] {
                b'-' => spec.minus = true,
                b'0' => spec.zero = true,
                b'+' | b' ' | b'#' => {}
                _ => break,
            }
            i += 1;
        }

        let mut good_index = true;
        if let Some((n, next)) = parse_index(bytes, i) {
            i = next;
            reordered = true;
            match n {
                Some(n) => arg_num = n,
                None => good_index = false,
            }
        }

        let (width, next) = parse_num(bytes, i);
        spec.width = width;
        i = next;

        if i < bytes.len() && bytes[i] == b'.' {
            let (precision, next) = parse_num(bytes, i + 1);
            spec.precision = Some(precision.unwrap_or(0));
            i = next;
        }

        if let Some((n, next)) = parse_index(bytes, i) {
            i = next;
            reordered = true;
            match n {
                Some(n) => arg_num = n,
                None => good_index = false,
            }
        }

        let Some(verb) = format[i..].chars().next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        i += verb.len_utf8();

        if verb == '%' {
            out.push('%');
            continue;
        }
        if !good_index {
            write!(out, "%!{verb}(BADINDEX)").ok();
            continue;
        }
        match args.get(arg_num) {
            None => {
                write!(out, "%!{verb}(MISSING)").ok();
            }
            Some(arg) => {
                render_arg(&mut out, verb, *arg, &spec);
                arg_num += 1;
            }
        }
    }

    if !reordered && arg_num < args.len() {
        out.push_str(EXTRA_SENTINEL);
        out.push(' ');
        for (n, arg) in args[arg_num..].iter().enumerate() {
            if n > 0 {
                out.push_str(", ");
            }
            write!(out, "{}={}", arg.type_name(), arg.plain()).ok();
        }
        out.push(')');
    }
    out
}

// Parses `[n]` (1-based) at position i; returns the 0-based index
// (None if malformed) and the position after the closing bracket.
fn parse_index(bytes: &[u8], i: usize) -> Option<(Option<usize>, usize)> {
    if i >= bytes.len() || bytes[i] != b'[' {
        return None;
    }
    let (num, next) = parse_num(bytes, i + 1);
    if next < bytes.len() && bytes[next] == b']' {
        Some((num.filter(|n| *n > 0).map(|n| n - 1), next + 1))
    } else {
        // unterminated index: swallow the bracket only
        Some((None, i + 1))
    }
}

fn parse_num(bytes: &[u8], mut i: usize) -> (Option<usize>, usize) {
    let start = i;
    let mut num = 0_usize;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        num = num.saturating_mul(10).saturating_add(usize::from(bytes[i] - b'0'));
        i += 1;
    }
    ((i > start).then_some(num), i)
}

fn render_arg(out: &mut String, verb: char, arg: Arg, spec: &Spec) {
    match (verb, arg) {
        ('s' | 'v', Arg::Str(s)) => {
            let s = match spec.precision {
                Some(p) => match s.char_indices().nth(p) {
                    Some((cut, _)) => &s[..cut],
                    None => s,
                },
                None => s,
            };
            pad(out, s, spec, false);
        }
        ('d' | 'v', Arg::Uint(u)) => pad(out, &u.to_string(), spec, true),
        ('s' | 'v', Arg::Duration(d)) => pad(out, &format!("{d:?}"), spec, false),
        ('d', Arg::Duration(d)) => pad(out, &d.as_nanos().to_string(), spec, true),
        (verb, arg) => {
            write!(out, "%!{verb}({}={})", arg.type_name(), arg.plain()).ok();
        }
    }
}

fn pad(out: &mut String, s: &str, spec: &Spec, numeric: bool) {
    let len = s.chars().count();
    let fill = spec.width.map_or(0, |w| w.saturating_sub(len));
    if spec.minus {
        out.push_str(s);
        out.extend(std::iter::repeat_n(' ', fill));
    } else {
        let c = if spec.zero && numeric { '0' } else { ' ' };
        out.extend(std::iter::repeat_n(c, fill));
        out.push_str(s);
    }
}
