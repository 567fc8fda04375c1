#![deny(warnings)]

//! Bilingual suggestion parser for fee-policy notes.
//!
//! Operator notes mix Arabic and English free text; this crate extracts
//! structured fee suggestions from them. Parsing is a fixed, ordered chain
//! of pattern rules evaluated most-specific first; the first rule that
//! matches wins. A note with no extractable numeric quantity yields no
//! suggestion, never an error.

use fee_core::{Catalog, FeeAmount, FeeStructure, FeeSuggestion, HistoricalChange, SuggestionSet};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

const CONF_HISTORICAL: f32 = 0.85;
const CONF_TIERED: f32 = 0.9;
const CONF_CONDITIONAL_ENTITY: f32 = 0.85;
const CONF_CONDITIONAL_OTHER: f32 = 0.7;
const CONF_PER_UNIT_CURRENCY: f32 = 0.9;
const CONF_PER_UNIT: f32 = 0.8;
const CONF_FLAT_CURRENCY: f32 = 0.8;
const CONF_FLAT_BARE: f32 = 0.5;

const HISTORICAL_MARKERS: &[&[&str]] = &[&["كانت"], &["تم", "تعديل"], &["was"]];
const CANCELLATION_MARKERS: &[&[&str]] =
    &[&["تم", "الغاء"], &["الغاء", "الرسوم"], &["cancelled"]];
const CONDITIONAL_MARKERS: &[&[&str]] =
    &[&["في", "حال"], &["اذا"], &["if"], &["when"], &["in", "case"]];
const PRIVATE_MARKERS: &[&[&str]] =
    &[&["شركة", "خاصة"], &["قطاع", "خاص"], &["جهة", "خاصة"], &["private"]];
const GOVERNMENT_MARKERS: &[&[&str]] =
    &[&["شبه", "حكومية"], &["حكومية"], &["حكومي"], &["government"]];
const SPECIALIZED_MARKERS: &[&[&str]] = &[&["مهنة", "تخصصية"], &["تخصصية"], &["specialized"]];
const NON_SPECIALIZED_MARKERS: &[&[&str]] = &[&["غير", "تخصصية"], &["non", "specialized"]];
const PER_PERSON_MARKERS: &[&[&str]] = &[
    &["عن", "كل", "شخص"],
    &["لكل", "شخص"],
    &["عن", "كل", "عامل"],
    &["لكل", "عامل"],
    &["per", "person"],
    &["per", "worker"],
];
const PER_MODIFICATION_MARKERS: &[&[&str]] = &[
    &["عن", "كل", "تعديل"],
    &["لكل", "تعديل"],
    &["per", "modification"],
    &["per", "amendment"],
];
const PER_MONTH_MARKERS: &[&[&str]] = &[
    &["عن", "كل", "شهر"],
    &["لكل", "شهر"],
    &["شهريا"],
    &["per", "month"],
    &["monthly"],
];
const CURRENCY_WORDS: &[&str] = &["ريال", "ريالات", "riyal", "riyals", "qar", "qr"];

/// Map one character to its canonical form.
///
/// Arabic-Indic digits become ASCII digits, alef variants collapse to bare
/// alef, final ya variants collapse, the Arabic decimal separator becomes a
/// point, ASCII letters lowercase. The mapping is one character to one
/// character so token offsets always slice the original note.
fn normalize_char(c: char) -> char {
    match c {
        '٠'..='٩' => char::from(b'0' + (c as u32 - 0x0660) as u8),
        '۰'..='۹' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
        'أ' | 'إ' | 'آ' => 'ا',
        'ى' => 'ي',
        '٫' => '.',
        _ => c.to_ascii_lowercase(),
    }
}

/// Characters skipped inside tokens: tatweel, harakat, the Arabic
/// thousands separator.
fn is_transparent(c: char) -> bool {
    matches!(c, 'ـ' | '\u{064B}'..='\u{0652}' | '\u{0670}' | '٬')
}

fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            ',' | '،'
                | '؛'
                | '؟'
                | ';'
                | ':'
                | '!'
                | '?'
                | '('
                | ')'
                | '['
                | ']'
                | '{'
                | '}'
                | '"'
                | '\''
                | '-'
                | '/'
                | '\\'
                | '*'
                | '%'
                | '+'
                | '='
        )
}

/// One normalized token with its byte range in the original note.
#[derive(Clone, Debug)]
struct Token {
    text: String,
    start: usize,
    end: usize,
}

fn tokenize(note: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<Token> = None;
    let mut chars = note.char_indices().peekable();
    while let Some((idx, raw)) = chars.next() {
        if is_transparent(raw) {
            if let Some(tok) = current.as_mut() {
                tok.end = idx + raw.len_utf8();
            }
            continue;
        }
        let c = normalize_char(raw);
        // A point stays inside a token only as a decimal point in a digit run.
        let decimal_point = c == '.'
            && current
                .as_ref()
                .is_some_and(|t| t.text.ends_with(|ch: char| ch.is_ascii_digit()))
            && matches!(
                chars.peek().map(|&(_, n)| normalize_char(n)),
                Some(n) if n.is_ascii_digit()
            );
        if is_separator(c) || (c == '.' && !decimal_point) {
            if let Some(tok) = current.take() {
                tokens.push(tok);
            }
            continue;
        }
        match current.as_mut() {
            Some(tok) => {
                tok.text.push(c);
                tok.end = idx + raw.len_utf8();
            }
            None => {
                current = Some(Token {
                    text: c.to_string(),
                    start: idx,
                    end: idx + raw.len_utf8(),
                });
            }
        }
    }
    if let Some(tok) = current.take() {
        tokens.push(tok);
    }
    tokens
}

/// Closed numeral lexicon: Arabic and English units, tens, hundred.
fn word_value(word: &str) -> Option<u64> {
    let value = match word {
        "واحد" | "واحده" | "واحدة" | "one" => 1,
        "اثنان" | "اثنين" | "two" => 2,
        "ثلاثة" | "ثلاثه" | "ثلاث" | "three" => 3,
        "اربعة" | "اربعه" | "اربع" | "four" => 4,
        "خمسة" | "خمسه" | "خمس" | "five" => 5,
        "ستة" | "سته" | "ست" | "six" => 6,
        "سبعة" | "سبعه" | "سبع" | "seven" => 7,
        "ثمانية" | "ثمانيه" | "ثماني" | "eight" => 8,
        "تسعة" | "تسعه" | "تسع" | "nine" => 9,
        "عشرة" | "عشره" | "عشر" | "ten" => 10,
        "عشرون" | "عشرين" | "twenty" => 20,
        "ثلاثون" | "ثلاثين" | "thirty" => 30,
        "اربعون" | "اربعين" | "forty" => 40,
        "خمسون" | "خمسين" | "fifty" => 50,
        "ستون" | "ستين" | "sixty" => 60,
        "سبعون" | "سبعين" | "seventy" => 70,
        "ثمانون" | "ثمانين" | "eighty" => 80,
        "تسعون" | "تسعين" | "ninety" => 90,
        "مئة" | "مائة" | "مئه" | "مائه" | "hundred" => 100,
        _ => return None,
    };
    Some(value)
}

fn is_unit(v: u64) -> bool {
    (1..=9).contains(&v)
}

fn is_connector(word: &str) -> bool {
    word == "و" || word == "and"
}

/// Number word carrying its واو attached, as in وعشرون inside
/// "خمسة وعشرون".
fn connected_value(word: &str) -> Option<u64> {
    word.strip_prefix('و').and_then(word_value)
}

/// Number words may chain without a connector only in two shapes:
/// a tens word followed by a unit ("twenty five") and a unit followed by
/// the hundred word ("خمس مئة").
fn adjacency_allowed(last_word: u64, next: &str) -> bool {
    match word_value(next) {
        Some(100) => is_unit(last_word),
        Some(v) if is_unit(v) => (20..=90).contains(&last_word) && last_word % 10 == 0,
        _ => false,
    }
}

/// Read a spelled-out number starting at `start`, returning its value and
/// the number of tokens consumed. Additive chains join through و / "and",
/// attached (وعشرون) or standalone; a hundred word multiplies an
/// immediately preceding unit.
fn spelled_number(tokens: &[Token], start: usize) -> Option<(u64, usize)> {
    let first = word_value(&tokens[start].text)?;
    let mut value = first;
    let mut last_word = first;
    let mut i = start + 1;
    loop {
        let (next, v, connected) = if i < tokens.len() && is_connector(&tokens[i].text) {
            match tokens.get(i + 1).and_then(|t| word_value(&t.text)) {
                Some(v) => (i + 1, v, true),
                None => break,
            }
        } else if let Some(v) = tokens.get(i).and_then(|t| connected_value(&t.text)) {
            (i, v, true)
        } else if i < tokens.len() && adjacency_allowed(last_word, &tokens[i].text) {
            match word_value(&tokens[i].text) {
                Some(v) => (i, v, false),
                None => break,
            }
        } else {
            break;
        };
        if v == 100 && !connected && is_unit(last_word) {
            value = value - last_word + last_word * 100;
        } else {
            value += v;
        }
        last_word = v;
        i = next + 1;
    }
    Some((value, i - start))
}

/// A numeric quantity found in the note, with its token range.
#[derive(Clone, Debug)]
struct Quantity {
    value: Decimal,
    token_start: usize,
    token_end: usize,
}

fn is_digit_run(text: &str) -> bool {
    !text.is_empty()
        && text.chars().all(|c| c.is_ascii_digit() || c == '.')
        && text.chars().any(|c| c.is_ascii_digit())
}

fn extract_quantities(tokens: &[Token]) -> Vec<Quantity> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let text = tokens[i].text.as_str();
        if is_digit_run(text) {
            if let Ok(value) = text.parse::<Decimal>() {
                out.push(Quantity {
                    value,
                    token_start: i,
                    token_end: i + 1,
                });
            }
            i += 1;
            continue;
        }
        if let Some((value, consumed)) = spelled_number(tokens, i) {
            out.push(Quantity {
                value: Decimal::from(value),
                token_start: i,
                token_end: i + consumed,
            });
            i += consumed;
            continue;
        }
        i += 1;
    }
    out
}

/// Arabic tokens match marker words with or without a leading article
/// (ال / وال) or an attached واو.
fn strip_article(word: &str) -> &str {
    for prefix in ["وال", "ال", "و"] {
        if let Some(rest) = word.strip_prefix(prefix) {
            if rest.chars().count() >= 2 {
                return rest;
            }
        }
    }
    word
}

fn token_matches(token: &str, word: &str) -> bool {
    token == word || strip_article(token) == strip_article(word)
}

fn find_phrase_from(tokens: &[Token], phrase: &[&str], from: usize) -> Option<usize> {
    if phrase.is_empty() || tokens.len() < phrase.len() {
        return None;
    }
    (from..=tokens.len() - phrase.len()).find(|&i| {
        phrase
            .iter()
            .enumerate()
            .all(|(j, w)| token_matches(&tokens[i + j].text, w))
    })
}

/// Earliest match of any phrase variant, as a token range.
fn find_any(tokens: &[Token], phrases: &[&[&str]]) -> Option<(usize, usize)> {
    phrases
        .iter()
        .filter_map(|p| find_phrase_from(tokens, p, 0).map(|i| (i, i + p.len())))
        .min_by_key(|&(i, _)| i)
}

fn is_currency(word: &str) -> bool {
    CURRENCY_WORDS.iter().any(|w| token_matches(word, w))
}

/// Tokenized note shared by all rules in one parse call.
struct ParseContext<'a> {
    note: &'a str,
    tokens: Vec<Token>,
    quantities: Vec<Quantity>,
}

impl<'a> ParseContext<'a> {
    fn new(note: &'a str) -> Self {
        let tokens = tokenize(note);
        let quantities = extract_quantities(&tokens);
        ParseContext {
            note,
            tokens,
            quantities,
        }
    }

    /// Slice of the original note covering a token range.
    fn slice(&self, token_start: usize, token_end: usize) -> String {
        let start = self.tokens[token_start].start;
        let end = self.tokens[token_end - 1].end;
        self.note[start..end].to_string()
    }

    /// Last quantity ending at or before a marker position.
    fn quantity_before(&self, marker_start: usize) -> Option<&Quantity> {
        self.quantities
            .iter()
            .rev()
            .find(|q| q.token_end <= marker_start)
    }

    /// First quantity starting after a position.
    fn quantity_after(&self, pos: usize) -> Option<&Quantity> {
        self.quantities.iter().find(|q| q.token_start > pos)
    }

    /// Quantity adjacent to a marker. Fee notes put the amount before its
    /// marker ("عشرة ريال عن كل شخص"), so the preceding quantity wins.
    fn quantity_near(&self, marker_start: usize) -> Option<&Quantity> {
        self.quantity_before(marker_start)
            .or_else(|| self.quantity_after(marker_start))
    }

    fn has_currency_near(&self, q: &Quantity) -> bool {
        self.tokens.iter().enumerate().any(|(i, t)| {
            is_currency(&t.text)
                && (i == q.token_end || i == q.token_end + 1 || i + 1 == q.token_start)
        })
    }
}

type RuleFn = fn(&ParseContext<'_>) -> Option<FeeSuggestion>;

/// Ordered rule chain, most specific first. The first match wins.
const RULES: &[(&str, RuleFn)] = &[
    ("historical-change", historical_rule),
    ("tiered", tiered_rule),
    ("conditional", conditional_rule),
    ("per-person", per_person_rule),
    ("per-modification", per_modification_rule),
    ("per-month", per_month_rule),
    ("flat", flat_rule),
];

fn find_connective_after(ctx: &ParseContext<'_>, from: usize) -> Option<usize> {
    ctx.tokens
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, t)| t.text == "الي" || t.text == "to")
        .map(|(i, _)| i)
}

/// Month number named right after a شهر / month token, if any.
fn effective_month(ctx: &ParseContext<'_>) -> Option<u32> {
    ctx.tokens.iter().enumerate().find_map(|(i, t)| {
        if !token_matches(&t.text, "شهر") && t.text != "month" {
            return None;
        }
        let q = ctx.quantities.iter().find(|q| q.token_start == i + 1)?;
        q.value.to_u32().filter(|m| (1..=12).contains(m))
    })
}

/// "كانت X … الى Y" / "تم تعديل … الى Y": the suggestion is the revised
/// amount; the old amount and effective month go into the condition.
fn historical_rule(ctx: &ParseContext<'_>) -> Option<FeeSuggestion> {
    let (marker_start, marker_end) = find_any(&ctx.tokens, HISTORICAL_MARKERS)?;
    let connective = find_connective_after(ctx, marker_start)?;
    let revised = ctx.quantity_after(connective)?;
    let previous = ctx
        .quantities
        .iter()
        .find(|q| q.token_start >= marker_end && q.token_end <= connective);
    let mut condition = match previous {
        Some(p) => format!("previously {}", p.value),
        None => "revised fee".to_string(),
    };
    if let Some(month) = effective_month(ctx) {
        condition.push_str(&format!(", effective month {month}"));
    }
    Some(FeeSuggestion {
        structure: FeeStructure::HistoricalChange,
        amounts: vec![FeeAmount::new("revised", revised.value)],
        confidence: CONF_HISTORICAL,
        matched: ctx.slice(marker_start.min(revised.token_start), revised.token_end),
        condition: Some(condition),
    })
}

/// Distinct amounts for specialized and non-specialized professions.
fn tiered_rule(ctx: &ParseContext<'_>) -> Option<FeeSuggestion> {
    let non_spec = find_any(&ctx.tokens, NON_SPECIALIZED_MARKERS)?;
    let spec = SPECIALIZED_MARKERS
        .iter()
        .filter_map(|p| {
            let mut from = 0;
            loop {
                let i = find_phrase_from(&ctx.tokens, p, from)?;
                let end = i + p.len();
                // The specialized marker must not be part of the
                // non-specialized phrase itself.
                if end <= non_spec.0 || i >= non_spec.1 {
                    return Some((i, end));
                }
                from = i + 1;
            }
        })
        .min_by_key(|&(i, _)| i)?;
    let spec_q = ctx.quantity_before(spec.0)?;
    let non_spec_q = ctx.quantity_before(non_spec.0)?;
    if spec_q.token_start == non_spec_q.token_start {
        return None;
    }
    let span_start = spec_q.token_start.min(non_spec_q.token_start).min(spec.0);
    let span_end = non_spec.1.max(spec.1);
    Some(FeeSuggestion {
        structure: FeeStructure::Tiered,
        amounts: vec![
            FeeAmount::new("specialized", spec_q.value),
            FeeAmount::new("non_specialized", non_spec_q.value),
        ],
        confidence: CONF_TIERED,
        matched: ctx.slice(span_start, span_end),
        condition: None,
    })
}

/// Amount tied to a conditional clause. Entity-type conditions (private
/// company vs government) produce two labeled amounts with the unmentioned
/// branch at zero; any other clause produces one amount with the clause
/// text as the condition.
fn conditional_rule(ctx: &ParseContext<'_>) -> Option<FeeSuggestion> {
    let (marker_start, marker_end) = find_any(&ctx.tokens, CONDITIONAL_MARKERS)?;
    let q = ctx.quantity_near(marker_start)?;
    let private = find_any(&ctx.tokens, PRIVATE_MARKERS);
    let government = find_any(&ctx.tokens, GOVERNMENT_MARKERS);
    let last = ctx.tokens.len();
    let matched = ctx.slice(q.token_start.min(marker_start), last);
    match (private, government) {
        (Some(_), None) => Some(FeeSuggestion {
            structure: FeeStructure::Conditional,
            amounts: vec![
                FeeAmount::new("private", q.value),
                FeeAmount::new("government", Decimal::ZERO),
            ],
            confidence: CONF_CONDITIONAL_ENTITY,
            matched,
            condition: Some("private company only".to_string()),
        }),
        (None, Some(_)) => Some(FeeSuggestion {
            structure: FeeStructure::Conditional,
            amounts: vec![
                FeeAmount::new("government", q.value),
                FeeAmount::new("private", Decimal::ZERO),
            ],
            confidence: CONF_CONDITIONAL_ENTITY,
            matched,
            condition: Some("government and semi-government entities".to_string()),
        }),
        (Some(p), Some(g)) => {
            let private_q = ctx.quantity_before(p.0).unwrap_or(q);
            let government_q = ctx.quantity_before(g.0).unwrap_or(q);
            let government_amount = if government_q.token_start == private_q.token_start {
                Decimal::ZERO
            } else {
                government_q.value
            };
            Some(FeeSuggestion {
                structure: FeeStructure::Conditional,
                amounts: vec![
                    FeeAmount::new("private", private_q.value),
                    FeeAmount::new("government", government_amount),
                ],
                confidence: CONF_CONDITIONAL_ENTITY,
                matched,
                condition: Some("private and government rates".to_string()),
            })
        }
        (None, None) => {
            let condition = if marker_end < last {
                Some(ctx.slice(marker_end, last))
            } else {
                None
            };
            Some(FeeSuggestion {
                structure: FeeStructure::Conditional,
                amounts: vec![FeeAmount::new("conditional", q.value)],
                confidence: CONF_CONDITIONAL_OTHER,
                matched,
                condition,
            })
        }
    }
}

fn per_unit(
    ctx: &ParseContext<'_>,
    markers: &[&[&str]],
    label: &str,
    structure: FeeStructure,
) -> Option<FeeSuggestion> {
    let (marker_start, marker_end) = find_any(&ctx.tokens, markers)?;
    let q = ctx.quantity_near(marker_start)?;
    let confidence = if ctx.has_currency_near(q) {
        CONF_PER_UNIT_CURRENCY
    } else {
        CONF_PER_UNIT
    };
    Some(FeeSuggestion {
        structure,
        amounts: vec![FeeAmount::new(label, q.value)],
        confidence,
        matched: ctx.slice(q.token_start.min(marker_start), q.token_end.max(marker_end)),
        condition: None,
    })
}

fn per_person_rule(ctx: &ParseContext<'_>) -> Option<FeeSuggestion> {
    per_unit(ctx, PER_PERSON_MARKERS, "per_person", FeeStructure::PerPerson)
}

fn per_modification_rule(ctx: &ParseContext<'_>) -> Option<FeeSuggestion> {
    per_unit(
        ctx,
        PER_MODIFICATION_MARKERS,
        "per_modification",
        FeeStructure::PerModification,
    )
}

fn per_month_rule(ctx: &ParseContext<'_>) -> Option<FeeSuggestion> {
    per_unit(ctx, PER_MONTH_MARKERS, "per_month", FeeStructure::PerMonth)
}

/// Fallback: the first quantity in the note, with confidence depending on
/// an adjacent currency word.
fn flat_rule(ctx: &ParseContext<'_>) -> Option<FeeSuggestion> {
    let q = ctx.quantities.first()?;
    let confidence = if ctx.has_currency_near(q) {
        CONF_FLAT_CURRENCY
    } else {
        CONF_FLAT_BARE
    };
    let mut span_end = q.token_end;
    if ctx
        .tokens
        .get(q.token_end)
        .map(|t| is_currency(&t.text))
        .unwrap_or(false)
    {
        span_end += 1;
    }
    Some(FeeSuggestion {
        structure: FeeStructure::Flat,
        amounts: vec![FeeAmount::new("flat", q.value)],
        confidence,
        matched: ctx.slice(q.token_start, span_end),
        condition: None,
    })
}

/// Parse one note into at most one suggestion.
///
/// Pure function: identical input always returns identical output, and no
/// input panics. Empty notes and notes without an extractable quantity
/// return `None`.
///
/// Example: "عشرة ريال عن كل شخص" parses to a per-person suggestion of 10.
pub fn parse(note: &str) -> Option<FeeSuggestion> {
    let ctx = ParseContext::new(note);
    if ctx.quantities.is_empty() {
        return None;
    }
    for &(name, rule) in RULES {
        if let Some(suggestion) = rule(&ctx) {
            debug!(
                rule = name,
                structure = ?suggestion.structure,
                confidence = suggestion.confidence,
                "note produced a suggestion"
            );
            return Some(suggestion);
        }
    }
    None
}

/// Parse every service note in a catalog.
///
/// The result has one entry per service; `None` marks notes that produced
/// no suggestion.
pub fn parse_all(catalog: &Catalog) -> SuggestionSet {
    catalog
        .services
        .iter()
        .map(|s| (s.key.clone(), parse(&s.note)))
        .collect()
}

/// Extract a recorded past fee change, including cancellations.
///
/// Unlike [`parse`], a cancellation needs no numeric quantity.
pub fn historical_change(note: &str) -> Option<HistoricalChange> {
    let ctx = ParseContext::new(note);
    if let Some((start, _)) = find_any(&ctx.tokens, CANCELLATION_MARKERS) {
        return Some(HistoricalChange {
            previous: None,
            revised: None,
            cancelled: true,
            effective_month: effective_month(&ctx),
            description: ctx.slice(start, ctx.tokens.len()),
        });
    }
    let (marker_start, marker_end) = find_any(&ctx.tokens, HISTORICAL_MARKERS)?;
    let connective = find_connective_after(&ctx, marker_start)?;
    let revised = ctx.quantity_after(connective)?;
    let previous = ctx
        .quantities
        .iter()
        .find(|q| q.token_start >= marker_end && q.token_end <= connective);
    Some(HistoricalChange {
        previous: previous.map(|q| q.value),
        revised: Some(revised.value),
        cancelled: false,
        effective_month: effective_month(&ctx),
        description: ctx.slice(marker_start, revised.token_end),
    })
}

/// Describe special applicability conditions named in a note, if any.
pub fn special_conditions(note: &str) -> Option<String> {
    let ctx = ParseContext::new(note);
    let mut found: Vec<&str> = Vec::new();
    if find_any(&ctx.tokens, GOVERNMENT_MARKERS).is_some() {
        found.push("government and semi-government entities");
    }
    if find_any(&ctx.tokens, PRIVATE_MARKERS).is_some() {
        found.push("private company only");
    }
    if find_any(&ctx.tokens, SPECIALIZED_MARKERS).is_some() {
        found.push("specialized profession rates");
    }
    if found.is_empty() {
        None
    } else {
        Some(found.join("; "))
    }
}
