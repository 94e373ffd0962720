//! Inline formatting: style contexts, span accumulation and colour parsing.

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, Token,
};

use super::arena::{DomId, FragmentDom};
use crate::model::{Color, Span, SpanStyle};

/// Formatting in effect at a point of the walk.
///
/// Contexts are immutable: entering an element derives a new context for
/// its children and the parent's context is untouched when the walk
/// returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineContext {
    pub style: SpanStyle,
    pub link: Option<String>,
    /// Inside `<pre>`: whitespace is kept as written.
    pub preformatted: bool,
}

impl InlineContext {
    /// Context for the children of element `id`.
    pub fn enter(&self, dom: &FragmentDom, id: DomId) -> InlineContext {
        let mut next = self.clone();
        match dom.tag(id) {
            Some("b" | "strong") => next.style.bold = true,
            Some("i" | "em" | "cite") => next.style.italic = true,
            Some("a") => {
                if let Some(href) = dom.attr_trimmed(id, "href") {
                    next.link = Some(href.to_string());
                }
            }
            Some("font") => {
                if let Some(color) = dom.attr(id, "color").and_then(parse_color_value) {
                    next.style.color = Some(color);
                }
            }
            Some("pre") => next.preformatted = true,
            _ => {}
        }
        if let Some(css) = dom.attr(id, "style") {
            let declared = InlineStyle::parse(css);
            if let Some(bold) = declared.bold {
                next.style.bold = bold;
            }
            if let Some(italic) = declared.italic {
                next.style.italic = italic;
            }
            if let Some(color) = declared.color {
                next.style.color = Some(color);
            }
        }
        next
    }

    fn matches(&self, span: &Span) -> bool {
        span.style == self.style && span.link == self.link
    }
}

/// Accumulates the spans of one text block.
///
/// Whitespace collapses as in HTML rendering: runs become one space,
/// leading whitespace is dropped and trailing whitespace is trimmed by
/// [`SpanBuffer::take`]. A character whose context differs from the last
/// span's starts a new span, so adjacent spans never share both style and
/// link.
#[derive(Debug, Default)]
pub struct SpanBuffer {
    spans: Vec<Span>,
}

impl SpanBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, text: &str, ctx: &InlineContext) {
        for c in text.chars() {
            if ctx.preformatted {
                match c {
                    '\r' => {}
                    '\n' => self.push_break(ctx),
                    _ => self.push_char(c, ctx),
                }
                continue;
            }
            if is_html_space(c) {
                if matches!(self.last_char(), Some(last) if last != ' ' && last != '\n') {
                    self.push_char(' ', ctx);
                }
            } else {
                self.push_char(c, ctx);
            }
        }
    }

    /// A line break (`<br>`).
    pub fn push_break(&mut self, ctx: &InlineContext) {
        self.trim_trailing(|c| c == ' ');
        if self.spans.is_empty() {
            return;
        }
        self.push_char('\n', ctx);
    }

    /// Finish the block and reset the buffer.
    ///
    /// Returns no spans when the block rendered as whitespace only.
    pub fn take(&mut self) -> Vec<Span> {
        self.trim_trailing(|c| c == ' ' || c == '\n');
        let spans = std::mem::take(&mut self.spans);
        if spans.iter().all(|s| s.text.chars().all(char::is_whitespace)) {
            return Vec::new();
        }
        spans
    }

    fn push_char(&mut self, c: char, ctx: &InlineContext) {
        match self.spans.last_mut() {
            Some(last) if ctx.matches(last) => last.text.push(c),
            _ => self.spans.push(Span {
                text: c.to_string(),
                link: ctx.link.clone(),
                style: ctx.style,
            }),
        }
    }

    fn last_char(&self) -> Option<char> {
        self.spans.last().and_then(|s| s.text.chars().last())
    }

    fn trim_trailing(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(last) = self.spans.last_mut() {
            let kept = last.text.trim_end_matches(&pred).len();
            last.text.truncate(kept);
            if !last.text.is_empty() {
                break;
            }
            self.spans.pop();
        }
    }
}

/// ASCII whitespace as defined by HTML. U+00A0 is deliberately excluded.
fn is_html_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0C')
}

// ============================================================================
// Style attributes
// ============================================================================

/// The declarations of a `style` attribute that affect spans.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InlineStyle {
    pub color: Option<Color>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
}

impl InlineStyle {
    /// Parse a `style` attribute. Unknown properties and malformed values
    /// are skipped.
    pub fn parse(css: &str) -> Self {
        let mut style = InlineStyle::default();
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut decl_parser = StyleAttrParser { style: &mut style };
        for result in RuleBodyParser::new(&mut parser, &mut decl_parser) {
            // Lenient: a bad declaration only loses itself.
            let _ = result;
        }
        style
    }
}

struct StyleAttrParser<'a> {
    style: &'a mut InlineStyle,
}

impl<'i> DeclarationParser<'i> for StyleAttrParser<'_> {
    type Declaration = ();
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        match name.to_ascii_lowercase().as_str() {
            "color" => {
                if let Some(color) = parse_color(input) {
                    self.style.color = Some(color);
                }
            }
            "font-weight" => {
                if let Some(bold) = parse_font_weight(input) {
                    self.style.bold = Some(bold);
                }
            }
            "font-style" => {
                if let Ok(ident) = input.expect_ident_cloned() {
                    match ident.to_ascii_lowercase().as_str() {
                        "italic" | "oblique" => self.style.italic = Some(true),
                        "normal" => self.style.italic = Some(false),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        // Consume whatever is left, including `!important`.
        while input.next().is_ok() {}
        Ok(())
    }
}

impl<'i> AtRuleParser<'i> for StyleAttrParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        _name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }
}

impl<'i> QualifiedRuleParser<'i> for StyleAttrParser<'_> {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }
}

impl<'i> RuleBodyItemParser<'i, (), ()> for StyleAttrParser<'_> {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

fn parse_font_weight(input: &mut Parser<'_, '_>) -> Option<bool> {
    match input.next().ok()? {
        Token::Ident(ident) => match ident.to_ascii_lowercase().as_str() {
            "bold" | "bolder" => Some(true),
            "normal" | "lighter" => Some(false),
            _ => None,
        },
        Token::Number {
            int_value: Some(v), ..
        } => Some(*v >= 600),
        _ => None,
    }
}

/// Parse a colour attribute value (`<font color>`), which browsers also
/// accept as bare hex digits.
pub fn parse_color_value(value: &str) -> Option<Color> {
    let value = value.trim();
    if value.len() == 6 && value.chars().all(|c| c.is_ascii_hexdigit()) {
        return parse_hex_color(value);
    }
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    parse_color(&mut parser)
}

/// Parse a CSS colour: `#rgb`, `#rrggbb`, `rgb(r, g, b)` or a named colour.
pub(crate) fn parse_color(input: &mut Parser<'_, '_>) -> Option<Color> {
    if let Ok(ident) = input.try_parse(|i| i.expect_ident_cloned()) {
        return named_color(&ident);
    }

    // Hex colours tokenize as IDHash (#ff0000) or Hash (#222299). The
    // variant check has to happen inside try_parse so a mismatch rewinds.
    if let Ok(hash) = input.try_parse(|i| -> Result<_, ParseError<'_, ()>> {
        match i.next()? {
            Token::IDHash(h) | Token::Hash(h) => Ok(h.clone()),
            _ => Err(i.new_custom_error(())),
        }
    }) {
        return parse_hex_color(hash.as_ref());
    }

    input.try_parse(parse_rgb_function).ok()
}

fn parse_hex_color(hex: &str) -> Option<Color> {
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(
            channel(&hex[0..1])? * 17,
            channel(&hex[1..2])? * 17,
            channel(&hex[2..3])? * 17,
        )),
        6 => Some(Color::rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        _ => None,
    }
}

fn parse_rgb_function<'i>(input: &mut Parser<'i, '_>) -> Result<Color, ParseError<'i, ()>> {
    let name = input.expect_function()?.clone();
    if !name.eq_ignore_ascii_case("rgb") && !name.eq_ignore_ascii_case("rgba") {
        return Err(input.new_custom_error(()));
    }
    input.parse_nested_block(|input| {
        let r = parse_channel(input)?;
        input.expect_comma()?;
        let g = parse_channel(input)?;
        input.expect_comma()?;
        let b = parse_channel(input)?;
        // Alpha is ignored: span colours are opaque.
        while input.next().is_ok() {}
        Ok(Color::rgb(r, g, b))
    })
}

fn parse_channel<'i>(input: &mut Parser<'i, '_>) -> Result<u8, ParseError<'i, ()>> {
    let location = input.current_source_location();
    match input.next()? {
        Token::Number { value, .. } => Ok(value.round().clamp(0.0, 255.0) as u8),
        Token::Percentage { unit_value, .. } => {
            Ok((unit_value * 255.0).round().clamp(0.0, 255.0) as u8)
        }
        _ => Err(location.new_custom_error(())),
    }
}

/// Look up a CSS named colour (case-insensitive).
pub fn named_color(name: &str) -> Option<Color> {
    let name = name.to_ascii_lowercase();
    NAMED_COLORS
        .binary_search_by(|(n, _)| (*n).cmp(name.as_str()))
        .ok()
        .map(|i| {
            let rgb = NAMED_COLORS[i].1;
            Color::rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
        })
}

/// CSS Color Module Level 4 named colours, sorted by name.
static NAMED_COLORS: &[(&str, u32)] = &[
    ("aliceblue", 0xF0F8FF),
    ("antiquewhite", 0xFAEBD7),
    ("aqua", 0x00FFFF),
    ("aquamarine", 0x7FFFD4),
    ("azure", 0xF0FFFF),
    ("beige", 0xF5F5DC),
    ("bisque", 0xFFE4C4),
    ("black", 0x000000),
    ("blanchedalmond", 0xFFEBCD),
    ("blue", 0x0000FF),
    ("blueviolet", 0x8A2BE2),
    ("brown", 0xA52A2A),
    ("burlywood", 0xDEB887),
    ("cadetblue", 0x5F9EA0),
    ("chartreuse", 0x7FFF00),
    ("chocolate", 0xD2691E),
    ("coral", 0xFF7F50),
    ("cornflowerblue", 0x6495ED),
    ("cornsilk", 0xFFF8DC),
    ("crimson", 0xDC143C),
    ("cyan", 0x00FFFF),
    ("darkblue", 0x00008B),
    ("darkcyan", 0x008B8B),
    ("darkgoldenrod", 0xB8860B),
    ("darkgray", 0xA9A9A9),
    ("darkgreen", 0x006400),
    ("darkgrey", 0xA9A9A9),
    ("darkkhaki", 0xBDB76B),
    ("darkmagenta", 0x8B008B),
    ("darkolivegreen", 0x556B2F),
    ("darkorange", 0xFF8C00),
    ("darkorchid", 0x9932CC),
    ("darkred", 0x8B0000),
    ("darksalmon", 0xE9967A),
    ("darkseagreen", 0x8FBC8F),
    ("darkslateblue", 0x483D8B),
    ("darkslategray", 0x2F4F4F),
    ("darkslategrey", 0x2F4F4F),
    ("darkturquoise", 0x00CED1),
    ("darkviolet", 0x9400D3),
    ("deeppink", 0xFF1493),
    ("deepskyblue", 0x00BFFF),
    ("dimgray", 0x696969),
    ("dimgrey", 0x696969),
    ("dodgerblue", 0x1E90FF),
    ("firebrick", 0xB22222),
    ("floralwhite", 0xFFFAF0),
    ("forestgreen", 0x228B22),
    ("fuchsia", 0xFF00FF),
    ("gainsboro", 0xDCDCDC),
    ("ghostwhite", 0xF8F8FF),
    ("gold", 0xFFD700),
    ("goldenrod", 0xDAA520),
    ("gray", 0x808080),
    ("green", 0x008000),
    ("greenyellow", 0xADFF2F),
    ("grey", 0x808080),
    ("honeydew", 0xF0FFF0),
    ("hotpink", 0xFF69B4),
    ("indianred", 0xCD5C5C),
    ("indigo", 0x4B0082),
    ("ivory", 0xFFFFF0),
    ("khaki", 0xF0E68C),
    ("lavender", 0xE6E6FA),
    ("lavenderblush", 0xFFF0F5),
    ("lawngreen", 0x7CFC00),
    ("lemonchiffon", 0xFFFACD),
    ("lightblue", 0xADD8E6),
    ("lightcoral", 0xF08080),
    ("lightcyan", 0xE0FFFF),
    ("lightgoldenrodyellow", 0xFAFAD2),
    ("lightgray", 0xD3D3D3),
    ("lightgreen", 0x90EE90),
    ("lightgrey", 0xD3D3D3),
    ("lightpink", 0xFFB6C1),
    ("lightsalmon", 0xFFA07A),
    ("lightseagreen", 0x20B2AA),
    ("lightskyblue", 0x87CEFA),
    ("lightslategray", 0x778899),
    ("lightslategrey", 0x778899),
    ("lightsteelblue", 0xB0C4DE),
    ("lightyellow", 0xFFFFE0),
    ("lime", 0x00FF00),
    ("limegreen", 0x32CD32),
    ("linen", 0xFAF0E6),
    ("magenta", 0xFF00FF),
    ("maroon", 0x800000),
    ("mediumaquamarine", 0x66CDAA),
    ("mediumblue", 0x0000CD),
    ("mediumorchid", 0xBA55D3),
    ("mediumpurple", 0x9370DB),
    ("mediumseagreen", 0x3CB371),
    ("mediumslateblue", 0x7B68EE),
    ("mediumspringgreen", 0x00FA9A),
    ("mediumturquoise", 0x48D1CC),
    ("mediumvioletred", 0xC71585),
    ("midnightblue", 0x191970),
    ("mintcream", 0xF5FFFA),
    ("mistyrose", 0xFFE4E1),
    ("moccasin", 0xFFE4B5),
    ("navajowhite", 0xFFDEAD),
    ("navy", 0x000080),
    ("oldlace", 0xFDF5E6),
    ("olive", 0x808000),
    ("olivedrab", 0x6B8E23),
    ("orange", 0xFFA500),
    ("orangered", 0xFF4500),
    ("orchid", 0xDA70D6),
    ("palegoldenrod", 0xEEE8AA),
    ("palegreen", 0x98FB98),
    ("paleturquoise", 0xAFEEEE),
    ("palevioletred", 0xDB7093),
    ("papayawhip", 0xFFEFD5),
    ("peachpuff", 0xFFDAB9),
    ("peru", 0xCD853F),
    ("pink", 0xFFC0CB),
    ("plum", 0xDDA0DD),
    ("powderblue", 0xB0E0E6),
    ("purple", 0x800080),
    ("rebeccapurple", 0x663399),
    ("red", 0xFF0000),
    ("rosybrown", 0xBC8F8F),
    ("royalblue", 0x4169E1),
    ("saddlebrown", 0x8B4513),
    ("salmon", 0xFA8072),
    ("sandybrown", 0xF4A460),
    ("seagreen", 0x2E8B57),
    ("seashell", 0xFFF5EE),
    ("sienna", 0xA0522D),
    ("silver", 0xC0C0C0),
    ("skyblue", 0x87CEEB),
    ("slateblue", 0x6A5ACD),
    ("slategray", 0x708090),
    ("slategrey", 0x708090),
    ("snow", 0xFFFAFA),
    ("springgreen", 0x00FF7F),
    ("steelblue", 0x4682B4),
    ("tan", 0xD2B48C),
    ("teal", 0x008080),
    ("thistle", 0xD8BFD8),
    ("tomato", 0xFF6347),
    ("turquoise", 0x40E0D0),
    ("violet", 0xEE82EE),
    ("wheat", 0xF5DEB3),
    ("white", 0xFFFFFF),
    ("whitesmoke", 0xF5F5F5),
    ("yellow", 0xFFFF00),
    ("yellowgreen", 0x9ACD32),
];
