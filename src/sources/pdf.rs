//! Positioned text spans and image placements read from PDF content streams.
//!
//! Coordinates are reported top-down from the page's upper edge, the way a
//! reader sees the page: `y` grows towards the bottom.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::{debug, warn};

const MAX_FORM_DEPTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(tx: f64, ty: f64) -> Matrix {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    /// `self` applied first, then `other` (PDF row-vector order).
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn from_operands(args: &[Object]) -> Option<Matrix> {
        if args.len() < 6 {
            return None;
        }
        Some(Matrix {
            a: num(&args[0])?,
            b: num(&args[1])?,
            c: num(&args[2])?,
            d: num(&args[3])?,
            e: num(&args[4])?,
            f: num(&args[5])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub x: f64,
    /// Top edge of the span.
    pub y: f64,
    pub size: f64,
}

#[derive(Debug, Clone)]
pub enum ImagePayload {
    /// DCT-encoded stream, already a JPEG file.
    Jpeg(Vec<u8>),
    /// 8-bit samples, 1 (gray) or 3 (RGB) channels.
    Raw {
        width: u32,
        height: u32,
        channels: u8,
        pixels: Vec<u8>,
    },
    Unsupported(String),
}

#[derive(Debug, Clone)]
pub struct PlacedImage {
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Placed with a negative vertical scale (drawn upside down).
    pub flipped: bool,
    /// Size of the stored stream, before any decoding.
    pub encoded_len: usize,
    pub payload: ImagePayload,
}

#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub index: usize,
    pub height: f64,
    pub spans: Vec<TextSpan>,
    pub images: Vec<PlacedImage>,
}

/// Read every page's spans and image placements.
pub fn read_layout(path: &Path) -> Result<Vec<PageLayout>> {
    let doc = Document::load(path).with_context(|| format!("failed to open PDF {}", path.display()))?;
    let mut pages = Vec::new();
    for (index, (_, page_id)) in doc.get_pages().into_iter().enumerate() {
        let page = doc
            .get_dictionary(page_id)
            .with_context(|| format!("page {} is not a dictionary", index + 1))?;
        let (top, height) = media_box(&doc, page).unwrap_or((792.0, 792.0));
        let resources = inherited(&doc, page, b"Resources").and_then(as_dict);
        let content = match doc.get_page_content(page_id) {
            Ok(c) => c,
            Err(err) => {
                warn!(page = index + 1, error = %err, "unreadable page content; skipping");
                Vec::new()
            }
        };
        let mut interp = Interpreter::new(&doc, index, top);
        interp.run(&content, resources, Matrix::IDENTITY, 0);
        let spans = interp.finish_spans();
        debug!(page = index + 1, spans = spans.len(), images = interp.images.len(), "page layout read");
        pages.push(PageLayout {
            index,
            height,
            spans,
            images: interp.images,
        });
    }
    Ok(pages)
}

fn media_box(doc: &Document, page: &Dictionary) -> Option<(f64, f64)> {
    let arr = inherited(doc, page, b"MediaBox").and_then(as_array)?;
    if arr.len() < 4 {
        return None;
    }
    let y0 = num(resolve(doc, &arr[1])?)?;
    let y1 = num(resolve(doc, &arr[3])?)?;
    Some((y0.max(y1), (y1 - y0).abs()))
}

fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> Option<&'a Object> {
    for _ in 0..16 {
        match obj {
            Object::Reference(id) => obj = doc.get_object(*id).ok()?,
            _ => return Some(obj),
        }
    }
    None
}

fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|o| resolve(doc, o))
}

/// Page attribute, walking up the page tree for inheritable keys.
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = page;
    for _ in 0..32 {
        if let Some(v) = dict_get(doc, current, key) {
            return Some(v);
        }
        current = dict_get(doc, current, b"Parent").and_then(as_dict)?;
    }
    None
}

fn as_dict(obj: &Object) -> Option<&Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

fn as_array(obj: &Object) -> Option<&Vec<Object>> {
    match obj {
        Object::Array(a) => Some(a),
        _ => None,
    }
}

fn as_stream(obj: &Object) -> Option<&Stream> {
    match obj {
        Object::Stream(s) => Some(s),
        _ => None,
    }
}

fn name_of(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::Name(n) => Some(n.as_slice()),
        _ => None,
    }
}

fn num(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes.as_slice()),
        _ => None,
    }
}

fn stream_bytes(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

#[derive(Debug, Default)]
struct FontInfo {
    to_unicode: HashMap<u32, String>,
    two_byte: bool,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    default_width: f64,
}

struct Decoded {
    text: String,
    width_units: f64,
    glyphs: usize,
    spaces: usize,
}

impl FontInfo {
    fn load(doc: &Document, font: &Dictionary) -> FontInfo {
        let two_byte = dict_get(doc, font, b"Subtype").and_then(name_of) == Some(b"Type0".as_slice());
        let to_unicode = dict_get(doc, font, b"ToUnicode")
            .and_then(as_stream)
            .map(|s| parse_to_unicode(&stream_bytes(s)))
            .unwrap_or_default();
        let mut info = FontInfo {
            to_unicode,
            two_byte,
            default_width: if two_byte { 1000.0 } else { 500.0 },
            ..Default::default()
        };
        if two_byte {
            let descendant = dict_get(doc, font, b"DescendantFonts")
                .and_then(as_array)
                .and_then(|a| a.first())
                .and_then(|o| resolve(doc, o))
                .and_then(as_dict);
            if let Some(cid) = descendant {
                if let Some(dw) = dict_get(doc, cid, b"DW").and_then(num) {
                    info.default_width = dw;
                }
                if let Some(w) = dict_get(doc, cid, b"W").and_then(as_array) {
                    info.cid_widths = parse_cid_widths(doc, w);
                }
            }
        } else {
            info.first_char = dict_get(doc, font, b"FirstChar")
                .and_then(num)
                .map(|f| f as u32)
                .unwrap_or(0);
            if let Some(w) = dict_get(doc, font, b"Widths").and_then(as_array) {
                info.widths = w
                    .iter()
                    .map(|o| resolve(doc, o).and_then(num).unwrap_or(0.0))
                    .collect();
            }
        }
        info
    }

    fn width(&self, code: u32) -> f64 {
        if self.two_byte {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    fn decode(&self, bytes: &[u8]) -> Decoded {
        let step = if self.two_byte { 2 } else { 1 };
        let mut out = Decoded {
            text: String::new(),
            width_units: 0.0,
            glyphs: 0,
            spaces: 0,
        };
        for chunk in bytes.chunks(step) {
            let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
            out.width_units += self.width(code);
            out.glyphs += 1;
            if step == 1 && code == 32 {
                out.spaces += 1;
            }
            match self.to_unicode.get(&code) {
                Some(s) => out.text.push_str(s),
                None if self.two_byte => {
                    if let Some(ch) = char::from_u32(code).filter(|c| !c.is_control()) {
                        out.text.push(ch);
                    }
                }
                None => {
                    if let Some(ch) = single_byte_char(code as u8) {
                        out.text.push(ch);
                    }
                }
            }
        }
        out
    }
}

/// WinAnsi-ish reading of a single byte code.
fn single_byte_char(b: u8) -> Option<char> {
    let ch = match b {
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x80..=0x9F => return None,
        _ => b as char,
    };
    if ch.is_control() {
        None
    } else {
        Some(ch)
    }
}

fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let items: Vec<&Object> = w.iter().filter_map(|o| resolve(doc, o)).collect();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = num(items[i]) else {
            i += 1;
            continue;
        };
        match items.get(i + 1) {
            Some(Object::Array(list)) => {
                for (k, o) in list.iter().enumerate() {
                    if let Some(wd) = resolve(doc, o).and_then(num) {
                        widths.insert(first as u32 + k as u32, wd);
                    }
                }
                i += 2;
            }
            Some(last) => {
                if let (Some(last), Some(wd)) = (num(last), items.get(i + 2).and_then(|o| num(o))) {
                    let (lo, hi) = (first as u32, last as u32);
                    for code in lo..=hi.min(lo.saturating_add(0xFFFF)) {
                        widths.insert(code, wd);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn cmap_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars();
    let mut word = String::new();
    let flush = |word: &mut String, tokens: &mut Vec<String>| {
        if !word.is_empty() {
            tokens.push(std::mem::take(word));
        }
    };
    while let Some(ch) = chars.next() {
        match ch {
            '<' => {
                flush(&mut word, &mut tokens);
                let mut hex = String::from("<");
                for c in chars.by_ref() {
                    hex.push(c);
                    if c == '>' {
                        break;
                    }
                }
                tokens.push(hex);
            }
            '[' | ']' => {
                flush(&mut word, &mut tokens);
                tokens.push(ch.to_string());
            }
            '%' => {
                flush(&mut word, &mut tokens);
                for c in chars.by_ref() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

fn hex_digits(token: &str) -> Option<String> {
    let inner = token.strip_prefix('<')?.strip_suffix('>')?;
    let digits: String = inner.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(digits)
    } else {
        None
    }
}

fn hex_code(token: &str) -> Option<u32> {
    let digits = hex_digits(token)?;
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}

fn hex_units(token: &str) -> Option<Vec<u16>> {
    let mut digits = hex_digits(token)?;
    while digits.len() % 4 != 0 {
        digits.push('0');
    }
    (0..digits.len())
        .step_by(4)
        .map(|i| u16::from_str_radix(&digits[i..i + 4], 16).ok())
        .collect()
}

/// Code -> text table from a `ToUnicode` CMap (`bfchar` and `bfrange`).
fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let text = String::from_utf8_lossy(data);
    let tokens = cmap_tokens(&text);
    let mut map = HashMap::new();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "beginbfchar" => {
                i += 1;
                while i + 1 < tokens.len() && tokens[i] != "endbfchar" {
                    if let (Some(src), Some(dst)) = (hex_code(&tokens[i]), hex_units(&tokens[i + 1])) {
                        map.insert(src, String::from_utf16_lossy(&dst));
                    }
                    i += 2;
                }
            }
            "beginbfrange" => {
                i += 1;
                while i + 2 < tokens.len() && tokens[i] != "endbfrange" {
                    let lo = hex_code(&tokens[i]);
                    let hi = hex_code(&tokens[i + 1]);
                    if tokens[i + 2] == "[" {
                        let mut j = i + 3;
                        let mut offset = 0u32;
                        while j < tokens.len() && tokens[j] != "]" {
                            if let (Some(lo), Some(dst)) = (lo, hex_units(&tokens[j])) {
                                map.insert(lo + offset, String::from_utf16_lossy(&dst));
                            }
                            offset += 1;
                            j += 1;
                        }
                        i = j + 1;
                    } else {
                        if let (Some(lo), Some(hi), Some(units)) = (lo, hi, hex_units(&tokens[i + 2])) {
                            for (offset, code) in (lo..=hi.min(lo.saturating_add(0xFFFF))).enumerate() {
                                let mut dst = units.clone();
                                if let Some(last) = dst.last_mut() {
                                    *last = last.wrapping_add(offset as u16);
                                }
                                map.insert(code, String::from_utf16_lossy(&dst));
                            }
                        }
                        i += 3;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    map
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Vec<u8>>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// A text run being assembled; adjacent pieces on one baseline merge.
#[derive(Debug)]
struct PendingSpan {
    text: String,
    x: f64,
    end_x: f64,
    baseline: f64,
    size: f64,
}

struct Interpreter<'a> {
    doc: &'a Document,
    page: usize,
    page_top: f64,
    pending: Vec<PendingSpan>,
    images: Vec<PlacedImage>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, page: usize, page_top: f64) -> Self {
        Self {
            doc,
            page,
            page_top,
            pending: Vec::new(),
            images: Vec::new(),
        }
    }

    fn load_fonts(&self, resources: Option<&'a Dictionary>) -> HashMap<Vec<u8>, FontInfo> {
        let mut fonts = HashMap::new();
        let Some(font_dict) = resources
            .and_then(|r| dict_get(self.doc, r, b"Font"))
            .and_then(as_dict)
        else {
            return fonts;
        };
        for (name, obj) in font_dict.iter() {
            if let Some(fd) = resolve(self.doc, obj).and_then(as_dict) {
                fonts.insert(name.clone(), FontInfo::load(self.doc, fd));
            }
        }
        fonts
    }

    fn run(&mut self, content: &[u8], resources: Option<&'a Dictionary>, base: Matrix, depth: usize) {
        let ops = match Content::decode(content) {
            Ok(c) => c.operations,
            Err(err) => {
                warn!(page = self.page + 1, error = %err, "undecodable content stream");
                return;
            }
        };
        let fonts = self.load_fonts(resources);
        let mut gs = GraphicsState {
            ctm: base,
            text: TextState::default(),
        };
        let mut saved: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &ops {
            let args = op.operands.as_slice();
            let arg = |i: usize| args.get(i).and_then(num);
            match op.operator.as_str() {
                "q" => saved.push(gs.clone()),
                "Q" => {
                    if let Some(prev) = saved.pop() {
                        gs = prev;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(args) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    gs.text.font = args.first().and_then(name_of).map(<[u8]>::to_vec);
                    if let Some(size) = arg(1) {
                        gs.text.size = size;
                    }
                }
                "Tc" => gs.text.char_spacing = arg(0).unwrap_or(0.0),
                "Tw" => gs.text.word_spacing = arg(0).unwrap_or(0.0),
                "Tz" => gs.text.h_scale = arg(0).unwrap_or(100.0) / 100.0,
                "TL" => gs.text.leading = arg(0).unwrap_or(0.0),
                "Ts" => gs.text.rise = arg(0).unwrap_or(0.0),
                "Td" | "TD" => {
                    let (tx, ty) = (arg(0).unwrap_or(0.0), arg(1).unwrap_or(0.0));
                    if op.operator == "TD" {
                        gs.text.leading = -ty;
                    }
                    tlm = Matrix::translate(tx, ty).then(&tlm);
                    tm = tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(args) {
                        tm = m;
                        tlm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(bytes) = args.first().and_then(string_bytes) {
                        self.show(&gs, &fonts, &mut tm, bytes);
                    }
                }
                "'" | "\"" => {
                    let text_idx = if op.operator == "\"" {
                        gs.text.word_spacing = arg(0).unwrap_or(gs.text.word_spacing);
                        gs.text.char_spacing = arg(1).unwrap_or(gs.text.char_spacing);
                        2
                    } else {
                        0
                    };
                    tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                    if let Some(bytes) = args.get(text_idx).and_then(string_bytes) {
                        self.show(&gs, &fonts, &mut tm, bytes);
                    }
                }
                "TJ" => {
                    let Some(items) = args.first().and_then(as_array) else {
                        continue;
                    };
                    for item in items {
                        if let Some(bytes) = string_bytes(item) {
                            self.show(&gs, &fonts, &mut tm, bytes);
                        } else if let Some(adj) = num(item) {
                            let tx = -adj / 1000.0 * gs.text.size * gs.text.h_scale;
                            tm = Matrix::translate(tx, 0.0).then(&tm);
                        }
                    }
                }
                "Do" => {
                    if let Some(name) = args.first().and_then(name_of) {
                        self.draw_xobject(name, resources, &gs.ctm, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn show(&mut self, gs: &GraphicsState, fonts: &HashMap<Vec<u8>, FontInfo>, tm: &mut Matrix, bytes: &[u8]) {
        let fallback = FontInfo {
            default_width: 500.0,
            ..Default::default()
        };
        let font = gs
            .text
            .font
            .as_ref()
            .and_then(|f| fonts.get(f))
            .unwrap_or(&fallback);
        let decoded = font.decode(bytes);
        let ts = &gs.text;

        let trm = tm.then(&gs.ctm);
        let (x, baseline) = trm.apply(0.0, ts.rise);
        let scale = (trm.c * trm.c + trm.d * trm.d).sqrt();
        let size = ts.size * if scale > 0.0 { scale } else { 1.0 };

        let advance = (decoded.width_units / 1000.0 * ts.size
            + decoded.glyphs as f64 * ts.char_spacing
            + decoded.spaces as f64 * ts.word_spacing)
            * ts.h_scale;
        *tm = Matrix::translate(advance, 0.0).then(tm);
        let (end_x, _) = tm.then(&gs.ctm).apply(0.0, ts.rise);

        self.push_piece(decoded.text, x, end_x, baseline, size);
    }

    fn push_piece(&mut self, text: String, x: f64, end_x: f64, baseline: f64, size: f64) {
        if let Some(last) = self.pending.last_mut() {
            let gap = x - last.end_x;
            let same_line = (last.baseline - baseline).abs() < 0.5;
            if same_line && gap > -0.5 * size && gap <= (0.3 * size).max(1.0) {
                if gap > 0.15 * size && !last.text.ends_with(' ') && !text.starts_with(' ') {
                    last.text.push(' ');
                }
                last.text.push_str(&text);
                last.end_x = end_x.max(last.end_x);
                return;
            }
        }
        self.pending.push(PendingSpan {
            text,
            x,
            end_x,
            baseline,
            size,
        });
    }

    fn finish_spans(&mut self) -> Vec<TextSpan> {
        let top = self.page_top;
        self.pending
            .drain(..)
            .filter_map(|p| {
                let text = p.text.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                Some(TextSpan {
                    text,
                    x: p.x,
                    y: top - (p.baseline + p.size),
                    size: p.size,
                })
            })
            .collect()
    }

    fn draw_xobject(&mut self, name: &[u8], resources: Option<&'a Dictionary>, ctm: &Matrix, depth: usize) {
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|r| dict_get(doc, r, b"XObject"))
            .and_then(as_dict)
            .and_then(|x| dict_get(doc, x, name))
            .and_then(as_stream)
        else {
            return;
        };
        match dict_get(doc, &stream.dict, b"Subtype").and_then(name_of) {
            Some(b"Image") => self.place_image(stream, ctm),
            Some(b"Form") if depth < MAX_FORM_DEPTH => {
                let form_matrix = dict_get(doc, &stream.dict, b"Matrix")
                    .and_then(as_array)
                    .and_then(|a| Matrix::from_operands(a))
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = dict_get(doc, &stream.dict, b"Resources")
                    .and_then(as_dict)
                    .or(resources);
                let content = stream_bytes(stream);
                self.run(&content, form_resources, form_matrix.then(ctm), depth + 1);
            }
            _ => {}
        }
    }

    fn place_image(&mut self, stream: &Stream, ctm: &Matrix) {
        let corners = [
            ctm.apply(0.0, 0.0),
            ctm.apply(1.0, 0.0),
            ctm.apply(0.0, 1.0),
            ctm.apply(1.0, 1.0),
        ];
        let (mut x0, mut x1, mut y0, mut y1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for (x, y) in corners {
            x0 = x0.min(x);
            x1 = x1.max(x);
            y0 = y0.min(y);
            y1 = y1.max(y);
        }
        self.images.push(PlacedImage {
            page: self.page,
            x: x0,
            y: self.page_top - y1,
            width: x1 - x0,
            height: y1 - y0,
            flipped: ctm.d < 0.0,
            encoded_len: stream.content.len(),
            payload: image_payload(self.doc, stream),
        });
    }
}

fn filter_names(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict_get(doc, dict, b"Filter") {
        Some(Object::Name(n)) => vec![n.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| resolve(doc, o).and_then(name_of).map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn color_channels(doc: &Document, dict: &Dictionary) -> Option<u8> {
    match dict_get(doc, dict, b"ColorSpace")? {
        Object::Name(n) => match n.as_slice() {
            b"DeviceRGB" | b"CalRGB" => Some(3),
            b"DeviceGray" | b"CalGray" => Some(1),
            _ => None,
        },
        Object::Array(items) => {
            let family = items.first().and_then(|o| resolve(doc, o)).and_then(name_of)?;
            if family != b"ICCBased" {
                return None;
            }
            let profile = items.get(1).and_then(|o| resolve(doc, o)).and_then(as_stream)?;
            match dict_get(doc, &profile.dict, b"N").and_then(num)? as u8 {
                n @ (1 | 3) => Some(n),
                _ => None,
            }
        }
        _ => None,
    }
}

fn image_payload(doc: &Document, stream: &Stream) -> ImagePayload {
    let filters = filter_names(doc, &stream.dict);
    let filter_refs: Vec<&[u8]> = filters.iter().map(Vec::as_slice).collect();
    match filter_refs.as_slice() {
        [b"DCTDecode"] => ImagePayload::Jpeg(stream.content.clone()),
        [] | [b"FlateDecode"] => {
            let dim = |key: &[u8]| dict_get(doc, &stream.dict, key).and_then(num).map(|v| v as u32);
            let (Some(width), Some(height)) = (dim(b"Width"), dim(b"Height")) else {
                return ImagePayload::Unsupported("missing dimensions".into());
            };
            if dim(b"BitsPerComponent").unwrap_or(8) != 8 {
                return ImagePayload::Unsupported("non 8-bit samples".into());
            }
            let Some(channels) = color_channels(doc, &stream.dict) else {
                return ImagePayload::Unsupported("unsupported color space".into());
            };
            let pixels = if filters.is_empty() {
                stream.content.clone()
            } else {
                match stream.decompressed_content() {
                    Ok(p) => p,
                    Err(err) => return ImagePayload::Unsupported(err.to_string()),
                }
            };
            let needed = width as usize * height as usize * channels as usize;
            if pixels.len() < needed {
                return ImagePayload::Unsupported("truncated sample data".into());
            }
            ImagePayload::Raw {
                width,
                height,
                channels,
                pixels: pixels[..needed].to_vec(),
            }
        }
        other => ImagePayload::Unsupported(
            other
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect::<Vec<_>>()
                .join("+"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn matrix_composition_matches_pdf_order() {
        let scale = Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::IDENTITY
        };
        let moved = Matrix::translate(10.0, 5.0).then(&scale);
        assert_eq!(moved.apply(1.0, 1.0), (22.0, 12.0));
        let flipped = Matrix {
            d: -1.0,
            f: 100.0,
            ..Matrix::IDENTITY
        };
        assert_eq!(flipped.apply(0.0, 30.0), (0.0, 70.0));
    }

    #[test]
    fn parses_bfchar_and_bfrange_tables() {
        let cmap = b"/CIDInit /ProcSet findresource begin\n\
            2 beginbfchar\n<0003> <0020>\n<0024> <0041>\nendbfchar\n\
            2 beginbfrange\n<0030> <0032> <0061>\n<0040> <0041> [<0058> <0059>]\nendbfrange\nend";
        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x24).map(String::as_str), Some("A"));
        assert_eq!(map.get(&0x31).map(String::as_str), Some("b"));
        assert_eq!(map.get(&0x32).map(String::as_str), Some("c"));
        assert_eq!(map.get(&0x41).map(String::as_str), Some("Y"));
    }

    #[test]
    fn single_byte_fallback_maps_smart_quotes() {
        let font = FontInfo {
            default_width: 500.0,
            ..Default::default()
        };
        let d = font.decode(b"12\x94 Pipe");
        assert_eq!(d.text, "12\u{201D} Pipe");
        assert_eq!(d.glyphs, 8);
        assert_eq!(d.spaces, 1);
        assert_eq!(d.width_units, 4000.0);
    }

    #[test]
    fn reads_spans_and_images_from_generated_pdf() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0u8, 255u8],
        ));
        let content = b"BT /F1 10 Tf 1 0 0 1 50 700 Tm (Frog Pipe) Tj ET \
BT /F1 10 Tf 1 0 0 1 150 700 Tm (CY101) Tj ET \
q 80 0 0 -60 20 760 cm /Im1 Do Q"
            .to_vec();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => dictionary! { "Im1" => image_id },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.pdf");
        doc.save(&path).unwrap();

        let pages = read_layout(&path).unwrap();
        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        let texts: Vec<&str> = page.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Frog Pipe", "CY101"]);
        assert!((page.spans[1].x - 150.0).abs() < 1e-6);
        assert!((page.spans[1].y - 82.0).abs() < 1e-6);

        assert_eq!(page.images.len(), 1);
        let img = &page.images[0];
        assert!(img.flipped);
        assert!((img.y - 32.0).abs() < 1e-6);
        assert!((img.width - 80.0).abs() < 1e-6);
        assert!(matches!(img.payload, ImagePayload::Raw { width: 2, height: 1, channels: 1, .. }));
    }
}
