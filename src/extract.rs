//! HTML helpers shared by the adapters.
//!
//! `scraper::Html` is not `Send`, so every function here parses, extracts and
//! drops the document synchronously. Call them between awaits, never across one.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p[^>]*>([\s\S]*?)</p>").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static DUPLICATE_SLASHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^:/])/{2,}").expect("static regex"));
static SKIPPED_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(logo|icon|avatar|emoji|pixel|spacer|gravatar)").expect("static regex")
});

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("static selector"));
static OG_IMAGE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:image"]"#).expect("static selector")
});
static LD_JSON: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("static selector")
});
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("static selector"));
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").expect("static selector"));

const MIN_IMAGE_DIMENSION: u32 = 100;

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Inner HTML of the first `<p>`, or the whole input when there is none.
pub fn first_paragraph(html: &str) -> String {
    PARAGRAPH
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| html.trim().to_string())
}

/// Strip tags, decode entities and collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join("");
    collapse_whitespace(&text)
}

/// `src` of the first `<img>` in a fragment.
pub fn first_image_src(html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    let src = fragment
        .select(&IMG)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_string);
    src
}

fn too_small(img: &ElementRef) -> bool {
    ["width", "height"].iter().any(|attr| {
        img.value()
            .attr(attr)
            .and_then(|v| v.trim().trim_end_matches("px").parse::<u32>().ok())
            .map(|v| v < MIN_IMAGE_DIMENSION)
            .unwrap_or(false)
    })
}

/// The page's representative image: `og:image` when declared, else the first
/// content image that isn't decoration or a tracking pixel.
pub fn best_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let og = document
        .select(&OG_IMAGE)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string);
    if og.is_some() {
        return og;
    }

    let image = document
        .select(&IMG)
        .filter(|img| !too_small(img))
        .filter_map(|img| {
            let src = img.value().attr("src")?.trim();
            let alt = img.value().attr("alt").unwrap_or_default();
            let class = img.value().attr("class").unwrap_or_default();
            let decorative = src.is_empty()
                || src.starts_with("data:")
                || SKIPPED_IMAGE.is_match(src)
                || SKIPPED_IMAGE.is_match(alt)
                || SKIPPED_IMAGE.is_match(class);
            (!decorative).then(|| src.to_string())
        })
        .next();
    image
}

/// Raw contents of every `application/ld+json` script, in document order.
pub fn json_ld_blocks(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let blocks = document
        .select(&LD_JSON)
        .map(|script| script.text().collect::<String>())
        .collect();
    blocks
}

/// Visible text of the page body, whitespace collapsed.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = match document.select(&BODY).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => document.root_element().text().collect::<Vec<_>>().join(" "),
    };
    collapse_whitespace(&text)
}

/// True when any `div` on the page announces the content as members only.
pub fn has_members_only_notice(html: &str) -> bool {
    let document = Html::parse_document(html);
    let found = document.select(&DIV).any(|div| {
        div.text()
            .collect::<String>()
            .to_lowercase()
            .contains("members only")
    });
    found
}

/// `https://a.org//x///y` -> `https://a.org/x/y`; the scheme separator is kept.
pub fn collapse_duplicate_slashes(url: &str) -> String {
    DUPLICATE_SLASHES.replace_all(url, "$1/").into_owned()
}

pub fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
