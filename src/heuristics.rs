use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

// Thresholds for the description-validity heuristic. All checks are
// deterministic functions of the input text.
const MIN_DESCRIPTION_CHARS: usize = 100;
const MIN_SENTENCE_COUNT: usize = 2;
const SHORT_LINE_CHARS: usize = 40;
const MAX_SHORT_LINE_RATIO: f64 = 0.6;
const MAX_REPEATED_LINE_RATIO: f64 = 0.3;
const NAV_KEYWORD_LIMIT: usize = 3;

const NAV_KEYWORDS: &[&str] = &[
    "home", "about", "contact", "menu", "search", "login", "sign in", "cookie", "privacy",
];

// Tags never worth descending into when collecting description text.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "select", "option",
];

// Tags that introduce a paragraph break in cleaned text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "li", "ul", "ol", "br", "h1", "h2", "h3", "h4", "h5", "h6",
    "tr", "table", "blockquote",
];

const EXCLUDE_TAGS: &[&str] = &["nav", "header", "footer", "aside", "form", "button"];

// Substrings of id/class values that mark non-content chrome.
const EXCLUDE_PATTERNS: &[&str] = &[
    "nav", "menu", "header", "footer", "sidebar", "banner", "cookie", "consent", "advert",
    "promo", "social", "share", "related", "recommend", "comment", "breadcrumb", "modal",
    "popup", "subscribe", "signup", "login",
];

const EXCLUDE_ROLES: &[&str] = &["navigation", "banner", "contentinfo", "complementary"];

/// Decide whether `text` is plausible job-description prose rather than
/// navigation or boilerplate.
pub fn is_valid_job_description(text: &str) -> bool {
    let text = text.trim();
    if text.chars().count() < MIN_DESCRIPTION_CHARS {
        return false;
    }

    // Prose has sentences; link farms and menus don't.
    let sentence_count = text.matches(['.', '!', '?']).count();
    if sentence_count < MIN_SENTENCE_COUNT {
        return false;
    }

    // A nav-keyword pileup at the start means we grabbed page chrome.
    let head: String = text.to_lowercase().chars().take(120).collect();
    let nav_hits = NAV_KEYWORDS.iter().filter(|k| head.contains(*k)).count();
    if nav_hits >= NAV_KEYWORD_LIMIT {
        return false;
    }

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() >= 5 {
        let short = lines
            .iter()
            .filter(|l| l.chars().count() < SHORT_LINE_CHARS)
            .count();
        if short as f64 / lines.len() as f64 > MAX_SHORT_LINE_RATIO {
            return false;
        }

        let mut seen = std::collections::HashSet::new();
        let repeated = lines.iter().filter(|l| !seen.insert(**l)).count();
        if repeated as f64 / lines.len() as f64 > MAX_REPEATED_LINE_RATIO {
            return false;
        }
    }

    true
}

/// Collect the readable text of an element, skipping script/style/nav-like
/// descendants, collapsing whitespace, and keeping paragraph breaks.
pub fn extract_clean_text(element: &ElementRef) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);

    // Block boundaries became "\n\n" markers; everything between them is one
    // paragraph whose internal whitespace collapses to single spaces.
    let paragraphs: Vec<String> = raw
        .split("\n\n")
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| !para.is_empty())
        .collect();
    paragraphs.join("\n\n")
}

fn collect_text(element: &ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(el) => {
                let name = el.name();
                if SKIP_TAGS.contains(&name) {
                    continue;
                }
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                if should_exclude_element(&child_ref) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push_str("\n\n");
                }
                collect_text(&child_ref, out);
                if block {
                    out.push_str("\n\n");
                }
            }
            _ => {}
        }
    }
}

/// Filter out elements that are page chrome (ads, navigation, footers)
/// before they are considered as description candidates.
pub fn should_exclude_element(element: &ElementRef) -> bool {
    let el = element.value();
    if EXCLUDE_TAGS.contains(&el.name()) {
        return true;
    }
    if let Some(role) = el.attr("role") {
        if EXCLUDE_ROLES.contains(&role) {
            return true;
        }
    }

    let mut haystack = String::new();
    if let Some(id) = el.id() {
        haystack.push_str(&id.to_lowercase());
    }
    for class in el.classes() {
        haystack.push(' ');
        haystack.push_str(&class.to_lowercase());
    }
    if haystack.is_empty() {
        return false;
    }
    EXCLUDE_PATTERNS.iter().any(|p| haystack.contains(p))
}

/// Produce a CSS selector that uniquely identifies `element` within
/// `document`. Preference order: unique id, unique test-data attribute,
/// unique class combination, structural nth-of-type path. Deterministic
/// for a given document state.
pub fn unique_selector(document: &Html, element: &ElementRef) -> String {
    if let Some(id) = element.value().id() {
        let candidate = format!("#{id}");
        if matches_uniquely(document, &candidate, element) {
            return candidate;
        }
    }

    for attr in ["data-testid", "data-test-id", "data-qa", "data-test"] {
        if let Some(value) = element.value().attr(attr) {
            if value.is_empty() || value.contains('"') {
                continue;
            }
            let candidate = format!("[{attr}=\"{value}\"]");
            if matches_uniquely(document, &candidate, element) {
                return candidate;
            }
        }
    }

    let classes: Vec<&str> = element.value().classes().collect();
    if !classes.is_empty() {
        let candidate = format!("{}.{}", element.value().name(), classes.join("."));
        if matches_uniquely(document, &candidate, element) {
            return candidate;
        }
    }

    structural_path(document, element)
}

// Walk up to (but excluding) body/html, emitting tag:nth-of-type(n)
// segments. An ancestor with a document-unique id terminates the walk.
fn structural_path(document: &Html, element: &ElementRef) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut current = *element;
    loop {
        let name = current.value().name();
        if name == "body" || name == "html" {
            break;
        }
        if current.id() != element.id() {
            if let Some(id) = current.value().id() {
                let candidate = format!("#{id}");
                if count_matches(document, &candidate) == 1 {
                    segments.push(candidate);
                    break;
                }
            }
        }
        segments.push(format!("{}:nth-of-type({})", name, nth_of_type(&current)));
        match current.parent().and_then(ElementRef::wrap) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    segments.reverse();
    segments.join(" > ")
}

fn nth_of_type(element: &ElementRef) -> usize {
    let name = element.value().name();
    element
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| sibling.value().name() == name)
        .count()
        + 1
}

fn matches_uniquely(document: &Html, selector: &str, target: &ElementRef) -> bool {
    let Ok(parsed) = Selector::parse(selector) else {
        return false;
    };
    let mut found = document.select(&parsed);
    match (found.next(), found.next()) {
        (Some(first), None) => first.id() == target.id(),
        _ => false,
    }
}

fn count_matches(document: &Html, selector: &str) -> usize {
    match Selector::parse(selector) {
        Ok(parsed) => document.select(&parsed).count(),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first<'a>(document: &'a Html, selector: &str) -> ElementRef<'a> {
        let sel = Selector::parse(selector).unwrap();
        document.select(&sel).next().unwrap()
    }

    const PROSE: &str = "We are looking for a senior engineer to join our platform team. \
        You will design and operate distributed services in Rust. \
        Five years of backend experience is required, and familiarity with \
        PostgreSQL and Kubernetes is a strong plus.";

    #[test]
    fn test_valid_description_accepts_prose() {
        assert!(is_valid_job_description(PROSE));
    }

    #[test]
    fn test_valid_description_rejects_short_text() {
        assert!(!is_valid_job_description("Apply now."));
    }

    #[test]
    fn test_valid_description_rejects_sentenceless_text() {
        let text = "rust engineer backend platform team remote full time senior level \
            competitive salary equity benefits flexible hours great culture apply today";
        assert!(!is_valid_job_description(text));
    }

    #[test]
    fn test_valid_description_rejects_nav_keyword_pileup() {
        let text = "Home About Contact Search Login. Browse all our open positions. \
            Use the menu to find teams, locations, and departments across the company.";
        assert!(!is_valid_job_description(text));
    }

    #[test]
    fn test_valid_description_rejects_repeated_short_lines() {
        let text = "See details.\nSee details.\nSee details.\nSee details.\n\
            See details.\nSee details.\nSee details.\nSee details.";
        assert!(!is_valid_job_description(text));
    }

    #[test]
    fn test_extract_clean_text_skips_script_and_collapses_whitespace() {
        let html = Html::parse_document(
            "<div id='d'><p>First   paragraph</p><script>var x = 1;</script>\
             <p>Second\n paragraph</p></div>",
        );
        let text = extract_clean_text(&first(&html, "#d"));
        assert_eq!(text, "First paragraph\n\nSecond paragraph");
    }

    #[test]
    fn test_extract_clean_text_skips_excluded_descendants() {
        let html = Html::parse_document(
            "<div id='d'><p>Real content here</p>\
             <div class='cookie-banner'>We use cookies</div></div>",
        );
        let text = extract_clean_text(&first(&html, "#d"));
        assert_eq!(text, "Real content here");
    }

    #[test]
    fn test_should_exclude_element_by_tag_class_and_role() {
        let html = Html::parse_document(
            "<nav id='n'></nav>\
             <div id='a' class='site-footer'></div>\
             <div id='r' role='navigation'></div>\
             <div id='ok' class='job-description'></div>",
        );
        assert!(should_exclude_element(&first(&html, "#n")));
        assert!(should_exclude_element(&first(&html, "#a")));
        assert!(should_exclude_element(&first(&html, "#r")));
        assert!(!should_exclude_element(&first(&html, "#ok")));
    }

    #[test]
    fn test_unique_selector_prefers_id() {
        let html = Html::parse_document("<div id='content'><p>x</p></div>");
        let sel = unique_selector(&html, &first(&html, "#content"));
        assert_eq!(sel, "#content");
    }

    #[test]
    fn test_unique_selector_uses_test_attribute() {
        let html =
            Html::parse_document("<div><span data-testid='job-title'>Engineer</span></div>");
        let sel = unique_selector(&html, &first(&html, "span"));
        assert_eq!(sel, "[data-testid=\"job-title\"]");
    }

    #[test]
    fn test_unique_selector_uses_class_combination() {
        let html = Html::parse_document(
            "<div class='card'></div><div class='card featured'><p>x</p></div>",
        );
        let sel = unique_selector(&html, &first(&html, ".featured"));
        assert_eq!(sel, "div.card.featured");
    }

    #[test]
    fn test_unique_selector_structural_path_stops_at_ancestor_id() {
        let html = Html::parse_document(
            "<div id='app'><section><p>a</p><p>b</p></section></div>",
        );
        let sel = Selector::parse("p").unwrap();
        let second = html.select(&sel).nth(1).unwrap();
        assert_eq!(
            unique_selector(&html, &second),
            "#app > section:nth-of-type(1) > p:nth-of-type(2)"
        );
    }

    #[test]
    fn test_unique_selector_is_deterministic() {
        let html = Html::parse_document(
            "<div><ul><li>one</li><li>two</li><li>three</li></ul></div>",
        );
        let sel = Selector::parse("li").unwrap();
        let third = html.select(&sel).nth(2).unwrap();
        let a = unique_selector(&html, &third);
        let b = unique_selector(&html, &third);
        assert_eq!(a, b);
        assert!(a.ends_with("li:nth-of-type(3)"));
    }

    #[test]
    fn test_non_unique_class_falls_back_to_path() {
        let html = Html::parse_document(
            "<div class='card'><p>a</p></div><div class='card'><p>b</p></div>",
        );
        let sel = Selector::parse(".card").unwrap();
        let second = html.select(&sel).nth(1).unwrap();
        assert_eq!(unique_selector(&html, &second), "div:nth-of-type(2)");
    }
}
