use chrono::Utc;
use scraper::{Html, Selector};

use crate::heuristics::{extract_clean_text, is_valid_job_description, should_exclude_element};
use crate::models::{
    ExtractionMetadata, JobDescription, JobSource, NO_DESCRIPTION, SiteConfig,
};

/// A fetched page: final URL plus parsed document.
pub struct Page {
    pub url: String,
    pub html: Html,
}

impl Page {
    pub fn parse(url: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            html: Html::parse_document(body),
        }
    }
}

/// Strategy for turning a page into a [`JobDescription`]. Extraction never
/// fails for "not found": it degrades to sentinel values with diagnostics
/// in the extraction metadata.
pub trait Extractor {
    fn name(&self) -> &str;
    fn can_extract(&self, url: &str) -> bool;
    fn extract(&self, page: &Page) -> JobDescription;
}

/// Pick the extractor for a URL: site-specific matchers first (in
/// registration order), then configured dynamic sites, then the generic
/// fallback. Pure function of its inputs.
pub fn extractor_for(url: &str, sites: &[SiteConfig]) -> Box<dyn Extractor> {
    let known: [Box<dyn Extractor>; 3] = [
        Box::new(LinkedInExtractor),
        Box::new(IndeedExtractor),
        Box::new(GlassdoorExtractor),
    ];
    for extractor in known {
        if extractor.can_extract(url) {
            return extractor;
        }
    }
    for config in sites {
        let extractor = DynamicExtractor::new(config.clone());
        if extractor.can_extract(url) {
            return Box::new(extractor);
        }
    }
    Box::new(GenericExtractor)
}

// Minimum cleaned length for title/company candidates.
const MIN_FIELD_CHARS: usize = 2;

pub struct LinkedInExtractor;
pub struct IndeedExtractor;
pub struct GlassdoorExtractor;
pub struct GenericExtractor;

pub struct DynamicExtractor {
    config: SiteConfig,
}

impl DynamicExtractor {
    pub fn new(config: SiteConfig) -> Self {
        Self { config }
    }
}

impl Extractor for LinkedInExtractor {
    fn name(&self) -> &str {
        "linkedin"
    }

    fn can_extract(&self, url: &str) -> bool {
        url.contains("linkedin.com/jobs") || url.contains("linkedin.com/comm/jobs")
    }

    fn extract(&self, page: &Page) -> JobDescription {
        let titles = [
            "h1.top-card-layout__title",
            ".job-details-jobs-unified-top-card__job-title",
            ".jobs-unified-top-card__job-title",
            "h1[data-test-id='job-title']",
            "h1",
        ];
        let companies = [
            ".job-details-jobs-unified-top-card__company-name",
            ".jobs-unified-top-card__company-name",
            ".top-card-layout__second-subline a",
            "a[data-test-id='job-poster-name']",
        ];
        let descriptions = [
            ".jobs-description__content",
            ".jobs-box__html-content",
            ".show-more-less-html__markup",
            ".jobs-description-content__text",
            ".description__text",
            "#job-details",
        ];
        extract_with_selectors(page, JobSource::Linkedin, &titles, &companies, &descriptions)
    }
}

impl Extractor for IndeedExtractor {
    fn name(&self) -> &str {
        "indeed"
    }

    fn can_extract(&self, url: &str) -> bool {
        url.contains("indeed.com")
    }

    fn extract(&self, page: &Page) -> JobDescription {
        let titles = [
            "h1.jobsearch-JobInfoHeader-title",
            "[data-testid='jobsearch-JobInfoHeader-title']",
            "[data-testid='simpler-jobTitle']",
            "h1",
        ];
        let companies = [
            "[data-testid='inlineHeader-companyName']",
            "[data-company-name='true']",
            ".jobsearch-CompanyInfoContainer a",
            "[data-testid='company-name']",
        ];
        let descriptions = [
            "#jobDescriptionText",
            ".jobsearch-jobDescriptionText",
            "[data-testid='jobDescriptionText']",
        ];
        extract_with_selectors(page, JobSource::Indeed, &titles, &companies, &descriptions)
    }
}

impl Extractor for GlassdoorExtractor {
    fn name(&self) -> &str {
        "glassdoor"
    }

    fn can_extract(&self, url: &str) -> bool {
        url.contains("glassdoor.com")
    }

    fn extract(&self, page: &Page) -> JobDescription {
        let titles = [
            "h1[data-test='job-title']",
            "[data-test='jobTitle']",
            "h1",
        ];
        let companies = [
            "[data-test='employer-name']",
            "[data-test='employerName']",
            "[data-test='employer-short-name']",
        ];
        let descriptions = [
            "[data-test='jobDescriptionContent']",
            "#JobDescriptionContainer",
            ".jobDescriptionContent",
        ];
        extract_with_selectors(page, JobSource::Glassdoor, &titles, &companies, &descriptions)
    }
}

impl Extractor for DynamicExtractor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn can_extract(&self, url: &str) -> bool {
        url.contains(&self.config.url_pattern)
    }

    fn extract(&self, page: &Page) -> JobDescription {
        // Config selectors may be comma-separated priority lists.
        let titles: Vec<&str> = split_selector_list(&self.config.selectors.title);
        let companies: Vec<&str> = split_selector_list(&self.config.selectors.company);
        let descriptions: Vec<&str> = split_selector_list(&self.config.selectors.description);
        extract_with_selectors(page, JobSource::Dynamic, &titles, &companies, &descriptions)
    }
}

fn split_selector_list(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

impl Extractor for GenericExtractor {
    fn name(&self) -> &str {
        "generic"
    }

    fn can_extract(&self, _url: &str) -> bool {
        true
    }

    fn extract(&self, page: &Page) -> JobDescription {
        let titles = [
            "h1",
            "[class*='job-title']",
            "[class*='jobTitle']",
            "[class*='position-title']",
            "h2",
        ];
        let companies = [
            "[class*='company-name']",
            "[class*='companyName']",
            "[class*='company']",
            "[class*='employer']",
            "[itemprop='hiringOrganization']",
        ];
        let descriptions = [
            "[class*='job-description']",
            "[class*='jobDescription']",
            "[class*='description']",
            "[itemprop='description']",
            "article",
        ];

        let title = first_text(&page.html, &titles, MIN_FIELD_CHARS)
            .map(|(text, _)| text)
            .or_else(|| document_title(&page.html))
            .unwrap_or_else(|| "Unknown title".to_string());
        let company = first_text(&page.html, &companies, MIN_FIELD_CHARS)
            .map(|(text, _)| text)
            .unwrap_or_else(|| "Unknown company".to_string());

        let mut failed = Vec::new();
        if let Some((description, used)) =
            first_valid_description(&page.html, &descriptions, &mut failed)
        {
            return build_job(page, JobSource::Generic, title, company, description, ExtractionMetadata {
                used_selector: Some(used),
                is_collection: false,
                failed_selectors: failed,
            });
        }

        // Nothing matched directly: scan main's containers and take the
        // longest valid text block (first found wins ties).
        if let Some(description) = longest_candidate(&page.html, &mut failed) {
            return build_job(page, JobSource::Generic, title, company, description, ExtractionMetadata {
                used_selector: None,
                is_collection: true,
                failed_selectors: failed,
            });
        }

        // Last resort: main itself.
        if let Some((description, used)) =
            first_valid_description(&page.html, &["main"], &mut failed)
        {
            return build_job(page, JobSource::Generic, title, company, description, ExtractionMetadata {
                used_selector: Some(used),
                is_collection: false,
                failed_selectors: failed,
            });
        }

        build_job(
            page,
            JobSource::Generic,
            title,
            company,
            NO_DESCRIPTION.to_string(),
            ExtractionMetadata {
                used_selector: None,
                is_collection: false,
                failed_selectors: failed,
            },
        )
    }
}

const CONTAINER_SELECTORS: [&str; 4] =
    ["main div", "main section", "main article", "main [role='article']"];

fn longest_candidate(document: &Html, failed: &mut Vec<String>) -> Option<String> {
    let mut best: Option<(String, usize)> = None;
    for selector_str in CONTAINER_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let mut matched = false;
        for element in document.select(&selector) {
            if should_exclude_element(&element) {
                continue;
            }
            let text = extract_clean_text(&element);
            if !is_valid_job_description(&text) {
                continue;
            }
            matched = true;
            let len = text.chars().count();
            if best.as_ref().is_none_or(|(_, max)| len > *max) {
                best = Some((text, len));
            }
        }
        if !matched {
            failed.push(selector_str.to_string());
        }
    }
    best.map(|(text, _)| text)
}

// Shared known-site/dynamic flow: priority lists, first valid candidate
// wins, sentinel description on total failure.
fn extract_with_selectors(
    page: &Page,
    source: JobSource,
    titles: &[&str],
    companies: &[&str],
    descriptions: &[&str],
) -> JobDescription {
    let title = first_text(&page.html, titles, MIN_FIELD_CHARS)
        .map(|(text, _)| text)
        .or_else(|| document_title(&page.html))
        .unwrap_or_else(|| "Unknown title".to_string());
    let company = first_text(&page.html, companies, MIN_FIELD_CHARS)
        .map(|(text, _)| text)
        .unwrap_or_else(|| "Unknown company".to_string());

    let mut failed = Vec::new();
    match first_valid_description(&page.html, descriptions, &mut failed) {
        Some((description, used)) => build_job(page, source, title, company, description, ExtractionMetadata {
            used_selector: Some(used),
            is_collection: false,
            failed_selectors: failed,
        }),
        None => build_job(
            page,
            source,
            title,
            company,
            NO_DESCRIPTION.to_string(),
            ExtractionMetadata {
                used_selector: None,
                is_collection: false,
                failed_selectors: failed,
            },
        ),
    }
}

fn build_job(
    page: &Page,
    source: JobSource,
    title: String,
    company: String,
    description: String,
    metadata: ExtractionMetadata,
) -> JobDescription {
    JobDescription {
        title,
        company,
        description,
        source,
        url: page.url.clone(),
        extracted_at: Utc::now(),
        extraction_metadata: Some(metadata),
    }
}

// First selector whose first match yields cleaned text of at least
// `min_chars`. Unparseable selectors are skipped.
fn first_text(document: &Html, selectors: &[&str], min_chars: usize) -> Option<(String, String)> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = extract_clean_text(&element);
            if text.chars().count() >= min_chars {
                return Some((text, selector_str.to_string()));
            }
        }
    }
    None
}

fn first_valid_description(
    document: &Html,
    selectors: &[&str],
    failed: &mut Vec<String>,
) -> Option<(String, String)> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            failed.push(selector_str.to_string());
            continue;
        };
        let candidate = document.select(&selector).next().map(|element| {
            (
                should_exclude_element(&element),
                extract_clean_text(&element),
            )
        });
        if let Some((excluded, text)) = candidate {
            if !excluded && is_valid_job_description(&text) {
                return Some((text, selector_str.to_string()));
            }
        }
        failed.push(selector_str.to_string());
    }
    None
}

fn document_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let element = document.select(&selector).next()?;
    let raw = element.text().collect::<String>();
    // Drop site-name suffixes like " - Acme" or " | Acme".
    let head = raw
        .split(['|', '-'])
        .next()
        .unwrap_or(&raw)
        .trim()
        .to_string();
    if head.is_empty() { None } else { Some(head) }
}
