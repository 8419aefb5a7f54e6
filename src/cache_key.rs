use regex::Regex;

use crate::models::{JobDescription, JobSource};

/// Reclassify a generic-source job by URL substring. Non-generic sources
/// are kept as-is.
pub fn normalize_source(job: &JobDescription) -> JobSource {
    match job.source {
        JobSource::Generic => {
            if job.url.contains("linkedin.com/jobs") {
                JobSource::Linkedin
            } else if job.url.contains("indeed.com") {
                JobSource::Indeed
            } else if job.url.contains("glassdoor.com") {
                JobSource::Glassdoor
            } else {
                JobSource::Generic
            }
        }
        other => other,
    }
}

/// Derive the cache key for a job: `"<normalized-source>:<job-id>"`, where
/// the id is a source-specific extracted identifier or a hash of the URL.
/// Pure and total: any URL/source combination yields a non-empty key, and
/// repeated calls yield identical output.
pub fn generate_cache_key(job: &JobDescription) -> String {
    let source = normalize_source(job);
    let id = extract_job_id(&job.url, source).unwrap_or_else(|| hash_url(&job.url));
    format!("{source}:{id}")
}

/// Pull the site-native job identifier out of a URL. Returns None when no
/// rule matches; malformed URLs simply fail every rule.
pub fn extract_job_id(url: &str, source: JobSource) -> Option<String> {
    match source {
        JobSource::Linkedin => linkedin_job_id(url),
        JobSource::Indeed => capture(url, r"[?&]jk=([^&#]+)"),
        JobSource::Glassdoor => capture(url, r"job-listing/([^/?#]+)"),
        JobSource::Generic | JobSource::Dynamic => generic_job_id(url),
    }
}

fn linkedin_job_id(url: &str) -> Option<String> {
    capture(url, r"/jobs/view/(\d+)")
        .or_else(|| capture(url, r"[?&]currentJobId=(\d+)"))
        .or_else(|| capture(url, r"/jobs/[^/?#]+/(\d+)"))
}

fn generic_job_id(url: &str) -> Option<String> {
    // A generic source that still looks like LinkedIn (normalization could
    // not reclassify, e.g. source was explicitly dynamic) gets the
    // LinkedIn rules first.
    if url.contains("linkedin.com/jobs") {
        if let Some(id) = linkedin_job_id(url) {
            return Some(id);
        }
    }
    capture(url, r"/jobs/(\d+)")
        .or_else(|| capture(url, r"/job/(\d+)"))
        .or_else(|| capture(url, r"[?&]id=([^&#]+)"))
        .or_else(|| capture(url, r"[?&]jobId=([^&#]+)"))
        .or_else(|| capture(url, r"[?&]job_id=([^&#]+)"))
        .or_else(|| capture(url, r"[?&]currentJobId=([^&#]+)"))
}

fn capture(url: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// 32-bit string hash, base-36 encoded. Bit-exact with the classic
/// `h = (h << 5) - h + code` JavaScript hash over UTF-16 code units, so
/// keys stay compatible with caches written by earlier versions.
pub fn hash_url(url: &str) -> String {
    let mut hash: i32 = 0;
    for unit in url.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    to_base36(i64::from(hash).unsigned_abs())
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job(source: JobSource, url: &str) -> JobDescription {
        JobDescription {
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            description: "A real description.".to_string(),
            source,
            url: url.to_string(),
            extracted_at: Utc::now(),
            extraction_metadata: None,
        }
    }

    #[test]
    fn test_generate_cache_key_is_deterministic() {
        let cases = [
            (JobSource::Linkedin, "https://www.linkedin.com/jobs/view/12345"),
            (JobSource::Indeed, "https://indeed.com/viewjob?jk=abc123"),
            (JobSource::Generic, "https://example.com/careers/senior-eng"),
            (JobSource::Generic, "not a url at all"),
        ];
        for (source, url) in cases {
            let j = job(source, url);
            assert_eq!(generate_cache_key(&j), generate_cache_key(&j));
            assert!(!generate_cache_key(&j).is_empty());
        }
    }

    #[test]
    fn test_generic_source_normalizes_to_linkedin() {
        let j = job(
            JobSource::Generic,
            "https://www.linkedin.com/jobs/view/12345",
        );
        assert_eq!(normalize_source(&j), JobSource::Linkedin);
        assert_eq!(generate_cache_key(&j), "linkedin:12345");
    }

    #[test]
    fn test_linkedin_current_job_id_param() {
        let j = job(
            JobSource::Linkedin,
            "https://www.linkedin.com/jobs/search/?currentJobId=987654321&keywords=rust",
        );
        assert_eq!(generate_cache_key(&j), "linkedin:987654321");
    }

    #[test]
    fn test_linkedin_slug_with_trailing_id() {
        let j = job(
            JobSource::Linkedin,
            "https://www.linkedin.com/jobs/senior-rust-engineer/4043212345",
        );
        assert_eq!(generate_cache_key(&j), "linkedin:4043212345");
    }

    #[test]
    fn test_indeed_jk_param() {
        let j = job(JobSource::Indeed, "https://indeed.com/viewjob?jk=abc123");
        assert_eq!(generate_cache_key(&j), "indeed:abc123");
    }

    #[test]
    fn test_glassdoor_job_listing_segment() {
        let j = job(
            JobSource::Glassdoor,
            "https://www.glassdoor.com/job-listing/rust-engineer-acme-JV_IC1147401.htm?src=feed",
        );
        assert_eq!(
            generate_cache_key(&j),
            "glassdoor:rust-engineer-acme-JV_IC1147401.htm"
        );
    }

    #[test]
    fn test_generic_patterns_in_order() {
        let j = job(JobSource::Generic, "https://jobs.acme.dev/jobs/4521");
        assert_eq!(generate_cache_key(&j), "generic:4521");

        let j = job(JobSource::Generic, "https://acme.dev/careers?jobId=rust-7");
        assert_eq!(generate_cache_key(&j), "generic:rust-7");
    }

    #[test]
    fn test_hash_fallback_is_stable_and_distinguishes_urls() {
        let a = job(JobSource::Generic, "https://example.com/careers/senior-eng");
        let b = job(JobSource::Generic, "https://example.com/careers/junior-eng");

        let key_a1 = generate_cache_key(&a);
        let key_a2 = generate_cache_key(&a);
        assert_eq!(key_a1, key_a2);
        assert!(key_a1.starts_with("generic:"));
        assert_ne!(key_a1, generate_cache_key(&b));
    }

    #[test]
    fn test_hash_matches_js_reference_values() {
        // Reference values computed with the JS hash this mirrors:
        // h = (h << 5) - h + c, h |= 0, Math.abs(h).toString(36).
        assert_eq!(hash_url(""), "0");
        assert_eq!(hash_url("a"), "2p");
        assert_eq!(hash_url("abc"), "22ci");
        assert_eq!(hash_url("https://example.com/careers/senior-eng"), "nx7iv0");
    }

    #[test]
    fn test_malformed_url_degrades_to_hash() {
        let j = job(JobSource::Linkedin, "::not-a-url::");
        let key = generate_cache_key(&j);
        assert!(key.starts_with("linkedin:"));
        assert!(key.len() > "linkedin:".len());
    }

    #[test]
    fn test_dynamic_source_is_kept_by_normalization() {
        let j = job(JobSource::Dynamic, "https://boards.acme.io/jobs/99");
        assert_eq!(normalize_source(&j), JobSource::Dynamic);
        assert_eq!(generate_cache_key(&j), "dynamic:99");
    }
}
