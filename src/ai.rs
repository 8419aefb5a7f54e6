use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::models::{ChecklistItem, JobDescription, MatchResult};

// --- Provider trait ---

pub trait AIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    match name {
        // Anthropic API (requires ANTHROPIC_API_KEY)
        "sonnet" | "claude-sonnet" => Ok(ModelSpec {
            provider: ProviderKind::Anthropic,
            model_id: "claude-sonnet-4-5-20250929".to_string(),
            short_name: "sonnet".to_string(),
        }),
        "opus" | "claude-opus" => Ok(ModelSpec {
            provider: ProviderKind::Anthropic,
            model_id: "claude-opus-4-6".to_string(),
            short_name: "opus".to_string(),
        }),
        "haiku" | "claude-haiku" => Ok(ModelSpec {
            provider: ProviderKind::Anthropic,
            model_id: "claude-haiku-4-5-20251001".to_string(),
            short_name: "haiku".to_string(),
        }),
        // OpenAI (requires OPENAI_API_KEY)
        "gpt-4o" => Ok(ModelSpec {
            provider: ProviderKind::OpenAI,
            model_id: "gpt-4o".to_string(),
            short_name: "gpt-4o".to_string(),
        }),
        "gpt-4o-mini" => Ok(ModelSpec {
            provider: ProviderKind::OpenAI,
            model_id: "gpt-4o-mini".to_string(),
            short_name: "gpt-4o-mini".to_string(),
        }),
        "o3" => Ok(ModelSpec {
            provider: ProviderKind::OpenAI,
            model_id: "o3".to_string(),
            short_name: "o3".to_string(),
        }),
        _ => Err(anyhow!(
            "Unknown model '{}'. Available: sonnet (default), opus, haiku, gpt-4o, gpt-4o-mini, o3",
            name
        )),
    }
}

pub fn create_provider(spec: &ModelSpec) -> Result<Box<dyn AIProvider>> {
    match spec.provider {
        ProviderKind::Anthropic => {
            let provider = AnthropicProvider::new(spec.model_id.clone())?;
            Ok(Box::new(provider))
        }
        ProviderKind::OpenAI => {
            let provider = OpenAIProvider::new(spec.model_id.clone())?;
            Ok(Box::new(provider))
        }
    }
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[allow(dead_code)]
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set. Set it with: export ANTHROPIC_API_KEY=your-key-here")?;
        let client = reqwest::blocking::Client::new();
        Ok(Self { api_key, model_id, client })
    }
}

impl AIProvider for AnthropicProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Anthropic API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: AnthropicResponse = response
            .json()
            .context("Failed to parse Anthropic API response")?;

        api_response
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| anyhow!("No content in Anthropic API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<OpenAIMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=your-key-here")?;
        let client = reqwest::blocking::Client::new();
        Ok(Self { api_key, model_id, client })
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model_id.clone(),
            max_tokens,
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAIResponse = response
            .json()
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Resume matching ---

/// Match a resume against an extracted job posting. Provider errors
/// propagate and abort the attempt; there is no retry here.
pub fn match_resume(
    provider: &dyn AIProvider,
    resume: &str,
    job: &JobDescription,
) -> Result<MatchResult> {
    let prompt = format!(
        "Compare this resume against the job posting and assess how well they match.\n\n\
        Return EXACTLY in this format:\n\
        MATCH: <number 0-100>\n\
        ANALYSIS:\n\
        <2-3 paragraph assessment of fit, strengths, and gaps>\n\
        CHECKLIST:\n\
        [x] <category>: <requirement the resume clearly satisfies>\n\
        [ ] <category>: <requirement the resume does not satisfy>\n\n\
        Use one checklist line per requirement, with categories like skills, \
        experience, education, location.\n\n\
        Job Title: {}\n\
        Company: {}\n\n\
        Job Posting:\n{}\n\n\
        Resume:\n{}",
        job.title, job.company, job.description, resume
    );

    let response = provider.complete(&prompt, 4096)?;
    Ok(parse_match_response(&response, job))
}

enum Section {
    Preamble,
    Analysis,
    Checklist,
}

// Lenient line-oriented parser: missing sections degrade to defaults
// rather than failing the whole match.
fn parse_match_response(response: &str, job: &JobDescription) -> MatchResult {
    let mut match_percentage = 0u8;
    let mut analysis = String::new();
    let mut checklist = Vec::new();
    let mut section = Section::Preamble;

    for line in response.lines() {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("MATCH:") {
            match_percentage = rest.trim().parse::<f64>().unwrap_or(0.0).clamp(0.0, 100.0) as u8;
            continue;
        }
        if trimmed.starts_with("ANALYSIS:") {
            section = Section::Analysis;
            continue;
        }
        if trimmed.starts_with("CHECKLIST:") {
            section = Section::Checklist;
            continue;
        }

        match section {
            Section::Preamble => {}
            Section::Analysis => {
                if !analysis.is_empty() {
                    analysis.push('\n');
                }
                analysis.push_str(line);
            }
            Section::Checklist => {
                if let Some(item) = parse_checklist_line(trimmed) {
                    checklist.push(item);
                }
            }
        }
    }

    MatchResult {
        match_percentage,
        analysis: analysis.trim().to_string(),
        checklist,
        job: job.clone(),
        is_cached: false,
    }
}

fn parse_checklist_line(line: &str) -> Option<ChecklistItem> {
    let (checked, rest) = if let Some(rest) =
        line.strip_prefix("[x]").or_else(|| line.strip_prefix("[X]"))
    {
        (true, rest)
    } else if let Some(rest) = line.strip_prefix("[ ]") {
        (false, rest)
    } else {
        return None;
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    let (category, description) = match rest.split_once(':') {
        Some((category, description)) => (category.trim(), description.trim()),
        None => ("general", rest),
    };
    Some(ChecklistItem {
        category: category.to_string(),
        checked,
        description: description.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobSource;
    use chrono::Utc;

    fn job() -> JobDescription {
        JobDescription {
            title: "Rust Engineer".to_string(),
            company: "Acme".to_string(),
            description: "Build backend services in Rust.".to_string(),
            source: JobSource::Linkedin,
            url: "https://linkedin.com/jobs/view/1".to_string(),
            extracted_at: Utc::now(),
            extraction_metadata: None,
        }
    }

    #[test]
    fn test_resolve_model_anthropic() {
        let spec = resolve_model("sonnet").unwrap();
        assert_eq!(spec.model_id, "claude-sonnet-4-5-20250929");
        assert!(matches!(spec.provider, ProviderKind::Anthropic));

        let spec = resolve_model("claude-opus").unwrap();
        assert_eq!(spec.short_name, "opus");

        let spec = resolve_model("haiku").unwrap();
        assert!(matches!(spec.provider, ProviderKind::Anthropic));
    }

    #[test]
    fn test_resolve_model_openai() {
        let spec = resolve_model("gpt-4o").unwrap();
        assert!(matches!(spec.provider, ProviderKind::OpenAI));

        let spec = resolve_model("o3").unwrap();
        assert_eq!(spec.model_id, "o3");
    }

    #[test]
    fn test_resolve_model_unknown() {
        assert!(resolve_model("gpt-3").is_err());
    }

    #[test]
    fn test_anthropic_provider_requires_api_key() {
        let original = env::var("ANTHROPIC_API_KEY").ok();
        unsafe { env::remove_var("ANTHROPIC_API_KEY"); }

        let result = AnthropicProvider::new("claude-sonnet-4-5-20250929".to_string());

        if let Some(val) = original {
            unsafe { env::set_var("ANTHROPIC_API_KEY", val); }
        }

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let original = env::var("OPENAI_API_KEY").ok();
        unsafe { env::remove_var("OPENAI_API_KEY"); }

        let result = OpenAIProvider::new("gpt-4o".to_string());

        if let Some(val) = original {
            unsafe { env::set_var("OPENAI_API_KEY", val); }
        }

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_parse_match_response_full() {
        let response = "MATCH: 82\n\
            ANALYSIS:\n\
            Strong alignment on core skills.\n\
            Some gaps in infrastructure experience.\n\
            CHECKLIST:\n\
            [x] skills: Rust experience\n\
            [X] experience: 5+ years backend\n\
            [ ] skills: Kubernetes\n\
            not a checklist line\n";
        let result = parse_match_response(response, &job());

        assert_eq!(result.match_percentage, 82);
        assert_eq!(
            result.analysis,
            "Strong alignment on core skills.\nSome gaps in infrastructure experience."
        );
        assert_eq!(result.checklist.len(), 3);
        assert!(result.checklist[0].checked);
        assert_eq!(result.checklist[0].category, "skills");
        assert!(result.checklist[1].checked);
        assert!(!result.checklist[2].checked);
        assert_eq!(result.checklist[2].description, "Kubernetes");
        assert!(!result.is_cached);
    }

    #[test]
    fn test_parse_match_response_clamps_score() {
        let result = parse_match_response("MATCH: 250", &job());
        assert_eq!(result.match_percentage, 100);

        let result = parse_match_response("MATCH: nonsense", &job());
        assert_eq!(result.match_percentage, 0);
    }

    #[test]
    fn test_parse_match_response_missing_sections_degrade() {
        let result = parse_match_response("The model ignored the format.", &job());
        assert_eq!(result.match_percentage, 0);
        assert!(result.analysis.is_empty());
        assert!(result.checklist.is_empty());
    }

    #[test]
    fn test_parse_checklist_line_without_category() {
        let item = parse_checklist_line("[x] Strong Rust background").unwrap();
        assert_eq!(item.category, "general");
        assert_eq!(item.description, "Strong Rust background");
        assert!(item.checked);
    }
}
