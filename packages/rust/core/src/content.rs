//! Page-row assembly: slug, heading and a locally-flavored paragraph.
//!
//! Prose comes from the text generator and is cleaned up before use. Anything
//! the generator gets wrong (errors, placeholders, truncated text) is replaced
//! by one of three fixed templates, so building a row never fails.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use landingsync_llm::{CompletionRequest, TextGenerator};
use landingsync_shared::{AppConfig, HeadingStyle, Location, PageRow};

use crate::pipeline::ProgressReporter;

const CONTENT_SYSTEM_PROMPT: &str = "You are an expert SEO content writer creating \
location-based service pages. Focus on local SEO, user intent, and natural keyword integration.";

/// Shortest body accepted from the generator.
const MIN_CONTENT_CHARS: usize = 50;

/// Keywords beyond this many are left out of the prompt.
const MAX_PROMPT_KEYWORDS: usize = 3;

/// Sentences kept when the generator overshoots the requested length.
const MAX_SENTENCES: usize = 4;

/// Writing parameters shared by every row of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOptions {
    pub tone: String,
    pub length: String,
    pub heading_style: HeadingStyle,
    /// SEO keywords offered to the generator.
    pub keywords: Vec<String>,
    /// Pause between successive generator calls.
    pub content_delay: Duration,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ContentOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tone: config.defaults.content_tone.clone(),
            length: config.defaults.content_length.clone(),
            heading_style: config.defaults.heading_style,
            keywords: Vec::new(),
            content_delay: Duration::from_millis(config.publishing.content_delay_ms),
        }
    }
}

/// Builds [`PageRow`]s, one generator call per row.
pub struct ContentRowBuilder<'a> {
    generator: &'a dyn TextGenerator,
    options: ContentOptions,
}

impl<'a> ContentRowBuilder<'a> {
    pub fn new(generator: &'a dyn TextGenerator, options: ContentOptions) -> Self {
        Self { generator, options }
    }

    pub fn options(&self) -> &ContentOptions {
        &self.options
    }

    /// Build the row for one location.
    #[instrument(skip_all, fields(location = %location))]
    pub async fn build_row(
        &self,
        industry: &str,
        location: &str,
        company_name: Option<&str>,
        keywords: &[String],
    ) -> PageRow {
        let body = self
            .generate_body(industry, location, company_name, keywords)
            .await;

        PageRow {
            identifier: page_identifier(self.options.heading_style, industry, location),
            heading: page_heading(self.options.heading_style, industry, location),
            body,
        }
    }

    /// Build rows for every location in order, pacing generator calls.
    #[instrument(skip_all, fields(industry = %industry, locations = locations.len()))]
    pub async fn build_rows(
        &self,
        industry: &str,
        locations: &[Location],
        company_name: Option<&str>,
        progress: &dyn ProgressReporter,
    ) -> Vec<PageRow> {
        let mut rows = Vec::with_capacity(locations.len());

        for (i, location) in locations.iter().enumerate() {
            if i > 0 && !self.options.content_delay.is_zero() {
                tokio::time::sleep(self.options.content_delay).await;
            }

            let row = self
                .build_row(industry, location.as_str(), company_name, &self.options.keywords)
                .await;
            progress.row_built(&row.heading, i + 1, locations.len());
            rows.push(row);
        }

        rows
    }

    async fn generate_body(
        &self,
        industry: &str,
        location: &str,
        company_name: Option<&str>,
        keywords: &[String],
    ) -> String {
        let request = CompletionRequest::new(
            CONTENT_SYSTEM_PROMPT,
            content_prompt(
                industry,
                location,
                company_name,
                keywords,
                &self.options.tone,
                &self.options.length,
            ),
        )
        .max_tokens(150)
        .temperature(0.7);

        match self.generator.complete(&request).await {
            Ok(text) => {
                let content = post_process(&text, industry, location);
                if validate_content(&content) {
                    debug!(chars = content.len(), "generated content accepted");
                    content
                } else {
                    warn!("generated content failed validation, using template");
                    fallback_content(industry, location, company_name)
                }
            }
            Err(e) => {
                warn!(error = %e, "content generation failed, using template");
                fallback_content(industry, location, company_name)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers and headings
// ---------------------------------------------------------------------------

/// URL-safe slug: lower-case ASCII alphanumerics joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase().replace(", ", "-").replace(' ', "-");
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    kept.split('-')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn page_identifier(style: HeadingStyle, industry: &str, location: &str) -> String {
    match style {
        HeadingStyle::Plain => slugify(location),
        HeadingStyle::Best => slugify(&format!("best-{industry}-{location}")),
    }
}

pub fn page_heading(style: HeadingStyle, industry: &str, location: &str) -> String {
    match style {
        HeadingStyle::Plain => format!("{industry} in {location}"),
        HeadingStyle::Best => format!("Best {industry} in {location}"),
    }
}

// ---------------------------------------------------------------------------
// Prose
// ---------------------------------------------------------------------------

fn content_prompt(
    industry: &str,
    location: &str,
    company_name: Option<&str>,
    keywords: &[String],
    tone: &str,
    length: &str,
) -> String {
    let mut lines = vec![
        format!("Write {length} of {tone} content for a service page about {industry} in {location}."),
        "The content should:".to_string(),
        "- Be informative and engaging".to_string(),
        "- Focus on local service benefits".to_string(),
        "- Use natural language that appeals to potential customers".to_string(),
        "- Avoid promotional language or calls-to-action".to_string(),
        "- Be suitable for a paragraph below a heading".to_string(),
    ];

    if !keywords.is_empty() {
        let shown: Vec<&str> = keywords
            .iter()
            .take(MAX_PROMPT_KEYWORDS)
            .map(String::as_str)
            .collect();
        lines.push(format!(
            "- Naturally incorporate these keywords where appropriate: {}",
            shown.join(", ")
        ));
    }

    if let Some(company) = company_name.filter(|c| !c.trim().is_empty()) {
        lines.push(format!(
            "- You may reference {company} as the service provider if it fits naturally"
        ));
    }

    lines.push("\nGenerate only the paragraph content, no heading or formatting:".to_string());
    lines.join("\n")
}

/// Strip Markdown, collapse whitespace, cap the length and make sure the
/// industry and location are mentioned.
pub fn post_process(content: &str, industry: &str, location: &str) -> String {
    static MARKUP_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[*_#]").expect("valid regex"));
    static WHITESPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let stripped = MARKUP_RE.replace_all(content, "");
    let mut text = WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string();

    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() > MAX_SENTENCES + 1 {
        let kept: Vec<&str> = parts[..MAX_SENTENCES].iter().map(|s| s.trim()).collect();
        text = format!("{}.", kept.join(". "));
    }

    let lower = text.to_lowercase();
    if !lower.contains(&industry.to_lowercase()) {
        text.push_str(&format!(
            " Our {industry} services are designed to meet your specific needs."
        ));
    }
    if !lower.contains(&location.to_lowercase()) {
        text.push_str(&format!(
            " Serving the {location} area with dedication and expertise."
        ));
    }

    text
}

/// True when `content` is publishable as-is.
pub fn validate_content(content: &str) -> bool {
    static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\[.*?\]|INSERT.*?HERE|TODO|Lorem ipsum|Contact us at \d{3}|555-\d{4}|XXX-XXX-XXXX",
        )
        .expect("valid regex")
    });

    content.chars().count() >= MIN_CONTENT_CHARS
        && content.ends_with('.')
        && !PLACEHOLDER_RE.is_match(content)
}

/// Stable bucket in `0..n` for an industry/location pair.
pub fn template_index(industry: &str, location: &str, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let mut hasher = Sha256::new();
    hasher.update(industry.as_bytes());
    hasher.update(location.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % n as u64) as usize
}

/// Template body used when generated prose is unusable.
pub fn fallback_content(industry: &str, location: &str, company_name: Option<&str>) -> String {
    let templates = [
        format!(
            "Finding reliable {industry} in {location} requires expertise and local knowledge. \
Our experienced professionals understand the unique needs of the {location} area and deliver \
solutions tailored to your specific requirements. With a commitment to quality and customer \
satisfaction, we ensure every project meets the highest standards."
        ),
        format!(
            "When it comes to {industry} in {location}, quality and reliability matter most. \
Our team brings years of experience serving the {location} community with professional \
services that exceed expectations. We combine industry best practices with local insights \
to deliver results that last."
        ),
        format!(
            "Professional {industry} services in {location} designed to meet your needs. \
We understand that every client has unique requirements, which is why we offer customized \
solutions backed by expertise and dedication. Our {location} team is committed to \
delivering exceptional results on time and within budget."
        ),
    ];

    let index = template_index(industry, location, templates.len());
    let content = templates[index].clone();

    match company_name.map(str::trim).filter(|c| !c.is_empty()) {
        Some(company) => content
            .replace("Our", &format!("{company}'s"))
            .replace("We ", &format!("At {company}, we ")),
        None => content,
    }
}
