//! Location-set generation: priority entries first, generated neighbors after.
//!
//! The generator is asked for more candidates than needed, because its lists
//! routinely contain repeats, the anchor itself, or names the caller already
//! supplied. Candidates are deduplicated by [`dedup_key`]. When the first list
//! is still short, one top-up request is made; after that the set is returned
//! short rather than retried.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{info, instrument, warn};

use landingsync_llm::{CompletionRequest, TextGenerator};
use landingsync_shared::{LandingSyncError, Location, LocationSet, Result};

use crate::normalize::{dedup_key, normalize};

/// Extra candidates requested on top of the remaining count (capped at 2x).
const OVERSAMPLE: usize = 20;

/// Maximum number of already-chosen names repeated in the top-up prompt.
const TOP_UP_EXCLUSIONS: usize = 20;

const GENERATION_SYSTEM_PROMPT: &str = "You are a geographic expert that generates \
comprehensive lists of unique locations. You have extensive knowledge of cities, towns, \
neighborhoods, suburbs, and communities across the United States. You NEVER return \
duplicate locations.";

const TOP_UP_SYSTEM_PROMPT: &str = "Generate unique locations not in the existing list.";

/// Builds a [`LocationSet`] around an anchor city.
pub struct LocationSetBuilder<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> LocationSetBuilder<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// Produce `count` unique locations near `anchor`.
    ///
    /// `priority` entries are normalized, deduplicated and placed first; if
    /// they alone reach `count` they are truncated and the generator is not
    /// called. `domain_hint` names the business the pages are for.
    ///
    /// Generated names are compared by [`dedup_key`] but kept as the
    /// generator spelled them; title-casing would mangle names such as
    /// "McKinney, TX".
    ///
    /// Fails with [`LandingSyncError::Generation`] when the first generator
    /// call fails or does not return a JSON array.
    #[instrument(skip_all, fields(anchor = %anchor, count = count))]
    pub async fn build(
        &self,
        anchor: &str,
        count: usize,
        priority: &[String],
        domain_hint: &str,
    ) -> Result<LocationSet> {
        let priority = dedupe_priority(priority);

        if priority.len() >= count {
            if priority.len() > count {
                warn!(
                    priority = priority.len(),
                    count, "priority locations exceed page count, truncating"
                );
            }
            let mut locations = priority;
            locations.truncate(count);
            return Ok(LocationSet {
                priority_count: locations.len(),
                locations,
                requested: count,
            });
        }

        let anchor = anchor.trim();
        if anchor.is_empty() {
            return Err(LandingSyncError::validation(
                "an anchor location is required to generate locations",
            ));
        }

        let remaining = count - priority.len();
        let request_count = remaining
            .saturating_add(OVERSAMPLE)
            .min(remaining.saturating_mul(2));
        info!(
            remaining,
            request_count,
            priority = priority.len(),
            "generating locations"
        );

        let request = CompletionRequest::new(
            GENERATION_SYSTEM_PROMPT,
            generation_prompt(anchor, request_count, &priority, domain_hint),
        )
        .temperature(0.5)
        .max_tokens(4000);

        let text = self.generator.complete(&request).await?;
        let candidates = parse_location_list(&text)?;

        let mut seen: HashSet<String> = priority.iter().map(|l| dedup_key(l.as_str())).collect();
        seen.insert(dedup_key(anchor));

        let mut generated = Vec::new();
        accept_candidates(candidates, &mut seen, &mut generated, usize::MAX);
        info!(unique = generated.len(), "deduplicated generated locations");

        if generated.len() < remaining {
            let needed = remaining - generated.len();
            warn!(
                have = generated.len(),
                needed = remaining,
                "not enough unique locations, requesting more"
            );
            let exclusions: Vec<&str> = priority
                .iter()
                .chain(generated.iter())
                .take(TOP_UP_EXCLUSIONS)
                .map(Location::as_str)
                .collect();

            match self.top_up(anchor, needed, &exclusions).await {
                Ok(extra) => {
                    let before = generated.len();
                    accept_candidates(extra, &mut seen, &mut generated, needed);
                    info!(added = generated.len() - before, "top-up locations accepted");
                }
                Err(e) => warn!(error = %e, "top-up generation failed, continuing short"),
            }
        }

        let priority_count = priority.len();
        let mut locations = priority;
        locations.extend(generated);
        locations.truncate(count);

        let set = LocationSet {
            locations,
            requested: count,
            priority_count,
        };

        if set.is_short() {
            warn!(requested = count, have = set.len(), "location set is short");
        } else {
            info!(
                total = set.len(),
                priority = priority_count,
                "location set complete"
            );
        }

        Ok(set)
    }

    async fn top_up(&self, anchor: &str, needed: usize, exclusions: &[&str]) -> Result<Vec<String>> {
        let request = CompletionRequest::new(
            TOP_UP_SYSTEM_PROMPT,
            top_up_prompt(anchor, needed, exclusions),
        )
        .temperature(0.6)
        .max_tokens(2000);

        let text = self.generator.complete(&request).await?;
        parse_location_list(&text)
    }
}

/// Normalize, drop blanks and duplicates, keep caller order.
pub(crate) fn dedupe_priority(priority: &[String]) -> Vec<Location> {
    let mut seen = HashSet::new();
    priority
        .iter()
        .filter_map(|raw| Location::new(normalize(raw)))
        .filter(|loc| seen.insert(loc.as_str().to_lowercase()))
        .collect()
}

/// Append unseen candidates to `out`, at most `limit` of them.
fn accept_candidates(
    candidates: Vec<String>,
    seen: &mut HashSet<String>,
    out: &mut Vec<Location>,
    limit: usize,
) {
    let mut added = 0;
    for candidate in candidates {
        if added >= limit {
            break;
        }
        let Some(location) = Location::new(&candidate) else {
            continue;
        };
        if seen.insert(dedup_key(location.as_str())) {
            out.push(location);
            added += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Remove a Markdown code fence wrapped around the response.
fn strip_code_fence(text: &str) -> &str {
    static OPEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^```(?:json)?\s*\n?").expect("valid regex"));
    static CLOSE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n?```\s*$").expect("valid regex"));

    let text = text.trim();
    if !text.starts_with("```") {
        return text;
    }

    let start = OPEN_RE.find(text).map_or(0, |m| m.end());
    let body = &text[start..];
    let end = CLOSE_RE.find(body).map_or(body.len(), |m| m.start());
    body[..end].trim()
}

/// Parse a JSON array of names. Non-string elements are skipped.
pub(crate) fn parse_location_list(text: &str) -> Result<Vec<String>> {
    let cleaned = strip_code_fence(text);
    let value: Value = serde_json::from_str(cleaned).map_err(|e| {
        let preview: String = cleaned.chars().take(100).collect();
        LandingSyncError::Generation(format!("failed to parse location list ({e}): {preview}"))
    })?;

    let Value::Array(items) = value else {
        return Err(LandingSyncError::Generation(
            "location list response is not a JSON array".into(),
        ));
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn generation_prompt(
    anchor: &str,
    request_count: usize,
    priority: &[Location],
    domain_hint: &str,
) -> String {
    let city = anchor.split(',').next().unwrap_or(anchor).trim();

    let exclude_block = if priority.is_empty() {
        String::new()
    } else {
        let names: Vec<&str> = priority.iter().map(Location::as_str).collect();
        format!(
            "\n5. Do NOT include any of these already-selected locations: {}",
            names.join(", ")
        )
    };

    let domain_block = match domain_hint.trim() {
        "" => String::new(),
        hint => format!("\nThese locations will be used for {hint} service pages.\n"),
    };

    format!(
        "Generate a list of exactly {request_count} UNIQUE nearby locations around {anchor}.
{domain_block}
CRITICAL REQUIREMENTS:
1. EVERY location must be UNIQUE - no duplicates allowed
2. Each location must be a real, verifiable place
3. Include the state abbreviation (e.g., \"Boulder, CO\" not just \"Boulder\")
4. Do NOT include {anchor} itself{exclude_block}

LOCATION PRIORITY (use this order to fill the list):
1. First: Cities and towns within 30 miles of {anchor}
2. Then: Suburbs and unincorporated communities within 45 miles
3. Then: Neighborhoods and districts within {anchor} metro area (e.g., \"Westside San Antonio, TX\", \"North Austin, TX\")
4. Then: Cities and towns within 60 miles
5. If still needed: Extend to 75 miles to ensure {request_count} unique locations

For rural areas with few nearby cities, include:
- Named neighborhoods (e.g., \"Downtown {city}\")
- Nearby unincorporated communities
- Census-designated places (CDPs)
- Well-known subdivisions or areas

FORMAT: Return ONLY a valid JSON array, no explanations:
[\"City1, ST\", \"City2, ST\", \"Neighborhood Name, ST\", ...]

VERIFY before responding:
- All {request_count} locations are UNIQUE
- No location appears twice
- All locations are real places"
    )
}

fn top_up_prompt(anchor: &str, needed: usize, exclusions: &[&str]) -> String {
    format!(
        "I need {needed} MORE unique locations near {anchor}.

ALREADY HAVE (do NOT repeat these): {existing}

Generate {needed} DIFFERENT locations I don't have yet. Include:
- Neighborhoods within cities (e.g., \"Midtown Atlanta, GA\")
- Small communities and CDPs
- Extend radius up to 100 miles if needed

Return ONLY a JSON array: [\"Location1, ST\", \"Location2, ST\", ...]",
        existing = exclusions.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fence_is_stripped() {
        let text = "```json\n[\"Round Rock, TX\"]\n```";
        assert_eq!(parse_location_list(text).unwrap(), strings(&["Round Rock, TX"]));

        let bare = "```\n[\"Kyle, TX\"]```  ";
        assert_eq!(parse_location_list(bare).unwrap(), strings(&["Kyle, TX"]));
    }

    #[test]
    fn non_strings_are_skipped() {
        let text = r#"["Kyle, TX", 7, null, {"name": "x"}, "Buda, TX"]"#;
        assert_eq!(parse_location_list(text).unwrap(), strings(&["Kyle, TX", "Buda, TX"]));
    }

    #[test]
    fn non_array_is_generation_error() {
        let err = parse_location_list(r#"{"locations": []}"#).unwrap_err();
        assert!(matches!(err, LandingSyncError::Generation(_)));

        let err = parse_location_list("Here are some towns: Kyle, Buda").unwrap_err();
        assert!(matches!(err, LandingSyncError::Generation(_)));
    }

    #[tokio::test]
    async fn duplicates_in_generator_output_collapse() {
        let generator = ScriptedGenerator::new(vec![Ok(
            r#"["Round Rock, TX","Round Rock, TX","Cedar Park, TX","Pflugerville, TX"]"#,
        )]);
        let set = LocationSetBuilder::new(&generator)
            .build("Austin, TX", 3, &[], "plumber")
            .await
            .unwrap();

        assert_eq!(
            set.names(),
            strings(&["Round Rock, TX", "Cedar Park, TX", "Pflugerville, TX"])
        );
        assert_eq!(generator.calls(), 1);
        assert!(!set.is_short());
    }

    #[tokio::test]
    async fn case_and_whitespace_variants_collapse_and_anchor_is_dropped() {
        let generator = ScriptedGenerator::new(vec![Ok(
            r#"["Kyle, TX", " kyle,tx ", "AUSTIN, TX", "Buda, TX", "  "]"#,
        )]);
        let set = LocationSetBuilder::new(&generator)
            .build("Austin, TX", 2, &[], "")
            .await
            .unwrap();

        assert_eq!(set.names(), strings(&["Kyle, TX", "Buda, TX"]));
    }

    #[tokio::test]
    async fn priority_entries_come_first_and_are_deduped() {
        let generator = ScriptedGenerator::new(vec![Ok(
            r#"["Denver, CO","Aurora, CO","Lakewood, CO","Golden, CO","Arvada, CO"]"#,
        )]);
        let set = LocationSetBuilder::new(&generator)
            .build(
                "Boulder, CO",
                5,
                &strings(&["Denver, CO", "denver, co"]),
                "",
            )
            .await
            .unwrap();

        assert_eq!(set.priority_count, 1);
        assert_eq!(
            set.names(),
            strings(&["Denver, CO", "Aurora, CO", "Lakewood, CO", "Golden, CO", "Arvada, CO"])
        );

        let prompt = &generator.requests()[0].user;
        assert!(prompt.contains("exactly 8 UNIQUE"));
        assert!(prompt.contains("already-selected locations: Denver, CO"));
    }

    #[tokio::test]
    async fn priority_filling_the_count_skips_generation() {
        let generator = ScriptedGenerator::new(vec![]);
        let set = LocationSetBuilder::new(&generator)
            .build("Austin, TX", 2, &strings(&["kyle tx", "buda tx", "lockhart tx"]), "")
            .await
            .unwrap();

        assert_eq!(set.names(), strings(&["Kyle, TX", "Buda, TX"]));
        assert_eq!(set.priority_count, 2);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn top_up_fills_shortfall() {
        let generator = ScriptedGenerator::new(vec![
            Ok(r#"["Kyle, TX", "Kyle, TX"]"#),
            Ok(r#"["Kyle, TX", "Buda, TX", "Lockhart, TX"]"#),
        ]);
        let set = LocationSetBuilder::new(&generator)
            .build("Austin, TX", 3, &[], "")
            .await
            .unwrap();

        assert_eq!(set.names(), strings(&["Kyle, TX", "Buda, TX", "Lockhart, TX"]));

        let requests = generator.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].user.contains("I need 2 MORE"));
        assert!(requests[1].user.contains("ALREADY HAVE (do NOT repeat these): Kyle, TX"));
        assert!((requests[1].temperature - 0.6).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn shortfall_after_one_top_up_returns_short_set() {
        let generator = ScriptedGenerator::new(vec![
            Ok(r#"["Kyle, TX"]"#),
            Ok(r#"["Kyle, TX"]"#),
            Ok(r#"["Buda, TX"]"#),
        ]);
        let set = LocationSetBuilder::new(&generator)
            .build("Austin, TX", 3, &[], "")
            .await
            .unwrap();

        assert_eq!(set.names(), strings(&["Kyle, TX"]));
        assert!(set.is_short());
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn top_up_failure_is_not_fatal() {
        let generator = ScriptedGenerator::new(vec![
            Ok(r#"["Kyle, TX"]"#),
            Err(LandingSyncError::Generation("rate limited".into())),
        ]);
        let set = LocationSetBuilder::new(&generator)
            .build("Austin, TX", 2, &[], "")
            .await
            .unwrap();

        assert_eq!(set.names(), strings(&["Kyle, TX"]));
        assert!(set.is_short());
    }

    #[tokio::test]
    async fn first_call_failure_is_fatal() {
        let generator = ScriptedGenerator::new(vec![Ok("not json")]);
        let err = LocationSetBuilder::new(&generator)
            .build("Austin, TX", 2, &[], "")
            .await
            .unwrap_err();
        assert!(matches!(err, LandingSyncError::Generation(_)));
    }

    #[tokio::test]
    async fn generation_request_parameters() {
        let generator = ScriptedGenerator::new(vec![Ok(r#"["Kyle, TX"]"#)]);
        LocationSetBuilder::new(&generator)
            .build("Austin, TX", 1, &[], "roofing")
            .await
            .unwrap();

        let request = &generator.requests()[0];
        assert_eq!(request.max_tokens, 4000);
        assert!((request.temperature - 0.5).abs() < f32::EPSILON);
        assert!(request.system.contains("NEVER return duplicate"));
        assert!(request.user.contains("exactly 2 UNIQUE"));
        assert!(request.user.contains("roofing service pages"));
        assert!(request.user.contains("Downtown Austin"));
    }

    #[tokio::test]
    async fn huge_count_does_not_overflow_candidate_request() {
        let generator = ScriptedGenerator::new(vec![Ok(r#"["Kyle, TX"]"#), Ok("[]")]);
        let set = LocationSetBuilder::new(&generator)
            .build("Austin, TX", usize::MAX, &[], "")
            .await
            .unwrap();

        assert_eq!(set.names(), strings(&["Kyle, TX"]));
        assert!(generator.requests()[0]
            .user
            .contains(&format!("exactly {} UNIQUE", usize::MAX)));
    }

    #[tokio::test]
    async fn generated_names_keep_their_spelling() {
        let generator = ScriptedGenerator::new(vec![Ok(r#"["round rock tx", "McKinney, TX"]"#)]);
        let set = LocationSetBuilder::new(&generator)
            .build("Austin, TX", 2, &[], "")
            .await
            .unwrap();

        assert_eq!(set.names(), strings(&["round rock tx", "McKinney, TX"]));
    }

    #[tokio::test]
    async fn missing_anchor_is_validation_error() {
        let generator = ScriptedGenerator::new(vec![]);
        let err = LocationSetBuilder::new(&generator)
            .build("  ", 2, &[], "")
            .await
            .unwrap_err();
        assert!(matches!(err, LandingSyncError::Validation { .. }));
    }
}
