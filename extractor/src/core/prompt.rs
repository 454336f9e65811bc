//! Batch prompt templates

use serde::Serialize;

use crate::error::ExtractorResult;
use crate::types::{Payload, ResponseEncoding};

const STRUCTURED_BATCH_INSTRUCTIONS: &str = r#"You will receive a JSON object whose "records" array holds several texts, each with an "id" and a "content" field.
For every record decide whether its title or content names a locatable place. Only count concrete point-like places or small areas (cities, peaks, bridges, lakes); ignore figurative places and very large regions (mountain ranges, long rivers, provinces, macro-regions).
Read carefully and do not guess. If an historical place name has no known modern equivalent, leave it out.
Return ONLY a JSON array (no explanation, no markdown code fence). Each element must have the form:
{"id":<record id>,"has_place":0 or 1,"places":[{"name":"place name","modern_name":"modern standard name","country":"country or null","province":"province or null","city":"city or null","county":"county or null"}]}
Rules:
1) Cover every id from the input exactly once and copy ids unchanged
2) If has_place is 0, places must be an empty array []
3) Use null for unknown fields, never placeholder words such as "unknown"
4) The reply must be parseable as JSON as-is
5) Always include the generic suffix of administrative units (province, city, county)
6) modern_name must be the modern name, never an historical one, and must not include parent units
7) Be as precise as possible: resolve point-like places to county level and areas to the smallest enclosing unit
Input (JSON):
"#;

const DELIMITED_BATCH_INSTRUCTIONS: &str = r#"Analyse the following texts and decide for each whether its title or content names a locatable place (one whose approximate coordinates or extent can be determined).
For a text with places answer 1 followed by the places, each as name(modern standard name) where the modern standard name uses province-city-county-name, province-city-name, province-name or name depending on scale; for a text without places answer 0.
Give the answers in the order the texts are listed and separate them with ';', for example:
1,West Lake(Zhejiang-Hangzhou-Xihu-West Lake),Yellow Crane Tower(Hubei-Wuhan-Wuchang-Yellow Crane Tower);0;1,Wuchang(Hubei-Wuhan)
Read carefully and do not guess. Return only the answers, no analysis. If an historical place name has no known modern equivalent, leave it out, and make sure every historical name maps to exactly one modern name.
Texts (JSON):
"#;

#[derive(Serialize)]
struct PromptPayload<'a> {
    records: &'a [Payload],
}

/// Prompt construction for batch requests
pub struct PromptTemplate;

impl PromptTemplate {
    /// Fixed instruction text for an encoding
    pub fn instructions(encoding: ResponseEncoding) -> &'static str {
        match encoding {
            ResponseEncoding::StructuredBatch => STRUCTURED_BATCH_INSTRUCTIONS,
            ResponseEncoding::DelimitedBatch => DELIMITED_BATCH_INSTRUCTIONS,
        }
    }

    /// Instructions followed by the compact JSON payload of the batch
    pub fn build(encoding: ResponseEncoding, payloads: &[Payload]) -> ExtractorResult<String> {
        let body = serde_json::to_string(&PromptPayload { records: payloads })?;
        let instructions = Self::instructions(encoding);

        let mut prompt = String::with_capacity(instructions.len() + body.len());
        prompt.push_str(instructions);
        prompt.push_str(&body);
        Ok(prompt)
    }
}
