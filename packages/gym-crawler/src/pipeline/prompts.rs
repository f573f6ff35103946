//! LLM prompts for the crawl pipeline.
//!
//! Placeholders use `{name}` and are filled with `str::replace`, so literal
//! JSON braces in the examples need no escaping.

use chrono::NaiveDate;

use crate::types::sitemap::SitemapEntry;

/// Prompt for the cheap timetable detector.
pub const SCHEDULE_CLASSIFIER_PROMPT: &str = r#"You are an HTML content classifier.
Decide whether the HTML below contains a **timetable of training or exercise classes**, NOT a general business-hours notice.

Rules:
1. Answer with exactly "YES" or "NO" (no explanation).
2. Answer "YES" only if you see **several repetitions of times or days together with class names or instructors** (for example: yoga 7am, spinning 8am, pilates 9am).
3. Answer "NO" if:
   - The text only mentions opening hours such as "Monday to Friday 8am-10pm".
   - There are only addresses, phone numbers or general information about the gym.
   - No class, activity or instructor names appear.
4. Ignore isolated words like "schedule", "training" or "gym"; on their own they do not imply a class timetable.

Examples:
---
HTML: "<p>Training hours: Monday to Friday 5am to 11pm</p>"
Answer: NO

HTML: "<div>Yoga - 7:00am<br>Spinning - 8:00am<br>Pilates - 9:00am</div>"
Answer: YES

HTML: "<p>Choose your plan. Monday to Thursday 5am to 11pm</p>"
Answer: NO

HTML: "<div><p>Class: CrossFit</p><p>Time: 6am</p><p>Instructor: Juan</p></div>"
Answer: YES
---

Now classify this HTML:
{content}"#;

/// Prompt for structured fact extraction from one document.
pub const EXTRACT_PROMPT: &str = r#"You are a world-class data extraction agent for the fitness industry. You turn web content into structured records for a PostgreSQL database used for vector search.

Goal: analyze the HTML of a gym page and rigorously extract every piece of information about **locations, prices, schedules and disciplines**.

### Key instructions

1. Output language: every extracted text MUST be written in {language}.
2. Output format: return a single JSON object with exactly these top-level keys:
   "locations", "prices", "schedules", "disciplines"
3. Mandatory search field: every record MUST include "search_summary", one short natural sentence summarizing the record for vector indexing, plus the structured fields of its schema below.
4. Strict separation rule (VERY IMPORTANT):
   - Every different site, address or district MUST be a separate object in "locations".
   - Never combine several addresses or districts into one record.
   - If several sites are mentioned in one sentence (for example "Chacarilla and Miraflores sites"), produce one object per site.
5. Prices per site: some gyms charge differently per site. Put the site the price applies to in "site"; if the price is the same everywhere use "All".
6. Opportunistic search: the page type is only a hint. Scan ALL of the content for data in every category.
7. Empty case: if a category has no valid data, return [] for its key.
8. Normalization: amounts as numbers in "value" with an ISO 4217 code in "currency" (S/ is PEN); explicit day names in "weekday".

### Schedule detection
Tell **business hours of the site** (for example "Monday to Friday 8am - 10pm") apart from **class times** (for example "Yoga Flow - Tuesday 9am with Mariana").
- Hours that apply to the whole site go in "locations", in the "opening_hours" field.
- Hours of a specific class or session go in "schedules" with "class_name", "weekday", "start_time" and so on.
- Always write times on the 24-hour clock (HH:MM).
- When available, write "date" as DD-MM-YYYY (DD-MM is accepted). If no exact date can be determined, leave it empty.
- Use the lastmod and changefreq values and today's date given at the end to infer dates when needed.

### Expected schemas

* "locations": {"search_summary": str, "full_address": str, "district": str, "opening_hours": str}
* "prices": {"search_summary": str, "site": str, "plan_description": str, "value": float, "currency": str, "recurrence": str}
* "schedules": {"search_summary": str, "site": str, "class_name": str, "instructor": str, "date": str, "weekday": str, "start_time": str, "end_time": str}
* "disciplines": {"search_summary": str, "name": str, "description": str}

### Example 1: mixed content

page_url: "https://gym.com/sites/miraflores"
page_type: "locations"
content:
<h2>Our Miraflores site</h2>
<p>Find us at Av. Larco 123, Miraflores, Lima.</p>
<p>Opening hours: Monday to Friday 6am to 10pm, Saturday 8am to 6pm.</p>
<p>Annual Plan: S/ 1500</p>
<p>Yoga Flow - Tuesday 9am with Mariana</p>

Output:
{
  "locations": [
    {"search_summary": "The Miraflores site is at Av. Larco 123, Miraflores, Lima and opens Monday to Friday 06:00-22:00 and Saturday 08:00-18:00.", "full_address": "Av. Larco 123, Miraflores, Lima", "district": "Miraflores", "opening_hours": "Monday-Friday 06:00-22:00; Saturday 08:00-18:00"}
  ],
  "prices": [
    {"search_summary": "Annual Plan for S/ 1500 at the Miraflores site.", "site": "Miraflores", "plan_description": "Annual Plan", "value": 1500.0, "currency": "PEN", "recurrence": "annual"}
  ],
  "schedules": [
    {"search_summary": "Yoga Flow class on Tuesday at 09:00 with Mariana at the Miraflores site.", "site": "Miraflores", "class_name": "Yoga Flow", "instructor": "Mariana", "date": "", "weekday": "Tuesday", "start_time": "09:00", "end_time": ""}
  ],
  "disciplines": []
}

### Example 2: no relevant data

page_url: "https://gym.com/blog/news"
page_type: "general"
content:
<h1>Our blog</h1><p>Read the latest fitness news.</p>

Output:
{"locations": [], "prices": [], "schedules": [], "disciplines": []}

### Final task

gym_name: "{gym_name}"
page_url: "{page_url}"
page_type: "{page_type}"
content:
'''
{content}
'''
lastmod: {lastmod}
changefreq: {changefreq}
today: {today}

Output:"#;

/// Prompt for classifying a site's URLs into intent buckets.
pub const CATEGORIZE_PROMPT: &str = r#"You are an expert data architect and SEO analyst specializing in the fitness industry. Analyze a list of URLs from a gym's sitemap and categorize them by their likely content.

Decide which URLs most likely contain information about:
1. **locations**: physical gym sites, addresses, maps, contact pages.
2. **pricing**: membership plans, prices, fees, sign-up offers.
3. **schedules**: class timetables, calendars, schedules per site.
4. **disciplines**: specific activities such as Yoga, Pilates, Cycling.

Return a JSON object with exactly four keys: "locations", "pricing", "schedules" and "disciplines". Each key holds a list of URLs copied verbatim from the input. A URL may appear in several categories, or in none.

Read URL paths carefully. Spanish keywords such as "sedes", "precios", "horarios" are common; also consider English and Portuguese equivalents.

Example:
Input URLs:
["https://example.com/clases-y-horarios", "https://example.com/sedes/miraflores", "https://example.com/disciplinas/yoga-y-pilates", "https://example.com/es/contacto", "https://example.com/blog/post-1"]

Output:
{
  "locations": ["https://example.com/sedes/miraflores", "https://example.com/es/contacto"],
  "pricing": [],
  "schedules": ["https://example.com/clases-y-horarios"],
  "disciplines": ["https://example.com/clases-y-horarios", "https://example.com/disciplinas/yoga-y-pilates"]
}

Input URLs:
{urls}

Output:"#;

/// System message for the fusion call.
pub const MERGE_SYSTEM_PROMPT: &str =
    "You are an assistant specialized in merging and deduplicating JSON data.";

/// Prompt for fusing per-page extraction results into one dataset.
pub const MERGE_PROMPT: &str = r#"You are an expert in data integration and cleaning for gyms and fitness studios.

Combine and deduplicate structured information extracted from **several pages of the gym "{gym_name}"**. Each page holds partial JSON data with the keys "locations", "prices", "schedules" and "disciplines".

Merge every input into **one unified JSON object**, making sure of:
1. Integrity: do not lose relevant information from any fragment.
2. Consistency: unify formats, data types and site names.
3. Deduplication: when several pages repeat the same site or address, keep it once.
4. Linking: every price and schedule carries a coherent "site" value.
5. Language: write all text in {language}.
6. No traceability: do not include page URLs in the output.
7. Locality: merge locations with similar descriptions into one record. Addresses must be as precise as possible (street, number, district, city). Two sites in the same district or at very close addresses are unlikely.

Expected structure:
{
  "gym": "{gym_name}",
  "locations": [{"search_summary": str, "full_address": str, "district": str, "opening_hours": str}],
  "prices": [{"search_summary": str, "site": str, "plan_description": str, "value": float, "currency": str, "recurrence": str}],
  "schedules": [{"search_summary": str, "site": str, "class_name": str, "instructor": str, "date": str, "weekday": str, "start_time": str, "end_time": str}],
  "disciplines": [{"search_summary": str, "name": str, "description": str}]
}

Input data:

{sources}

Return only the final JSON object, with no explanation. Do not wrap it in code fences or quotes."#;

/// Separator between labeled source blocks in the merge prompt.
pub const SOURCE_SEPARATOR: &str = "\n\n---\n\n";

pub fn format_schedule_classifier_prompt(content: &str) -> String {
    SCHEDULE_CLASSIFIER_PROMPT.replace("{content}", content)
}

/// Page recency metadata used to resolve relative dates.
#[derive(Debug, Clone, Default)]
pub struct RecencyContext {
    pub last_modified: Option<String>,
    pub change_frequency: Option<String>,
    /// Today's date, e.g. "Tuesday, 15-10-2024"
    pub today: String,
}

impl RecencyContext {
    pub fn from_entry(entry: &SitemapEntry, today: NaiveDate) -> Self {
        Self {
            last_modified: entry
                .last_modified
                .map(|dt| dt.format("%d-%m-%Y").to_string()),
            change_frequency: entry.change_frequency.map(|f| f.as_str().to_string()),
            today: today.format("%A, %d-%m-%Y").to_string(),
        }
    }
}

/// Fill the extraction prompt.
///
/// `content` is substituted last so page text that happens to contain a
/// placeholder cannot expand into the template.
pub fn format_extract_prompt(
    gym_name: &str,
    page_url: &str,
    page_type: &str,
    content: &str,
    language: &str,
    recency: &RecencyContext,
) -> String {
    EXTRACT_PROMPT
        .replace("{language}", language)
        .replace("{gym_name}", gym_name)
        .replace("{page_url}", page_url)
        .replace("{page_type}", page_type)
        .replace("{lastmod}", recency.last_modified.as_deref().unwrap_or("unknown"))
        .replace(
            "{changefreq}",
            recency.change_frequency.as_deref().unwrap_or("unknown"),
        )
        .replace("{today}", &recency.today)
        .replace("{content}", content)
}

pub fn format_categorize_prompt(urls_json: &str) -> String {
    CATEGORIZE_PROMPT.replace("{urls}", urls_json)
}

/// Fill the merge prompt from `(source_id, json)` blocks.
pub fn format_merge_prompt(gym_name: &str, language: &str, sources: &[(String, String)]) -> String {
    let blocks = sources
        .iter()
        .map(|(source, json)| format!("SOURCE: {source}\n{json}"))
        .collect::<Vec<_>>()
        .join(SOURCE_SEPARATOR);

    MERGE_PROMPT
        .replace("{gym_name}", gym_name)
        .replace("{language}", language)
        .replace("{sources}", &blocks)
}
