use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use gym_crawler::{
    CrawlerConfig, ExtractorConfig, GymTarget, MergeStrategy, ModelConfig, PipelineConfig,
    ScrollConfig,
};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub gyms: Vec<GymTarget>,
    pub scrape_urls: Vec<String>,
    pub skip_domains: Option<Vec<String>>,
    pub merge_strategy: MergeStrategy,
    pub url_concurrency: usize,
    pub output_language: Option<String>,
    pub models: ModelConfig,
    pub scroll: ScrollConfig,
    pub llm_requests_per_minute: u32,
    pub chrome_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let mut models = ModelConfig::default();
        override_string("MODEL_SCHEDULE_CLASSIFIER", &mut models.schedule_classifier);
        override_string("MODEL_EXTRACTION", &mut models.extraction);
        override_string("MODEL_SCHEDULE_EXTRACTION", &mut models.schedule_extraction);
        override_string("MODEL_CATEGORIZER", &mut models.categorizer);
        override_string("MODEL_MERGER", &mut models.merger);

        let mut scroll = ScrollConfig::default();
        if let Some(steps) = parse_var("SCROLL_MAX_STEPS")? {
            scroll = scroll.with_max_steps(steps);
        }
        if let Some(px) = parse_var("SCROLL_STEP_PX")? {
            scroll = scroll.with_step_px(px);
        }
        if let Some(checks) = parse_var("SCROLL_STABLE_CHECKS")? {
            scroll = scroll.with_stable_checks(checks);
        }

        let merge_strategy = match env::var("MERGE_STRATEGY") {
            Ok(value) => value
                .parse()
                .map_err(anyhow::Error::msg)
                .context("MERGE_STRATEGY must be 'deterministic' or 'llm'")?,
            Err(_) => MergeStrategy::default(),
        };

        Ok(Self {
            database_url: non_empty_var("DATABASE_URL"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_base_url: non_empty_var("OPENAI_BASE_URL"),
            gyms: load_gyms()?,
            scrape_urls: list_var("SCRAPE_URLS").unwrap_or_default(),
            skip_domains: list_var("FRAME_SKIP_DOMAINS"),
            merge_strategy,
            url_concurrency: parse_var("URL_CONCURRENCY")?.unwrap_or(1),
            output_language: non_empty_var("OUTPUT_LANGUAGE"),
            models,
            scroll,
            llm_requests_per_minute: parse_var("LLM_REQUESTS_PER_MINUTE")?.unwrap_or(60),
            chrome_path: non_empty_var("CHROME_PATH").map(PathBuf::from),
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut crawler = CrawlerConfig::default().with_scroll(self.scroll.clone());
        if let Some(domains) = &self.skip_domains {
            crawler = crawler.with_skip_domains(domains.iter().cloned());
        }

        let mut extractor = ExtractorConfig::default();
        if let Some(language) = &self.output_language {
            extractor = extractor.with_output_language(language.clone());
        }

        PipelineConfig::default()
            .with_crawler(crawler)
            .with_extractor(extractor)
            .with_merge_strategy(self.merge_strategy)
            .with_url_concurrency(self.url_concurrency)
            .with_url_overrides(self.scrape_urls.iter().cloned())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn override_string(name: &str, target: &mut String) {
    if let Some(value) = non_empty_var(name) {
        *target = value;
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty_var(name)
        .map(|v| v.parse::<T>().with_context(|| format!("{name} must be a valid number")))
        .transpose()
}

/// Comma-separated list; `None` when unset.
fn list_var(name: &str) -> Option<Vec<String>> {
    non_empty_var(name).map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// Gyms from `GYMS_FILE` (JSON) or `GYM_TARGETS` (`name=url,...`).
fn load_gyms() -> Result<Vec<GymTarget>> {
    if let Some(path) = non_empty_var("GYMS_FILE") {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read GYMS_FILE {path}"))?;
        return parse_gyms_json(&raw).with_context(|| format!("Invalid GYMS_FILE {path}"));
    }
    match non_empty_var("GYM_TARGETS") {
        Some(targets) => parse_gym_targets(&targets),
        None => Ok(Vec::new()),
    }
}

/// `{"name": "url", ...}` or `[{"name": ..., "base_url": ...}, ...]`.
pub fn parse_gyms_json(raw: &str) -> Result<Vec<GymTarget>> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(name, url)| match url.as_str() {
                Some(url) => Ok(GymTarget::new(name, url)),
                None => bail!("URL for gym '{name}' must be a string"),
            })
            .collect(),
        other => Ok(serde_json::from_value(other)?),
    }
}

pub fn parse_gym_targets(raw: &str) -> Result<Vec<GymTarget>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (name, url) = pair
                .split_once('=')
                .with_context(|| format!("GYM_TARGETS entry '{pair}' must be name=url"))?;
            Ok(GymTarget::new(name.trim(), url.trim()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gym_targets() {
        let gyms = parse_gym_targets("zenda=https://zenda.pe/, boost-studio = https://www.boost-studio.com/").unwrap();
        assert_eq!(gyms.len(), 2);
        assert_eq!(gyms[1].name, "boost-studio");
        assert_eq!(gyms[1].base_url, "https://www.boost-studio.com/");
        assert!(parse_gym_targets("zenda").is_err());
    }

    #[test]
    fn test_parse_gyms_json_both_shapes() {
        let map = parse_gyms_json(r#"{"zenda": "https://zenda.pe/"}"#).unwrap();
        let list = parse_gyms_json(r#"[{"name": "zenda", "base_url": "https://zenda.pe/"}]"#).unwrap();
        assert_eq!(map, list);
    }
}
