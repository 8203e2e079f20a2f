// Narrative collaborator seam: prompt construction and tolerant parsing of
// the tagged response format. Missing or mangled tags never fail a request;
// every field has a neutral default that is part of the contract.

pub mod gemini;

use crate::model::{MetricsSnapshot, NarrativeError, SmartMoney};
use regex::{Regex, RegexBuilder};

pub use gemini::GeminiClient;

#[async_trait::async_trait]
pub trait NarrativeClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError>;
}

/// Parsed narrative fields. Defaults (used when a tag is absent): sentiment
/// 50, political risk "5", summary "Profile unavailable.", everything else "N/A".
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub sentiment: u8,
    pub political_risk: String,
    pub summary: String,
    pub thesis: String,
    pub drivers: String,
    pub risks: String,
    pub verdict: String,
}

impl Default for Narrative {
    fn default() -> Self {
        Self {
            sentiment: 50,
            political_risk: "5".to_string(),
            summary: "Profile unavailable.".to_string(),
            thesis: "N/A".to_string(),
            drivers: "N/A".to_string(),
            risks: "N/A".to_string(),
            verdict: "N/A".to_string(),
        }
    }
}

/// Extracts the tagged sections from a free-text model reply. Tags may be
/// missing, reordered or duplicated (first occurrence wins); parsing is
/// case-insensitive and never fails.
pub fn parse_narrative(text: &str) -> Narrative {
    let mut narrative = Narrative::default();

    if let Some(value) = extract_number(text, "SENTIMENT") {
        narrative.sentiment = value.min(100) as u8;
    }
    if let Some(value) = extract_number(text, "POLITICAL") {
        narrative.political_risk = value.to_string();
    }
    for (tag, field) in [
        ("SUMMARY", &mut narrative.summary as &mut String),
        ("THESIS", &mut narrative.thesis),
        ("DRIVERS", &mut narrative.drivers),
        ("RISKS", &mut narrative.risks),
        ("VERDICT", &mut narrative.verdict),
    ] {
        if let Some(section) = extract_section(text, tag) {
            *field = section;
        }
    }
    narrative
}

fn extract_number(text: &str, tag: &str) -> Option<u64> {
    let re = RegexBuilder::new(&format!(r"\[{tag}\]:\s*(\d+)"))
        .case_insensitive(true)
        .build()
        .expect("tag regex");
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn extract_section(text: &str, tag: &str) -> Option<String> {
    // A section runs until the next [TAG]: marker or the end of the reply.
    let re = RegexBuilder::new(&format!(r"\[{tag}\]:\s*(.*?)(?:\[[A-Z]+\]:|\z)"))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("section regex");
    let section = re.captures(text)?.get(1)?.as_str().trim().to_string();
    if section.is_empty() { None } else { Some(section) }
}

/// Structured facts handed to the narrative collaborator for one analysis.
pub struct AnalysisFacts<'a> {
    pub symbol: &'a str,
    pub snapshot: &'a MetricsSnapshot,
    pub smart_money: &'a SmartMoney,
    pub macro_context: &'a str,
    pub description: &'a str,
}

/// Renders the structured-facts prompt. Formatting of the model's answer is
/// constrained to the tag schema parse_narrative understands.
pub fn build_analysis_prompt(facts: &AnalysisFacts<'_>) -> String {
    let snapshot = facts.snapshot;
    let pc = facts
        .smart_money
        .put_call_ratio
        .map(|r| format!("{r:.2}"))
        .unwrap_or_else(|| "N/A".to_string());
    let earnings = facts
        .smart_money
        .earnings_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "Role: Quant Desk Manager. Asset: {symbol} ({class:?}).\n\
         Macro: {macro_context} | Price: ${price:.2} | RSI: {rsi:.1} | Drawdown: {dd:.1}%\n\
         Squeeze: {squeeze} | P/C Ratio: {pc} (Note: <0.7 is bullish/optimistic, >1.0 is bearish/fear) | Insider: {insider} | Earnings: {earnings}\n\
         Desc: {description}\n\
         \n\
         RULES (CRITICAL):\n\
         1. NO SHORT SELLING. NO PUTS. LONG OR CASH ONLY. If bearish, you MUST say \"AVOID\" or \"STAY IN CASH\".\n\
         2. Format exactly as requested below. DO NOT USE MARKDOWN (NO ASTERISKS) for headers.\n\
         \n\
         OUTPUT FORMAT:\n\
         [SENTIMENT]: 0-100\n\
         [POLITICAL]: 0-10\n\
         [SUMMARY]: 2 sentences max.\n\
         [THESIS]: 1 sentence punchline.\n\
         [DRIVERS]: 2 short bullets.\n\
         [RISKS]: 2 short bullets.\n\
         [VERDICT]: Action (Buy/Hold/Avoid/Cash), Target, Stop-Loss.",
        symbol = facts.symbol,
        class = snapshot.class,
        macro_context = facts.macro_context,
        price = snapshot.price,
        rsi = snapshot.rsi,
        dd = snapshot.max_drawdown * 100.0,
        squeeze = snapshot.squeeze,
        insider = facts.smart_money.insider.label(),
        description = facts.description,
    )
}

/// Prompt for free-text questions, grounded in the recent session memory.
pub fn build_chat_prompt(history: &[String], question: &str) -> String {
    let context = if history.is_empty() {
        "No cached data.".to_string()
    } else {
        history.join("\n")
    };
    format!(
        "You are the \"Quant Council\", a senior trader. Session context so far:\n{context}\n\
         Client question: \"{question}\"\n\
         \n\
         HARD RULES:\n\
         1. BE BRIEF. 4 sentences MAX. No filler, straight to the point.\n\
         2. If the asset is not in the context, say EXACTLY: \"No cached data. Type the symbol (e.g. MSFT) to run the terminal.\" Do not justify.\n\
         3. LONG OR CASH ONLY. NEVER propose shorts, puts or any short selling. If the setup is bad, say \"STAY IN CASH\" or \"AVOID\"."
    )
}

/// Strips residual tag markers for display and caps the reply length.
pub fn clean_reply(text: &str, max_len: usize) -> String {
    let re = Regex::new(r"(?i)\[(SENTIMENT|POLITICAL)\]:.*").expect("clean regex");
    let cleaned = re.replace_all(text, "").trim().to_string();
    if cleaned.len() > max_len {
        let mut cut = max_len;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &cleaned[..cut])
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_REPLY: &str = "[SENTIMENT]: 72\n[POLITICAL]: 3\n\
        [SUMMARY]: Solid uptrend with strong volume. Institutions accumulating.\n\
        [THESIS]: Ride the trend.\n\
        [DRIVERS]: - AI demand\n- Buybacks\n\
        [RISKS]: - Valuation\n- Rates\n\
        [VERDICT]: Buy, Target 210, Stop-Loss 175";

    #[test]
    fn parses_all_tags() {
        let n = parse_narrative(FULL_REPLY);
        assert_eq!(n.sentiment, 72);
        assert_eq!(n.political_risk, "3");
        assert!(n.summary.starts_with("Solid uptrend"));
        assert_eq!(n.thesis, "Ride the trend.");
        assert!(n.drivers.contains("AI demand"));
        assert!(n.verdict.starts_with("Buy"));
    }

    #[test]
    fn missing_tags_fall_back_to_documented_defaults() {
        let n = parse_narrative("The model rambled and ignored the format entirely.");
        assert_eq!(n, Narrative::default());
        assert_eq!(n.sentiment, 50);
        assert_eq!(n.political_risk, "5");
        assert_eq!(n.summary, "Profile unavailable.");
    }

    #[test]
    fn tags_parse_case_insensitively_and_reordered() {
        let n = parse_narrative("[verdict]: Hold\n[sentiment]: 41\nnoise\n[Summary]: Flat tape.");
        assert_eq!(n.sentiment, 41);
        assert_eq!(n.summary, "Flat tape.");
        assert_eq!(n.verdict, "Hold");
        assert_eq!(n.thesis, "N/A");
    }

    #[test]
    fn sentiment_is_clamped_and_malformed_numbers_ignored() {
        assert_eq!(parse_narrative("[SENTIMENT]: 250").sentiment, 100);
        assert_eq!(parse_narrative("[SENTIMENT]: high").sentiment, 50);
    }

    #[test]
    fn chat_prompt_embeds_memory_snapshot() {
        let history = vec!["[NVDA]: P=$900.00, RSI=65.0".to_string()];
        let prompt = build_chat_prompt(&history, "should I add?");
        assert!(prompt.contains("[NVDA]"));
        assert!(prompt.contains("should I add?"));
        assert!(build_chat_prompt(&[], "hi").contains("No cached data."));
    }

    #[test]
    fn clean_reply_truncates_long_text() {
        let long = "x".repeat(900);
        let cleaned = clean_reply(&long, 800);
        assert!(cleaned.len() <= 803);
        assert!(cleaned.ends_with("..."));
    }
}
