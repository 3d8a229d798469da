//! Prompt construction for each analysis specialization.
//!
//! Prompts are a pure function of the deal and the specialization, so the
//! same deal always produces the same request text.

use crate::models::DealInput;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The angle a provider takes when analyzing a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    /// Market analysis, competition and location.
    MarketResearch,
    /// Multiples, payback and margins.
    FinancialMetrics,
    /// Strategic fit, AI upside, certifications and tax benefits.
    StrategicRisk,
    /// Operations, legal and integration review.
    DueDiligence,
    /// Everything at once.
    #[default]
    Comprehensive,
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specialization::MarketResearch => write!(f, "Market research"),
            Specialization::FinancialMetrics => write!(f, "Financial metrics"),
            Specialization::StrategicRisk => write!(f, "Strategic risk"),
            Specialization::DueDiligence => write!(f, "Due diligence"),
            Specialization::Comprehensive => write!(f, "Comprehensive"),
        }
    }
}

/// A system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

/// Chat message shared by the chat-style wire formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl Prompt {
    /// Render as a chat message list, system message first.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);

        if let Some(ref system) = self.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: self.user.clone(),
        });

        messages
    }
}

/// Build the prompt a provider sends for `deal`.
pub fn build_prompt(
    specialization: Specialization,
    deal: &DealInput,
    structured_output: bool,
) -> Prompt {
    let (system, body) = match specialization {
        Specialization::MarketResearch => (Some(MARKET_SYSTEM_PROMPT), market_research_body(deal)),
        Specialization::FinancialMetrics => (None, financial_metrics_body(deal)),
        Specialization::StrategicRisk => (Some(STRATEGIC_SYSTEM_PROMPT), strategic_risk_body(deal)),
        Specialization::DueDiligence => (None, due_diligence_body(deal)),
        Specialization::Comprehensive => {
            (Some(COMPREHENSIVE_SYSTEM_PROMPT), comprehensive_body(deal))
        }
    };

    let format = if structured_output {
        JSON_FORMAT_INSTRUCTIONS
    } else {
        TEXT_FORMAT_INSTRUCTIONS
    };

    Prompt {
        system: system.map(String::from),
        user: format!("{}\n\n{}", body, format),
    }
}

fn market_research_body(deal: &DealInput) -> String {
    format!(
        "Analyze this business acquisition opportunity:\n\n\
         Name: {}\n\
         Industry: {}\n\
         Location: {}\n\
         Price: {}\n\
         Revenue: {}\n\
         Cash Flow: {}\n\n\
         Provide:\n\
         1. Market analysis and competitive landscape\n\
         2. Growth potential and market trends\n\
         3. Location advantages/disadvantages\n\
         4. Score (0-100) based on market opportunity\n\
         5. Key strengths and risks\n\
         6. Recommendation (strong_buy/buy/hold/pass)",
        deal.name,
        text_or_na(&deal.industry),
        text_or_na(&deal.location),
        money(deal.price),
        money(deal.revenue),
        money(deal.cash_flow),
    )
}

fn financial_metrics_body(deal: &DealInput) -> String {
    format!(
        "Analyze the financial metrics of this acquisition:\n\n\
         Name: {}\n\
         Price: {}\n\
         Revenue: {}\n\
         Cash Flow: {}\n\
         SDE Margin: {}\n\n\
         Calculate:\n\
         1. Revenue multiple (Price/Revenue)\n\
         2. Cash flow multiple (Price/Cash Flow)\n\
         3. Payback period\n\
         4. Financial health score (0-100)\n\
         5. Key financial strengths and risks\n\
         6. Recommendation based on financial metrics",
        deal.name,
        money(deal.price),
        money(deal.revenue),
        money(deal.cash_flow),
        percent(deal.sde_margin),
    )
}

fn strategic_risk_body(deal: &DealInput) -> String {
    format!(
        "Perform strategic risk assessment for this acquisition:\n\n\
         Name: {}\n\
         Industry: {}\n\
         Location: {}\n\
         Price: {}\n\
         AI Potential Score: {}\n\
         Certification Advantage: {}\n\
         Opportunity Zone: {}\n\n\
         Analyze:\n\
         1. Strategic fit and synergies\n\
         2. AI optimization opportunities\n\
         3. Certification advantages\n\
         4. Tax benefits (Opportunity Zone)\n\
         5. Risk factors and mitigation strategies\n\
         6. Overall strategic score (0-100)\n\
         7. Recommendation",
        deal.name,
        text_or_na(&deal.industry),
        text_or_na(&deal.location),
        money(deal.price),
        out_of_100(deal.ai_potential),
        out_of_100(deal.cert_advantage),
        if deal.opportunity_zone { "Yes" } else { "No" },
    )
}

fn due_diligence_body(deal: &DealInput) -> String {
    format!(
        "Conduct comprehensive due diligence for this acquisition:\n\n\
         Name: {}\n\
         Description: {}\n\
         Industry: {}\n\
         Location: {}\n\
         Price: {}\n\
         Revenue: {}\n\
         Cash Flow: {}\n\
         Current Stage: {}\n\
         Notes: {}\n\n\
         Provide comprehensive analysis:\n\
         1. Business model evaluation\n\
         2. Operational assessment\n\
         3. Legal and compliance considerations\n\
         4. Integration complexity\n\
         5. Overall due diligence score (0-100)\n\
         6. Critical strengths and risks\n\
         7. Final recommendation with confidence level",
        deal.name,
        text_or_na(&deal.description),
        text_or_na(&deal.industry),
        text_or_na(&deal.location),
        money(deal.price),
        money(deal.revenue),
        money(deal.cash_flow),
        text_or_na(&deal.stage),
        text_or_na(&deal.notes),
    )
}

fn comprehensive_body(deal: &DealInput) -> String {
    format!(
        "Analyze this business acquisition opportunity comprehensively:\n\n\
         Name: {}\n\
         Industry: {}\n\
         Location: {}\n\
         Price: {}\n\
         Revenue: {}\n\
         Cash Flow: {}\n\
         Description: {}\n\n\
         Provide comprehensive analysis:\n\
         1. Business model evaluation\n\
         2. Financial health assessment\n\
         3. Market position and competitive advantages\n\
         4. Growth potential and scalability\n\
         5. Risk factors and mitigation strategies\n\
         6. Overall acquisition score (0-100)\n\
         7. Recommendation (strong_buy/buy/hold/pass) with reasoning",
        deal.name,
        text_or_na(&deal.industry),
        text_or_na(&deal.location),
        money(deal.price),
        money(deal.revenue),
        money(deal.cash_flow),
        text_or_na(&deal.description),
    )
}

fn text_or_na(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(s) if !s.trim().is_empty() => s,
        _ => "N/A",
    }
}

/// Format dollars with thousands separators, e.g. `$1,500,000`.
pub fn money(value: Option<f64>) -> String {
    let Some(amount) = value else {
        return "N/A".to_string();
    };

    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

fn percent(fraction: Option<f64>) -> String {
    match fraction {
        Some(f) => format!("{:.1}%", f * 100.0),
        None => "N/A".to_string(),
    }
}

fn out_of_100(score: Option<u8>) -> String {
    match score {
        Some(s) => format!("{}/100", s),
        None => "N/A".to_string(),
    }
}

const MARKET_SYSTEM_PROMPT: &str = "You are an expert business acquisition analyst specializing in market research and competitive analysis. Provide structured, data-driven insights.";

const STRATEGIC_SYSTEM_PROMPT: &str = "You are a strategic acquisition advisor specializing in risk assessment and opportunity evaluation.";

const COMPREHENSIVE_SYSTEM_PROMPT: &str = "You are an expert business acquisition analyst with deep expertise in financial analysis, market research, and strategic decision-making. Provide structured, actionable insights.";

const TEXT_FORMAT_INSTRUCTIONS: &str = r#"Format your answer with these labeled sections:
Score: <0-100>
Strengths:
- <one strength per bullet>
Risks:
- <one risk per bullet>
Recommendation: <strong_buy|buy|hold|pass>"#;

const JSON_FORMAT_INSTRUCTIONS: &str = r#"Respond with only a JSON object, no other text:
{"score": <0-100>, "recommendation": "<strong_buy|buy|hold|pass>", "strengths": ["..."], "risks": ["..."]}"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn ponce() -> DealInput {
        DealInput {
            industry: Some("Hospitality / Real Estate".to_string()),
            location: Some("Druid Hills, Atlanta, GA".to_string()),
            price: Some(850_000.0),
            revenue: Some(109_000.0),
            cash_flow: Some(85_000.0),
            sde_margin: Some(0.78),
            ai_potential: Some(85),
            cert_advantage: Some(90),
            opportunity_zone: true,
            stage: Some("due_diligence".to_string()),
            ..DealInput::new(90003, "Ponce Protocol")
        }
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(Some(850_000.0)), "$850,000");
        assert_eq!(money(Some(1_500_000.0)), "$1,500,000");
        assert_eq!(money(Some(999.0)), "$999");
        assert_eq!(money(Some(-12_500.0)), "-$12,500");
        assert_eq!(money(None), "N/A");
    }

    #[test]
    fn test_financial_prompt_fields() {
        let prompt = build_prompt(Specialization::FinancialMetrics, &ponce(), false);

        assert!(prompt.system.is_none());
        assert!(prompt.user.contains("Price: $850,000"));
        assert!(prompt.user.contains("SDE Margin: 78.0%"));
        assert!(prompt.user.contains("Payback period"));
        assert!(prompt.user.contains("Score: <0-100>"));
    }

    #[test]
    fn test_strategic_prompt_fields() {
        let prompt = build_prompt(Specialization::StrategicRisk, &ponce(), false);

        assert!(prompt.system.is_some());
        assert!(prompt.user.contains("AI Potential Score: 85/100"));
        assert!(prompt.user.contains("Certification Advantage: 90/100"));
        assert!(prompt.user.contains("Opportunity Zone: Yes"));
    }

    #[test]
    fn test_missing_fields_render_na() {
        let deal = DealInput::new(1, "Bare Deal");
        let prompt = build_prompt(Specialization::DueDiligence, &deal, false);

        assert!(prompt.user.contains("Industry: N/A"));
        assert!(prompt.user.contains("Cash Flow: N/A"));
        assert!(prompt.user.contains("Notes: N/A"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_prompt(Specialization::MarketResearch, &ponce(), false);
        let b = build_prompt(Specialization::MarketResearch, &ponce(), false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_structured_prompt_asks_for_json() {
        let prompt = build_prompt(Specialization::Comprehensive, &ponce(), true);
        assert!(prompt.user.contains("Respond with only a JSON object"));
        assert!(!prompt.user.contains("Strengths:\n-"));
    }

    #[test]
    fn test_to_messages() {
        let prompt = build_prompt(Specialization::MarketResearch, &ponce(), false);
        let messages = prompt.to_messages();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }
}
