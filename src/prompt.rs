use crate::error::Result;
use crate::selector::{Recommendation, RiskLevel};

/// Everything the explanation prompt needs from one request.
#[derive(Debug, Clone)]
pub struct ExplanationRequest {
    pub notes: Option<String>,
    pub sector: String,
    pub risk: RiskLevel,
    /// The investor's own wording, shown in the prompt.
    pub risk_label: String,
    pub companies: Vec<String>,
    pub esg_present: bool,
}

impl ExplanationRequest {
    pub fn from_recommendation(
        recommendation: &Recommendation,
        sector: &str,
        notes: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            notes: notes.map(str::to_string),
            sector: sector.to_string(),
            risk: recommendation.risk(),
            risk_label: recommendation.risk_label().to_string(),
            companies: recommendation.companies()?,
            esg_present: recommendation.has_esg_score(),
        })
    }

    pub fn to_prompt(&self) -> String {
        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("N/A");
        let companies = if self.companies.is_empty() {
            "N/A".to_string()
        } else {
            self.companies.join(", ")
        };
        let risk_label = match self.risk_label.trim() {
            "" => "N/A",
            label => label,
        };
        let esg_hint = if self.esg_present && self.risk.prefers_esg() {
            " (prioritizing higher ESG scores)"
        } else {
            ""
        };

        format!(
            r#"You are an investment assistant. Explain the recommendations clearly in non-technical language.

Investor notes: {}
Sector: {}
Risk tolerance: {}{}
Recommended Companies: {}

Keep it brief (120-180 words), avoid guarantees, and emphasize diversification and due diligence."#,
            notes, self.sector, risk_label, esg_hint, companies
        )
    }
}
