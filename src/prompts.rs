//! Prompt templates sent to the IATI agent.

use serde::Serialize;

use crate::dataset::RequestContext;

/// One quick-action chat prompt offered by the UI.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StandardPrompt {
    pub id: &'static str,
    pub text: &'static str,
}

pub const STANDARD_PROMPTS: [StandardPrompt; 7] = [
    StandardPrompt {
        id: "portfolio_snapshot",
        text: "Using the World Bank IATI knowledge base, provide a portfolio snapshot for the current filter context. Format as: 6-10 bullets, then a short 'Evidence' list with IATI activity identifiers/titles, then a 3-bullet 'So what'.",
    },
    StandardPrompt {
        id: "top_sectors",
        text: "For the current filter context, summarize top sectors by commitments and disbursements, highlight the biggest shifts over time, and include 5-8 evidence items (IATI identifiers/titles).",
    },
    StandardPrompt {
        id: "top_projects",
        text: "List the top projects by disbursement for the current filter context. For each: title, IATI identifier, commitment, disbursement, and one sentence on results/outcomes if present in KB. Finish with a short narrative summary.",
    },
    StandardPrompt {
        id: "outcomes_evidence",
        text: "Identify projects with the strongest outcome/results evidence for the current filter context. Provide a ranked list with a one-line outcome statement each, and cite IATI identifiers/titles.",
    },
    StandardPrompt {
        id: "implementation_flags",
        text: "Flag implementation risks for the current filter context (e.g., low disbursement ratio, long gaps, cancellations, delays). Provide actionable mitigations and cite IATI identifiers/titles.",
    },
    StandardPrompt {
        id: "data_quality",
        text: "Assess data quality for the current filter context: missing dates, mismatched totals, unusual values, gaps, or inconsistent sector tagging. Provide practical remediation steps.",
    },
    StandardPrompt {
        id: "exec_brief",
        text: "Write a one-page executive brief for the current filter context: headline, 6 bullets, 3 risks, 3 opportunities, and an evidence appendix (IATI identifiers/titles). Make it copy-ready.",
    },
];

pub fn standard_prompt(id: &str) -> Option<&'static StandardPrompt> {
    STANDARD_PROMPTS.iter().find(|p| p.id == id)
}

/// Chat message scoped to the current filters.
pub fn with_context(ctx: &RequestContext, message: &str) -> String {
    format!(
        "Context: Country={}, Years={}, Sector={}.\n\n{}",
        ctx.country, ctx.years, ctx.sector, message
    )
}

/// Dashboard request: a readable narrative plus the four-table appendix the extractor parses.
pub fn dashboard_prompt(ctx: &RequestContext) -> String {
    format!(
        "You are the World Bank IATI Intelligence Agent. Use ONLY the World Bank IATI knowledge base available to you.\n\n\
         Dashboard context: Country={}, Years={}, Sector={}.\n\n\
         Task: Produce (1) a short executive narrative that explains the portfolio and what the charts imply, and (2) a small, readable data appendix the UI can parse.\n\n\
         Formatting requirements (STRICT):\n\
         A) Start with: ## Dashboard Narrative\n\
         - 6–10 bullets\n\
         - then: ## Evidence (IATI) with 5–12 items (identifier + title)\n\
         - then: ## Caveats (1–3 bullets)\n\n\
         B) Then include a readable appendix with FOUR markdown tables EXACTLY in this order, using | pipes and a header row: \n\
         ### KPI\n| metric | value | note |\n\
         ### Trend\n| period | commitments | disbursements |\n\
         ### Sectors\n| sector | amount |\n\
         ### Mix\n| category | amount |\n\n\
         Notes: Use numbers as plain decimals (no commas). Use USD amounts. Keep periods like 2021-Q1, 2021-Q2, etc.\n\
         If the KB does not contain enough data for any table, write 'NA' for the value(s) in that table, but still include the table.\n",
        ctx.country, ctx.years, ctx.sector
    )
}
