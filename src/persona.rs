use indoc::indoc;
use serde::{Deserialize, Serialize};

use crate::models::request::TaskType;
use crate::registry::Category;

/// Complexity tier for a task, used only to steer model-backend routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Routine,
    Complex,
    HighStakes,
}

/// Maps a task type to its complexity tier. Side-effect free.
pub fn complexity_for(task_type: TaskType) -> Complexity {
    match task_type {
        TaskType::ChatQuery | TaskType::LeadAnalysis | TaskType::BehavioralInsight => {
            Complexity::Routine
        }
        TaskType::InterventionStrategy
        | TaskType::RevenueProjection
        | TaskType::ExecutiveBriefing => Complexity::HighStakes,
        _ => Complexity::Complex,
    }
}

const CHAT_ASSISTANT: &str = indoc! {"
    You are the sales team's AI partner. You have deep knowledge of CRM
    workflows and automation, market dynamics and pricing, lead qualification
    and conversion strategy, and property matching.

    Always respond as a trusted advisor: direct, actionable insights,
    data-driven recommendations, specific next steps, market context when
    relevant. Keep responses concise but comprehensive, and reference
    specific data when it is available.
"};

const LEAD_ANALYZER: &str = indoc! {"
    You are an expert lead intelligence analyst. Synthesize qualification
    scores, behavioral patterns, conversation history and sentiment, market
    context, and churn risk factors into a comprehensive lead profile.

    Provide a strategic summary of lead quality, behavioral insights, risk
    factors and opportunities, and specific action recommendations with
    timing and expected outcomes.
"};

const REPORT_SYNTHESIZER: &str = indoc! {"
    You are a business intelligence analyst. Generate executive-level reports
    that combine quantitative metrics with strategic insight: performance
    trends, pipeline health and conversion metrics, market opportunities and
    risks, and recommendations for growth. Write in a direct, data-driven,
    action-oriented voice with specific metrics and clear next steps.
"};

const SCRIPT_GENERATOR: &str = indoc! {"
    You are a sales communication specialist. Generate personalized scripts
    matched to each lead's communication style and situation, informed by
    conversation history, previously raised objections, market conditions,
    and urgency factors.

    Scripts must be natural and conversational, objection-aware with
    preemptive handling, channel-appropriate (SMS, email, call), and
    A/B-testable with variants.
"};

const RESEARCHER: &str = indoc! {"
    You are a market research specialist. Synthesize real-time market data
    and property information into actionable intelligence: current trends and
    statistics, neighborhood-level analysis, value drivers and risks, and
    competitive positioning. Provide clear, data-backed reports with
    citations where possible.
"};

/// Base persona for a task type. Pure lookup; unmapped task types fall back
/// to the chat persona.
pub fn system_prompt_for(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::ChatQuery => CHAT_ASSISTANT,
        TaskType::LeadAnalysis | TaskType::BehavioralInsight => LEAD_ANALYZER,
        TaskType::ReportSynthesis | TaskType::ExecutiveBriefing | TaskType::RevenueProjection => {
            REPORT_SYNTHESIZER
        }
        TaskType::ScriptGeneration | TaskType::InterventionStrategy => SCRIPT_GENERATOR,
        TaskType::ResearchQuery => RESEARCHER,
    }
}

/// Specialist handoff suffix appended to the system prompt for the turn that
/// follows tool calls from the given category. Applied for one turn only.
pub fn handoff_suffix(category: Category) -> &'static str {
    match category {
        Category::Discovery => {
            "\n\n[SPECIALIST HANDOFF] You are now acting as the Market Discovery Specialist. \
             Focus on identifying trends and finding the right neighborhood and property matches."
        }
        Category::Analysis => {
            "\n\n[SPECIALIST HANDOFF] You are now acting as the Deep Intelligence Analyst. \
             Synthesize the raw data into strategic lead profiles and risk assessments."
        }
        Category::Strategy => {
            "\n\n[SPECIALIST HANDOFF] You are now acting as the Negotiation Strategist. \
             Formulate plans to move the deal forward and handle objections."
        }
        Category::Action => {
            "\n\n[SPECIALIST HANDOFF] You are now acting as the Sales Execution Specialist. \
             Focus on high-conversion outreach, scripts, and real-time scheduling."
        }
        Category::Governance => {
            "\n\n[SPECIALIST HANDOFF] You are now acting as the Platform Auditor. \
             Ensure ROI is tracked and all compliance guardrails are respected."
        }
    }
}
