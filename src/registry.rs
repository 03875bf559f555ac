use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// Coarse grouping of tools, used both for filtering the tool list offered to
/// the model and for specialist persona handoff between turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Discovery,
    Analysis,
    Strategy,
    Action,
    Governance,
}

#[derive(Debug, Clone)]
struct SkillEntry {
    category: Category,
    server: String,
}

/// Static mapping of tool name -> capability category -> owning skill server.
/// Populated once at startup and read-only thereafter.
#[derive(Debug, Default)]
pub struct SkillRegistry {
    entries: HashMap<String, SkillEntry>,
    // registration order, so the tool list offered to the model is stable
    order: Vec<String>,
}

impl SkillRegistry {
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Category, &'a str)>,
    {
        let mut registry = SkillRegistry::default();
        for (name, category, server) in entries {
            registry.order.push(name.to_string());
            registry.entries.insert(
                name.to_string(),
                SkillEntry {
                    category,
                    server: server.to_string(),
                },
            );
        }
        registry
    }

    /// The built-in tool roster, grouped by the skill server that owns each tool.
    pub fn with_defaults() -> Self {
        Self::from_entries([
            // lead-intelligence: qualification and retention analysis
            ("analyze_lead", Category::Analysis, "lead-intelligence"),
            ("score_lead", Category::Analysis, "lead-intelligence"),
            ("churn_risk_summary", Category::Analysis, "lead-intelligence"),
            // property-intelligence: inventory matching
            ("match_properties", Category::Discovery, "property-intelligence"),
            ("property_profile", Category::Discovery, "property-intelligence"),
            // market-intelligence: trends and locality data
            ("get_market_trends", Category::Discovery, "market-intelligence"),
            ("neighborhood_profile", Category::Discovery, "market-intelligence"),
            // negotiation-intelligence: deal strategy
            ("analyze_negotiation", Category::Strategy, "negotiation-intelligence"),
            ("objection_playbook", Category::Strategy, "negotiation-intelligence"),
            ("plan_intervention", Category::Strategy, "negotiation-intelligence"),
            // engagement: outbound touches that land in the CRM
            ("generate_lead_outreach_script", Category::Action, "engagement"),
            ("get_realtime_coaching", Category::Action, "engagement"),
            ("schedule_followup", Category::Action, "engagement"),
            // analytics-intelligence: reporting and guardrails
            ("pipeline_metrics", Category::Governance, "analytics-intelligence"),
            ("roi_report", Category::Governance, "analytics-intelligence"),
            ("audit_touchpoint", Category::Governance, "analytics-intelligence"),
        ])
    }

    pub fn all_tools(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn tools_for_category(&self, category: Category) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| {
                self.entries
                    .get(name.as_str())
                    .is_some_and(|entry| entry.category == category)
            })
            .map(String::as_str)
            .collect()
    }

    pub fn category_for_tool(&self, name: &str) -> Option<Category> {
        self.entries.get(name).map(|entry| entry.category)
    }

    pub fn server_for_tool(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|entry| entry.server.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_tool_has_exactly_one_category_and_server() {
        let registry = SkillRegistry::with_defaults();
        for name in registry.all_tools() {
            assert!(registry.category_for_tool(name).is_some(), "{name} missing category");
            assert!(registry.server_for_tool(name).is_some(), "{name} missing server");
        }
    }

    #[test]
    fn test_unknown_tool_resolves_to_none() {
        let registry = SkillRegistry::with_defaults();
        assert_eq!(registry.category_for_tool("send_fax"), None);
        assert_eq!(registry.server_for_tool("send_fax"), None);
    }

    #[test]
    fn test_category_filtering_partitions_the_roster() {
        let registry = SkillRegistry::with_defaults();
        let mut total = 0;
        for category in Category::iter() {
            let tools = registry.tools_for_category(category);
            for tool in &tools {
                assert_eq!(registry.category_for_tool(tool), Some(category));
            }
            total += tools.len();
        }
        assert_eq!(total, registry.all_tools().len());
    }

    #[test]
    fn test_action_tools_route_to_engagement_server() {
        let registry = SkillRegistry::with_defaults();
        for tool in registry.tools_for_category(Category::Action) {
            assert_eq!(registry.server_for_tool(tool), Some("engagement"));
        }
    }
}
