use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// Write-only view of the external CRM system
#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn update_custom_field(
        &self,
        contact_id: &str,
        field_id: &str,
        value: &str,
    ) -> anyhow::Result<()>;

    /// Resolve a field key to a deployment-specific field id, when the CRM
    /// account maps custom fields by id rather than key
    fn custom_field_id(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Subject ids that mark seeded demo data; never synced
const PLACEHOLDER_SUBJECTS: &[&str] = &["demo_lead", "demo_contact"];

// Tool -> CRM custom-field key. Tools missing here fall back to a
// deployment-specific lookup by tool name.
fn field_for_tool(tool: &str) -> Option<&'static str> {
    match tool {
        "generate_lead_outreach_script" => Some("ai_outreach_script"),
        "get_realtime_coaching" => Some("ai_coaching_advice"),
        "analyze_negotiation" => Some("negotiation_strategy"),
        "analyze_lead" => Some("qualification_summary"),
        _ => None,
    }
}

/// Fire-and-forget writer that pushes qualifying tool results back to the
/// CRM, decoupled from the response path. Every failure in here is caught and
/// logged; nothing can delay or fail the primary request.
pub struct SideEffectSync {
    crm: Arc<dyn CrmClient>,
    synced: AtomicU64,
}

impl SideEffectSync {
    pub fn new(crm: Arc<dyn CrmClient>) -> Self {
        Self {
            crm,
            synced: AtomicU64::new(0),
        }
    }

    /// Number of successful field writes since startup
    pub fn synced_count(&self) -> u64 {
        self.synced.load(Ordering::Relaxed)
    }

    /// Launch a sync as detached background work. The caller never awaits it.
    pub fn spawn(
        self: &Arc<Self>,
        tool: String,
        arguments: Value,
        result: String,
        subject_id: Option<String>,
    ) {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            sync.sync_action(&tool, &arguments, &result, subject_id.as_deref())
                .await;
        });
    }

    pub async fn sync_action(
        &self,
        tool: &str,
        arguments: &Value,
        result: &str,
        subject_id: Option<&str>,
    ) {
        let Some(contact_id) = subject_id else {
            return;
        };
        if PLACEHOLDER_SUBJECTS.contains(&contact_id) {
            return;
        }

        let field_id = match field_for_tool(tool) {
            Some(key) => self
                .crm
                .custom_field_id(key)
                .unwrap_or_else(|| key.to_string()),
            None => match self.crm.custom_field_id(tool) {
                Some(id) => id,
                None => return,
            },
        };

        match self.crm.update_custom_field(contact_id, &field_id, result).await {
            Ok(()) => {
                self.synced.fetch_add(1, Ordering::Relaxed);
                info!(tool, contact_id, field = %field_id, args = %arguments, "synced tool result to CRM");
            }
            Err(err) => {
                warn!(tool, contact_id, error = %err, "CRM sync failed");
            }
        }
    }
}
