#![forbid(unsafe_code)]

use crate::error::ToolError;
use crate::{READ_ROLES, Toolbox, WRITE_ROLES};
use pf_core::auth::UserContext;
use pf_core::model::{EntityKind, MemoryType};
use pf_storage::{MemoryRow, SearchMemoryRequest, StoreMemoryRequest};
use serde_json::Value;
use tracing::debug;

const MAX_TOP_K: usize = 100;

impl Toolbox {
    /// Attach an advisory annotation to an entity. Not event-sourced and
    /// not idempotency-guarded; duplicates are tolerated.
    pub fn store_memory(
        &mut self,
        entity_kind: EntityKind,
        entity_id: &str,
        content: &str,
        memory_type: MemoryType,
        package_id: Option<&str>,
        metadata: Option<Value>,
        source_refs: Option<Vec<String>>,
        user: &UserContext,
    ) -> Result<MemoryRow, ToolError> {
        user.require_any(WRITE_ROLES)?;
        if entity_id.trim().is_empty() {
            return Err(ToolError::Validation("entity id must not be empty"));
        }
        let memory = self.store_mut().memory_store(StoreMemoryRequest {
            entity_kind,
            entity_id: entity_id.to_string(),
            content: content.to_string(),
            memory_type,
            package_id: package_id.map(|s| s.to_string()),
            metadata,
            source_refs,
            created_by: user.user_id().to_string(),
        })?;
        debug!(memory_id = %memory.id, entity_id, "memory stored");
        Ok(memory)
    }

    /// Bounded, recency-ordered lookup. Exact match on memory type and a
    /// plain substring predicate on content are the only filters.
    pub fn search_memory(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        query: Option<&str>,
        top_k: usize,
        memory_type: Option<MemoryType>,
        user: &UserContext,
    ) -> Result<Vec<MemoryRow>, ToolError> {
        user.require_any(READ_ROLES)?;
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(ToolError::Validation("top_k must be 1..=100"));
        }
        Ok(self.store().memory_search(SearchMemoryRequest {
            entity_kind,
            entity_id: entity_id.to_string(),
            query: query.map(|s| s.to_string()),
            top_k,
            memory_type,
        })?)
    }
}
