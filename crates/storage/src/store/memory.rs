#![forbid(unsafe_code)]

use super::*;
use rusqlite::params;

impl SqliteStore {
    /// Advisory annotation attached to an entity. Plain insert, outside the
    /// event log; duplicates are tolerated, so no idempotency key.
    pub fn memory_store(&mut self, request: StoreMemoryRequest) -> Result<MemoryRow, StoreError> {
        if request.content.trim().is_empty() {
            return Err(StoreError::InvalidInput("memory content must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        let memory_id = mint_id_tx(&tx, "MEM", "memory_seq")?;
        let metadata_json = request
            .metadata
            .as_ref()
            .map(|metadata| metadata.to_string());
        let source_refs_json = request
            .source_refs
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        tx.execute(
            r#"
            INSERT INTO memories(id, package_id, entity_kind, entity_id, memory_type,
                                 content, metadata_json, source_refs_json, created_by, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                memory_id,
                request.package_id,
                request.entity_kind.as_str(),
                request.entity_id,
                request.memory_type.as_str(),
                request.content,
                metadata_json,
                source_refs_json,
                request.created_by,
                now_ms
            ],
        )?;
        tx.commit()?;

        Ok(MemoryRow {
            id: memory_id,
            package_id: request.package_id,
            entity_kind: request.entity_kind.as_str().to_string(),
            entity_id: request.entity_id,
            memory_type: request.memory_type.as_str().to_string(),
            content: request.content,
            metadata: request.metadata,
            source_refs: request.source_refs,
            created_by: request.created_by,
            created_at_ms: now_ms,
        })
    }

    /// Recency-ordered lookup: newest rows first, optional exact memory-type
    /// filter and substring match on content, bounded by `top_k`.
    pub fn memory_search(
        &self,
        request: SearchMemoryRequest,
    ) -> Result<Vec<MemoryRow>, StoreError> {
        if request.top_k == 0 {
            return Err(StoreError::InvalidInput("top_k must be positive"));
        }

        let mut sql = String::from(
            "SELECT id, package_id, entity_kind, entity_id, memory_type, content, \
             metadata_json, source_refs_json, created_by, created_at_ms \
             FROM memories WHERE entity_kind = ?1 AND entity_id = ?2",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
            Box::new(request.entity_kind.as_str().to_string()),
            Box::new(request.entity_id.clone()),
        ];
        if let Some(memory_type) = request.memory_type {
            sql.push_str(&format!(" AND memory_type = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(memory_type.as_str().to_string()));
        }
        if let Some(query) = request.query.as_ref().filter(|q| !q.is_empty()) {
            sql.push_str(&format!(" AND content LIKE ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(format!("%{query}%")));
        }
        sql.push_str(&format!(
            " ORDER BY created_at_ms DESC, rowid DESC LIMIT ?{}",
            params_vec.len() + 1
        ));
        params_vec.push(Box::new(request.top_k as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, i64>(9)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut memories = Vec::with_capacity(rows.len());
        for (
            id,
            package_id,
            entity_kind,
            entity_id,
            memory_type,
            content,
            metadata_json,
            source_refs_json,
            created_by,
            created_at_ms,
        ) in rows
        {
            memories.push(MemoryRow {
                id,
                package_id,
                entity_kind,
                entity_id,
                memory_type,
                content,
                metadata: metadata_json
                    .map(|raw| serde_json::from_str(&raw))
                    .transpose()?,
                source_refs: source_refs_json
                    .map(|raw| serde_json::from_str(&raw))
                    .transpose()?,
                created_by,
                created_at_ms,
            });
        }
        Ok(memories)
    }
}
