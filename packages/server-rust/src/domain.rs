//! Tenant-owned documents served over HTTP.

use serde::{Deserialize, Serialize};
use tenantscope_core::{Entity, EntityKey, Row, TenantId, TenantScoped, TENANT_ID_FIELD};

/// A document owned by exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(skip)]
    pub id: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl Document {
    /// Field map for [`TenantModel::create_for_tenant`](tenantscope_core::TenantModel::create_for_tenant).
    #[must_use]
    pub fn fields(title: &str, body: &str) -> Row {
        let mut row = Row::new();
        row.insert("title".to_string(), title.into());
        row.insert("body".to_string(), body.into());
        row
    }
}

impl Entity for Document {
    const TABLE: &'static str = "documents";
    const TENANT_COLUMN: Option<&'static str> = Some(TENANT_ID_FIELD);

    fn key(&self) -> Option<EntityKey> {
        self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = Some(key);
    }
}

impl TenantScoped for Document {
    fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = Some(tenant_id);
    }
}

/// Wire form of a [`Document`], with its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentView {
    pub id: Option<EntityKey>,
    pub tenant_id: Option<TenantId>,
    pub title: String,
    pub body: String,
}

impl From<Document> for DocumentView {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            tenant_id: doc.tenant_id,
            title: doc.title,
            body: doc.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use tenantscope_core::TableMeta;

    use super::*;

    #[test]
    fn documents_are_tenant_scoped() {
        let meta = TableMeta::of::<Document>();
        assert_eq!(meta.table, "documents");
        assert!(meta.is_tenant_scoped());
    }

    #[test]
    fn view_carries_key() {
        let doc = Document {
            id: Some(4),
            tenant_id: Some(TenantId(2)),
            title: "Roadmap".to_string(),
            body: String::new(),
        };
        let view = DocumentView::from(doc);
        assert_eq!(view.id, Some(4));
        assert_eq!(view.tenant_id, Some(TenantId(2)));
    }
}
