//! Tenant-scoped query decorator.
//!
//! [`ScopedQuery`] builds a [`QuerySpec`] and, on the first terminal
//! operation, decides a filter on the entity's tenant column. The decision
//! is recorded in [`FilterState`] and never revisited. The tenant predicate
//! lives only in that state and is appended when a terminal op builds the
//! spec it executes, so predicates the caller wrote are never rewritten.

use std::iter::Map;
use std::marker::PhantomData;
use std::vec;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::UnscopedReadPolicy;
use crate::context::TenantContextManager;
use crate::entity::{decode, Entity, EntityKey, Row};
use crate::error::{TenantError, TenantResult};
use crate::traits::{Predicate, QuerySpec, Session};
use crate::types::TenantId;

/// How the tenant filter of a query has been decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Tenant-scoped and not yet filtered; the next terminal op decides.
    Pending,
    /// Filtered by the ambient tenant.
    Applied(TenantId),
    /// Filtered by a caller-supplied tenant via `for_tenant`.
    Explicit(TenantId),
    /// Filtering turned off via `without_tenant`.
    Disabled,
    /// The entity is global; there is nothing to filter.
    NotScoped,
}

type DecodeFn<E> = fn((EntityKey, Row)) -> TenantResult<E>;

/// Iterator returned by [`ScopedQuery::iter`].
pub type EntityIter<E> = Map<vec::IntoIter<(EntityKey, Row)>, DecodeFn<E>>;

fn decode_pair<E: Entity>((key, row): (EntityKey, Row)) -> TenantResult<E> {
    decode(key, row)
}

/// Query over `E` that scopes itself to the current tenant.
pub struct ScopedQuery<'a, E> {
    session: &'a dyn Session,
    manager: &'a TenantContextManager,
    spec: QuerySpec,
    filter: FilterState,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> ScopedQuery<'a, E> {
    #[must_use]
    pub fn new(session: &'a dyn Session, manager: &'a TenantContextManager) -> Self {
        let filter = if E::TENANT_COLUMN.is_some() {
            FilterState::Pending
        } else {
            FilterState::NotScoped
        };
        Self {
            session,
            manager,
            spec: QuerySpec::new(E::TABLE),
            filter,
            _entity: PhantomData,
        }
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.spec.predicates.push(predicate);
        self
    }

    #[must_use]
    pub fn filter_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::equals(field, value))
    }

    #[must_use]
    pub fn filter_key(mut self, key: EntityKey) -> Self {
        self.spec.key = Some(key);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.spec.offset = offset;
        self
    }

    /// Turn automatic tenant filtering off for this query. Predicates added
    /// with [`ScopedQuery::filter`] still apply.
    ///
    /// Reserved for cross-tenant administrative reads. The query does not
    /// check who is calling; authorize before using it.
    #[must_use]
    pub fn without_tenant(mut self) -> Self {
        if self.filter != FilterState::NotScoped {
            self.filter = FilterState::Disabled;
        }
        self
    }

    /// Filter by `tenant_id` regardless of ambient context and stop
    /// automatic injection. A later call overrides an earlier one; caller
    /// predicates on the tenant column are kept alongside it.
    #[must_use]
    pub fn for_tenant(mut self, tenant_id: TenantId) -> Self {
        if E::TENANT_COLUMN.is_some() {
            self.filter = FilterState::Explicit(tenant_id);
        }
        self
    }

    #[must_use]
    pub fn filter_state(&self) -> FilterState {
        self.filter
    }

    /// Tenant the query is currently filtered by.
    #[must_use]
    pub fn tenant_filter(&self) -> Option<TenantId> {
        match self.filter {
            FilterState::Applied(tenant_id) | FilterState::Explicit(tenant_id) => Some(tenant_id),
            _ => None,
        }
    }

    /// Predicates added by the caller, without the tenant filter.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.spec.predicates
    }

    /// The spec a terminal op would execute: caller predicates plus the
    /// decided tenant filter.
    #[must_use]
    pub fn spec(&self) -> QuerySpec {
        let mut spec = self.spec.clone();
        if let (Some(column), Some(tenant_id)) = (E::TENANT_COLUMN, self.tenant_filter()) {
            spec.predicates.push(Predicate::equals(column, tenant_id.0));
        }
        spec
    }

    /// Every matching entity, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::NoContext`] for a tenant-scoped entity when no
    /// tenant resolves and reads fail closed, plus storage and decoding
    /// failures.
    pub fn all(&mut self) -> TenantResult<Vec<E>> {
        self.scope("query.all")?;
        self.fetch(&self.spec())
    }

    /// # Errors
    ///
    /// See [`ScopedQuery::all`].
    pub fn first(&mut self) -> TenantResult<Option<E>> {
        self.scope("query.first")?;
        let mut spec = self.spec();
        spec.limit = Some(1);
        Ok(self.fetch(&spec)?.into_iter().next())
    }

    /// Exactly one matching entity.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::NoResult`] or [`TenantError::MultipleResults`]
    /// when the match count is not one, otherwise see [`ScopedQuery::all`].
    pub fn one(&mut self) -> TenantResult<E> {
        self.one_or_none()?
            .ok_or(TenantError::NoResult { table: E::TABLE })
    }

    /// # Errors
    ///
    /// Returns [`TenantError::MultipleResults`] when more than one entity
    /// matches, otherwise see [`ScopedQuery::all`].
    pub fn one_or_none(&mut self) -> TenantResult<Option<E>> {
        self.scope("query.one")?;
        let mut spec = self.spec();
        spec.limit = Some(2);
        let mut found = self.fetch(&spec)?;
        if found.len() > 1 {
            spec.limit = None;
            let count = self.session.count(&spec)?;
            return Err(TenantError::MultipleResults {
                table: E::TABLE,
                count,
            });
        }
        Ok(found.pop())
    }

    /// Number of matching rows, ignoring limit and offset.
    ///
    /// # Errors
    ///
    /// See [`ScopedQuery::all`].
    pub fn count(&mut self) -> TenantResult<usize> {
        self.scope("query.count")?;
        Ok(self.session.count(&self.spec())?)
    }

    /// # Errors
    ///
    /// See [`ScopedQuery::all`].
    pub fn exists(&mut self) -> TenantResult<bool> {
        self.scope("query.exists")?;
        let mut spec = self.spec();
        spec.limit = Some(1);
        Ok(!self.session.select(&spec)?.is_empty())
    }

    /// Matching entities decoded one at a time.
    ///
    /// # Errors
    ///
    /// Scoping and storage failures surface here; decoding failures surface
    /// per item.
    pub fn iter(&mut self) -> TenantResult<EntityIter<E>> {
        self.scope("query.iter")?;
        let rows = self.session.select(&self.spec())?;
        Ok(rows.into_iter().map(decode_pair::<E> as DecodeFn<E>))
    }

    fn fetch(&self, spec: &QuerySpec) -> TenantResult<Vec<E>> {
        self.session
            .select(spec)?
            .into_iter()
            .map(|(key, row)| decode(key, row))
            .collect()
    }

    /// Decide the tenant filter if it is still pending.
    fn scope(&mut self, operation: &'static str) -> TenantResult<()> {
        if self.filter != FilterState::Pending {
            return Ok(());
        }
        if E::TENANT_COLUMN.is_none() {
            self.filter = FilterState::NotScoped;
            return Ok(());
        }

        match self.manager.get_current_tenant_id() {
            Some(tenant_id) => {
                self.filter = FilterState::Applied(tenant_id);
                debug!(table = E::TABLE, %tenant_id, "tenant filter applied");
                Ok(())
            }
            None => match self.manager.config().unscoped_reads {
                UnscopedReadPolicy::FailClosed => Err(TenantError::NoContext { operation }),
                UnscopedReadPolicy::FailOpen => {
                    warn!(table = E::TABLE, operation, "no tenant context; reading unfiltered");
                    Ok(())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IsolationConfig;
    use crate::context::{enter, ContextFrame};
    use crate::entity::TENANT_ID_FIELD;
    use crate::test_support::{directory, manager, seed_notes, Locale, Note, VecSession};

    fn tenant_predicates(query: &ScopedQuery<'_, Note>) -> usize {
        query
            .spec()
            .predicates
            .iter()
            .filter(|p| p.field == TENANT_ID_FIELD)
            .count()
    }

    #[test]
    fn filter_is_applied_exactly_once() {
        let session = VecSession::default();
        seed_notes(&session);
        let mgr = manager();
        let _frame = enter(ContextFrame::new().with_active_tenant(TenantId(1)));

        let mut query = ScopedQuery::<Note>::new(&session, &mgr);
        assert_eq!(query.filter_state(), FilterState::Pending);

        let all = query.all().unwrap();
        let count = query.count().unwrap();
        assert!(query.exists().unwrap());

        assert_eq!(all.len(), 2);
        assert_eq!(count, 2);
        assert_eq!(tenant_predicates(&query), 1);
        assert_eq!(query.filter_state(), FilterState::Applied(TenantId(1)));
        assert!(all.iter().all(|n| n.tenant_id == Some(TenantId(1))));
    }

    #[test]
    fn filter_decision_survives_context_change() {
        let session = VecSession::default();
        seed_notes(&session);
        let mgr = manager();
        let _frame = enter(ContextFrame::new().with_active_tenant(TenantId(1)));

        let mut query = ScopedQuery::<Note>::new(&session, &mgr);
        assert_eq!(query.count().unwrap(), 2);

        mgr.with_tenant(TenantId(2), || {
            assert_eq!(query.count().unwrap(), 2);
            assert_eq!(query.tenant_filter(), Some(TenantId(1)));
        });
    }

    #[test]
    fn for_tenant_wins_over_ambient_context() {
        let session = VecSession::default();
        seed_notes(&session);
        let mgr = manager();
        let _frame = enter(ContextFrame::new().with_active_tenant(TenantId(1)));

        let mut query = ScopedQuery::<Note>::new(&session, &mgr).for_tenant(TenantId(7));
        let notes = query.all().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].tenant_id, Some(TenantId(7)));

        assert_eq!(query.count().unwrap(), 1);
        assert_eq!(tenant_predicates(&query), 1);
        assert_eq!(query.filter_state(), FilterState::Explicit(TenantId(7)));
    }

    #[test]
    fn later_for_tenant_overrides_earlier_one() {
        let session = VecSession::default();
        seed_notes(&session);
        let mgr = manager();
        let mut query = ScopedQuery::<Note>::new(&session, &mgr)
            .for_tenant(TenantId(2))
            .for_tenant(TenantId(7));

        assert_eq!(tenant_predicates(&query), 1);
        assert_eq!(query.tenant_filter(), Some(TenantId(7)));
        assert_eq!(query.count().unwrap(), 1);
    }

    #[test]
    fn for_tenant_keeps_caller_tenant_predicate() {
        let session = VecSession::default();
        seed_notes(&session);
        let mgr = manager();
        let mut query = ScopedQuery::<Note>::new(&session, &mgr)
            .filter_eq(TENANT_ID_FIELD, 1)
            .for_tenant(TenantId(2));

        assert_eq!(query.predicates().len(), 1);
        assert_eq!(tenant_predicates(&query), 2);
        assert_eq!(query.count().unwrap(), 0);
    }

    #[test]
    fn without_tenant_reads_everything() {
        let session = VecSession::default();
        seed_notes(&session);
        let mgr = manager();
        let _frame = enter(ContextFrame::new().with_active_tenant(TenantId(1)));

        let mut query = ScopedQuery::<Note>::new(&session, &mgr).without_tenant();
        assert_eq!(query.count().unwrap(), 5);
        assert_eq!(tenant_predicates(&query), 0);
        assert_eq!(query.filter_state(), FilterState::Disabled);
    }

    #[test]
    fn without_tenant_keeps_caller_filters() {
        let session = VecSession::default();
        seed_notes(&session);
        let mgr = manager();
        let _frame = enter(ContextFrame::new().with_active_tenant(TenantId(1)));

        let mut query = ScopedQuery::<Note>::new(&session, &mgr)
            .filter_eq(TENANT_ID_FIELD, 7)
            .without_tenant();
        assert_eq!(query.count().unwrap(), 1);
        assert_eq!(query.predicates().len(), 1);

        let mut query = ScopedQuery::<Note>::new(&session, &mgr)
            .for_tenant(TenantId(2))
            .without_tenant();
        assert_eq!(query.count().unwrap(), 5);
        assert_eq!(tenant_predicates(&query), 0);
    }

    #[test]
    fn missing_context_fails_closed_by_default() {
        let session = VecSession::default();
        seed_notes(&session);
        let mgr = manager();
        let _frame = enter(ContextFrame::new());

        let mut query = ScopedQuery::<Note>::new(&session, &mgr);
        let err = query.all().unwrap_err();
        assert!(matches!(err, TenantError::NoContext { operation: "query.all" }));
        assert!(query.exists().unwrap_err().is_no_context());
    }

    #[test]
    fn fail_open_reads_unfiltered_and_stays_pending() {
        let session = VecSession::default();
        seed_notes(&session);
        let dir = directory();
        let mgr = TenantContextManager::new(dir.clone(), dir).with_config(IsolationConfig {
            unscoped_reads: UnscopedReadPolicy::FailOpen,
            ..IsolationConfig::default()
        });
        let _frame = enter(ContextFrame::new());

        let mut query = ScopedQuery::<Note>::new(&session, &mgr);
        assert_eq!(query.count().unwrap(), 5);
        assert_eq!(query.filter_state(), FilterState::Pending);

        mgr.with_tenant(TenantId(2), || {
            assert_eq!(query.count().unwrap(), 2);
        });
        assert_eq!(query.filter_state(), FilterState::Applied(TenantId(2)));
    }

    #[test]
    fn global_entities_pass_through() {
        let session = VecSession::default();
        session.insert(Locale::TABLE, Locale::row("en")).unwrap();
        session.insert(Locale::TABLE, Locale::row("fr")).unwrap();
        let mgr = manager();
        let _frame = enter(ContextFrame::new());

        let mut query = ScopedQuery::<Locale>::new(&session, &mgr);
        assert_eq!(query.all().unwrap().len(), 2);
        assert_eq!(query.filter_state(), FilterState::NotScoped);

        let query = query.for_tenant(TenantId(1)).without_tenant();
        assert!(query.spec().predicates.is_empty());
    }

    #[test]
    fn one_and_one_or_none_check_cardinality() {
        let session = VecSession::default();
        seed_notes(&session);
        let mgr = manager();
        let _frame = enter(ContextFrame::new().with_active_tenant(TenantId(2)));

        let err = ScopedQuery::<Note>::new(&session, &mgr).one().unwrap_err();
        assert!(matches!(err, TenantError::MultipleResults { count: 2, .. }));

        let one = ScopedQuery::<Note>::new(&session, &mgr)
            .filter_eq("title", "b1")
            .one()
            .unwrap();
        assert_eq!(one.title, "b1");

        let none = ScopedQuery::<Note>::new(&session, &mgr)
            .filter_eq("title", "a1")
            .one_or_none()
            .unwrap();
        assert!(none.is_none());

        let err = ScopedQuery::<Note>::new(&session, &mgr)
            .filter_eq("title", "a1")
            .one()
            .unwrap_err();
        assert!(matches!(err, TenantError::NoResult { table: "notes" }));
    }

    #[test]
    fn first_limit_offset_and_iter() {
        let session = VecSession::default();
        seed_notes(&session);
        let mgr = manager();
        let _frame = enter(ContextFrame::new().with_active_tenant(TenantId(1)));

        let first = ScopedQuery::<Note>::new(&session, &mgr).first().unwrap();
        assert_eq!(first.map(|n| n.title), Some("a1".to_owned()));

        let page = ScopedQuery::<Note>::new(&session, &mgr)
            .offset(1)
            .limit(5)
            .all()
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "a2");

        let titles: Vec<String> = ScopedQuery::<Note>::new(&session, &mgr)
            .iter()
            .unwrap()
            .map(|n| n.unwrap().title)
            .collect();
        assert_eq!(titles, ["a1", "a2"]);
    }

    #[test]
    fn filter_key_selects_single_row_within_tenant() {
        let session = VecSession::default();
        let keys = seed_notes(&session);
        let mgr = manager();
        let _frame = enter(ContextFrame::new().with_active_tenant(TenantId(1)));

        let own = ScopedQuery::<Note>::new(&session, &mgr)
            .filter_key(keys[0])
            .one_or_none()
            .unwrap();
        assert!(own.is_some());

        let foreign = ScopedQuery::<Note>::new(&session, &mgr)
            .filter_key(keys[2])
            .one_or_none()
            .unwrap();
        assert!(foreign.is_none());
    }
}
