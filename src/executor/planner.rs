//! Query Planner for FileDB
//!
//! This module binds a parsed instruction template and its positional
//! parameters into a typed `Query` for one entity type. A template that
//! cannot be bound (missing parameter, unusable limit, key assignment)
//! plans to `None`, which callers treat as an unrecognized shape.

use serde_json::Value;

use super::query::{Filter, FilterOp, MatchBy, Query, SortBy};
use crate::catalog::EntityType;
use crate::sql::ast::*;
use crate::storage::value::as_index;
use crate::storage::{PrimaryKey, Record};

/// Query planner
pub struct Planner<'a> {
    entity: &'a EntityType,
    params: &'a [Value],
}

impl<'a> Planner<'a> {
    pub fn new(entity: &'a EntityType, params: &'a [Value]) -> Self {
        Self { entity, params }
    }

    /// Bind a template into a query
    pub fn plan(&self, template: &Template) -> Option<Query> {
        match template {
            Template::Select {
                count,
                conditions,
                order_by,
                limit,
                ..
            } => {
                if count.is_some() {
                    self.plan_count(conditions)
                } else {
                    self.plan_select(conditions, order_by, *limit)
                }
            }
            Template::Insert {
                on_conflict,
                columns,
                values,
                ..
            } => {
                let record = columns
                    .iter()
                    .zip(values)
                    .map(|(column, slot)| Some((column.clone(), self.bind(slot)?)))
                    .collect::<Option<Record>>()?;
                Some(Query::Insert {
                    record,
                    on_conflict: *on_conflict,
                })
            }
            Template::Update {
                assignments,
                conditions,
                ..
            } => self.plan_update(assignments, conditions),
            Template::Delete { conditions, .. } => {
                let target = self.plan_target(conditions)?;
                Some(Query::delete(target))
            }
            Template::Schema => None,
        }
    }

    fn plan_select(
        &self,
        conditions: &[Condition],
        order_by: &[OrderItem],
        limit: Option<LimitSlot>,
    ) -> Option<Query> {
        let filters = self.bind_conditions(conditions)?;
        let limit = match limit {
            None => None,
            Some(LimitSlot::Literal(n)) => Some(n),
            Some(LimitSlot::LastParam) => Some(self.last_param_as_limit()?),
        };

        if let Some(key) = self.key_of(&filters) {
            return Some(Query::PointLookup { key });
        }

        // Only the first sortable item is honored.
        let sort = order_by
            .iter()
            .find(|item| self.entity.is_sortable(&item.field))
            .map(|item| {
                if item.ascending {
                    SortBy::asc(item.field.clone())
                } else {
                    SortBy::desc(item.field.clone())
                }
            });

        Some(Query::FilterScan {
            filters,
            sort,
            limit,
        })
    }

    fn plan_count(&self, conditions: &[Condition]) -> Option<Query> {
        Some(Query::count(self.bind_conditions(conditions)?))
    }

    fn plan_update(
        &self,
        assignments: &[(String, Slot)],
        conditions: &[Condition],
    ) -> Option<Query> {
        if conditions.is_empty() {
            return None;
        }
        if assignments
            .iter()
            .any(|(field, _)| self.entity.key().is_key_field(field))
        {
            return None;
        }

        let set = assignments
            .iter()
            .map(|(field, slot)| Some((field.clone(), self.bind(slot)?)))
            .collect::<Option<Record>>()?;
        let target = self.plan_target(conditions)?;
        Some(Query::update(target, set))
    }

    /// Key when the conditions pin exactly the key fields, filters otherwise
    fn plan_target(&self, conditions: &[Condition]) -> Option<MatchBy> {
        let filters = self.bind_conditions(conditions)?;
        Some(match self.key_of(&filters) {
            Some(key) => MatchBy::Key(key),
            None => MatchBy::Filters(filters),
        })
    }

    fn key_of(&self, filters: &[Filter]) -> Option<PrimaryKey> {
        if filters.is_empty() || filters.iter().any(|f| f.op != FilterOp::Eq) {
            return None;
        }
        let pairs: Vec<(&str, &Value)> = filters
            .iter()
            .map(|f| (f.field.as_str(), &f.value))
            .collect();
        self.entity.key_from_equalities(&pairs)
    }

    fn bind_conditions(&self, conditions: &[Condition]) -> Option<Vec<Filter>> {
        conditions
            .iter()
            .map(|condition| {
                let value = self.bind(&condition.slot)?;
                Some(match condition.op {
                    CompareOp::Eq => Filter::eq(condition.field.clone(), value),
                    CompareOp::Lt => Filter::before(condition.field.clone(), value),
                })
            })
            .collect()
    }

    fn bind(&self, slot: &Slot) -> Option<Value> {
        match slot {
            Slot::Literal(value) => Some(value.clone()),
            Slot::Param(index) => self.params.get(*index).cloned(),
        }
    }

    fn last_param_as_limit(&self) -> Option<usize> {
        let n = as_index(self.params.last()?)?;
        usize::try_from(n).ok()
    }
}
