//! Listing: active-only filtering, stable ordering and offset/limit slicing

use crate::config::ServiceConfig;
use crate::models::transaction::{ListTransactionsQuery, Transaction, TransactionPage};
use crate::services::validation::{ValidationError, is_identifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Exclude completed and failed
    pub active_only: bool,
    pub limit: usize,
    pub offset: usize,
}

impl TransactionFilter {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            active_only: false,
            limit,
            offset,
        }
    }

    pub fn active_only(self) -> Self {
        Self {
            active_only: true,
            ..self
        }
    }

    pub fn validate(&self, max_page_size: usize) -> Result<(), ValidationError> {
        if self.limit < 1 {
            return Err(ValidationError::InvalidPagination(
                "limit must be at least 1".to_string(),
            ));
        }
        if self.limit > max_page_size {
            return Err(ValidationError::InvalidPagination(format!(
                "limit cannot exceed {}",
                max_page_size
            )));
        }
        Ok(())
    }
}

/// Turn raw query parameters into a player id and a filter
pub fn parse_list_query(
    query: &ListTransactionsQuery,
    config: &ServiceConfig,
) -> Result<(String, TransactionFilter), ValidationError> {
    let player_id = match query.player_id.as_deref() {
        None | Some("") => return Err(ValidationError::MissingField("player_id")),
        Some(player_id) if !is_identifier(player_id) => {
            return Err(ValidationError::InvalidIdentifier {
                field: "player_id",
                value: player_id.to_string(),
            });
        }
        Some(player_id) => player_id.to_string(),
    };

    let limit = match query.limit {
        None => config.default_page_size,
        Some(limit) if limit < 1 => {
            return Err(ValidationError::InvalidPagination(
                "limit must be at least 1".to_string(),
            ));
        }
        Some(limit) => usize::try_from(limit).unwrap_or(usize::MAX),
    };
    let offset = match query.offset {
        None => 0,
        Some(offset) if offset < 0 => {
            return Err(ValidationError::InvalidPagination(
                "offset cannot be negative".to_string(),
            ));
        }
        Some(offset) => usize::try_from(offset).unwrap_or(usize::MAX),
    };

    let filter = TransactionFilter {
        active_only: query.active_only.unwrap_or(false),
        limit,
        offset,
    };
    filter.validate(config.max_page_size)?;
    Ok((player_id, filter))
}

/// Filter, order by (`start_time`, `id`) and slice `[offset, offset + limit)`.
///
/// `total` counts records after filtering and before slicing.
pub fn paginate(mut records: Vec<Transaction>, filter: &TransactionFilter) -> TransactionPage {
    if filter.active_only {
        records.retain(Transaction::is_active);
    }
    records.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.id.cmp(&b.id))
    });

    let total = records.len();
    let items: Vec<Transaction> = records
        .into_iter()
        .skip(filter.offset)
        .take(filter.limit)
        .collect();

    TransactionPage {
        items,
        total,
        has_more: filter.offset.saturating_add(filter.limit) < total,
        limit: filter.limit,
        offset: filter.offset,
    }
}
