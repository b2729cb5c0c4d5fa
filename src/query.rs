// src/query.rs
//
// Catalog reads for the listing feed: one independent page per source,
// concatenated in the fixed source order.

use crate::config::PageSizes;
use crate::db::connection::Database;
use crate::db::listings::{has_rows_from, page_for_source};
use crate::domain::listing::{Listing, SearchFilter, Source};
use crate::errors::ServerError;
use serde::Serialize;

/// Offsets keyed by source, as sent by the client and returned as the next cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceOffsets {
    pub kufar: usize,
    pub onliner: usize,
    pub user: usize,
}

impl SourceOffsets {
    pub fn get(&self, source: Source) -> usize {
        match source {
            Source::Kufar => self.kufar,
            Source::Onliner => self.onliner,
            Source::UserSubmitted => self.user,
        }
    }

    pub fn set(&mut self, source: Source, value: usize) {
        match source {
            Source::Kufar => self.kufar = value,
            Source::Onliner => self.onliner = value,
            Source::UserSubmitted => self.user = value,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingsPage {
    pub items: Vec<Listing>,
    pub per_source_next_offsets: SourceOffsets,
    pub has_more: bool,
}

pub fn query_listings(
    db: &Database,
    filter: &SearchFilter,
    offsets: SourceOffsets,
    pages: PageSizes,
) -> Result<ListingsPage, ServerError> {
    db.with_conn(|conn| {
        let mut items = Vec::new();
        let mut next = offsets;
        let mut has_more = false;

        for source in Source::ALL {
            let offset = offsets.get(source);
            let size = if offset == 0 { pages.initial } else { pages.more };

            let page = page_for_source(conn, filter, source, offset, size)?;
            let next_offset = offset.saturating_add(page.len());
            next.set(source, next_offset);
            items.extend(page);

            if !has_more && has_rows_from(conn, filter, source, next_offset)? {
                has_more = true;
            }
        }

        tracing::debug!(
            returned = items.len(),
            kufar = next.kufar,
            onliner = next.onliner,
            user = next.user,
            has_more,
            "listings page served"
        );
        Ok(ListingsPage {
            items,
            per_source_next_offsets: next,
            has_more,
        })
    })
}
