use crate::types::{ContentUnit, ImageUnit, TableUnit, TextLine};

/// Merge a page's lines, tables and images into reading order.
///
/// The sort is stable, so units sharing a vertical position keep the order
/// lines, tables, images, and their relative extraction order within each.
pub fn interleave(
    lines: Vec<TextLine>,
    tables: Vec<TableUnit>,
    images: Vec<ImageUnit>,
) -> Vec<ContentUnit> {
    let mut units: Vec<ContentUnit> = lines
        .into_iter()
        .map(ContentUnit::Text)
        .chain(tables.into_iter().map(ContentUnit::Table))
        .chain(images.into_iter().map(ContentUnit::Image))
        .collect();

    units.sort_by(|a, b| a.top().total_cmp(&b.top()));
    units
}
