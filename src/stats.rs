use crate::{
    models::{AggregateStats, Role},
    store::{Collection, DocumentStore, Filter, StoreError},
};

/// `part / whole` as a percentage rounded to two decimal places.
/// An empty whole yields `0.0` instead of NaN.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let ratio = part as f64 / whole as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}

/// compute_admin_stats
///
/// Builds a fresh dashboard snapshot from the current room and user collections.
/// The counting queries run one after another; any storage failure aborts the whole
/// computation.
pub async fn compute_admin_stats(store: &dyn DocumentStore) -> Result<AggregateStats, StoreError> {
    let total_rooms = store.estimated_document_count(Collection::Rooms).await?;
    let total_users = store
        .count_documents(Collection::Users, &Filter::all().eq("role", Role::User.as_str()))
        .await?;
    let total_members = store
        .count_documents(Collection::Users, &Filter::all().eq("role", Role::Member.as_str()))
        .await?;
    let available_rooms = store
        .count_documents(Collection::Rooms, &Filter::all().eq("availability", true))
        .await?;

    let unavailable_rooms = total_rooms.saturating_sub(available_rooms);

    Ok(AggregateStats {
        total_rooms,
        total_users,
        total_members,
        percent_of_available: percentage(available_rooms, total_rooms),
        percent_of_unavailable: percentage(unavailable_rooms, total_rooms),
    })
}
