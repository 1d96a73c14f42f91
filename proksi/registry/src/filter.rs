use proksi_core::{Endpoint, Uptime};

/// Narrows a selection of endpoints down. Applied in order by
/// [`crate::Registry::select`] and by insertion watchers.
///
/// Grounded on `examples/original_source/pkg/storage/filter.go`'s
/// `Filter` type.
pub type Filter = std::sync::Arc<dyn Fn(&[Endpoint]) -> Vec<Endpoint> + Send + Sync>;

/// Keeps only endpoints whose observed uptime is at least `threshold`.
pub fn by_uptime(threshold: Uptime) -> Filter {
    std::sync::Arc::new(move |endpoints: &[Endpoint]| {
        endpoints
            .iter()
            .filter(|e| e.quality().uptime >= threshold)
            .cloned()
            .collect()
    })
}

/// Keeps only endpoints whose score is at least `threshold`.
pub fn by_score(threshold: i8) -> Filter {
    std::sync::Arc::new(move |endpoints: &[Endpoint]| {
        endpoints
            .iter()
            .filter(|e| e.score() >= threshold)
            .cloned()
            .collect()
    })
}

pub fn apply(filters: &[Filter], mut endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    for filter in filters {
        endpoints = filter(&endpoints);
    }
    endpoints
}
