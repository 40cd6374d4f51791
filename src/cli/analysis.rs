use crate::{
    daemon::{processing::site::Site, storage::entities::SiteCounters},
    utils::percentage::{seconds_percentage, Percentage},
};

#[derive(Debug, PartialEq)]
pub struct SiteUsage {
    pub site: Site,
    pub seconds: f64,
    pub percentage: Percentage,
}

/// Returns sites sorted by time spent, together with the total time. Sites below
/// `min_percentage` of the total are filtered out.
pub fn analyze_sites(counters: &SiteCounters, min_percentage: Percentage) -> (Vec<SiteUsage>, f64) {
    let total = counters.values().sum::<f64>();

    let mut usages = counters
        .iter()
        .map(|(site, seconds)| SiteUsage {
            site: site.clone(),
            seconds: *seconds,
            percentage: seconds_percentage(*seconds, total),
        })
        .filter(|usage| usage.percentage >= min_percentage)
        .collect::<Vec<_>>();
    usages.sort_by(|a, b| b.seconds.total_cmp(&a.seconds));
    (usages, total)
}
