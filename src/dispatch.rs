// src/dispatch.rs
use metrics::{counter, gauge};

use crate::filter::{self, KeywordSet, SeenSet};
use crate::ingest::poller::{PollLoop, StopReason};
use crate::ingest::types::{Listing, TenderSource};
use crate::notify::{format_failure_message, Notification, NotifierMux};

/// What one processed listing produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub total: usize,
    pub matched: usize,
    pub new: usize,
    pub delivered: usize,
    pub failed: usize,
    /// First cycle: new matches recorded as baseline, nothing sent.
    pub baseline: bool,
}

/// Owns the seen set and the cycle counter, and fans new matches out to
/// every configured channel.
pub struct Dispatcher {
    keywords: KeywordSet,
    channels: NotifierMux,
    seen: SeenSet,
    cycle: u64,
}

impl Dispatcher {
    pub fn new(keywords: KeywordSet, channels: NotifierMux) -> Self {
        Self::with_seen(keywords, channels, SeenSet::new())
    }

    pub fn with_seen(keywords: KeywordSet, channels: NotifierMux, seen: SeenSet) -> Self {
        Self {
            keywords,
            channels,
            seen,
            cycle: 0,
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub async fn process(&mut self, listing: Listing) -> CycleReport {
        self.cycle += 1;
        let baseline = self.cycle == 1;

        let matched = filter::keyword_matches(&listing, &self.keywords).len();
        let fresh = filter::new_matches(&listing, &self.keywords, &self.seen);

        let mut report = CycleReport {
            cycle: self.cycle,
            total: listing.len(),
            matched,
            new: fresh.len(),
            baseline,
            ..Default::default()
        };

        if matched > 0 {
            tracing::info!(
                cycle = self.cycle,
                "Found {}/{} tenders matching keywords.",
                matched,
                listing.len()
            );
        }
        if fresh.is_empty() {
            tracing::info!(cycle = self.cycle, "No new tenders found matching keywords.");
        }

        for tender in fresh {
            let keywords: Vec<String> = self
                .keywords
                .matched_in(&tender.name)
                .into_iter()
                .map(str::to_string)
                .collect();
            let msg = Notification::new_tender(&tender, keywords);
            tracing::info!(
                cycle = self.cycle,
                id = %tender.id,
                keywords = ?msg.tender.as_ref().map(|c| &c.keywords),
                baseline,
                "{}",
                msg.text
            );
            // Recorded before any send so a tender is never re-announced,
            // whatever the channels do.
            self.seen.insert(tender.id.clone(), tender);

            if !baseline {
                let d = self.channels.broadcast(&msg).await;
                report.delivered += d.delivered;
                report.failed += d.failed.len();
            }
        }

        counter!("tender_cycles_total").increment(1);
        counter!("tender_new_matches_total").increment(report.new as u64);
        gauge!("tender_seen_total").set(self.seen.len() as f64);
        gauge!("tender_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);

        report
    }

    /// Drain `poller` until it stops and report why it stopped.
    pub async fn run<S: TenderSource>(&mut self, poller: &mut PollLoop<S>) -> StopReason {
        tracing::info!(
            keywords = ?self.keywords.patterns(),
            channels = ?self.channels.names(),
            "dispatcher started"
        );
        while let Some(listing) = poller.next_listing().await {
            let r = self.process(listing).await;
            tracing::debug!(?r, "cycle done");
        }
        // A loop that yields None is always stopped.
        let reason = poller.stop_reason().unwrap_or(StopReason::Cancelled);
        if let StopReason::RetriesExhausted { attempts } = reason {
            let alert = Notification::text(format_failure_message(attempts, poller.last_error()));
            let d = self.channels.broadcast(&alert).await;
            tracing::info!(
                delivered = d.delivered,
                failed = d.failed.len(),
                "failure alert sent"
            );
        }
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Tender;

    #[tokio::test]
    async fn baseline_cycle_records_but_does_not_send() {
        let mut d = Dispatcher::new(KeywordSet::defaults(), NotifierMux::default());
        let r = d
            .process(vec![Tender::new("A", "Curso"), Tender::new("S", "Sillas")])
            .await;
        assert!(r.baseline);
        assert_eq!((r.total, r.matched, r.new, r.delivered), (2, 1, 1, 0));
        assert!(d.seen().contains_key("A"));
        assert!(!d.seen().contains_key("S"));
    }

    #[tokio::test]
    async fn preseeded_seen_set_is_respected() {
        let mut seen = SeenSet::new();
        seen.insert("A".into(), Tender::new("A", "Curso"));
        let mut d = Dispatcher::with_seen(KeywordSet::defaults(), NotifierMux::default(), seen);
        d.process(vec![]).await;
        let r = d.process(vec![Tender::new("A", "Curso")]).await;
        assert_eq!(r.new, 0);
        assert_eq!(d.cycle(), 2);
    }
}
