//! Per-entity dataset construction
//!
//! An [`EntityBuilder`] buffers the events of one user/item pair. Every view
//! replays them in time order, normalized so the first event sits at 0.

use crate::config::{validate_plotting_params, validate_training_params};
use crate::curve::{memory_trace, recall_score, RetentionCurve};
use crate::error::RetentionError;
use crate::schema::{check_timestamp, ClickCounting, EntityId, Event, Interaction};
use crate::snapshot::FeatureSnapshot;
use crate::types::{PlottingRow, Projection, Row, TrainingRow};

const CLICKED: &str = "CLICKED";

/// A scored time window and the features at its end
#[derive(Debug, Clone, PartialEq)]
struct Bucket {
    recall_score: f64,
    period_end: i64,
    features: Row,
}

/// Buffered events of one entity
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    entity: EntityId,
    events: Vec<Interaction>,
}

impl EntityBuilder {
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            events: Vec::new(),
        }
    }

    pub fn from_event(event: Event) -> Result<Self, RetentionError> {
        let mut builder = Self::new(event.entity.clone());
        builder.add(event)?;
        Ok(builder)
    }

    /// Buffer an event of this builder's entity
    pub fn add(&mut self, event: Event) -> Result<(), RetentionError> {
        if event.entity != self.entity {
            return Err(RetentionError::EntityMismatch {
                expected: self.entity.clone(),
                actual: event.entity,
            });
        }
        check_timestamp(event.timestamp())?;
        self.events.push(event.interaction);
        Ok(())
    }

    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events sorted by time (ties keep arrival order), shifted so the first is at 0
    pub fn message_sequence(&self) -> Vec<Interaction> {
        let mut events = self.events.clone();
        events.sort_by_key(|e| e.timestamp);

        if let Some(origin) = events.first().map(|e| e.timestamp) {
            for event in &mut events {
                event.timestamp -= origin;
            }
        }
        events
    }

    fn insufficient(&self, reason: &str) -> RetentionError {
        RetentionError::InsufficientData(format!("{}: {reason}", self.entity))
    }

    /// Fold events into windows `[k * period, (k + 1) * period)` covering every event
    fn aggregate_into_buckets(
        events: &[Interaction],
        sample_period: i64,
        projection: Projection,
    ) -> (Vec<i64>, Vec<Option<Bucket>>) {
        let Some(last) = events.last().map(|e| e.timestamp) else {
            return (Vec::new(), Vec::new());
        };

        let mut snapshot = FeatureSnapshot::new();
        let mut ends = Vec::new();
        let mut buckets = Vec::new();
        let mut pending = events.iter().peekable();
        let mut period_start = 0;

        while period_start <= last {
            // a window reaching past i64::MAX already holds every remaining event
            let period_end = period_start.saturating_add(sample_period);
            let (mut recalls, mut clicks) = (0, 0);

            while let Some(event) = pending.next_if(|e| e.timestamp < period_end) {
                snapshot.update_counting_text_as_clicks(event);
                recalls += u32::from(event.message.is_recall());
                clicks += u32::from(event.message.is_click());
            }

            buckets.push(recall_score(recalls, clicks).map(|score| Bucket {
                recall_score: score,
                period_end,
                features: snapshot.project(projection),
            }));
            ends.push(period_end);
            period_start = period_end;
        }

        (ends, buckets)
    }

    /// Bucket recall scores and the smoothed retention curve over them
    pub fn infer_retention_rate(
        &self,
        sample_period: i64,
        alpha: f64,
    ) -> Result<RetentionCurve, RetentionError> {
        validate_training_params(sample_period, alpha)?;
        let events = self.message_sequence();
        let (ends, buckets) =
            Self::aggregate_into_buckets(&events, sample_period, Projection::Common);
        let scores = buckets
            .iter()
            .map(|b| b.as_ref().map(|b| b.recall_score))
            .collect();

        RetentionCurve::from_scores(ends, scores, alpha)
            .ok_or_else(|| self.insufficient("no bucket holds a scored event"))
    }

    /// Supervised rows over every feature
    pub fn build_training_rows(
        &self,
        sample_period: i64,
        alpha: f64,
    ) -> Result<Vec<TrainingRow>, RetentionError> {
        self.build_training_rows_with_projection(sample_period, alpha, Projection::All)
    }

    /// Supervised rows: features at each scored bucket paired with the
    /// inferred retention at the next scored bucket
    pub fn build_training_rows_with_projection(
        &self,
        sample_period: i64,
        alpha: f64,
        projection: Projection,
    ) -> Result<Vec<TrainingRow>, RetentionError> {
        validate_training_params(sample_period, alpha)?;
        let events = self.message_sequence();
        let (ends, buckets) = Self::aggregate_into_buckets(&events, sample_period, projection);
        let scores = buckets
            .iter()
            .map(|b| b.as_ref().map(|b| b.recall_score))
            .collect();
        let curve = RetentionCurve::from_scores(ends, scores, alpha)
            .ok_or_else(|| self.insufficient("no bucket holds a scored event"))?;

        let known: Vec<(usize, &Bucket)> = buckets
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (i, b)))
            .collect();

        let mut rows = Vec::with_capacity(known.len().saturating_sub(1));
        for pair in known.windows(2) {
            let [(_, bucket), (j, successor)] = pair else {
                continue;
            };
            let delta = successor.period_end - bucket.period_end;
            let mu = memory_trace(successor.recall_score, delta);
            if !mu.is_finite() {
                tracing::warn!(
                    entity = %self.entity,
                    delta,
                    mu,
                    "dropping row with non-finite memory trace"
                );
                continue;
            }

            let mut features = bucket.features.clone();
            features.remove(CLICKED);
            rows.push(TrainingRow {
                features,
                delta,
                inferred_retention_rate: curve.inferred[*j],
                previous_recall_score: bucket.recall_score,
            });
        }

        if rows.is_empty() {
            return Err(self.insufficient("fewer than two scored buckets"));
        }
        Ok(rows)
    }

    /// The latest snapshot sampled every `interval` seconds until
    /// `tail_padding` seconds past the last event
    pub fn build_plotting_rows(
        &self,
        interval: i64,
        tail_padding: i64,
    ) -> Result<Vec<PlottingRow>, RetentionError> {
        validate_plotting_params(interval, tail_padding)?;
        let events = self.message_sequence();
        let Some(last) = events.last().map(|e| e.timestamp) else {
            return Err(self.insufficient("no events"));
        };

        let end = last.checked_add(tail_padding).ok_or_else(|| {
            RetentionError::InvalidParameter(format!(
                "tail padding {tail_padding} overflows past the last event at {last}"
            ))
        })?;

        let mut snapshot = FeatureSnapshot::new();
        let mut history = Vec::with_capacity(events.len());
        for event in &events {
            snapshot.update_counting_text_as_clicks(event);
            let mut features = snapshot.project(Projection::All);
            features.remove(CLICKED);
            history.push((event.timestamp, snapshot.first_exposure_seconds(), features));
        }

        let mut rows = Vec::new();
        let mut latest = 0;
        let mut offset = Some(0);
        while let Some(at) = offset.filter(|at| *at <= end) {
            while latest + 1 < history.len() && history[latest + 1].0 <= at {
                latest += 1;
            }
            let (_, first_exposure, features) = &history[latest];
            rows.push(PlottingRow {
                features: features.clone(),
                delta: at - first_exposure.as_feature(),
            });
            offset = at.checked_add(interval);
        }

        Ok(rows)
    }

    /// One row per outcome-carrying event after the first, holding the
    /// features right after that event
    pub fn build_event_rows(
        &self,
        projection: Projection,
        counting: ClickCounting,
    ) -> Result<Vec<Row>, RetentionError> {
        let mut snapshot = FeatureSnapshot::new();
        let mut rows = Vec::new();

        for (i, event) in self.message_sequence().iter().enumerate() {
            snapshot.update_with(event, counting);
            if i > 0 && event.message.outcome(counting).is_some() {
                rows.push(snapshot.project(projection));
            }
        }

        if rows.is_empty() {
            return Err(self.insufficient("no outcome after the first event"));
        }
        Ok(rows)
    }

    /// Features after every event, for entities with at least one labeled row
    pub fn build_final_snapshot(&self, projection: Projection) -> Result<Row, RetentionError> {
        self.build_event_rows(projection, ClickCounting::ExercisesOnly)?;
        let mut snapshot = FeatureSnapshot::new();
        for event in self.message_sequence() {
            snapshot.update(&event);
        }
        Ok(snapshot.project(projection))
    }

    /// Features at normalized time `offset`
    pub fn snapshot_at(&self, offset: i64, projection: Projection) -> Result<Row, RetentionError> {
        let events = self.message_sequence();
        if events.first().map_or(true, |e| e.timestamp > offset) {
            return Err(self.insufficient("no event at or before the offset"));
        }

        let mut snapshot = FeatureSnapshot::new();
        for event in events.iter().take_while(|e| e.timestamp <= offset) {
            snapshot.update(event);
        }
        snapshot.update_timestamp(offset);
        Ok(snapshot.project(projection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NEVER;
    use crate::schema::{Message, ValidationError, MAX_TIMESTAMP};
    use crate::types::FeatureValue;
    use pretty_assertions::assert_eq;

    fn builder(events: &[(i64, Message)]) -> EntityBuilder {
        let entity = EntityId::new("ana", "casa");
        let mut builder = EntityBuilder::new(entity.clone());
        for (t, m) in events {
            builder.add(Event::new(entity.clone(), *t, *m)).unwrap();
        }
        builder
    }

    fn golden() -> EntityBuilder {
        builder(&[
            (100, Message::TextWordHighlighted),
            (1000, Message::TextWordHighlighted),
            (1050, Message::TextSentenceClick),
            (2000, Message::RevisionClicked),
            (2050, Message::RevisionClicked),
            (2060, Message::RevisionNotClicked),
        ])
    }

    fn pick(row: &Row, keys: &[&'static str]) -> Vec<(&'static str, FeatureValue)> {
        keys.iter().map(|k| (*k, row[k])).collect()
    }

    #[test]
    fn test_add_rejects_other_entity() {
        let mut b = builder(&[]);
        let result = b.add(Event::new(
            EntityId::new("ana", "perro"),
            0,
            Message::RevisionClicked,
        ));
        assert!(matches!(result, Err(RetentionError::EntityMismatch { .. })));
        assert!(b.is_empty());
    }

    #[test]
    fn test_message_sequence_is_sorted_and_normalized() {
        let b = builder(&[
            (500, Message::RevisionClicked),
            (200, Message::TextWordHighlighted),
            (500, Message::RevisionNotClicked),
        ]);
        assert_eq!(
            b.message_sequence(),
            vec![
                Interaction::new(0, Message::TextWordHighlighted),
                Interaction::new(300, Message::RevisionClicked),
                Interaction::new(300, Message::RevisionNotClicked),
            ]
        );
    }

    #[test]
    fn test_golden_revision_rows() {
        let rows = golden()
            .build_event_rows(Projection::Revision, ClickCounting::ExercisesOnly)
            .unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(
            pick(
                &rows[0],
                &[
                    "CLICKED",
                    "FIRST_EXPOSURE_seconds",
                    "REVISION__CLICKED_amount",
                    "REVISION__CLICKED_seconds",
                    "REVISION__NOT_CLICKED_seconds",
                    "REVISION_last_interval",
                    "REVISION_previous_interval",
                    "REVISION_interval_ratio",
                ]
            ),
            vec![
                ("CLICKED", FeatureValue::Bool(true)),
                ("FIRST_EXPOSURE_seconds", FeatureValue::Int(1900)),
                ("REVISION__CLICKED_amount", FeatureValue::Int(0)),
                ("REVISION__CLICKED_seconds", FeatureValue::Int(1900)),
                ("REVISION__NOT_CLICKED_seconds", FeatureValue::Int(NEVER)),
                ("REVISION_last_interval", FeatureValue::Int(1900)),
                ("REVISION_previous_interval", FeatureValue::Int(NEVER)),
                ("REVISION_interval_ratio", FeatureValue::Float(1.0)),
            ]
        );

        assert_eq!(
            pick(
                &rows[2],
                &[
                    "CLICKED",
                    "FIRST_EXPOSURE_seconds",
                    "REVISION__CLICKED_amount",
                    "REVISION__NOT_CLICKED_amount",
                    "REVISION__ALL_seconds",
                    "REVISION_last_interval",
                    "REVISION_previous_interval",
                ]
            ),
            vec![
                ("CLICKED", FeatureValue::Bool(false)),
                ("FIRST_EXPOSURE_seconds", FeatureValue::Int(1960)),
                ("REVISION__CLICKED_amount", FeatureValue::Int(2)),
                ("REVISION__NOT_CLICKED_amount", FeatureValue::Int(0)),
                ("REVISION__ALL_seconds", FeatureValue::Int(10)),
                ("REVISION_last_interval", FeatureValue::Int(10)),
                ("REVISION_previous_interval", FeatureValue::Int(50)),
            ]
        );
        assert!(rows.iter().all(|r| !r.contains_key("TEXT__ALL_amount")));
    }

    #[test]
    fn test_golden_reading_features_in_full_projection() {
        let rows = golden()
            .build_event_rows(Projection::All, ClickCounting::ExercisesOnly)
            .unwrap();
        assert_eq!(
            pick(
                &rows[0],
                &[
                    "TEXT__WORD_HIGHLIGHTED_amount",
                    "TEXT__SENTENCE_CLICK_amount",
                    "TEXT__ALL_amount",
                    "TEXT__WORD_HIGHLIGHTED_seconds",
                    "TEXT__SENTENCE_CLICK_seconds",
                    "ALL_amount",
                    "ALL_seconds",
                ]
            ),
            vec![
                ("TEXT__WORD_HIGHLIGHTED_amount", FeatureValue::Int(3)),
                ("TEXT__SENTENCE_CLICK_amount", FeatureValue::Int(2)),
                ("TEXT__ALL_amount", FeatureValue::Int(2)),
                ("TEXT__WORD_HIGHLIGHTED_seconds", FeatureValue::Int(1000)),
                ("TEXT__SENTENCE_CLICK_seconds", FeatureValue::Int(950)),
                ("ALL_amount", FeatureValue::Int(4)),
                ("ALL_seconds", FeatureValue::Int(950)),
            ]
        );
        assert_eq!(rows[2]["ALL_amount"], FeatureValue::Int(6));
    }

    #[test]
    fn test_counting_text_as_clicks_adds_highlight_rows() {
        let rows = golden()
            .build_event_rows(Projection::Common, ClickCounting::TextAsClicks)
            .unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["FIRST_EXPOSURE_seconds"], FeatureValue::Int(900));
    }

    #[test]
    fn test_event_rows_need_a_later_outcome() {
        let b = builder(&[(0, Message::RevisionClicked), (10, Message::TextSentenceRead)]);
        let err = b
            .build_event_rows(Projection::All, ClickCounting::ExercisesOnly)
            .unwrap_err();
        assert!(err.is_insufficient_data());
        assert!(b.build_final_snapshot(Projection::All).is_err());
    }

    #[test]
    fn test_final_snapshot() {
        let row = golden().build_final_snapshot(Projection::Revision).unwrap();
        assert_eq!(row["REVISION__CLICKED_amount"], FeatureValue::Int(2));
        assert_eq!(row["CLICKED"], FeatureValue::Bool(false));
    }

    #[test]
    fn test_snapshot_at_moves_clock_to_offset() {
        let b = golden();
        let row = b.snapshot_at(2900, Projection::Revision).unwrap();
        assert_eq!(row["FIRST_EXPOSURE_seconds"], FeatureValue::Int(2900));
        // last revision sits at normalized 1960
        assert_eq!(row["REVISION__NOT_CLICKED_seconds"], FeatureValue::Int(940));
        assert!(b.snapshot_at(-1, Projection::Common).is_err());
    }

    fn training_builder() -> EntityBuilder {
        builder(&[
            (1000, Message::RevisionNotClicked),
            (1050, Message::RevisionClicked),
            (1150, Message::RevisionNotClicked),
            (1350, Message::RevisionClicked),
        ])
    }

    #[test]
    fn test_training_rows_pair_known_buckets() {
        let rows = training_builder().build_training_rows(100, 0.0).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].delta, 100);
        assert_eq!(rows[0].previous_recall_score, 0.5);
        assert_eq!(rows[0].inferred_retention_rate, 1.0);

        // the empty third bucket is skipped
        assert_eq!(rows[1].delta, 200);
        assert_eq!(rows[1].previous_recall_score, 1.0);
        assert_eq!(rows[1].inferred_retention_rate, 0.0);
    }

    #[test]
    fn test_training_rows_hide_bucket_bookkeeping() {
        let rows = training_builder().build_training_rows(100, 0.6).unwrap();
        for row in &rows {
            assert!(!row.features.contains_key("CLICKED"));
            assert!(!row.features.contains_key("recall_score"));
            assert!(!row.features.contains_key("period_end"));
            assert!((0.0..=1.0).contains(&row.inferred_retention_rate));
        }
        assert_eq!(
            rows[1].features["REVISION__CLICKED_amount"],
            FeatureValue::Int(1)
        );
        assert_eq!(
            rows[1].features["REVISION__NOT_CLICKED_amount"],
            FeatureValue::Int(1)
        );
    }

    #[test]
    fn test_retention_curve_matches_buckets() {
        let curve = training_builder().infer_retention_rate(100, 0.0).unwrap();
        assert_eq!(curve.bucket_ends, vec![100, 200, 300, 400]);
        assert_eq!(curve.recall_scores, vec![Some(0.5), Some(1.0), None, Some(0.0)]);
        assert_eq!(curve.filled, vec![0.5, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_row_count_equals_known_buckets_with_successor() {
        let messages = Message::ALL;
        let mut seed: u64 = 7;
        let mut events = Vec::new();
        let mut t = 0;
        for _ in 0..200 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            t += (seed >> 33) as i64 % 20_000;
            events.push((t, messages[(seed >> 40) as usize % messages.len()]));
        }
        let b = builder(&events);

        let curve = b.infer_retention_rate(3600, 0.6).unwrap();
        let known = curve.recall_scores.iter().filter(|s| s.is_some()).count();
        let rows = b.build_training_rows(3600, 0.6).unwrap();
        assert_eq!(rows.len(), known - 1);
    }

    #[test]
    fn test_single_bucket_is_insufficient() {
        let err = golden().build_training_rows(86_400, 0.6).unwrap_err();
        assert!(err.is_insufficient_data());

        let unscored = builder(&[
            (0, Message::TextSentenceClick),
            (90_000, Message::TextSentenceClick),
        ]);
        assert!(unscored
            .build_training_rows(86_400, 0.6)
            .unwrap_err()
            .is_insufficient_data());
    }

    #[test]
    fn test_invalid_parameters() {
        let b = training_builder();
        assert!(matches!(
            b.build_training_rows(0, 0.6),
            Err(RetentionError::InvalidParameter(_))
        ));
        assert!(matches!(
            b.build_training_rows(100, -0.1),
            Err(RetentionError::InvalidParameter(_))
        ));
        assert!(matches!(
            b.build_plotting_rows(100, -1),
            Err(RetentionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_identical_input_gives_identical_rows() {
        let render = || {
            let rows = training_builder().build_training_rows(100, 0.6).unwrap();
            serde_json::to_string(&rows).unwrap()
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn test_plotting_rows_sample_latest_snapshot() {
        let b = builder(&[(40, Message::TextWordHighlighted), (140, Message::RevisionClicked)]);
        let rows = b.build_plotting_rows(50, 0).unwrap();
        assert_eq!(rows.iter().map(|r| r.delta).collect::<Vec<_>>(), vec![0, 50, 0]);
        assert_eq!(rows[1].features["ALL_amount"], FeatureValue::Int(1));
        assert_eq!(rows[2].features["ALL_amount"], FeatureValue::Int(2));
        assert!(rows.iter().all(|r| !r.features.contains_key("CLICKED")));

        let padded = b.build_plotting_rows(50, 100).unwrap();
        assert_eq!(padded.len(), 5);
        assert_eq!(padded[4].delta, 100);
    }

    #[test]
    fn test_extreme_timestamps_are_refused_by_builder() {
        let entity = EntityId::new("ana", "casa");
        let mut b = EntityBuilder::new(entity.clone());
        let result = b.add(Event::new(entity.clone(), i64::MIN, Message::RevisionClicked));
        assert!(matches!(
            result,
            Err(RetentionError::Validation(ValidationError::TimestampOutOfRange(i64::MIN)))
        ));
        assert!(EntityBuilder::from_event(Event::new(
            entity.clone(),
            i64::MAX,
            Message::RevisionNotClicked
        ))
        .is_err());

        b.add(Event::new(entity.clone(), -MAX_TIMESTAMP, Message::RevisionClicked))
            .unwrap();
        b.add(Event::new(entity, MAX_TIMESTAMP, Message::RevisionNotClicked))
            .unwrap();
        assert_eq!(b.message_sequence()[1].timestamp, 2 * MAX_TIMESTAMP);
        let rows = b.build_training_rows(MAX_TIMESTAMP, 0.6).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].delta, 2 * MAX_TIMESTAMP);
        assert_eq!(rows[0].previous_recall_score, 0.0);
    }

    #[test]
    fn test_huge_sample_period_holds_every_event_in_one_bucket() {
        let curve = training_builder().infer_retention_rate(i64::MAX, 0.6).unwrap();
        assert_eq!(curve.bucket_ends, vec![i64::MAX]);
        assert_eq!(curve.recall_scores.len(), 1);
        assert!(curve.recall_scores[0].is_some());
    }

    #[test]
    fn test_plotting_padding_overflow_is_an_invalid_parameter() {
        let b = builder(&[(0, Message::TextWordHighlighted), (60, Message::RevisionClicked)]);
        assert!(matches!(
            b.build_plotting_rows(86_400, i64::MAX),
            Err(RetentionError::InvalidParameter(_))
        ));

        // the last offset before the end is kept even when the next one overflows
        let lone = builder(&[(0, Message::TextWordHighlighted)]);
        let rows = lone.build_plotting_rows(i64::MAX / 2 + 1, i64::MAX).unwrap();
        assert_eq!(
            rows.iter().map(|r| r.delta).collect::<Vec<_>>(),
            vec![0, i64::MAX / 2 + 1]
        );
    }
}
