//! Multi-model detection aggregation.

use std::collections::HashMap;

use tracing::trace;
use vigil_models::{AggregatedObject, RawDetection};

use crate::thresholds::ThresholdTable;

/// Detections produced by one model for one frame, in model invocation order.
pub type ModelDetections = (String, Vec<RawDetection>);

/// Merge raw detections from every model into one object per label.
///
/// A detection survives when `confidence >= thresholds.required(model, label)`.
/// Survivors are grouped by normalized label; each group keeps the bounding box
/// of its highest-confidence member (first one wins on ties) and counts every
/// survivor, across all models.
///
/// Output order is the order in which each label first survived.
pub fn aggregate(per_model: &[ModelDetections], thresholds: &ThresholdTable) -> Vec<AggregatedObject> {
    let mut objects: Vec<AggregatedObject> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (model_id, detections) in per_model {
        for detection in detections {
            let label = detection.normalized_label();
            let required = thresholds.required(model_id, &label);

            if detection.confidence < required {
                trace!(
                    model = %model_id,
                    label = %label,
                    confidence = detection.confidence,
                    required,
                    "Detection below threshold"
                );
                continue;
            }

            match index.get(&label) {
                Some(&slot) => {
                    let existing = &mut objects[slot];
                    existing.occurrence_count += 1;
                    if detection.confidence > existing.best_confidence {
                        existing.best_confidence = detection.confidence;
                        existing.bbox = detection.bbox;
                    }
                }
                None => {
                    index.insert(label.clone(), objects.len());
                    objects.push(AggregatedObject {
                        label,
                        best_confidence: detection.confidence,
                        bbox: detection.bbox,
                        occurrence_count: 1,
                    });
                }
            }
        }
    }

    objects
}

/// Total number of raw detections across all models.
pub fn raw_count(per_model: &[ModelDetections]) -> usize {
    per_model.iter().map(|(_, detections)| detections.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::BoundingBox;

    fn det(model: &str, label: &str, confidence: f32, x: i32) -> RawDetection {
        RawDetection::new(model, label, confidence, BoundingBox::new(x, 0, x + 10, 10).unwrap())
    }

    #[test]
    fn test_single_model_scenario() {
        let input = vec![(
            "firesmoke".to_string(),
            vec![
                det("firesmoke", "fire", 0.91, 0),
                det("firesmoke", "pistol", 0.60, 10),
                det("firesmoke", "smoke", 0.76, 20),
            ],
        )];

        let out = aggregate(&input, &ThresholdTable::default());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].label, "fire");
        assert_eq!(out[0].best_confidence, 0.91);
        assert_eq!(out[1].label, "smoke");
        assert_eq!(out[1].best_confidence, 0.76);
    }

    #[test]
    fn test_groups_across_models_and_case() {
        let input = vec![
            ("a".to_string(), vec![det("a", "Fire", 0.80, 0), det("a", "fire ", 0.95, 30)]),
            ("b".to_string(), vec![det("b", "FIRE", 0.90, 60)]),
        ];

        let out = aggregate(&input, &ThresholdTable::default());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "fire");
        assert_eq!(out[0].best_confidence, 0.95);
        assert_eq!(out[0].bbox.x1(), 30);
        assert_eq!(out[0].occurrence_count, 3);
    }

    #[test]
    fn test_tie_keeps_first_encountered() {
        let input = vec![
            ("a".to_string(), vec![det("a", "smoke", 0.88, 5)]),
            ("b".to_string(), vec![det("b", "smoke", 0.88, 50)]),
        ];

        let out = aggregate(&input, &ThresholdTable::default());
        assert_eq!(out[0].bbox.x1(), 5);
        assert_eq!(out[0].occurrence_count, 2);
    }

    #[test]
    fn test_per_model_override() {
        let thresholds = ThresholdTable::default().with_override("gunonly", "pistol", 0.5);
        let input = vec![
            ("gunonly".to_string(), vec![det("gunonly", "pistol", 0.6, 0)]),
            ("total".to_string(), vec![det("total", "pistol", 0.6, 0)]),
        ];

        let out = aggregate(&input, &thresholds);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].occurrence_count, 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let input = vec![("m".to_string(), vec![det("m", "person", 0.75, 0)])];
        assert_eq!(aggregate(&input, &ThresholdTable::default()).len(), 1);
    }

    #[test]
    fn test_no_duplicate_labels_and_nothing_below_threshold() {
        let labels = ["fire", "Smoke", "pistol", "FIRE", "person", "smoke "];
        let mut input = Vec::new();
        for m in 0..3 {
            let model = format!("m{}", m);
            let detections = (0..24)
                .map(|i| {
                    let confidence = ((i * 7 + m * 13) % 100) as f32 / 100.0;
                    det(&model, labels[(i + m) % labels.len()], confidence, i as i32)
                })
                .collect();
            input.push((model, detections));
        }

        let thresholds = ThresholdTable::default();
        let out = aggregate(&input, &thresholds);

        let mut seen = std::collections::HashSet::new();
        for object in &out {
            assert!(seen.insert(object.label.clone()), "duplicate label {}", object.label);
            assert!(object.best_confidence >= thresholds.global_default());
        }

        let survivors = input
            .iter()
            .flat_map(|(_, d)| d)
            .filter(|d| d.confidence >= 0.75)
            .count() as u32;
        assert_eq!(out.iter().map(|o| o.occurrence_count).sum::<u32>(), survivors);
    }

    #[test]
    fn test_raw_count() {
        let input = vec![
            ("a".to_string(), vec![det("a", "fire", 0.1, 0)]),
            ("b".to_string(), vec![]),
        ];
        assert_eq!(raw_count(&input), 1);
    }
}
