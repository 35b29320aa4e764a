//! Specification documents survive serialization and re-parsing

use proptest::prelude::*;

use gamefactory::error::{ErrorCode, FactoryError};
use gamefactory::spec::{parse_spec, ArtifactSpecification, Difficulty, ParamValue};

fn difficulty() -> impl Strategy<Value = Difficulty> {
    prop_oneof![
        Just(Difficulty::Easy),
        Just(Difficulty::Medium),
        Just(Difficulty::Hard),
        Just(Difficulty::VeryHard),
    ]
}

fn stages() -> impl Strategy<Value = Vec<(String, Difficulty, Option<String>)>> {
    prop::collection::vec(
        (
            "[A-Z][a-z]{2,12}( [A-Za-z]{1,8})?",
            difficulty(),
            prop::option::of("[a-z]{3,10}"),
        ),
        1..16,
    )
}

fn spec_with(stages: &[(String, Difficulty, Option<String>)]) -> ArtifactSpecification {
    let mut spec = ArtifactSpecification::default_spec(stages.len());
    for (stage, (name, difficulty, layout)) in spec.stages.iter_mut().zip(stages) {
        stage.name = name.clone();
        stage.difficulty = *difficulty;
        if let Some(layout) = layout {
            stage
                .parameters
                .insert("layout".to_string(), ParamValue::Text(layout.clone()));
        }
    }
    spec
}

proptest! {
    #[test]
    fn serialized_spec_parses_back_identically(stages in stages(), fenced in any::<bool>()) {
        let spec = spec_with(&stages);
        let json = spec.to_json().unwrap();
        let raw = if fenced {
            format!("Here is the design:\n```json\n{}\n```\n", json)
        } else {
            json
        };

        let parsed = parse_spec(&raw, stages.len()).unwrap();
        prop_assert_eq!(parsed.stages.len(), stages.len());
        let order: Vec<u32> = parsed.stages.iter().map(|s| s.id).collect();
        let expected: Vec<u32> = (1..=stages.len() as u32).collect();
        prop_assert_eq!(order, expected);
        prop_assert_eq!(parsed, spec);
    }

    #[test]
    fn wrong_stage_count_is_rejected(stages in stages(), extra in 1usize..4) {
        let spec = spec_with(&stages);
        let json = spec.to_json().unwrap();

        let err = parse_spec(&json, stages.len() + extra).unwrap_err();
        prop_assert!(
            matches!(&err, FactoryError::Validation { code, .. } if *code == ErrorCode::SPEC_STAGE_COUNT),
            "unexpected error: {}",
            err
        );
    }
}

#[test]
fn regressions_follow_stage_order() {
    let spec = spec_with(&[
        ("Dawn".into(), Difficulty::Medium, None),
        ("Noon".into(), Difficulty::Easy, None),
        ("Dusk".into(), Difficulty::Hard, None),
        ("Night".into(), Difficulty::Medium, None),
    ]);
    let parsed = parse_spec(&spec.to_json().unwrap(), 4).unwrap();
    assert_eq!(parsed.difficulty_regressions(), vec![2, 4]);
}
