//! Scaling configuration tests

use super::*;

#[test]
fn registry_round_trips_every_tag() {
    for (name, ty) in ROPE_TYPE_REGISTRY {
        assert_eq!(name.parse::<RopeType>().unwrap(), ty);
        assert_eq!(ty.as_str(), name);
    }
}

#[test]
fn unknown_tag_is_rejected() {
    let err = RopeScalingConfig::from_json_str(r#"{"rope_type": "su", "factor": 2.0}"#)
        .unwrap()
        .validate()
        .unwrap_err();
    assert!(matches!(err, RopeError::UnknownRopeType(ref tag) if tag == "su"));
}

#[test]
fn absent_tag_means_default() {
    let scaling = RopeScalingConfig::default().validate().unwrap();
    assert_eq!(scaling, RopeScaling::Default);
}

#[test]
fn legacy_type_key_is_accepted() {
    let raw = RopeScalingConfig::from_json_str(r#"{"type": "linear", "factor": 4.0}"#).unwrap();
    assert_eq!(raw.legacy_type.as_deref(), Some("linear"));
    assert_eq!(raw.validate().unwrap(), RopeScaling::Linear(LinearScaling { factors: vec![4.0] }));
}

#[test]
fn rope_type_wins_over_legacy_type() {
    let raw = RopeScalingConfig::from_json_str(
        r#"{"type": "linear", "rope_type": "dynamic", "factor": 2}"#,
    )
    .unwrap();
    assert_eq!(raw.rope_type().unwrap(), RopeType::Dynamic);
}

#[test]
fn linear_accepts_scalar_and_list_factors() {
    let list = RopeScalingConfig::from_json_str(r#"{"rope_type": "linear", "factor": [1, 2.5]}"#)
        .unwrap()
        .validate()
        .unwrap();
    assert_eq!(list, RopeScaling::Linear(LinearScaling { factors: vec![1.0, 2.5] }));

    let empty = RopeScalingConfig::new(RopeType::Linear).with_factor(Vec::new()).validate();
    assert!(matches!(empty, Err(RopeError::EmptyScalingFactors)));
}

#[test]
fn list_factor_rejected_for_single_factor_variants() {
    let err = RopeScalingConfig::new(RopeType::Dynamic)
        .with_factor(vec![2.0, 4.0])
        .validate()
        .unwrap_err();
    assert!(matches!(err, RopeError::FactorLength { name: "factor", expected: 1, got: 2 }));
}

#[test]
fn yarn_defaults_are_filled_in() {
    let scaling = RopeScalingConfig::from_json_str(
        r#"{"rope_type": "yarn", "factor": 4.0, "original_max_position_embeddings": 32768}"#,
    )
    .unwrap()
    .validate()
    .unwrap();
    let RopeScaling::Yarn(params) = scaling else { panic!("expected yarn") };
    assert_eq!(params.factor, 4.0);
    assert_eq!(params.original_max_position, 32768);
    assert_eq!(params.extrapolation_factor, 1.0);
    assert_eq!(params.attn_factor, 1.0);
    assert_eq!(params.beta_fast, DEFAULT_BETA_FAST);
    assert_eq!(params.beta_slow, DEFAULT_BETA_SLOW);
}

#[test]
fn deepseek_yarn_defaults_mscales() {
    let scaling = RopeScalingConfig::new(RopeType::DeepseekYarn)
        .with_factor(40.0)
        .with_original_max_position(4096)
        .validate()
        .unwrap();
    let RopeScaling::DeepseekYarn(params) = scaling else { panic!("expected deepseek_yarn") };
    assert_eq!(params.mscale, 1.0);
    assert_eq!(params.mscale_all_dim, DEFAULT_MSCALE_ALL_DIM);
    assert_eq!(params.yarn.factor, 40.0);
}

#[test]
fn missing_required_keys_are_named() {
    let err = RopeScalingConfig::new(RopeType::Yarn).with_factor(2.0).validate().unwrap_err();
    assert!(matches!(
        err,
        RopeError::MissingScalingKey { rope_type: "yarn", key: "original_max_position_embeddings" }
    ));

    let err = RopeScalingConfig::new(RopeType::Llama3)
        .with_factor(8.0)
        .with_original_max_position(8192)
        .validate()
        .unwrap_err();
    assert!(matches!(
        err,
        RopeError::MissingScalingKey { rope_type: "llama3", key: "low_freq_factor" }
    ));

    let err = RopeScalingConfig::new(RopeType::Dynamic).validate().unwrap_err();
    assert!(matches!(err, RopeError::MissingScalingKey { rope_type: "dynamic", key: "factor" }));

    let err = RopeScalingConfig::new(RopeType::Longrope)
        .with_original_max_position(4096)
        .validate()
        .unwrap_err();
    assert!(matches!(err, RopeError::MissingScalingKey { key: "short_factor", .. }));
}

#[test]
fn non_positive_factor_is_rejected() {
    let err = RopeScalingConfig::new(RopeType::Dynamic).with_factor(0.0).validate().unwrap_err();
    assert!(matches!(err, RopeError::NonPositive { name: "factor", .. }));

    let err = RopeScalingConfig::new(RopeType::Yarn)
        .with_factor(2.0)
        .with_original_max_position(0)
        .validate()
        .unwrap_err();
    assert!(matches!(err, RopeError::NonPositive { name: "original_max_position_embeddings", .. }));
}

#[test]
fn longrope_keeps_optional_mscales() {
    let raw = RopeScalingConfig::new(RopeType::Longrope)
        .with_original_max_position(4096)
        .with_range_factors(vec![1.0, 1.5], vec![2.0, 3.0]);
    let RopeScaling::LongRope(params) = raw.validate().unwrap() else {
        panic!("expected longrope")
    };
    assert_eq!(params.short_mscale, None);
    assert_eq!(params.long_mscale, None);

    let raw = raw.with_range_mscales(1.0, 1.2);
    let RopeScaling::LongRope(params) = raw.validate().unwrap() else {
        panic!("expected longrope")
    };
    assert_eq!(params.short_mscale, Some(1.0));
    assert_eq!(params.long_mscale, Some(1.2));
}

#[test]
fn unknown_keys_are_ignored() {
    let raw = RopeScalingConfig::from_json_str(
        r#"{"rope_type": "dynamic", "factor": 2.0, "finetuned": true}"#,
    )
    .unwrap();
    assert_eq!(raw.validate().unwrap(), RopeScaling::Dynamic(DynamicNtkScaling { factor: 2.0 }));
}

#[test]
fn serialization_skips_absent_keys() {
    let raw = RopeScalingConfig::new(RopeType::Linear).with_factor(2.0);
    insta::assert_snapshot!(
        serde_json::to_string(&raw).unwrap(),
        @r#"{"rope_type":"linear","factor":2.0}"#
    );
}

#[test]
fn canonical_words_distinguish_list_values() {
    let a = RopeScalingConfig::new(RopeType::Longrope)
        .with_original_max_position(16)
        .with_range_factors(vec![1.0, 2.0], vec![3.0, 4.0])
        .validate()
        .unwrap();
    let b = RopeScalingConfig::new(RopeType::Longrope)
        .with_original_max_position(16)
        .with_range_factors(vec![1.0, 2.0], vec![3.0, 4.0])
        .validate()
        .unwrap();
    let c = RopeScalingConfig::new(RopeType::Longrope)
        .with_original_max_position(16)
        .with_range_factors(vec![1.0, 2.0, 3.0], vec![4.0])
        .validate()
        .unwrap();
    assert_eq!(a.canonical_words(), b.canonical_words());
    assert_ne!(a.canonical_words(), c.canonical_words());
}

#[test]
fn canonical_words_tag_the_variant() {
    let linear = RopeScaling::Linear(LinearScaling { factors: vec![2.0] });
    let dynamic = RopeScaling::Dynamic(DynamicNtkScaling { factor: 2.0 });
    assert_ne!(linear.canonical_words(), dynamic.canonical_words());
    assert_eq!(RopeScaling::Default.canonical_words(), vec![RopeType::Default as u64]);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Positive finite factors validate and distinct factors never share a key.
        #[test]
        fn positive_factors_validate_with_distinct_keys(
            a in 1e-3f64..1e3,
            b in 1e-3f64..1e3,
        ) {
            let scaling =
                |f: f64| RopeScalingConfig::new(RopeType::Dynamic).with_factor(f).validate();
            let (sa, sb) = (scaling(a).unwrap(), scaling(b).unwrap());
            prop_assert_eq!(sa.canonical_words() == sb.canonical_words(), a == b);
        }

        /// Non-positive factors are rejected for linear and dynamic scaling.
        #[test]
        fn non_positive_factors_are_rejected(factor in -1e3f64..=0.0) {
            for ty in [RopeType::Linear, RopeType::Dynamic] {
                let result = RopeScalingConfig::new(ty).with_factor(factor).validate();
                prop_assert!(
                    matches!(result, Err(RopeError::NonPositive { .. })),
                    "{ty} factor {factor} accepted"
                );
            }
        }
    }
}
