use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use nestgen_core::{
    DType, Field, Form, IndexWidth, ListLayout, OptionLayout, Scalars, Type, TypeKind, Value,
    check_consistency, validity_error,
};
use nestgen_generate::{
    DrawSource, GenerateOptions, GenerationEngine, GenerationError, Knob, Opts, Output, Param,
    Request, Triple, generate,
};

fn run(options: GenerateOptions, request: &Request, seed: u64) -> Output {
    let opts = Opts::new(options);
    let mut source = DrawSource::new(seed);
    generate(&opts, request, &mut source).expect("generation succeeds")
}

fn triple(output: Output) -> Triple {
    Triple {
        ty: output.ty.expect("type selected"),
        form: output.form.expect("form selected"),
        value: output.value.expect("value selected"),
    }
}

#[test]
fn generation_terminates_for_every_seed() {
    let options = GenerateOptions {
        max_depth: 8,
        max_nodes: 64,
        ..GenerateOptions::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    for _ in 0..300 {
        let seed: u64 = rng.random();
        let output = run(options.clone(), &Request::default(), seed);
        assert!(output.value.is_some(), "seed {seed}");
    }
}

#[test]
fn generated_triples_are_consistent() {
    for seed in 0..300 {
        let triple = triple(run(GenerateOptions::default(), &Request::default(), seed));
        assert_eq!(triple.form.project(), triple.ty, "seed {seed}");
        assert_eq!(
            check_consistency(None, Some(&triple.form), Some(&triple.value)),
            Ok(()),
            "seed {seed}"
        );
        assert!(validity_error(&triple.value).is_none(), "seed {seed}");
        assert!(triple.value.len() <= GenerateOptions::default().max_size);
    }
}

#[test]
fn same_seed_same_triple() {
    let a = run(GenerateOptions::default(), &Request::default(), 77);
    let b = run(GenerateOptions::default(), &Request::default(), 77);
    assert_eq!(a, b);
}

#[test]
fn supplied_type_is_reproduced_exactly() {
    let ty = Type::record([
        (
            "a",
            Type::list(Type::option(Type::leaf(DType::Int32)).expect("option type")),
        ),
        ("b", Type::string()),
        ("c", Type::regular(Type::leaf(DType::Float64), 2)),
        (
            "d",
            Type::union([Type::leaf(DType::Int64), Type::bytestring()]).expect("union type"),
        ),
    ])
    .expect("record type");
    for seed in 0..100 {
        let triple = triple(run(
            GenerateOptions::default(),
            &Request::of_type(ty.clone()),
            seed,
        ));
        assert_eq!(triple.ty, ty);
        assert_eq!(triple.form.project(), ty);
        assert_eq!(check_consistency(Some(&ty), None, Some(&triple.value)), Ok(()));
    }
}

#[test]
fn supplied_form_is_reproduced_exactly() {
    let form = Form::list(
        ListLayout::StartsStops {
            width: IndexWidth::U32,
        },
        Form::option(
            OptionLayout::BitMasked {
                valid_when: true,
                lsb_order: false,
            },
            Form::numpy(DType::UInt8),
        )
        .expect("option form"),
    );
    for seed in 0..100 {
        let triple = triple(run(
            GenerateOptions::default(),
            &Request::of_form(form.clone()),
            seed,
        ));
        assert_eq!(triple.form, form);
        assert_eq!(triple.ty, form.project());
    }
}

#[test]
fn disallowed_nulls_never_materialize() {
    let options = GenerateOptions {
        allow_null: Param::Value(false),
        ..GenerateOptions::default()
    };
    for seed in 0..200 {
        let triple = triple(run(options.clone(), &Request::default(), seed));
        assert!(!triple.ty.contains_kind(TypeKind::Option), "seed {seed}");
        assert!(!triple.value.has_nulls());
    }
}

#[test]
fn single_dtype_set_is_honored() {
    let options = GenerateOptions {
        dtypes: Knob::Fixed(DType::Int16),
        ..GenerateOptions::default()
    };
    for seed in 0..200 {
        let triple = triple(run(options.clone(), &Request::default(), seed));
        assert!(triple.ty.dtypes().iter().all(|dtype| *dtype == DType::Int16));
        assert!(
            triple
                .value
                .leaves()
                .iter()
                .all(|(dtype, _)| **dtype == DType::Int16)
        );
    }
}

#[test]
fn every_variant_is_reachable() {
    let mut seen = BTreeSet::new();
    for seed in 0..2000 {
        let output = run(GenerateOptions::default(), &Request::default(), seed);
        let ty = output.ty.expect("type selected");
        for kind in TypeKind::ALL {
            if ty.contains_kind(kind) {
                seen.insert(kind);
            }
        }
        if seen.len() == TypeKind::ALL.len() {
            break;
        }
    }
    assert_eq!(seen.len(), TypeKind::ALL.len(), "reached only {seen:?}");
}

#[test]
fn empty_list_is_reachable() {
    let found = (0..2000).any(|seed| {
        let value = run(GenerateOptions::default(), &Request::default(), seed)
            .value
            .expect("value selected");
        value.kind() == TypeKind::List && value.len() == 0
    });
    assert!(found);
}

#[test]
fn both_list_layouts_are_reachable() {
    let ty = Type::list(Type::leaf(DType::Int32));
    let (mut offsets, mut starts_stops) = (false, false);
    for seed in 0..200 {
        let triple = triple(run(
            GenerateOptions::default(),
            &Request::of_type(ty.clone()),
            seed,
        ));
        let Form::List { layout, .. } = &triple.form else {
            panic!("expected a list form");
        };
        match layout {
            ListLayout::Offsets { .. } => offsets = true,
            ListLayout::StartsStops { .. } => starts_stops = true,
        }
        if offsets && starts_stops {
            break;
        }
    }
    assert!(offsets && starts_stops);
}

#[test]
fn list_of_int32_respects_max_size() {
    let ty = Type::list(Type::leaf(DType::Int32));
    let options = GenerateOptions {
        max_size: 3,
        ..GenerateOptions::default()
    };
    for seed in 0..100 {
        let triple = triple(run(options.clone(), &Request::of_type(ty.clone()), seed));
        assert!(triple.value.len() <= 3);
        assert_eq!(triple.form.project(), ty);
        let Value::List { content, .. } = &triple.value else {
            panic!("expected a list");
        };
        let Value::Numpy { dtype, data } = content.as_ref() else {
            panic!("expected a numeric leaf");
        };
        assert_eq!(*dtype, DType::Int32);
        let Scalars::Int(data) = data else {
            panic!("expected integer storage");
        };
        assert!(data.len() <= 3);
        assert!(
            data.iter()
                .all(|x| (i64::from(i32::MIN)..=i64::from(i32::MAX)).contains(x))
        );
    }
}

#[test]
fn option_type_without_nulls_is_all_valid() {
    let ty = Type::option(Type::leaf(DType::Float64)).expect("option type");
    let options = GenerateOptions {
        allow_null: Param::Value(false),
        ..GenerateOptions::default()
    };
    for seed in 0..100 {
        let triple = triple(run(options.clone(), &Request::of_type(ty.clone()), seed));
        assert_eq!(triple.ty, ty);
        assert_eq!(triple.value.null_count(), 0);
    }
}

#[test]
fn duplicate_field_names_fail_before_recursion() {
    let ty = Type::Record {
        fields: vec![
            Field {
                name: "x".to_string(),
                ty: Type::leaf(DType::Int8),
            },
            Field {
                name: "x".to_string(),
                ty: Type::string(),
            },
        ],
    };
    let opts = Opts::default();
    let mut source = DrawSource::new(1);
    let result = generate(&opts, &Request::of_type(ty), &mut source);
    assert!(matches!(result, Err(GenerationError::Config(_))));
    assert_eq!(source.draws(), 0);
}

#[test]
fn incompatible_type_and_form_is_a_config_error() {
    let request = Request {
        ty: Some(Type::list(Type::leaf(DType::Int32))),
        form: Some(Form::list(
            ListLayout::Offsets {
                width: IndexWidth::I64,
            },
            Form::numpy(DType::Int64),
        )),
        ..Request::default()
    };
    let opts = Opts::default();
    let mut source = DrawSource::new(1);
    let result = generate(&opts, &request, &mut source);
    assert!(matches!(result, Err(GenerationError::Config(_))));
}

#[test]
fn nesting_beyond_the_ceiling_is_a_config_error() {
    let mut ty = Type::leaf(DType::Bool);
    for _ in 0..=nestgen_core::DEPTH_CEILING {
        ty = Type::list(ty);
    }
    let opts = Opts::default();
    let mut source = DrawSource::new(1);
    let result = generate(&opts, &Request::of_type(ty), &mut source);
    assert!(matches!(result, Err(GenerationError::Config(_))));

    let options = GenerateOptions {
        max_depth: nestgen_core::DEPTH_CEILING + 1,
        ..GenerateOptions::default()
    };
    let result = generate(&Opts::new(options), &Request::default(), &mut source);
    assert!(matches!(result, Err(GenerationError::Config(_))));
}

#[test]
fn oversized_field_count_fails_before_drawing() {
    let options = GenerateOptions {
        max_fields: 1_000_000,
        max_depth: 1,
        max_size: 1,
        allow_null: Param::Value(false),
        allow_string: false,
        allow_bytestring: false,
        allow_list: false,
        allow_regular: false,
        allow_union: false,
        ..GenerateOptions::default()
    };
    let opts = Opts::new(options);
    let mut source = DrawSource::new(1);
    let result = generate(&opts, &Request::default(), &mut source);
    assert!(matches!(result, Err(GenerationError::Config(_))));
    assert_eq!(source.draws(), 0);
}

#[test]
fn dtype_outside_bounds_is_a_config_error() {
    let options = GenerateOptions {
        min_value: Param::Value(1_000.0),
        ..GenerateOptions::default()
    };
    let opts = Opts::new(options);
    let mut source = DrawSource::new(1);
    let request = Request::of_type(Type::leaf(DType::Int8));
    let result = generate(&opts, &request, &mut source);
    assert!(matches!(result, Err(GenerationError::Config(_))));
}

#[test]
fn engine_runs_are_reproducible() {
    let engine = GenerationEngine::new(Opts::default());
    let a = engine.run(&Request::default(), 9, 5).expect("run a");
    let b = engine.run(&Request::default(), 9, 5).expect("run b");
    assert_eq!(a.len(), 5);
    assert_eq!(a, b);
}
