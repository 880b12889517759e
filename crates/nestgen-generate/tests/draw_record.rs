use std::rc::Rc;

use nestgen_core::{DType, Scalars, Value};
use nestgen_generate::{
    DrawSource, GenerateOptions, GenerationError, Knob, Opts, OptionsPatch, Param, Request,
    Strategy, Triple, from_fn, generate, integers, list_contents, sampled_from,
};
use serde_json::json;

fn even_leaf() -> impl Strategy<Value = Triple> {
    from_fn(|cx| {
        let length = cx.source().size(0, 4);
        let data = (0..length)
            .map(|_| cx.source().integer(-50, 50) * 2)
            .collect();
        Ok(Triple::from_value(Value::Numpy {
            dtype: DType::Int64,
            data: Scalars::Int(data),
        }))
    })
}

fn even_ints(triple: &Triple) -> bool {
    triple.value.leaves().iter().all(|(_, data)| match data {
        Scalars::Int(values) => values.iter().all(|x| x % 2 == 0),
        _ => false,
    })
}

#[test]
fn list_content_handle_records_even_leaves() {
    let opts = Opts::default();
    let handle = opts.register(even_leaf());
    let strategy = list_contents(&opts, Param::Drawn(handle));
    let mut source = DrawSource::new(5);
    let mut cx = opts.context(&mut source);
    let list = cx.draw(&strategy).expect("list drawn");

    let drawn = opts.drawn(&handle).expect("registered handle");
    assert_eq!(drawn.len(), 1);
    assert!(even_ints(&drawn[0]));
    let Value::List { content, .. } = &list.value else {
        panic!("expected a list");
    };
    assert_eq!(content.as_ref(), &drawn[0].value);

    let record = opts.record();
    assert_eq!(record.draws(&handle).len(), 1);
    assert_eq!(record.total_draws(), 1);
}

#[test]
fn recorded_draws_come_from_the_strategy() {
    let opts = Opts::default();
    let allowed = [DType::Int8, DType::Float32];
    let dtypes = opts.register(sampled_from(allowed));
    let scoped = opts.extend(OptionsPatch {
        dtypes: Some(Knob::Drawn(dtypes)),
        allow_string: Some(false),
        allow_bytestring: Some(false),
        ..OptionsPatch::default()
    });
    for seed in 0..50 {
        scoped.reset();
        let mut source = DrawSource::new(seed);
        let output = generate(&scoped, &Request::default(), &mut source).expect("generated");
        let drawn = opts.drawn(&dtypes).expect("registered handle");
        assert!(drawn.iter().all(|dtype| allowed.contains(dtype)));
        let leaves = output.value.expect("value selected");
        for (dtype, _) in leaves.leaves() {
            assert!(drawn.contains(dtype));
        }
        assert_eq!(output.record.draws(&dtypes).len(), drawn.len());
    }
}

#[test]
fn reset_empties_the_log() {
    let opts = Opts::default();
    let handle = opts.register(integers(0, 9));
    let scoped = opts.extend(OptionsPatch::default());
    let mut source = DrawSource::new(3);
    {
        let mut cx = scoped.context(&mut source);
        for _ in 0..4 {
            cx.resolve(&handle).expect("resolved");
        }
    }
    assert_eq!(opts.drawn(&handle).expect("registered").len(), 4);
    scoped.reset();
    assert!(opts.record().is_empty());
    scoped.reset();
    assert!(opts.record().is_empty());
}

#[test]
fn extended_scopes_share_the_log() {
    let parent = Opts::default();
    let handle = parent.register(integers(1, 3));
    let child = parent.extend(OptionsPatch {
        max_size: Some(2),
        ..OptionsPatch::default()
    });
    assert_eq!(child.options().max_size, 2);
    assert_eq!(parent.options().max_size, GenerateOptions::default().max_size);

    let mut source = DrawSource::new(11);
    let value = child.context(&mut source).resolve(&handle).expect("resolved");
    assert_eq!(parent.drawn(&handle).expect("registered"), vec![value]);
}

#[test]
fn shared_registration_logs_each_draw_once() {
    let opts = Opts::default();
    let strategy = Rc::new(integers(0, 100));
    let first = opts.register_shared(&strategy);
    let second = opts.register_shared(&strategy);
    assert_eq!(first, second);

    let mut source = DrawSource::new(2);
    opts.context(&mut source).resolve(&first).expect("resolved");
    assert_eq!(opts.record().total_draws(), 1);
}

#[test]
fn foreign_handles_are_rejected() {
    let owner = Opts::default();
    let handle = owner.register(integers(0, 1));
    let stranger = Opts::default();
    let mut source = DrawSource::new(0);
    let result = stranger.context(&mut source).resolve(&handle);
    assert!(matches!(result, Err(GenerationError::UnregisteredHandle(_))));

    let flag = owner.register(from_fn(|_| Ok(false)));
    let options = GenerateOptions {
        allow_null: Param::Drawn(flag),
        ..GenerateOptions::default()
    };
    let result = generate(&Opts::new(options), &Request::default(), &mut source);
    assert!(matches!(result, Err(GenerationError::UnregisteredHandle(_))));
}

#[test]
fn factory_log_concatenates_calls() {
    let opts = Opts::default();
    let factory = opts.register_factory(|base: i64| integers(base, base));
    let low = factory.call(1);
    let high = factory.call(7);
    let mut source = DrawSource::new(4);
    {
        let mut cx = opts.context(&mut source);
        cx.resolve(&low).expect("low");
        cx.resolve(&high).expect("high");
        cx.resolve(&low).expect("low again");
    }
    assert_eq!(factory.calls(), 2);
    assert_eq!(factory.drawn(), vec![1, 1, 7]);
    opts.reset();
    assert_eq!(factory.calls(), 0);
    assert!(factory.drawn().is_empty());
}

#[test]
fn patch_rejects_unknown_keys() {
    let patch = OptionsPatch::from_json(&json!({ "max_size": 4, "allow_null": false }))
        .expect("known keys");
    assert_eq!(patch.max_size, Some(4));
    assert_eq!(patch.allow_null, Some(Param::Value(false)));

    let result = OptionsPatch::from_json(&json!({ "max_sise": 4 }));
    assert!(matches!(result, Err(GenerationError::Config(_))));
}
