use nestgen_config::GenerationConfig;
use nestgen_core::{
    DEPTH_CEILING, DType, Form, ListLayout, StringEncoding, Type, Value, Violation,
    check_consistency, type_diff,
};
use tracing::{debug, error, info, trace};

use crate::budget::{Budget, CountdownDrawer, CountdownLimits};
use crate::contents::numpy::{Bounds, admissible_dtypes, choose_dtype};
use crate::contents::option::draw_option_layout;
use crate::contents::record::draw_field_count;
use crate::contents::string::draw_list_layout;
use crate::contents::union::{draw_union_index, draw_variant_count};
use crate::contents::{
    FreeRoot, numpy_value, string_value, wrap_list, wrap_option, wrap_record, wrap_regular,
    wrap_union,
};
use crate::errors::{GenerationError, Result};
use crate::model::{Output, Request, Selection, Triple};
use crate::options::{GenerateOptions, Knob, Opts};
use crate::source::DrawSource;
use crate::strategy::DrawContext;

/// Shape constraint at one recursion step.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Shape<'s> {
    Free(FreeRoot),
    Type(&'s Type),
    Form(&'s Form),
}

#[derive(Debug, Clone, Copy)]
enum Terminal {
    Numpy(DType),
    String(StringEncoding, ListLayout),
}

#[derive(Debug, Clone, Copy)]
enum Choice {
    Numpy,
    String,
    Bytestring,
    List,
    Regular,
    Option,
    Record,
    Union,
}

/// One recursive build. Owns the composite-node counter and the leaf
/// element budget shared by every leaf of the tree.
pub(crate) struct Builder<'o> {
    options: &'o GenerateOptions,
    nodes: usize,
    composites: usize,
    leaves: CountdownDrawer,
}

impl<'o> Builder<'o> {
    pub(crate) fn new(cx: &mut DrawContext<'_>, options: &'o GenerateOptions) -> Self {
        let leaves = CountdownDrawer::new(
            cx,
            CountdownLimits {
                min_size_each: options.min_size,
                max_size_each: Some(options.max_size),
                min_size_total: 0,
                max_size_total: options.max_size,
                max_draws: usize::MAX,
            },
        );
        Self {
            options,
            nodes: options.max_nodes,
            composites: 0,
            leaves,
        }
    }

    /// Composite nodes built so far.
    pub(crate) fn composites(&self) -> usize {
        self.composites
    }

    pub(crate) fn build(
        &mut self,
        cx: &mut DrawContext<'_>,
        shape: Shape<'_>,
        depth: usize,
    ) -> Result<Value> {
        let value = match shape {
            Shape::Form(form) => self.build_form(cx, form, depth)?,
            Shape::Type(ty) => self.build_type(cx, ty, depth)?,
            Shape::Free(root) => self.build_free(cx, root, depth)?,
        };
        let checked = match shape {
            Shape::Form(form) => check_consistency(None, Some(form), Some(&value)),
            Shape::Type(ty) => check_consistency(Some(ty), None, Some(&value)),
            Shape::Free(_) => check_consistency(None, None, Some(&value)),
        };
        checked.map_err(internal)?;
        trace!(kind = %value.kind(), length = value.len(), depth, "node assembled");
        Ok(value)
    }

    fn enter(&mut self) {
        self.nodes = self.nodes.saturating_sub(1);
        self.composites += 1;
    }

    fn leaf(&mut self, cx: &mut DrawContext<'_>, terminal: Terminal) -> Result<Value> {
        let options = self.options;
        let drawn = self.leaves.draw_next(cx, |cx, min, max| {
            let length = cx.source().size(min, max);
            terminal_value(cx, options, terminal, length)
        })?;
        match drawn {
            Some(value) => Ok(value),
            None => terminal_value(cx, options, terminal, options.min_size),
        }
    }

    fn build_form(&mut self, cx: &mut DrawContext<'_>, form: &Form, depth: usize) -> Result<Value> {
        let options = self.options;
        let below = depth.saturating_sub(1);
        match form {
            Form::Numpy { dtype } => self.leaf(cx, Terminal::Numpy(*dtype)),
            Form::String { encoding, layout } => {
                self.leaf(cx, Terminal::String(*encoding, *layout))
            }
            Form::List { layout, content } => {
                self.enter();
                let content = self.build(cx, Shape::Form(content), below)?;
                wrap_list(cx, options, *layout, content)
            }
            Form::Regular { size, content } => {
                self.enter();
                let content = self.build(cx, Shape::Form(content), below)?;
                wrap_regular(cx, options, Some(*size), content)
            }
            Form::Option { layout, content } => {
                self.enter();
                let content = self.build(cx, Shape::Form(content), below)?;
                wrap_option(cx, options, *layout, content)
            }
            Form::Record { fields } => {
                self.enter();
                let names = fields.iter().map(|field| field.name.clone()).collect();
                let values = fields
                    .iter()
                    .map(|field| self.build(cx, Shape::Form(&field.form), below))
                    .collect::<Result<Vec<_>>>()?;
                wrap_record(cx, Some(names), values)
            }
            Form::Union { index, variants } => {
                self.enter();
                let values = variants
                    .iter()
                    .map(|variant| self.build(cx, Shape::Form(variant), below))
                    .collect::<Result<Vec<_>>>()?;
                wrap_union(cx, options, *index, values)
            }
        }
    }

    fn build_type(&mut self, cx: &mut DrawContext<'_>, ty: &Type, depth: usize) -> Result<Value> {
        let options = self.options;
        let below = depth.saturating_sub(1);
        match ty {
            Type::Leaf { dtype } => self.leaf(cx, Terminal::Numpy(*dtype)),
            Type::String { encoding } => {
                let layout = draw_list_layout(cx);
                self.leaf(cx, Terminal::String(*encoding, layout))
            }
            Type::List { content } => {
                self.enter();
                let content = self.build(cx, Shape::Type(content), below)?;
                let layout = draw_list_layout(cx);
                wrap_list(cx, options, layout, content)
            }
            Type::Regular { content, size } => {
                self.enter();
                let content = self.build(cx, Shape::Type(content), below)?;
                wrap_regular(cx, options, Some(*size), content)
            }
            Type::Option { content } => {
                self.enter();
                let content = self.build(cx, Shape::Type(content), below)?;
                let layout = draw_option_layout(cx);
                wrap_option(cx, options, layout, content)
            }
            Type::Record { fields } => {
                self.enter();
                let names = fields.iter().map(|field| field.name.clone()).collect();
                let values = fields
                    .iter()
                    .map(|field| self.build(cx, Shape::Type(&field.ty), below))
                    .collect::<Result<Vec<_>>>()?;
                wrap_record(cx, Some(names), values)
            }
            Type::Union { variants } => {
                self.enter();
                let values = variants
                    .iter()
                    .map(|variant| self.build(cx, Shape::Type(variant), below))
                    .collect::<Result<Vec<_>>>()?;
                let index = draw_union_index(cx);
                wrap_union(cx, options, index, values)
            }
        }
    }

    fn build_free(&mut self, cx: &mut DrawContext<'_>, root: FreeRoot, depth: usize) -> Result<Value> {
        let options = self.options;
        let composite = Budget::new(depth, self.nodes).composite_weight();
        let admit = |allowed: bool, weight: u32| if allowed { weight } else { 0 };
        let choices = [
            (Choice::Numpy, admit(options.allow_numpy, 4)),
            (Choice::String, admit(options.allow_string, 1)),
            (Choice::Bytestring, admit(options.allow_bytestring, 1)),
            (Choice::List, admit(options.allow_list, composite)),
            (Choice::Regular, admit(options.allow_regular, composite)),
            (
                Choice::Option,
                admit(options.may_be_null() && !root.no_option, composite),
            ),
            (Choice::Record, admit(options.allow_record, composite)),
            (
                Choice::Union,
                admit(options.allow_union && !root.no_union, composite),
            ),
        ];
        let weights: Vec<u32> = choices.iter().map(|(_, weight)| *weight).collect();
        let Some(pick) = cx.source().weighted(&weights) else {
            return Err(GenerationError::Config(
                "no node variant is allowed".to_string(),
            ));
        };
        let below = depth.saturating_sub(1);
        let anything = Shape::Free(FreeRoot::default());
        match choices[pick].0 {
            Choice::Numpy => {
                let dtype = choose_dtype(cx, options)?;
                self.leaf(cx, Terminal::Numpy(dtype))
            }
            Choice::String => {
                let layout = draw_list_layout(cx);
                self.leaf(cx, Terminal::String(StringEncoding::Utf8, layout))
            }
            Choice::Bytestring => {
                let layout = draw_list_layout(cx);
                self.leaf(cx, Terminal::String(StringEncoding::Bytes, layout))
            }
            Choice::List => {
                self.enter();
                let content = self.build(cx, anything, below)?;
                let layout = draw_list_layout(cx);
                wrap_list(cx, options, layout, content)
            }
            Choice::Regular => {
                self.enter();
                let content = self.build(cx, anything, below)?;
                wrap_regular(cx, options, None, content)
            }
            Choice::Option => {
                self.enter();
                let content = self.build(cx, Shape::Free(FreeRoot::under_option()), below)?;
                let layout = draw_option_layout(cx);
                wrap_option(cx, options, layout, content)
            }
            Choice::Record => {
                self.enter();
                let count = draw_field_count(cx, options);
                let values = (0..count)
                    .map(|_| self.build(cx, anything, below))
                    .collect::<Result<Vec<_>>>()?;
                wrap_record(cx, None, values)
            }
            Choice::Union => {
                self.enter();
                let count = draw_variant_count(cx, options);
                let values = (0..count)
                    .map(|_| self.build(cx, Shape::Free(FreeRoot::under_union()), below))
                    .collect::<Result<Vec<_>>>()?;
                let index = draw_union_index(cx);
                wrap_union(cx, options, index, values)
            }
        }
    }
}

fn terminal_value(
    cx: &mut DrawContext<'_>,
    options: &GenerateOptions,
    terminal: Terminal,
    length: usize,
) -> Result<Value> {
    match terminal {
        Terminal::Numpy(dtype) => numpy_value(cx, options, dtype, length),
        Terminal::String(encoding, layout) => string_value(cx, options, encoding, layout, length),
    }
}

/// An engine-built node failed validation.
pub(crate) fn internal(violation: Violation) -> GenerationError {
    error!(
        code = violation.code,
        path = %violation.path,
        message = %violation.message,
        "generated node failed validation"
    );
    GenerationError::Internal(violation)
}

fn config_error(message: impl Into<String>) -> GenerationError {
    GenerationError::Config(message.into())
}

/// Reject unusable constraints before any recursion.
pub fn check_request(options: &GenerateOptions, request: &Request) -> Result<()> {
    if let Some(ty) = &request.ty {
        ty.validate()
            .map_err(|err| config_error(format!("type constraint: {err}")))?;
        check_depth(ty.depth(), "type")?;
    }
    if let Some(form) = &request.form {
        form.validate()
            .map_err(|err| config_error(format!("form constraint: {err}")))?;
        check_depth(form.project().depth(), "form")?;
    }
    if let (Some(ty), Some(form)) = (&request.ty, &request.form)
        && let Some((path, message)) = type_diff(&form.project(), ty, "$")
    {
        return Err(config_error(format!(
            "form does not project onto the type at {path}: {message}"
        )));
    }

    let bounds = Bounds::fixed(options);
    let constrained = match (&request.form, &request.ty) {
        (Some(form), _) => Some(form.project()),
        (None, Some(ty)) => Some(ty.clone()),
        (None, None) => None,
    };
    match constrained {
        Some(ty) => {
            for dtype in ty.dtypes() {
                if !options.admits_dtype(dtype) {
                    return Err(config_error(format!(
                        "constraint uses {dtype}, which the dtype set excludes"
                    )));
                }
                if !bounds.admit(dtype) {
                    return Err(config_error(format!(
                        "min_value/max_value exclude every {dtype} value"
                    )));
                }
            }
        }
        None if options.allow_numpy => {
            let pool = match &options.dtypes {
                Knob::Auto => DType::all(),
                Knob::Fixed(dtype) => vec![*dtype],
                Knob::OneOf(dtypes) => dtypes.clone(),
                Knob::Drawn(_) => return Ok(()),
            };
            if admissible_dtypes(options, pool).is_empty() {
                return Err(config_error(
                    "no dtype in the dtype set fits min_value/max_value",
                ));
            }
        }
        None => {}
    }
    Ok(())
}

fn check_depth(depth: usize, what: &str) -> Result<()> {
    if depth > DEPTH_CEILING {
        return Err(config_error(format!(
            "{what} nests {depth} composite layers, the ceiling is {DEPTH_CEILING}"
        )));
    }
    Ok(())
}

/// Generate one triple under `opts`.
///
/// Options and constraints are checked before any drawing. A supplied form
/// fixes the layout, a supplied type fixes the structure; otherwise every
/// node is chosen freely within the scope's budgets.
pub fn generate(opts: &Opts, request: &Request, source: &mut DrawSource) -> Result<Output> {
    let options = opts.options();
    options.validate()?;
    options.check_handles(opts.recorder())?;
    check_request(options, request)?;

    let seed = source.seed();
    let mut cx = opts.context(source);
    info!(
        seed,
        max_depth = options.max_depth,
        max_nodes = options.max_nodes,
        constrained = request.ty.is_some() || request.form.is_some(),
        "generation started"
    );

    let mut builder = Builder::new(&mut cx, options);
    let shape = match (&request.form, &request.ty) {
        (Some(form), _) => Shape::Form(form),
        (None, Some(ty)) => Shape::Type(ty),
        (None, None) => Shape::Free(FreeRoot::default()),
    };
    let value = builder.build(&mut cx, shape, options.max_depth)?;
    let composites = builder.composites();

    let form = request.form.clone().unwrap_or_else(|| value.form());
    let triple = Triple {
        ty: request.ty.clone().unwrap_or_else(|| form.project()),
        form,
        value,
    };
    triple.verify().map_err(internal)?;

    let record = opts.record();
    info!(
        seed,
        composites,
        length = triple.value.len(),
        draws = cx.source().draws(),
        recorded = record.total_draws(),
        "generation finished"
    );
    Ok(Output::select(triple, request.select, record))
}

/// Runs whole configs: one session per requested triple.
#[derive(Debug, Clone)]
pub struct GenerationEngine {
    opts: Opts,
}

impl GenerationEngine {
    pub fn new(opts: Opts) -> Self {
        Self { opts }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(Opts::new(GenerateOptions::from_config(&config.options)))
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    /// Generate `count` triples. Session `i` draws from a source derived
    /// from `seed` and `i`, and starts from an empty draw log.
    pub fn run(&self, request: &Request, seed: u64, count: usize) -> Result<Vec<Output>> {
        let mut outputs = Vec::with_capacity(count);
        for i in 0..count {
            self.opts.reset();
            let mut source = DrawSource::derived(seed, &format!("triple-{i}"));
            match generate(&self.opts, request, &mut source) {
                Ok(output) => outputs.push(output),
                Err(err) => {
                    debug!(session = i, error = %err, "session failed");
                    return Err(err);
                }
            }
        }
        Ok(outputs)
    }

    /// Request described by a config: its constraints and emitted parts.
    pub fn request_for(config: &GenerationConfig) -> Request {
        let emits = |component| config.emit.contains(&component);
        Request {
            ty: config.ty.clone(),
            form: config.form.clone(),
            select: Selection {
                ty: emits(nestgen_config::Component::Type),
                form: emits(nestgen_config::Component::Form),
                value: emits(nestgen_config::Component::Value),
            },
        }
    }
}
