use std::cell::RefCell;
use std::rc::Rc;

use vellum_core::{
    BinOp, Closure, EvalBreak, EvalResult, ExecutionContext, FnDef, Interner, MapData, Node,
    NodeKind, ScriptError, Scope, SourceLoc, Sym, Value,
};

/// Collaborator that resolves and parses scripts for the `source` statement.
/// The engine implements this; a bare evaluator has no loader and rejects
/// `source`.
pub trait ScriptLoader {
    fn load_script(&self, name: &str, loc: SourceLoc) -> Result<Rc<Node>, ScriptError>;
}

/// Symbols the evaluator compares against on hot paths, interned once at
/// construction so dispatch is integer comparison.
pub(crate) struct Syms {
    pub get: Sym,
    pub set: Sym,
    pub has: Sym,
    pub remove: Sym,
    pub keys: Sym,
    pub values: Sym,
    pub length: Sym,
    pub push: Sym,
    pub pop: Sym,
    pub set_method: Sym,
    pub slice: Sym,
    pub contains: Sym,
    pub sort: Sym,
    pub sort_by: Sym,
    pub map: Sym,
    pub filter: Sym,
    pub foreach: Sym,
    pub insert: Sym,
    pub delete: Sym,
    pub replace: Sym,
    pub split: Sym,
    pub substr: Sym,
    pub find: Sym,
    pub upper: Sym,
    pub lower: Sym,
    pub trim: Sym,
    pub starts_with: Sym,
    pub ends_with: Sym,
    pub char_at: Sym,
    pub self_: Sym,
    pub underscore: Sym,
}

impl Syms {
    fn init(interner: &mut Interner) -> Self {
        Syms {
            get: interner.intern(b"get"),
            set: interner.intern(b"set"),
            has: interner.intern(b"has"),
            remove: interner.intern(b"remove"),
            keys: interner.intern(b"keys"),
            values: interner.intern(b"values"),
            length: interner.intern(b"length"),
            push: interner.intern(b"push"),
            pop: interner.intern(b"pop"),
            set_method: interner.intern(b"setMethod"),
            slice: interner.intern(b"slice"),
            contains: interner.intern(b"contains"),
            sort: interner.intern(b"sort"),
            sort_by: interner.intern(b"sort_by"),
            map: interner.intern(b"map"),
            filter: interner.intern(b"filter"),
            foreach: interner.intern(b"foreach"),
            insert: interner.intern(b"insert"),
            delete: interner.intern(b"delete"),
            replace: interner.intern(b"replace"),
            split: interner.intern(b"split"),
            substr: interner.intern(b"substr"),
            find: interner.intern(b"find"),
            upper: interner.intern(b"upper"),
            lower: interner.intern(b"lower"),
            trim: interner.intern(b"trim"),
            starts_with: interner.intern(b"starts_with"),
            ends_with: interner.intern(b"ends_with"),
            char_at: interner.intern(b"char_at"),
            self_: interner.intern(b"self"),
            underscore: interner.intern(b"_"),
        }
    }
}

/// The AST-walking interpreter. One recursion over a shared AST; non-local
/// control for `return` travels on the `EvalBreak::Return` channel and is
/// unwrapped at call boundaries.
pub struct Evaluator<'e> {
    pub(crate) interner: Rc<RefCell<Interner>>,
    loader: Option<&'e dyn ScriptLoader>,
    pub(crate) syms: Syms,
}

impl<'e> Evaluator<'e> {
    pub fn new(interner: Rc<RefCell<Interner>>, loader: Option<&'e dyn ScriptLoader>) -> Self {
        let syms = Syms::init(&mut interner.borrow_mut());
        Evaluator {
            interner,
            loader,
            syms,
        }
    }

    pub(crate) fn err(&self, message: impl Into<String>, loc: SourceLoc) -> EvalBreak {
        EvalBreak::Error(ScriptError::runtime(message, loc))
    }

    pub(crate) fn resolve(&self, sym: Sym) -> String {
        match self.interner.borrow().try_resolve(sym) {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => "<unknown>".to_string(),
        }
    }

    /// A closure whose first parameter is `self` becomes a method when
    /// stored on a map.
    pub(crate) fn is_auto_method(&self, value: &Value) -> bool {
        match value {
            Value::Closure(c) => c.params.first() == Some(&self.syms.self_),
            _ => false,
        }
    }

    // -- Main dispatch --

    pub fn eval(
        &self,
        node: &Node,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        match &node.kind {
            NodeKind::IntLit(n) => Ok(Value::int(*n)),
            NodeKind::FloatLit(f) => Ok(Value::float(*f)),
            NodeKind::StringLit(bytes) => Ok(Value::string(bytes.clone())),
            NodeKind::StringInterp(parts) => self.eval_string_interp(parts, scope, ctx),
            NodeKind::SymbolLit(sym) => Ok(Value::symbol(*sym)),
            NodeKind::BoolLit(b) => Ok(Value::bool(*b)),
            NodeKind::NilLit => Ok(Value::Nil),
            NodeKind::ArrayLit(elems) => self.eval_array_lit(elems, scope, ctx),
            NodeKind::MapLit(entries) => self.eval_map_lit(entries, scope, ctx),
            NodeKind::Name(sym) => Ok(scope.lookup(*sym).unwrap_or(Value::Nil)),
            NodeKind::DottedName { base, fields } => {
                self.eval_dotted_name(base, fields, node.loc, scope, ctx)
            }
            NodeKind::Call { head, args, named } => {
                self.eval_call(head, args, named, node.loc, scope, ctx)
            }
            NodeKind::Infix { op, lhs, rhs } => self.eval_infix(*op, lhs, rhs, node.loc, scope, ctx),
            NodeKind::UnaryNot(operand) => {
                let val = self.eval(operand, scope, ctx)?;
                Ok(Value::bool(!val.truthy()))
            }
            NodeKind::UnaryNegate(operand) => {
                let val = self.eval(operand, scope, ctx)?;
                match val {
                    Value::Int(n) => Ok(Value::int(n.wrapping_neg())),
                    Value::Float(f) => Ok(Value::float(-f)),
                    other => Err(self.err(
                        format!("Cannot negate {}", other.type_name()),
                        node.loc,
                    )),
                }
            }
            NodeKind::Ref(operand) => self.eval(operand, scope, ctx),
            NodeKind::Block(stmts) => self.eval_block(stmts, scope, ctx),
            NodeKind::Index { target, index } => self.eval_index(target, index, node.loc, scope, ctx),
            NodeKind::If { arms, else_body } => self.eval_if(arms, else_body.as_ref(), scope, ctx),
            NodeKind::For {
                var,
                iterable,
                body,
            } => self.eval_for(*var, iterable, body, node.loc, scope, ctx),
            NodeKind::While { cond, body } => self.eval_while(cond, body, scope, ctx),
            NodeKind::Match { scrutinee, arms } => self.eval_match(scrutinee, arms, scope, ctx),
            NodeKind::Set { target, value } => self.eval_set(target, value, node.loc, scope, ctx),
            NodeKind::Let { name, value } => {
                let val = self.eval(value, scope, ctx)?;
                scope.define(*name, val.clone());
                Ok(val)
            }
            NodeKind::Fn(def) => self.eval_fn(def, scope),
            NodeKind::On { event, body } => self.eval_on(*event, body, node.loc, scope, ctx),
            NodeKind::Return(value) => {
                let val = match value {
                    Some(node) => self.eval(node, scope, ctx)?,
                    None => Value::Nil,
                };
                Err(EvalBreak::Return(val))
            }
            NodeKind::Source(filename) => self.eval_source(filename, node.loc, scope, ctx),
        }
    }

    // -- Literals and simple forms --

    fn eval_string_interp(
        &self,
        parts: &[Rc<Node>],
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let mut out: Vec<u8> = Vec::new();
        for part in parts {
            let val = self.eval(part, scope, ctx)?;
            let rendered = val.to_display_string(Some(&self.interner.borrow()));
            out.extend_from_slice(rendered.as_bytes());
        }
        Ok(Value::string(out))
    }

    fn eval_array_lit(
        &self,
        elems: &[Rc<Node>],
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let mut out = Vec::with_capacity(elems.len());
        for elem in elems {
            out.push(self.eval(elem, scope, ctx)?);
        }
        Ok(Value::array(out))
    }

    fn eval_map_lit(
        &self,
        entries: &[(Sym, Rc<Node>)],
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let mut data = MapData::new();
        for (key, value_node) in entries {
            let val = self.eval(value_node, scope, ctx)?;
            let auto = self.is_auto_method(&val);
            data.set(*key, val);
            if auto {
                data.mark_method(*key);
            } else {
                data.clear_method(*key);
            }
        }
        Ok(Value::map_from_data(data))
    }

    fn eval_block(
        &self,
        stmts: &[Rc<Node>],
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let mut result = Value::Nil;
        for stmt in stmts {
            result = self.eval(stmt, scope, ctx)?;
        }
        Ok(result)
    }

    // -- Field access --

    fn eval_dotted_name(
        &self,
        base: &Rc<Node>,
        fields: &[Sym],
        loc: SourceLoc,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let mut current = self.eval(base, scope, ctx)?;

        for &field in fields {
            current = match &current {
                Value::Map(map) => {
                    // Zero-arg built-in map properties
                    if field == self.syms.keys {
                        let keys = map.borrow().keys();
                        Value::array(keys.into_iter().map(Value::symbol).collect())
                    } else if field == self.syms.values {
                        let map = map.borrow();
                        let keys = map.keys();
                        Value::array(keys.into_iter().map(|k| map.get(k)).collect())
                    } else {
                        let value = map.borrow().get(field);
                        value
                    }
                }
                Value::Array(arr) => {
                    if field == self.syms.length {
                        Value::int(arr.borrow().len() as i64)
                    } else if field == self.syms.pop {
                        let popped = arr.borrow_mut().pop();
                        match popped {
                            Some(last) => last,
                            None => {
                                return Err(self.err("Cannot pop from empty array", loc));
                            }
                        }
                    } else {
                        return Err(self.err(
                            format!("Cannot access field '{}' on array", self.resolve(field)),
                            loc,
                        ));
                    }
                }
                Value::String(s) => {
                    if field == self.syms.length {
                        Value::int(s.borrow().len() as i64)
                    } else {
                        return Err(self.err(
                            format!("Cannot access field '{}' on string", self.resolve(field)),
                            loc,
                        ));
                    }
                }
                other => {
                    return Err(self.err(
                        format!(
                            "Cannot access field '{}' on {}",
                            self.resolve(field),
                            other.type_name()
                        ),
                        loc,
                    ));
                }
            };
        }

        Ok(current)
    }

    // -- Indexing --

    fn eval_index(
        &self,
        target: &Rc<Node>,
        index: &Rc<Node>,
        loc: SourceLoc,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let target = self.eval(target, scope, ctx)?;
        let index = self.eval(index, scope, ctx)?;

        match &target {
            Value::Array(arr) => {
                let Some(raw) = index.as_int() else {
                    return Err(self.err("Array index must be an integer", loc));
                };
                let arr = arr.borrow();
                let mut idx = raw;
                if idx < 0 {
                    idx += arr.len() as i64;
                }
                if idx < 0 || idx >= arr.len() as i64 {
                    return Err(self.err(format!("Array index out of bounds: {raw}"), loc));
                }
                Ok(arr[idx as usize].clone())
            }
            Value::String(s) => {
                let Some(raw) = index.as_int() else {
                    return Err(self.err("String index must be an integer", loc));
                };
                let s = s.borrow();
                let mut idx = raw;
                if idx < 0 {
                    idx += s.len() as i64;
                }
                if idx < 0 || idx >= s.len() as i64 {
                    return Err(self.err(format!("String index out of bounds: {raw}"), loc));
                }
                Ok(Value::string(vec![s[idx as usize]]))
            }
            Value::Map(map) => {
                let Some(key) = index.as_symbol() else {
                    return Err(self.err("Map key must be a symbol", loc));
                };
                let value = map.borrow().get(key);
                Ok(value)
            }
            other => Err(self.err(format!("Cannot index {}", other.type_name()), loc)),
        }
    }

    // -- Assignment --

    fn eval_set(
        &self,
        target: &[Sym],
        value: &Rc<Node>,
        loc: SourceLoc,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let val = self.eval(value, scope, ctx)?;

        if target.len() == 1 {
            scope.set(target[0], val.clone());
            return Ok(val);
        }

        // Dotted target: walk maps through all but the last field
        let Some(root) = scope.lookup(target[0]) else {
            return Err(self.err(
                format!("Undefined variable '{}'", self.resolve(target[0])),
                loc,
            ));
        };

        let mut current = root;
        for &field in &target[1..target.len() - 1] {
            current = match &current {
                Value::Map(map) => {
                    let next = map.borrow().get(field);
                    next
                }
                other => {
                    return Err(self.err(
                        format!(
                            "Cannot access field '{}' on {}",
                            self.resolve(field),
                            other.type_name()
                        ),
                        loc,
                    ));
                }
            };
        }

        match &current {
            Value::Map(map) => {
                let last = *target.last().unwrap();
                let auto = self.is_auto_method(&val);
                let mut data = map.borrow_mut();
                data.set(last, val.clone());
                // The auto-method rule re-evaluates on every overwrite
                if auto {
                    data.mark_method(last);
                } else {
                    data.clear_method(last);
                }
            }
            other => {
                return Err(self.err(
                    format!("Cannot set field on {}", other.type_name()),
                    loc,
                ));
            }
        }

        Ok(val)
    }

    // -- Functions --

    fn eval_fn(&self, def: &Rc<FnDef>, scope: &Rc<Scope>) -> EvalResult {
        let closure = Rc::new(Closure {
            params: def.params.clone(),
            num_required: def.num_required,
            defaults: def.defaults.clone(),
            rest_param: def.rest_param,
            kwargs_param: def.kwargs_param,
            body: Rc::clone(&def.body),
            scope: Rc::clone(scope),
            name: def.name,
        });
        let value = Value::closure(closure);

        if let Some(name) = def.name {
            scope.define(name, value.clone());
        }
        Ok(value)
    }

    // -- Control flow --

    fn eval_if(
        &self,
        arms: &[(Rc<Node>, Rc<Node>)],
        else_body: Option<&Rc<Node>>,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        for (cond, body) in arms {
            if self.eval(cond, scope, ctx)?.truthy() {
                return self.eval(body, scope, ctx);
            }
        }
        match else_body {
            Some(body) => self.eval(body, scope, ctx),
            None => Ok(Value::Nil),
        }
    }

    fn eval_for(
        &self,
        var: Sym,
        iterable: &Rc<Node>,
        body: &Rc<Node>,
        loc: SourceLoc,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let iterable = self.eval(iterable, scope, ctx)?;
        let Value::Array(arr) = &iterable else {
            return Err(self.err(
                format!("Cannot iterate over {}", iterable.type_name()),
                loc,
            ));
        };

        // One child scope shared across iterations: the loop variable is
        // redefined each pass, so closures made in the body all observe the
        // same binding.
        let loop_scope = scope.child();
        loop_scope.define(var, Value::Nil);

        let elems: Vec<Value> = arr.borrow().clone();
        let mut result = Value::Nil;
        for elem in elems {
            loop_scope.define(var, elem);
            result = self.eval(body, &loop_scope, ctx)?;
        }
        Ok(result)
    }

    fn eval_while(
        &self,
        cond: &Rc<Node>,
        body: &Rc<Node>,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let mut result = Value::Nil;
        while self.eval(cond, scope, ctx)?.truthy() {
            result = self.eval(body, scope, ctx)?;
        }
        Ok(result)
    }

    fn eval_match(
        &self,
        scrutinee: &Rc<Node>,
        arms: &[(Rc<Node>, Rc<Node>)],
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let scrutinee = self.eval(scrutinee, scope, ctx)?;

        for (pattern, body) in arms {
            // The wildcard matches unconditionally
            if matches!(pattern.kind, NodeKind::Name(sym) if sym == self.syms.underscore) {
                return self.eval(body, scope, ctx);
            }
            let pat_val = self.eval(pattern, scope, ctx)?;
            if scrutinee == pat_val {
                return self.eval(body, scope, ctx);
            }
        }

        Ok(Value::Nil)
    }

    // -- Events --

    fn eval_on(
        &self,
        event: Sym,
        body: &Rc<Node>,
        loc: SourceLoc,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let Some(ctx) = ctx else {
            return Err(self.err("'on' requires an execution context", loc));
        };

        let name = {
            let event_name = self.resolve(event);
            self.interner.borrow_mut().intern(format!("on:{event_name}").as_bytes())
        };
        let handler = Value::closure(Rc::new(Closure {
            params: Vec::new(),
            num_required: 0,
            defaults: Vec::new(),
            rest_param: None,
            kwargs_param: None,
            body: Rc::clone(body),
            scope: Rc::clone(scope),
            name: Some(name),
        }));

        ctx.register_event_handler(event, handler);
        Ok(Value::Nil)
    }

    // -- Source inclusion --

    fn eval_source(
        &self,
        filename: &Rc<Node>,
        loc: SourceLoc,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let Some(loader) = self.loader else {
            return Err(self.err("'source' not available (no script engine configured)", loc));
        };

        let filename = self.eval(filename, scope, ctx)?;
        let Value::String(s) = &filename else {
            return Err(self.err("source requires a string filename", loc));
        };
        let name = String::from_utf8_lossy(&s.borrow()).into_owned();

        let root = loader.load_script(&name, loc).map_err(EvalBreak::Error)?;
        // Shell-source semantics: evaluate in the current scope
        self.eval(&root, scope, ctx)
    }

    // -- Calls --

    fn eval_named_args(
        &self,
        named: &[(Sym, Rc<Node>)],
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult<Vec<(Sym, Value)>> {
        let mut out = Vec::with_capacity(named.len());
        for (key, node) in named {
            out.push((*key, self.eval(node, scope, ctx)?));
        }
        Ok(out)
    }

    fn named_args_to_map(&self, named: Vec<(Sym, Value)>) -> Value {
        let mut data = MapData::new();
        for (key, val) in named {
            data.set(key, val);
        }
        Value::map_from_data(data)
    }

    fn eval_call(
        &self,
        head: &Rc<Node>,
        args: &[Rc<Node>],
        named: &[(Sym, Rc<Node>)],
        loc: SourceLoc,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        // Method call: the head is a dotted name
        if let NodeKind::DottedName { base, fields } = &head.kind {
            let mut receiver = self.eval(base, scope, ctx)?;

            // Navigate through all but the last field
            for &field in &fields[..fields.len() - 1] {
                receiver = match &receiver {
                    Value::Map(map) => {
                        let next = map.borrow().get(field);
                        next
                    }
                    other => {
                        return Err(self.err(
                            format!(
                                "Cannot access field '{}' on {}",
                                self.resolve(field),
                                other.type_name()
                            ),
                            loc,
                        ));
                    }
                };
            }

            let method = *fields.last().unwrap();

            // Positional arguments only; named arguments apply to
            // user-defined callables below
            let mut call_args = Vec::with_capacity(args.len());
            for arg in args {
                call_args.push(self.eval(arg, scope, ctx)?);
            }

            // Built-in container methods (no named arguments)
            if self.is_builtin_method(&receiver, method) {
                return self.dispatch_builtin_method(&receiver, method, call_args, ctx, loc);
            }

            // Map field holding a user-defined method or stored function
            if let Value::Map(map) = &receiver {
                let entry = {
                    let data = map.borrow();
                    if data.has(method) {
                        Some((data.get(method), data.is_method(method)))
                    } else {
                        None
                    }
                };
                if let Some((func, is_method)) = entry {
                    if is_method {
                        // Auto-inject the receiver as the first argument
                        call_args.insert(0, receiver.clone());
                    }
                    // Zero-arg access on a non-callable field is a read
                    if call_args.is_empty() && named.is_empty() && !func.is_callable() {
                        return Ok(func);
                    }
                    if !named.is_empty() {
                        let named_args = self.eval_named_args(named, scope, ctx)?;
                        match &func {
                            Value::Closure(closure) => {
                                return self.call_closure_with_named(
                                    closure, call_args, named_args, ctx,
                                );
                            }
                            Value::Native(_) => {
                                call_args.push(self.named_args_to_map(named_args));
                            }
                            _ => {}
                        }
                    }
                    return self.call_function(&func, call_args, ctx, loc);
                }
            }

            // Zero-arg call with no method found degrades to a field read
            if call_args.is_empty() && named.is_empty() {
                return self.eval_dotted_name(base, fields, loc, scope, ctx);
            }

            return Err(self.err(
                format!(
                    "No method '{}' on {}",
                    self.resolve(method),
                    receiver.type_name()
                ),
                loc,
            ));
        }

        // Regular prefix call
        let verb = self.eval(head, scope, ctx)?;

        let mut call_args = Vec::with_capacity(args.len());
        for arg in args {
            call_args.push(self.eval(arg, scope, ctx)?);
        }

        // Zero-arg call on a non-callable yields the value unchanged; this
        // is how bare-name statements read their binding
        if call_args.is_empty() && named.is_empty() && !verb.is_callable() {
            return Ok(verb);
        }

        if !named.is_empty() {
            let named_args = self.eval_named_args(named, scope, ctx)?;
            match &verb {
                Value::Closure(closure) => {
                    return self.call_closure_with_named(closure, call_args, named_args, ctx);
                }
                Value::Native(_) => {
                    call_args.push(self.named_args_to_map(named_args));
                }
                _ => {}
            }
        }

        self.call_function(&verb, call_args, ctx, loc)
    }

    /// Call any callable value with already-evaluated arguments. Used by the
    /// evaluator itself, by built-in higher-order methods, and by the host
    /// through the engine.
    pub fn call_function(
        &self,
        callable: &Value,
        args: Vec<Value>,
        ctx: Option<&ExecutionContext>,
        loc: SourceLoc,
    ) -> EvalResult {
        match callable {
            Value::Closure(closure) => self.call_closure(closure, args, ctx),
            Value::Native(native) => {
                let Some(ctx) = ctx else {
                    return Err(
                        self.err("Cannot call native function without execution context", loc)
                    );
                };
                (native.func)(ctx, &args).map_err(EvalBreak::Error)
            }
            other => Err(self.err(
                format!("Value is not callable: {}", other.type_name()),
                loc,
            )),
        }
    }

    fn call_closure(
        &self,
        closure: &Rc<Closure>,
        args: Vec<Value>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let call_scope = closure.scope.child();

        for (i, &param) in closure.params.iter().enumerate() {
            if i < args.len() {
                call_scope.define(param, args[i].clone());
            } else if i >= closure.num_required
                && (i - closure.num_required) < closure.defaults.len()
            {
                // Default expressions evaluate at call time, in the
                // partially-filled frame
                let default =
                    self.eval(&closure.defaults[i - closure.num_required], &call_scope, ctx)?;
                call_scope.define(param, default);
            } else {
                call_scope.define(param, Value::Nil);
            }
        }

        if let Some(rest) = closure.rest_param {
            let rest_args: Vec<Value> = args.iter().skip(closure.params.len()).cloned().collect();
            call_scope.define(rest, Value::array(rest_args));
        }
        if let Some(kwargs) = closure.kwargs_param {
            call_scope.define(kwargs, Value::map());
        }

        match self.eval(&closure.body, &call_scope, ctx) {
            Err(EvalBreak::Return(value)) => Ok(value),
            other => other,
        }
    }

    pub(crate) fn call_closure_with_named(
        &self,
        closure: &Rc<Closure>,
        pos_args: Vec<Value>,
        named_args: Vec<(Sym, Value)>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        let call_scope = closure.scope.child();
        let mut named_used = vec![false; named_args.len()];

        for (i, &param) in closure.params.iter().enumerate() {
            if i < pos_args.len() {
                call_scope.define(param, pos_args[i].clone());
                continue;
            }
            if let Some(j) = named_args.iter().position(|(key, _)| *key == param) {
                call_scope.define(param, named_args[j].1.clone());
                named_used[j] = true;
                continue;
            }
            if i >= closure.num_required && (i - closure.num_required) < closure.defaults.len() {
                let default =
                    self.eval(&closure.defaults[i - closure.num_required], &call_scope, ctx)?;
                call_scope.define(param, default);
            } else {
                call_scope.define(param, Value::Nil);
            }
        }

        if let Some(rest) = closure.rest_param {
            let rest_args: Vec<Value> = pos_args
                .iter()
                .skip(closure.params.len())
                .cloned()
                .collect();
            call_scope.define(rest, Value::array(rest_args));
        }
        if let Some(kwargs) = closure.kwargs_param {
            let mut data = MapData::new();
            for (j, (key, val)) in named_args.into_iter().enumerate() {
                if !named_used[j] {
                    data.set(key, val);
                }
            }
            call_scope.define(kwargs, Value::map_from_data(data));
        }

        match self.eval(&closure.body, &call_scope, ctx) {
            Err(EvalBreak::Return(value)) => Ok(value),
            other => other,
        }
    }

    // -- Infix --

    fn eval_infix(
        &self,
        op: BinOp,
        lhs: &Rc<Node>,
        rhs: &Rc<Node>,
        loc: SourceLoc,
        scope: &Rc<Scope>,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult {
        // Short-circuiting operators
        match op {
            BinOp::And => {
                let left = self.eval(lhs, scope, ctx)?;
                if !left.truthy() {
                    return Ok(left);
                }
                return self.eval(rhs, scope, ctx);
            }
            BinOp::Or => {
                let left = self.eval(lhs, scope, ctx)?;
                if left.truthy() {
                    return Ok(left);
                }
                return self.eval(rhs, scope, ctx);
            }
            BinOp::NilCoalesce => {
                let left = self.eval(lhs, scope, ctx)?;
                if !left.is_nil() {
                    return Ok(left);
                }
                return self.eval(rhs, scope, ctx);
            }
            BinOp::FalsyCoalesce => {
                let left = self.eval(lhs, scope, ctx)?;
                if left.truthy() {
                    return Ok(left);
                }
                return self.eval(rhs, scope, ctx);
            }
            _ => {}
        }

        let left = self.eval(lhs, scope, ctx)?;
        let right = self.eval(rhs, scope, ctx)?;
        self.apply_bin_op(op, &left, &right, loc)
    }
}
