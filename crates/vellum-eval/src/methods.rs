//! Built-in methods on maps, arrays and strings, dispatched on receiver kind
//! plus method symbol. None of these accept named arguments. String
//! operations are byte-oriented throughout.

use std::cmp::Ordering;

use vellum_core::{EvalBreak, EvalResult, ExecutionContext, SourceLoc, Sym, Value};

use crate::eval::Evaluator;

/// Byte-slice substring search, non-overlapping, from `start`.
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if start > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(start);
    }
    if needle.len() > haystack.len() - start {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + start)
}

impl<'e> Evaluator<'e> {
    pub(crate) fn is_builtin_method(&self, receiver: &Value, method: Sym) -> bool {
        match receiver {
            Value::Map(_) => self.is_builtin_map_method(method),
            Value::Array(_) => self.is_builtin_array_method(method),
            Value::String(_) => self.is_builtin_string_method(method),
            _ => false,
        }
    }

    fn is_builtin_map_method(&self, sym: Sym) -> bool {
        let s = &self.syms;
        sym == s.get
            || sym == s.set
            || sym == s.has
            || sym == s.remove
            || sym == s.keys
            || sym == s.values
            || sym == s.set_method
    }

    fn is_builtin_array_method(&self, sym: Sym) -> bool {
        let s = &self.syms;
        sym == s.length
            || sym == s.push
            || sym == s.pop
            || sym == s.get
            || sym == s.set
            || sym == s.slice
            || sym == s.contains
            || sym == s.sort
            || sym == s.sort_by
            || sym == s.map
            || sym == s.filter
            || sym == s.foreach
    }

    fn is_builtin_string_method(&self, sym: Sym) -> bool {
        let s = &self.syms;
        sym == s.length
            || sym == s.get
            || sym == s.set
            || sym == s.char_at
            || sym == s.push
            || sym == s.insert
            || sym == s.delete
            || sym == s.replace
            || sym == s.find
            || sym == s.contains
            || sym == s.substr
            || sym == s.slice
            || sym == s.split
            || sym == s.upper
            || sym == s.lower
            || sym == s.trim
            || sym == s.starts_with
            || sym == s.ends_with
    }

    pub(crate) fn dispatch_builtin_method(
        &self,
        receiver: &Value,
        method: Sym,
        args: Vec<Value>,
        ctx: Option<&ExecutionContext>,
        loc: SourceLoc,
    ) -> EvalResult {
        match receiver {
            Value::Map(_) => self.dispatch_map_method(receiver, method, args, loc),
            Value::Array(_) => self.dispatch_array_method(receiver, method, args, ctx, loc),
            Value::String(_) => self.dispatch_string_method(receiver, method, args, loc),
            _ => Err(self.err("Unknown built-in method", loc)),
        }
    }

    // -- Map methods --

    fn dispatch_map_method(
        &self,
        receiver: &Value,
        method: Sym,
        args: Vec<Value>,
        loc: SourceLoc,
    ) -> EvalResult {
        let s = &self.syms;
        let map = receiver.map_handle().unwrap();

        if method == s.get {
            let key = self.expect_symbol_arg(&args, 0, "map.get requires a key argument", loc)?;
            let value = map.borrow().get(key);
            return Ok(value);
        }
        if method == s.set {
            if args.len() < 2 {
                return Err(self.err("map.set requires key and value arguments", loc));
            }
            let key = self.expect_symbol_arg(&args, 0, "map.set requires a key argument", loc)?;
            let value = args[1].clone();
            let auto = self.is_auto_method(&value);
            let mut data = map.borrow_mut();
            data.set(key, value.clone());
            if auto {
                data.mark_method(key);
            } else {
                data.clear_method(key);
            }
            return Ok(value);
        }
        if method == s.has {
            let key = self.expect_symbol_arg(&args, 0, "map.has requires a key argument", loc)?;
            let has = map.borrow().has(key);
            return Ok(Value::bool(has));
        }
        if method == s.remove {
            let key =
                self.expect_symbol_arg(&args, 0, "map.remove requires a key argument", loc)?;
            let removed = map.borrow_mut().remove(key);
            return Ok(Value::bool(removed));
        }
        if method == s.keys {
            let keys = map.borrow().keys();
            return Ok(Value::array(keys.into_iter().map(Value::symbol).collect()));
        }
        if method == s.values {
            let data = map.borrow();
            let keys = data.keys();
            return Ok(Value::array(keys.into_iter().map(|k| data.get(k)).collect()));
        }
        if method == s.set_method {
            if args.len() < 2 {
                return Err(self.err("map.setMethod requires name and function arguments", loc));
            }
            let key = self.expect_symbol_arg(&args, 0, "Method name must be a symbol", loc)?;
            map.borrow_mut().set_method(key, args[1].clone());
            return Ok(args[1].clone());
        }

        Err(self.err("Unknown built-in method", loc))
    }

    // -- Array methods --

    fn dispatch_array_method(
        &self,
        receiver: &Value,
        method: Sym,
        args: Vec<Value>,
        ctx: Option<&ExecutionContext>,
        loc: SourceLoc,
    ) -> EvalResult {
        let s = &self.syms;
        let arr = receiver.array_handle().unwrap();

        if method == s.length {
            return Ok(Value::int(arr.borrow().len() as i64));
        }
        if method == s.push {
            let mut items = arr.borrow_mut();
            for arg in args {
                items.push(arg);
            }
            return Ok(Value::int(items.len() as i64));
        }
        if method == s.pop {
            return match arr.borrow_mut().pop() {
                Some(last) => Ok(last),
                None => Err(self.err("Cannot pop from empty array", loc)),
            };
        }
        if method == s.get {
            let idx = self.expect_int_arg(&args, 0, "array.get requires an index", loc)?;
            let items = arr.borrow();
            let idx = self.wrap_index(idx, items.len(), "Array index out of bounds", loc)?;
            return Ok(items[idx].clone());
        }
        if method == s.set {
            if args.len() < 2 {
                return Err(self.err("array.set requires index and value", loc));
            }
            let idx = self.expect_int_arg(&args, 0, "array.set requires an index", loc)?;
            let mut items = arr.borrow_mut();
            let idx = self.wrap_index(idx, items.len(), "Array index out of bounds", loc)?;
            items[idx] = args[1].clone();
            return Ok(args[1].clone());
        }
        if method == s.slice {
            let start = self.expect_int_arg(&args, 0, "array.slice requires start index", loc)?;
            let items = arr.borrow();
            let (start, end) = clamp_slice(start, args.get(1).and_then(|a| a.as_int()), items.len());
            return Ok(Value::array(items[start..end].to_vec()));
        }
        if method == s.contains {
            if args.is_empty() {
                return Err(self.err("array.contains requires a value", loc));
            }
            let found = arr.borrow().iter().any(|elem| *elem == args[0]);
            return Ok(Value::bool(found));
        }
        if method == s.sort {
            // Take the elements out so user-visible aliasing during the sort
            // cannot alias a live mutable borrow
            let mut items = std::mem::take(&mut *arr.borrow_mut());
            items.sort_by(|a, b| match (a, b) {
                (Value::Int(x), Value::Int(y)) => x.cmp(y),
                (Value::String(x), Value::String(y)) => {
                    let (x, y) = (x.borrow(), y.borrow());
                    x.as_slice().cmp(y.as_slice())
                }
                _ => match (a.as_number(), b.as_number()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                },
            });
            *arr.borrow_mut() = items;
            return Ok(receiver.clone());
        }
        if method == s.sort_by {
            if args.is_empty() || !args[0].is_callable() {
                return Err(self.err("array.sort_by requires a comparator function", loc));
            }
            let comparator = args[0].clone();
            let mut items = std::mem::take(&mut *arr.borrow_mut());
            let mut failed: Option<EvalBreak> = None;
            items.sort_by(|a, b| {
                if failed.is_some() {
                    return Ordering::Equal;
                }
                match self.call_function(&comparator, vec![a.clone(), b.clone()], ctx, loc) {
                    Ok(v) if v.truthy() => Ordering::Less,
                    Ok(_) => Ordering::Greater,
                    Err(e) => {
                        failed = Some(e);
                        Ordering::Equal
                    }
                }
            });
            *arr.borrow_mut() = items;
            if let Some(e) = failed {
                return Err(e);
            }
            return Ok(receiver.clone());
        }
        if method == s.map {
            if args.is_empty() || !args[0].is_callable() {
                return Err(self.err("array.map requires a function argument", loc));
            }
            let items: Vec<Value> = arr.borrow().clone();
            let mut out = Vec::with_capacity(items.len());
            for elem in items {
                out.push(self.call_function(&args[0], vec![elem], ctx, loc)?);
            }
            return Ok(Value::array(out));
        }
        if method == s.filter {
            if args.is_empty() || !args[0].is_callable() {
                return Err(self.err("array.filter requires a function argument", loc));
            }
            let items: Vec<Value> = arr.borrow().clone();
            let mut out = Vec::new();
            for elem in items {
                let keep = self.call_function(&args[0], vec![elem.clone()], ctx, loc)?;
                if keep.truthy() {
                    out.push(elem);
                }
            }
            return Ok(Value::array(out));
        }
        if method == s.foreach {
            if args.is_empty() || !args[0].is_callable() {
                return Err(self.err("array.foreach requires a function argument", loc));
            }
            let items: Vec<Value> = arr.borrow().clone();
            for elem in items {
                self.call_function(&args[0], vec![elem], ctx, loc)?;
            }
            return Ok(Value::Nil);
        }

        Err(self.err("Unknown built-in method", loc))
    }

    // -- String methods --

    fn dispatch_string_method(
        &self,
        receiver: &Value,
        method: Sym,
        args: Vec<Value>,
        loc: SourceLoc,
    ) -> EvalResult {
        let s = &self.syms;
        let handle = receiver.string_handle().unwrap();

        if method == s.length {
            return Ok(Value::int(handle.borrow().len() as i64));
        }
        if method == s.get || method == s.char_at {
            let idx = self.expect_int_arg(&args, 0, "string.get requires an index", loc)?;
            let bytes = handle.borrow();
            let idx = self.wrap_index(idx, bytes.len(), "String index out of bounds", loc)?;
            return Ok(Value::string(vec![bytes[idx]]));
        }
        if method == s.set {
            if args.len() < 2 {
                return Err(self.err("string.set requires index and character", loc));
            }
            let idx = self.expect_int_arg(&args, 0, "String index must be an integer", loc)?;
            let replacement = self.expect_string_arg(&args, 1, "string.set value must be a string", loc)?;
            let mut bytes = handle.borrow_mut();
            let idx = self.wrap_index(idx, bytes.len(), "String index out of bounds", loc)?;
            bytes.splice(idx..idx + 1, replacement);
            return Ok(receiver.clone());
        }
        if method == s.push {
            let suffix = self.expect_string_arg(&args, 0, "string.push requires a string argument", loc)?;
            handle.borrow_mut().extend_from_slice(&suffix);
            return Ok(receiver.clone());
        }
        if method == s.insert {
            if args.len() < 2 {
                return Err(self.err("string.insert requires index and string", loc));
            }
            let idx = self.expect_int_arg(&args, 0, "Insert index must be an integer", loc)?;
            let insert = self.expect_string_arg(&args, 1, "Insert value must be a string", loc)?;
            let mut bytes = handle.borrow_mut();
            let len = bytes.len() as i64;
            let mut idx = idx;
            if idx < 0 {
                idx += len;
            }
            // Inserting at the very end is allowed
            if idx < 0 || idx > len {
                return Err(self.err("String insert index out of bounds", loc));
            }
            let idx = idx as usize;
            bytes.splice(idx..idx, insert);
            return Ok(receiver.clone());
        }
        if method == s.delete {
            let start = self.expect_int_arg(&args, 0, "string.delete requires a start index", loc)?;
            let mut bytes = handle.borrow_mut();
            let start = self.wrap_index(start, bytes.len(), "String delete index out of bounds", loc)?;
            let count = args
                .get(1)
                .and_then(|a| a.as_int())
                .map(|n| n.max(0) as usize)
                .unwrap_or(1);
            let end = (start + count).min(bytes.len());
            bytes.drain(start..end);
            return Ok(receiver.clone());
        }
        if method == s.replace {
            if args.len() < 2 {
                return Err(self.err("string.replace requires old and new strings", loc));
            }
            let old = self.expect_string_arg(&args, 0, "string.replace arguments must be strings", loc)?;
            let new = self.expect_string_arg(&args, 1, "string.replace arguments must be strings", loc)?;
            if old.is_empty() {
                return Ok(receiver.clone());
            }
            let mut bytes = handle.borrow_mut();
            let mut pos = 0;
            while let Some(found) = find_bytes(&bytes, &old, pos) {
                bytes.splice(found..found + old.len(), new.iter().copied());
                pos = found + new.len();
            }
            return Ok(receiver.clone());
        }
        if method == s.find {
            let needle = self.expect_string_arg(&args, 0, "string.find requires a search string", loc)?;
            let start = args
                .get(1)
                .and_then(|a| a.as_int())
                .map(|n| n.max(0) as usize)
                .unwrap_or(0);
            let bytes = handle.borrow();
            return Ok(match find_bytes(&bytes, &needle, start) {
                Some(pos) => Value::int(pos as i64),
                None => Value::int(-1),
            });
        }
        if method == s.contains {
            let needle =
                self.expect_string_arg(&args, 0, "string.contains requires a search string", loc)?;
            let bytes = handle.borrow();
            return Ok(Value::bool(find_bytes(&bytes, &needle, 0).is_some()));
        }
        if method == s.substr {
            let start = self.expect_int_arg(&args, 0, "string.substr requires a start index", loc)?;
            let bytes = handle.borrow();
            let len = bytes.len() as i64;
            let mut start = start;
            if start < 0 {
                start += len;
            }
            if start < 0 {
                start = 0;
            }
            if start >= len {
                return Ok(Value::string(Vec::new()));
            }
            let start = start as usize;
            let end = match args.get(1).and_then(|a| a.as_int()) {
                Some(n) => start.saturating_add(n.max(0) as usize).min(bytes.len()),
                None => bytes.len(),
            };
            return Ok(Value::string(bytes[start..end].to_vec()));
        }
        if method == s.slice {
            let start = self.expect_int_arg(&args, 0, "string.slice requires a start index", loc)?;
            let bytes = handle.borrow();
            let (start, end) = clamp_slice(start, args.get(1).and_then(|a| a.as_int()), bytes.len());
            return Ok(Value::string(bytes[start..end].to_vec()));
        }
        if method == s.split {
            let delim = self.expect_string_arg(&args, 0, "string.split requires a delimiter", loc)?;
            let bytes = handle.borrow();
            let mut parts = Vec::new();
            if delim.is_empty() {
                // Empty delimiter splits into one-byte pieces
                for &b in bytes.iter() {
                    parts.push(Value::string(vec![b]));
                }
            } else {
                let mut pos = 0;
                while let Some(found) = find_bytes(&bytes, &delim, pos) {
                    parts.push(Value::string(bytes[pos..found].to_vec()));
                    pos = found + delim.len();
                }
                parts.push(Value::string(bytes[pos..].to_vec()));
            }
            return Ok(Value::array(parts));
        }
        if method == s.upper {
            let mut bytes = handle.borrow().clone();
            bytes.make_ascii_uppercase();
            return Ok(Value::string(bytes));
        }
        if method == s.lower {
            let mut bytes = handle.borrow().clone();
            bytes.make_ascii_lowercase();
            return Ok(Value::string(bytes));
        }
        if method == s.trim {
            let bytes = handle.borrow();
            let start = bytes
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .unwrap_or(bytes.len());
            let end = bytes
                .iter()
                .rposition(|b| !b.is_ascii_whitespace())
                .map(|i| i + 1)
                .unwrap_or(start);
            return Ok(Value::string(bytes[start..end].to_vec()));
        }
        if method == s.starts_with {
            let prefix =
                self.expect_string_arg(&args, 0, "string.starts_with requires a string argument", loc)?;
            let bytes = handle.borrow();
            return Ok(Value::bool(bytes.starts_with(&prefix)));
        }
        if method == s.ends_with {
            let suffix =
                self.expect_string_arg(&args, 0, "string.ends_with requires a string argument", loc)?;
            let bytes = handle.borrow();
            return Ok(Value::bool(bytes.ends_with(&suffix)));
        }

        Err(self.err("Unknown built-in method", loc))
    }

    // -- Argument helpers --

    fn expect_symbol_arg(
        &self,
        args: &[Value],
        idx: usize,
        msg: &str,
        loc: SourceLoc,
    ) -> EvalResult<Sym> {
        match args.get(idx) {
            Some(v) => v
                .as_symbol()
                .ok_or_else(|| self.err("Map key must be a symbol", loc)),
            None => Err(self.err(msg, loc)),
        }
    }

    fn expect_int_arg(
        &self,
        args: &[Value],
        idx: usize,
        msg: &str,
        loc: SourceLoc,
    ) -> EvalResult<i64> {
        match args.get(idx) {
            Some(v) => v.as_int().ok_or_else(|| self.err(msg, loc)),
            None => Err(self.err(msg, loc)),
        }
    }

    fn expect_string_arg(
        &self,
        args: &[Value],
        idx: usize,
        msg: &str,
        loc: SourceLoc,
    ) -> EvalResult<Vec<u8>> {
        match args.get(idx) {
            Some(Value::String(h)) => Ok(h.borrow().clone()),
            _ => Err(self.err(msg, loc)),
        }
    }

    /// Negative indices count from the end; out-of-range fails.
    fn wrap_index(
        &self,
        raw: i64,
        len: usize,
        msg: &str,
        loc: SourceLoc,
    ) -> EvalResult<usize> {
        let mut idx = raw;
        if idx < 0 {
            idx += len as i64;
        }
        if idx < 0 || idx >= len as i64 {
            return Err(self.err(msg, loc));
        }
        Ok(idx as usize)
    }
}

/// Clamp slice bounds into `0..len`, with negative-from-end handling; an
/// inverted range yields an empty slice.
fn clamp_slice(start: i64, end: Option<i64>, len: usize) -> (usize, usize) {
    let len = len as i64;
    let mut start = start;
    let mut end = end.unwrap_or(len);
    if start < 0 {
        start += len;
    }
    if end < 0 {
        end += len;
    }
    start = start.clamp(0, len);
    end = end.clamp(0, len);
    if start > end {
        start = end;
    }
    (start as usize, end as usize)
}
